//! Session Handle - async front end of the session client
//!
//! The client runs inside one tokio task. Callers send [`SessionCommand`]s and
//! get the immediate issue result back on a oneshot; provider completions are
//! drained from their own channel by the same task, so all session state has a
//! single owner.
//!
//! ```text
//! SessionHandle ──commands──►┐
//!                            ├──► worker task ──► AttachedClient
//! Provider ──completions────►┘          │
//!                                       └──► watch<MatchmakingStatus>
//! ```

use super::client::{AttachedClient, MatchmakingStatus, SessionClient};
use super::provider::{CompletionReceiver, LocalPlayerIdentity, SharedProvider};
use super::SessionError;
use crate::diagnostics::DiagnosticsSink;
use crate::travel::TravelTrigger;
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

#[derive(Debug)]
pub enum SessionCommand {
    CreateGameSession {
        response_tx: oneshot::Sender<Result<(), SessionError>>,
    },
    JoinGameSession {
        response_tx: oneshot::Sender<Result<(), SessionError>>,
    },
    Shutdown,
}

pub struct SessionHandle {
    player: String,
    tx: mpsc::Sender<SessionCommand>,
    status_rx: watch::Receiver<MatchmakingStatus>,
    task_handle: Option<JoinHandle<()>>,
}

impl SessionHandle {
    /// Attaches a client to `provider` and spawns its worker task.
    ///
    /// `completions` must be the receiving half of the channel `provider` delivers to.
    pub fn spawn(
        provider: Option<SharedProvider>,
        completions: CompletionReceiver,
        identity: Arc<dyn LocalPlayerIdentity>,
        travel: Arc<dyn TravelTrigger>,
        diagnostics: DiagnosticsSink,
    ) -> Self {
        let player = identity.display_name();
        info!("Spawning session worker for {}", player);

        let client = SessionClient::create(provider, identity, travel, diagnostics).attach();
        let status_rx = client.subscribe();
        let (tx, rx) = mpsc::channel(32);

        let worker_player = player.clone();
        let task_handle = tokio::spawn(async move {
            run_session_worker(client, rx, completions).await;
            info!("Session worker for {} stopped", worker_player);
        });

        Self {
            player,
            tx,
            status_rx,
            task_handle: Some(task_handle),
        }
    }

    pub fn player(&self) -> &str {
        &self.player
    }

    pub async fn create_game_session(&self) -> Result<(), SessionError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(SessionCommand::CreateGameSession { response_tx })
            .await?;
        response_rx
            .await
            .map_err(|_| SessionError::WorkerUnavailable)?
    }

    pub async fn join_game_session(&self) -> Result<(), SessionError> {
        let (response_tx, response_rx) = oneshot::channel();
        self.send(SessionCommand::JoinGameSession { response_tx })
            .await?;
        response_rx
            .await
            .map_err(|_| SessionError::WorkerUnavailable)?
    }

    pub fn subscribe(&self) -> watch::Receiver<MatchmakingStatus> {
        self.status_rx.clone()
    }

    pub fn status(&self) -> MatchmakingStatus {
        self.status_rx.borrow().clone()
    }

    /// Stops the worker and waits for it to finish
    pub async fn shutdown(&mut self) {
        debug!("Sending shutdown to session worker of {}", self.player);
        if self.tx.send(SessionCommand::Shutdown).await.is_err() {
            debug!("Session worker of {} already gone", self.player);
        }

        if let Some(handle) = self.task_handle.take() {
            if let Err(e) = handle.await {
                error!("Session worker of {} panicked: {}", self.player, e);
            }
        }
    }

    async fn send(&self, command: SessionCommand) -> Result<(), SessionError> {
        self.tx.send(command).await.map_err(|e| {
            error!("Failed to reach session worker of {}: {}", self.player, e);
            SessionError::WorkerUnavailable
        })
    }
}

async fn run_session_worker(
    mut client: AttachedClient,
    mut commands: mpsc::Receiver<SessionCommand>,
    mut completions: CompletionReceiver,
) {
    debug!("Session worker loop started (online: {})", client.is_online());

    loop {
        tokio::select! {
            command = commands.recv() => match command {
                Some(SessionCommand::CreateGameSession { response_tx }) => {
                    let result = client.create_game_session();
                    if response_tx.send(result).is_err() {
                        debug!("Create caller went away before the response");
                    }
                }
                Some(SessionCommand::JoinGameSession { response_tx }) => {
                    let result = client.join_game_session();
                    if response_tx.send(result).is_err() {
                        debug!("Join caller went away before the response");
                    }
                }
                Some(SessionCommand::Shutdown) | None => break,
            },

            Some(completion) = completions.recv() => {
                debug!("Completion {} received", completion.ticket());
                client.handle_completion(completion);
                debug!("Role is now {}", client.status().role);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::operation::OperationState;
    use crate::session::provider::{OperationKind, ProviderCompletion};
    use crate::session::testing::{FakePlayer, RecordingProvider, RecordingTravel, TravelCall};
    use crate::session::LOBBY_MAP_URL;
    use std::time::Duration;

    async fn wait_for(
        rx: &mut watch::Receiver<MatchmakingStatus>,
        predicate: impl Fn(&MatchmakingStatus) -> bool,
    ) -> MatchmakingStatus {
        tokio::time::timeout(Duration::from_secs(2), rx.wait_for(|s| predicate(s)))
            .await
            .expect("timed out waiting for status")
            .expect("status channel closed")
            .clone()
    }

    #[tokio::test]
    async fn completion_from_channel_drives_travel() {
        let provider = Arc::new(RecordingProvider::new());
        let travel = Arc::new(RecordingTravel::default());
        let (completion_tx, completion_rx) = mpsc::unbounded_channel();
        let shared: SharedProvider = provider.clone();

        let mut handle = SessionHandle::spawn(
            Some(shared),
            completion_rx,
            Arc::new(FakePlayer::with_id("host")),
            travel.clone(),
            DiagnosticsSink::log_only("test"),
        );

        handle.create_game_session().await.unwrap();
        let ticket = provider.calls()[0].ticket();
        assert_eq!(ticket.kind, OperationKind::Create);

        completion_tx
            .send(ProviderCompletion::CreateSession {
                ticket,
                session_name: "GameSession".into(),
                success: true,
            })
            .unwrap();

        let mut status_rx = handle.subscribe();
        let status = wait_for(&mut status_rx, |s| s.create == OperationState::Completed).await;
        assert!(status.online);
        assert_eq!(
            travel.calls(),
            vec![TravelCall::Server(LOBBY_MAP_URL.to_string())]
        );

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn refusal_is_returned_to_caller() {
        let provider = Arc::new(RecordingProvider::new());
        let (_completion_tx, completion_rx) = mpsc::unbounded_channel();
        let shared: SharedProvider = provider.clone();

        let mut handle = SessionHandle::spawn(
            Some(shared),
            completion_rx,
            Arc::new(FakePlayer::with_id("guest")),
            Arc::new(RecordingTravel::default()),
            DiagnosticsSink::log_only("test"),
        );

        assert!(handle.join_game_session().await.is_ok());
        assert!(matches!(
            handle.join_game_session().await,
            Err(SessionError::OperationPending(OperationKind::Find))
        ));
        assert_eq!(provider.calls().len(), 1);

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn offline_worker_accepts_commands_as_no_ops() {
        let (_completion_tx, completion_rx) = mpsc::unbounded_channel();
        let travel = Arc::new(RecordingTravel::default());

        let mut handle = SessionHandle::spawn(
            None,
            completion_rx,
            Arc::new(FakePlayer::with_id("lonely")),
            travel.clone(),
            DiagnosticsSink::log_only("test"),
        );

        assert!(handle.create_game_session().await.is_ok());
        assert!(handle.join_game_session().await.is_ok());
        assert!(!handle.status().online);
        assert!(travel.calls().is_empty());

        handle.shutdown().await;
    }

    #[tokio::test]
    async fn commands_after_shutdown_report_worker_unavailable() {
        let (_completion_tx, completion_rx) = mpsc::unbounded_channel();
        let mut handle = SessionHandle::spawn(
            None,
            completion_rx,
            Arc::new(FakePlayer::with_id("gone")),
            Arc::new(RecordingTravel::default()),
            DiagnosticsSink::log_only("test"),
        );

        handle.shutdown().await;
        assert!(matches!(
            handle.create_game_session().await,
            Err(SessionError::WorkerUnavailable)
        ));
    }
}

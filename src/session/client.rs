//! Session client with statum lifecycle
//!
//! # State Machine
//!
//! ```text
//! Initializing ──attach──► Online    (provider present and available)
//!                 └──────► Offline   (no provider, every request is a no-op)
//! ```
//!
//! Per-request progress is tracked separately in [`OperationSlots`], since any
//! number of create/find/join cycles happen while the client stays Online.

use super::filter::MatchFilter;
use super::operation::{OperationSlots, OperationState};
use super::provider::{
    JoinSessionResult, LocalPlayerIdentity, OperationKind, ProviderCompletion, RequestTicket,
    SharedProvider, UniqueNetId,
};
use super::settings::{AdvertisementType, ComparisonOp, SearchResult, SessionSearch, SessionSettings};
use super::{
    SessionError, FREE_FOR_ALL, LOBBY_MAP_URL, MATCH_TYPE_KEY, MAX_PUBLIC_CONNECTIONS,
    MAX_SEARCH_RESULTS, NAME_GAME_SESSION, SEARCH_PRESENCE,
};
use crate::diagnostics::{DiagnosticsSink, MessageColor};
use crate::travel::{NetRole, TravelTrigger, TravelType};
use statum::{machine, state};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tracing::{debug, error, info, warn};

/// How long the subsystem notice stays on screen
const SUBSYSTEM_MESSAGE_TIME: Duration = Duration::from_secs(5);
/// How long create, find and join messages stay on screen
const SESSION_MESSAGE_TIME: Duration = Duration::from_secs(10);

/// Snapshot published after every state change
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MatchmakingStatus {
    pub online: bool,
    pub subsystem: Option<String>,
    pub destroy: OperationState,
    pub create: OperationState,
    pub find: OperationState,
    pub join: OperationState,
    pub role: NetRole,
    pub sessions_seen: usize,
    pub last_join_result: Option<JoinSessionResult>,
}

impl MatchmakingStatus {
    /// The last create finished, successfully or not
    pub fn host_settled(&self) -> bool {
        matches!(self.role, NetRole::ListenServer { .. }) || self.create == OperationState::Completed
    }

    /// Travelled as a client, or the last search left nothing to join
    pub fn join_settled(&self) -> bool {
        matches!(self.role, NetRole::Client { .. })
            || (self.find == OperationState::Completed && self.join == OperationState::Idle)
            || self.join == OperationState::Completed
    }
}

#[state]
#[derive(Debug, Clone)]
pub enum ClientState {
    Initializing, // Collaborators wired, provider not checked yet
    Online,       // Provider usable, requests are issued
    Offline,      // No provider, requests are ignored
}

#[machine]
pub struct SessionClient<S: ClientState> {
    provider: Option<SharedProvider>,
    identity: Arc<dyn LocalPlayerIdentity>,
    travel: Arc<dyn TravelTrigger>,
    diagnostics: DiagnosticsSink,
    slots: OperationSlots,
    filter: MatchFilter,
    // Query of the current find, replaced on each search
    search: Option<SessionSearch>,
    // Destroy request whose completion must issue the create
    create_after_destroy: Option<RequestTicket>,
    status: MatchmakingStatus,
    status_tx: watch::Sender<MatchmakingStatus>,
}

impl<S: ClientState> SessionClient<S> {
    pub fn subscribe(&self) -> watch::Receiver<MatchmakingStatus> {
        self.status_tx.subscribe()
    }

    pub fn status(&self) -> &MatchmakingStatus {
        &self.status
    }

    pub fn player_name(&self) -> String {
        self.identity.display_name()
    }

    fn publish(&mut self) {
        self.status.destroy = self.slots.state(OperationKind::Destroy);
        self.status.create = self.slots.state(OperationKind::Create);
        self.status.find = self.slots.state(OperationKind::Find);
        self.status.join = self.slots.state(OperationKind::Join);
        self.status_tx.send_replace(self.status.clone());
    }
}

impl SessionClient<Initializing> {
    pub fn create(
        provider: Option<SharedProvider>,
        identity: Arc<dyn LocalPlayerIdentity>,
        travel: Arc<dyn TravelTrigger>,
        diagnostics: DiagnosticsSink,
    ) -> Self {
        debug!("Creating session client for {}", identity.display_name());
        let (status_tx, _) = watch::channel(MatchmakingStatus::default());

        Self::new(
            provider,
            identity,
            travel,
            diagnostics,
            OperationSlots::new(),
            MatchFilter::default(),
            None, // search
            None, // create_after_destroy
            MatchmakingStatus::default(),
            status_tx,
        )
    }

    /// Checks the provider and settles into Online or Offline
    pub fn attach(mut self) -> AttachedClient {
        let subsystem = self
            .provider
            .as_ref()
            .filter(|provider| provider.is_available())
            .map(|provider| provider.subsystem_name().to_string());

        match subsystem {
            Some(name) => {
                self.diagnostics.show(
                    SUBSYSTEM_MESSAGE_TIME,
                    MessageColor::Blue,
                    format!("Found subsystem {}", name),
                );
                self.status.online = true;
                self.status.subsystem = Some(name);
                self.publish();
                AttachedClient::Online(self.transition())
            }
            None => {
                warn!(
                    "No online session interface for {}, matchmaking disabled",
                    self.player_name()
                );
                self.publish();
                AttachedClient::Offline(self.transition())
            }
        }
    }
}

/// Settings every hosted game session is created with
pub fn game_session_settings() -> SessionSettings {
    let mut settings = SessionSettings {
        is_lan_match: false,
        num_public_connections: MAX_PUBLIC_CONNECTIONS,
        allow_join_in_progress: true,
        allow_join_via_presence: true,
        should_advertise: true,
        uses_presence: true,
        use_lobbies_if_available: true,
        ..SessionSettings::default()
    };
    settings.set(
        MATCH_TYPE_KEY,
        FREE_FOR_ALL,
        AdvertisementType::ViaOnlineServiceAndPing,
    );
    settings
}

/// Query used to look for joinable sessions
pub fn game_session_search() -> SessionSearch {
    let mut search = SessionSearch {
        max_search_results: MAX_SEARCH_RESULTS,
        is_lan_query: false,
        ..SessionSearch::default()
    };
    search.set(SEARCH_PRESENCE, true, ComparisonOp::Equals);
    search
}

impl SessionClient<Online> {
    /// Hosts a new game session, destroying the current one first.
    ///
    /// With an existing session the create is deferred until the destroy
    /// completes successfully.
    pub fn create_game_session(&mut self) -> Result<(), SessionError> {
        let Some(provider) = self.usable_provider() else {
            return Ok(());
        };
        let player = self.player_id()?;

        if self.slots.state(OperationKind::Create).is_pending() {
            return Err(SessionError::OperationPending(OperationKind::Create));
        }

        if provider
            .get_named_session(&player, NAME_GAME_SESSION)
            .is_some()
        {
            info!(
                "{} already has {}, destroying it before creating a new one",
                self.player_name(),
                NAME_GAME_SESSION
            );
            let ticket = self.slots.begin(OperationKind::Destroy)?;
            if let Err(e) = provider.destroy_session(&player, NAME_GAME_SESSION, ticket) {
                error!("Failed to issue destroy: {}", e);
                self.slots.abandon(ticket);
                self.publish();
                return Err(e.into());
            }
            self.create_after_destroy = Some(ticket);
            self.publish();
            return Ok(());
        }

        self.issue_create(&provider, &player)
    }

    /// Searches for sessions to join
    pub fn join_game_session(&mut self) -> Result<(), SessionError> {
        let Some(provider) = self.usable_provider() else {
            return Ok(());
        };
        let player = self.player_id()?;

        let ticket = self.slots.begin(OperationKind::Find)?;
        let search = game_session_search();
        debug!(
            "Finding sessions (max {}, lan {})",
            search.max_search_results, search.is_lan_query
        );

        if let Err(e) = provider.find_sessions(&player, &search, ticket) {
            error!("Failed to issue find: {}", e);
            self.slots.abandon(ticket);
            self.publish();
            return Err(e.into());
        }

        self.search = Some(search);
        self.publish();
        Ok(())
    }

    /// Routes a provider completion to its handler.
    ///
    /// Completions that do not match the pending request of their kind are dropped.
    pub fn handle_completion(&mut self, completion: ProviderCompletion) {
        if !self.slots.complete(completion.ticket()) {
            return;
        }

        match completion {
            ProviderCompletion::DestroySession {
                ticket,
                session_name,
                success,
            } => self.on_destroy_session_complete(ticket, &session_name, success),
            ProviderCompletion::CreateSession {
                session_name,
                success,
                ..
            } => self.on_create_session_complete(&session_name, success),
            ProviderCompletion::FindSessions {
                success, results, ..
            } => self.on_find_sessions_complete(success, results),
            ProviderCompletion::JoinSession {
                session_name,
                result,
                ..
            } => self.on_join_session_complete(&session_name, result),
        }

        self.publish();
    }

    fn on_destroy_session_complete(&mut self, ticket: RequestTicket, session_name: &str, success: bool) {
        let chained = self.create_after_destroy == Some(ticket);
        if chained {
            self.create_after_destroy = None;
        }

        if !success {
            self.diagnostics.show(
                SESSION_MESSAGE_TIME,
                MessageColor::Red,
                format!("Failed to destroy session {}!", session_name),
            );
            return;
        }

        debug!("Destroyed session {}", session_name);
        if !chained {
            return;
        }

        let Some(provider) = self.usable_provider() else {
            return;
        };
        match self.player_id() {
            Ok(player) => {
                if let Err(e) = self.issue_create(&provider, &player) {
                    warn!("Create after destroy was not issued: {}", e);
                }
            }
            Err(e) => warn!("Create after destroy was not issued: {}", e),
        }
    }

    fn on_create_session_complete(&mut self, session_name: &str, success: bool) {
        if !success {
            self.diagnostics.show(
                SESSION_MESSAGE_TIME,
                MessageColor::Red,
                "Failed to create session!",
            );
            return;
        }

        self.diagnostics.show(
            SESSION_MESSAGE_TIME,
            MessageColor::Blue,
            format!("Created session : {}", session_name),
        );
        self.travel.server_travel(LOBBY_MAP_URL);
        self.status.role = NetRole::ListenServer {
            map_url: LOBBY_MAP_URL.to_string(),
        };
    }

    fn on_find_sessions_complete(&mut self, success: bool, results: Vec<SearchResult>) {
        // The query is only needed for the duration of one search
        let search = self.search.take();

        let Some(provider) = self.usable_provider() else {
            return;
        };
        if !success {
            warn!("Finding sessions failed for {}", self.player_name());
            return;
        }

        debug!(
            "Find returned {} of at most {} sessions",
            results.len(),
            search.map(|s| s.max_search_results).unwrap_or(MAX_SEARCH_RESULTS)
        );

        for result in &results {
            debug!("Session {} answered in {:?}ms", result.session_id, result.ping_ms);
        }

        let discovered = self.filter.inspect(&results);
        self.status.sessions_seen = discovered.len();
        for session in &discovered {
            self.diagnostics.show(
                SESSION_MESSAGE_TIME,
                MessageColor::Cyan,
                format!("Id : {}, User : {}", session.id, session.user),
            );
            if session.eligible {
                self.diagnostics.show(
                    SESSION_MESSAGE_TIME,
                    MessageColor::Cyan,
                    format!("MatchType : {}", session.match_type),
                );
            }
        }

        let Some(chosen) = self.filter.select(&results) else {
            info!(
                "No {} session among {} results",
                self.filter.match_type(),
                results.len()
            );
            return;
        };

        let player = match self.player_id() {
            Ok(player) => player,
            Err(e) => {
                warn!("Join not issued: {}", e);
                return;
            }
        };
        let ticket = match self.slots.begin(OperationKind::Join) {
            Ok(ticket) => ticket,
            Err(e) => {
                warn!("Join not issued: {}", e);
                return;
            }
        };

        info!("Joining session {} of {}", chosen.session_id, chosen.owning_user_name);
        if let Err(e) = provider.join_session(&player, NAME_GAME_SESSION, chosen, ticket) {
            error!("Failed to issue join: {}", e);
            self.slots.abandon(ticket);
        }
    }

    fn on_join_session_complete(&mut self, session_name: &str, result: JoinSessionResult) {
        let Some(provider) = self.usable_provider() else {
            return;
        };

        self.status.last_join_result = Some(result);
        match result {
            JoinSessionResult::Success => info!("Joined {}", session_name),
            other => warn!("Join of {} completed with {}", session_name, other),
        }

        let player = match self.player_id() {
            Ok(player) => player,
            Err(e) => {
                warn!("Cannot resolve connect string: {}", e);
                return;
            }
        };

        match provider.get_resolved_connect_string(&player, NAME_GAME_SESSION) {
            Some(address) => {
                self.diagnostics.show(
                    SESSION_MESSAGE_TIME,
                    MessageColor::Yellow,
                    format!("Connect string : {}", address),
                );
                self.travel.client_travel(&address, TravelType::Absolute);
                self.status.role = NetRole::Client { address };
            }
            None => warn!("Could not resolve connect string for {}", NAME_GAME_SESSION),
        }
    }

    fn issue_create(
        &mut self,
        provider: &SharedProvider,
        player: &UniqueNetId,
    ) -> Result<(), SessionError> {
        let ticket = self.slots.begin(OperationKind::Create)?;
        let settings = game_session_settings();

        if let Err(e) = provider.create_session(player, NAME_GAME_SESSION, &settings, ticket) {
            error!("Failed to issue create: {}", e);
            self.slots.abandon(ticket);
            self.publish();
            return Err(e.into());
        }

        info!("{} creating {}", self.player_name(), NAME_GAME_SESSION);
        self.publish();
        Ok(())
    }

    fn usable_provider(&self) -> Option<SharedProvider> {
        match &self.provider {
            Some(provider) if provider.is_available() => Some(Arc::clone(provider)),
            _ => {
                warn!("Online session interface unavailable, ignoring request");
                None
            }
        }
    }

    fn player_id(&self) -> Result<UniqueNetId, SessionError> {
        self.identity.preferred_unique_net_id().ok_or_else(|| {
            warn!("{} has no preferred network id", self.player_name());
            SessionError::MissingIdentity(self.player_name())
        })
    }
}

impl SessionClient<Offline> {
    pub fn create_game_session(&mut self) -> Result<(), SessionError> {
        debug!("Offline, ignoring create for {}", self.player_name());
        Ok(())
    }

    pub fn join_game_session(&mut self) -> Result<(), SessionError> {
        debug!("Offline, ignoring join for {}", self.player_name());
        Ok(())
    }

    pub fn handle_completion(&mut self, completion: ProviderCompletion) {
        debug!("Offline, dropping completion {}", completion.ticket());
    }
}

/// A client after its provider check
pub enum AttachedClient {
    Online(SessionClient<Online>),
    Offline(SessionClient<Offline>),
}

impl AttachedClient {
    pub fn is_online(&self) -> bool {
        matches!(self, AttachedClient::Online(_))
    }

    pub fn create_game_session(&mut self) -> Result<(), SessionError> {
        match self {
            AttachedClient::Online(client) => client.create_game_session(),
            AttachedClient::Offline(client) => client.create_game_session(),
        }
    }

    pub fn join_game_session(&mut self) -> Result<(), SessionError> {
        match self {
            AttachedClient::Online(client) => client.join_game_session(),
            AttachedClient::Offline(client) => client.join_game_session(),
        }
    }

    pub fn handle_completion(&mut self, completion: ProviderCompletion) {
        match self {
            AttachedClient::Online(client) => client.handle_completion(completion),
            AttachedClient::Offline(client) => client.handle_completion(completion),
        }
    }

    pub fn subscribe(&self) -> watch::Receiver<MatchmakingStatus> {
        match self {
            AttachedClient::Online(client) => client.subscribe(),
            AttachedClient::Offline(client) => client.subscribe(),
        }
    }

    pub fn status(&self) -> &MatchmakingStatus {
        match self {
            AttachedClient::Online(client) => client.status(),
            AttachedClient::Offline(client) => client.status(),
        }
    }
}

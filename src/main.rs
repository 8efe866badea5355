pub mod config;
pub mod diagnostics;
pub mod player;
pub mod service;
pub mod session;
pub mod travel;

use crate::config::{AppConfig, RunMode};
use crate::diagnostics::{run_overlay, DiagnosticsSink};
use crate::player::LocalPlayer;
use crate::service::LoopbackSessionService;
use crate::session::{LocalPlayerIdentity, MatchmakingStatus, SessionHandle, SharedProvider};
use crate::travel::{EngineTravel, NetRole};
use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, watch};
use tracing::{debug, error, info, warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    setup()?;

    let config = AppConfig::load_or_create().await?;
    let mode = match std::env::args().nth(1) {
        Some(arg) => arg.parse::<RunMode>()?,
        None => config.run.mode,
    };
    info!("Running in {} mode", mode);

    let service = LoopbackSessionService::new(config.loopback.latency(), config.loopback.base_port);
    let (overlay_tx, overlay_rx) = mpsc::channel(config.diagnostics.overlay_capacity);
    let overlay_handle = tokio::spawn(run_overlay(overlay_rx));

    let mut handles = Vec::new();
    let outcome = match mode {
        RunMode::Host => {
            let host = spawn_player(
                &service,
                &overlay_tx,
                LocalPlayer::signed_in(&config.player.host_name),
            );
            let result = host_game(&host, config.run.timeout()).await;
            handles.push(host);
            result
        }
        RunMode::Join => {
            let guest = spawn_player(
                &service,
                &overlay_tx,
                LocalPlayer::signed_in(&config.player.guest_name),
            );
            let result = join_game(&guest, config.run.timeout()).await;
            handles.push(guest);
            result.map(|_| ())
        }
        RunMode::Demo => {
            let host = spawn_player(
                &service,
                &overlay_tx,
                LocalPlayer::signed_in(&config.player.host_name),
            );
            let guest = spawn_player(
                &service,
                &overlay_tx,
                LocalPlayer::signed_in(&config.player.guest_name),
            );
            let result = run_demo(&host, &guest, config.run.timeout()).await;
            handles.push(host);
            handles.push(guest);
            result
        }
    };

    info!("{} sessions hosted", service.hosted_sessions());
    for handle in handles.iter_mut() {
        info!("{} finished as {}", handle.player(), handle.status().role);
        handle.shutdown().await;
    }
    service.shutdown();

    drop(overlay_tx);
    match overlay_handle.await {
        Ok(shown) => debug!("Overlay displayed {} messages", shown),
        Err(e) => error!("Overlay task failed: {}", e),
    }

    outcome
}

fn setup() -> Result<()> {
    if std::env::var("RUST_LIB_BACKTRACE").is_err() {
        std::env::set_var("RUST_LIB_BACKTRACE", "0")
    }
    color_eyre::install()?;
    if std::env::var("RUST_LOG").is_err() {
        std::env::set_var("RUST_LOG", "info")
    }
    setup_logging_env();
    Ok(())
}

fn setup_logging_env() {
    FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(false)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true)
        .pretty()
        .init();
}

fn spawn_player(
    service: &LoopbackSessionService,
    overlay_tx: &mpsc::Sender<diagnostics::ScreenMessage>,
    player: LocalPlayer,
) -> SessionHandle {
    let name = player.display_name();
    let (completion_tx, completion_rx) = mpsc::unbounded_channel();

    let provider: Option<SharedProvider> = match player.preferred_unique_net_id() {
        Some(net_id) => Some(Arc::new(service.connect(net_id, &name, completion_tx))),
        None => {
            warn!("{} has no online identity, running offline", name);
            None
        }
    };

    SessionHandle::spawn(
        provider,
        completion_rx,
        Arc::new(player),
        Arc::new(EngineTravel::new(&name)),
        DiagnosticsSink::new(&name, overlay_tx.clone()),
    )
}

async fn host_game(host: &SessionHandle, timeout: Duration) -> Result<()> {
    host.create_game_session()
        .await
        .map_err(|e| eyre!("{} could not create a session: {}", host.player(), e))?;

    let status = wait_for_status(host, timeout, MatchmakingStatus::host_settled).await?;

    if !matches!(status.role, NetRole::ListenServer { .. }) {
        return Err(eyre!("{} failed to host a session", host.player()));
    }
    info!("{} is now {}", host.player(), status.role);
    Ok(())
}

async fn join_game(guest: &SessionHandle, timeout: Duration) -> Result<MatchmakingStatus> {
    guest
        .join_game_session()
        .await
        .map_err(|e| eyre!("{} could not search for sessions: {}", guest.player(), e))?;

    let status = wait_for_status(guest, timeout, MatchmakingStatus::join_settled).await?;

    match &status.role {
        NetRole::Client { address } => info!("{} joined {}", guest.player(), address),
        _ => warn!(
            "{} did not join a session ({} seen, join result {:?})",
            guest.player(),
            status.sessions_seen,
            status.last_join_result
        ),
    }
    Ok(status)
}

async fn run_demo(host: &SessionHandle, guest: &SessionHandle, timeout: Duration) -> Result<()> {
    host_game(host, timeout).await?;
    let status = join_game(guest, timeout).await?;

    if !matches!(status.role, NetRole::Client { .. }) {
        return Err(eyre!("{} never reached the host", guest.player()));
    }
    info!("Demo finished: {} hosts, {} connected", host.player(), guest.player());
    Ok(())
}

async fn wait_for_status(
    handle: &SessionHandle,
    timeout: Duration,
    predicate: impl Fn(&MatchmakingStatus) -> bool,
) -> Result<MatchmakingStatus> {
    let mut rx: watch::Receiver<MatchmakingStatus> = handle.subscribe();
    let waited = tokio::time::timeout(timeout, rx.wait_for(|s| predicate(s)))
        .await
        .map_err(|_| eyre!("Timed out after {:?} waiting on {}", timeout, handle.player()))?;

    let status = waited.map_err(|e| eyre!("Session worker of {} stopped: {}", handle.player(), e))?;
    Ok(status.clone())
}

//! Loopback session service for in-process matchmaking.
//!
//! Keeps every hosted session in one shared registry so several local players
//! can host and join each other without a real online backend. Requests are
//! applied after a fixed latency on a spawned task and answered with exactly one
//! completion on the requesting player's channel. Cancelling the service drops
//! outstanding requests without completing them.

use crate::session::{
    JoinSessionResult, NamedSession, OnlineSessionProvider, ProviderCompletion, ProviderError,
    RequestTicket, SearchResult, SessionId, SessionSearch, SessionSettings, SettingValue,
    UniqueNetId, CompletionSender, SEARCH_PRESENCE,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use uuid::Uuid;

const SUBSYSTEM_NAME: &str = "LOOPBACK";

#[derive(Debug, Clone)]
struct HostedSession {
    id: String,
    host: UniqueNetId,
    owner_name: String,
    settings: SessionSettings,
    members: Vec<UniqueNetId>,
    address: String,
}

#[derive(Debug, Default)]
struct Registry {
    // Creation order is the order searches report
    hosted: Vec<HostedSession>,
    named: HashMap<(UniqueNetId, String), NamedSession>,
    display_names: HashMap<UniqueNetId, String>,
    next_port: u16,
}

impl Registry {
    fn hosted_by_id(&mut self, id: &str) -> Option<&mut HostedSession> {
        self.hosted.iter_mut().find(|session| session.id == id)
    }
}

#[derive(Debug)]
struct SharedService {
    registry: Mutex<Registry>,
    latency: Duration,
    cancel: CancellationToken,
}

impl SharedService {
    fn registry(&self) -> MutexGuard<'_, Registry> {
        self.registry.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// The service itself; hand out per-player views with [`connect`](Self::connect)
#[derive(Debug, Clone)]
pub struct LoopbackSessionService {
    shared: Arc<SharedService>,
}

impl LoopbackSessionService {
    pub fn new(latency: Duration, base_port: u16) -> Self {
        info!(
            "Starting loopback session service (latency {}ms, base port {})",
            latency.as_millis(),
            base_port
        );
        Self {
            shared: Arc::new(SharedService {
                registry: Mutex::new(Registry {
                    next_port: base_port,
                    ..Registry::default()
                }),
                latency,
                cancel: CancellationToken::new(),
            }),
        }
    }

    /// Registers a player and returns its provider view
    pub fn connect(
        &self,
        player: UniqueNetId,
        display_name: impl Into<String>,
        completions: CompletionSender,
    ) -> LoopbackSession {
        let display_name = display_name.into();
        debug!("Player {} ({}) connected to loopback", display_name, player);
        self.shared
            .registry()
            .display_names
            .insert(player.clone(), display_name);

        LoopbackSession {
            shared: Arc::clone(&self.shared),
            player,
            completions,
        }
    }

    /// Number of sessions currently hosted
    pub fn hosted_sessions(&self) -> usize {
        self.shared.registry().hosted.len()
    }

    /// Stops the service; outstanding requests never complete
    pub fn shutdown(&self) {
        info!("Shutting down loopback session service");
        self.shared.cancel.cancel();
    }
}

/// One player's view of the loopback service
#[derive(Debug)]
pub struct LoopbackSession {
    shared: Arc<SharedService>,
    player: UniqueNetId,
    completions: CompletionSender,
}

impl LoopbackSession {
    fn check_player(&self, player: &UniqueNetId) -> Result<(), ProviderError> {
        if self.shared.cancel.is_cancelled() {
            return Err(ProviderError::Unavailable(SUBSYSTEM_NAME.to_string()));
        }
        if player != &self.player {
            return Err(ProviderError::UnknownPlayer(player.to_string()));
        }
        if self.completions.is_closed() {
            return Err(ProviderError::ChannelClosed);
        }
        Ok(())
    }

    /// Applies `work` after the service latency and delivers its completion
    fn schedule<F>(&self, ticket: RequestTicket, work: F)
    where
        F: FnOnce(&mut Registry) -> ProviderCompletion + Send + 'static,
    {
        let shared = Arc::clone(&self.shared);
        let completions = self.completions.clone();

        tokio::spawn(async move {
            tokio::select! {
                _ = shared.cancel.cancelled() => {
                    debug!("Loopback request {} dropped on shutdown", ticket);
                }
                _ = tokio::time::sleep(shared.latency) => {
                    let completion = work(&mut shared.registry());
                    if completions.send(completion).is_err() {
                        warn!("Completion {} has no receiver", ticket);
                    }
                }
            }
        });
    }
}

fn matches_search(session: &HostedSession, search: &SessionSearch) -> bool {
    if !session.settings.should_advertise || session.settings.is_lan_match != search.is_lan_query {
        return false;
    }

    let advertised = session.settings.advertised();
    search.query_settings.iter().all(|predicate| {
        if predicate.key == SEARCH_PRESENCE {
            return predicate.matches(&SettingValue::Bool(session.settings.uses_presence));
        }
        advertised
            .get(&predicate.key)
            .is_some_and(|value| predicate.matches(value))
    })
}

impl OnlineSessionProvider for LoopbackSession {
    fn subsystem_name(&self) -> &str {
        SUBSYSTEM_NAME
    }

    fn is_available(&self) -> bool {
        !self.shared.cancel.is_cancelled()
    }

    fn create_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        settings: &SessionSettings,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.check_player(player)?;
        let player = player.clone();
        let session_name = session_name.to_string();
        let settings = settings.clone();

        self.schedule(ticket, move |registry| {
            let key = (player.clone(), session_name.clone());
            if registry.named.contains_key(&key) {
                warn!("{} already has a session named {}", player, session_name);
                return ProviderCompletion::CreateSession {
                    ticket,
                    session_name,
                    success: false,
                };
            }

            let port = registry.next_port;
            registry.next_port = registry.next_port.wrapping_add(1);
            let owner_name = registry
                .display_names
                .get(&player)
                .cloned()
                .unwrap_or_else(|| player.to_string());
            let hosted = HostedSession {
                id: Uuid::new_v4().to_string(),
                host: player.clone(),
                owner_name: owner_name.clone(),
                settings,
                members: Vec::new(),
                address: format!("127.0.0.1:{}", port),
            };
            info!("{} hosts session {} at {}", owner_name, hosted.id, hosted.address);

            registry.named.insert(
                key,
                NamedSession {
                    session_name: session_name.clone(),
                    session_id: hosted.id.clone(),
                    owning_user_name: owner_name,
                    is_host: true,
                },
            );
            registry.hosted.push(hosted);

            ProviderCompletion::CreateSession {
                ticket,
                session_name,
                success: true,
            }
        });
        Ok(())
    }

    fn find_sessions(
        &self,
        player: &UniqueNetId,
        search: &SessionSearch,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.check_player(player)?;
        let player = player.clone();
        let search = search.clone();
        let ping_ms = u32::try_from(self.shared.latency.as_millis()).unwrap_or(u32::MAX);

        self.schedule(ticket, move |registry| {
            let limit = usize::try_from(search.max_search_results).unwrap_or(usize::MAX);
            let results: Vec<SearchResult> = registry
                .hosted
                .iter()
                .filter(|session| session.host != player)
                .filter(|session| matches_search(session, &search))
                .take(limit)
                .map(|session| SearchResult {
                    session_id: SessionId(session.id.clone()),
                    owning_user_name: session.owner_name.clone(),
                    settings: session.settings.advertised(),
                    ping_ms: Some(ping_ms),
                })
                .collect();
            debug!("Loopback find for {} returns {} sessions", player, results.len());

            ProviderCompletion::FindSessions {
                ticket,
                success: true,
                results,
            }
        });
        Ok(())
    }

    fn join_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        result: &SearchResult,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.check_player(player)?;
        let player = player.clone();
        let session_name = session_name.to_string();
        let session_id = result.session_id_str().to_string();

        self.schedule(ticket, move |registry| {
            let key = (player.clone(), session_name.clone());
            let outcome = if registry.named.contains_key(&key) {
                JoinSessionResult::AlreadyInSession
            } else {
                let joined = match registry.hosted_by_id(&session_id) {
                    None => Err(JoinSessionResult::SessionDoesNotExist),
                    Some(hosted) => {
                        let capacity =
                            usize::try_from(hosted.settings.num_public_connections).unwrap_or(0);
                        if hosted.members.len() >= capacity {
                            Err(JoinSessionResult::SessionIsFull)
                        } else {
                            hosted.members.push(player.clone());
                            Ok(NamedSession {
                                session_name: session_name.clone(),
                                session_id: hosted.id.clone(),
                                owning_user_name: hosted.owner_name.clone(),
                                is_host: false,
                            })
                        }
                    }
                };
                match joined {
                    Ok(named) => {
                        registry.named.insert(key, named);
                        JoinSessionResult::Success
                    }
                    Err(rejected) => rejected,
                }
            };
            debug!("Loopback join of {} by {}: {}", session_id, player, outcome);

            ProviderCompletion::JoinSession {
                ticket,
                session_name,
                result: outcome,
            }
        });
        Ok(())
    }

    fn destroy_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.check_player(player)?;
        let player = player.clone();
        let session_name = session_name.to_string();

        self.schedule(ticket, move |registry| {
            let removed = registry
                .named
                .remove(&(player.clone(), session_name.clone()));

            if let Some(named) = &removed {
                if named.is_host {
                    registry.hosted.retain(|session| session.id != named.session_id);
                    // Members lose their membership together with the host
                    registry
                        .named
                        .retain(|_, member| member.session_id != named.session_id);
                    info!("Hosted session {} destroyed", named.session_id);
                } else if let Some(hosted) = registry.hosted_by_id(&named.session_id) {
                    hosted.members.retain(|member| member != &player);
                }
            }

            ProviderCompletion::DestroySession {
                ticket,
                session_name,
                success: removed.is_some(),
            }
        });
        Ok(())
    }

    fn get_named_session(&self, player: &UniqueNetId, session_name: &str) -> Option<NamedSession> {
        self.shared
            .registry()
            .named
            .get(&(player.clone(), session_name.to_string()))
            .cloned()
    }

    fn get_resolved_connect_string(
        &self,
        player: &UniqueNetId,
        session_name: &str,
    ) -> Option<String> {
        let mut registry = self.shared.registry();
        let session_id = registry
            .named
            .get(&(player.clone(), session_name.to_string()))?
            .session_id
            .clone();
        registry
            .hosted_by_id(&session_id)
            .map(|hosted| hosted.address.clone())
    }
}

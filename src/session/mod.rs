//! # Session Matchmaking
//!
//! Drives the online session protocol for one local player:
//!
//! ```text
//! create_game_session ──► [Destroy] ──► Create ──► server travel (listen)
//!
//! join_game_session ──► Find ──► filter MatchType ──► Join ──► resolve ──► client travel
//! ```
//!
//! Requests are issued to an [`OnlineSessionProvider`] and never awaited; each
//! completion comes back on a channel and is matched against the per-kind
//! [`OperationSlots`](operation::OperationSlots). The [`SessionHandle`] runs the
//! client in its own tokio task so that a single task owns all session state.
//!
//! ## Failure model
//!
//! Nothing here retries. A missing provider turns both entry points into no-ops,
//! failed creates and finds are reported as screen messages, and a join whose
//! address cannot be resolved simply does not travel.

pub mod client;
pub mod filter;
pub mod handle;
pub mod operation;
pub mod provider;
pub mod settings;

#[cfg(test)]
pub(crate) mod testing;

pub use client::{AttachedClient, MatchmakingStatus, SessionClient};
pub use filter::{DiscoveredSession, MatchFilter};
pub use handle::{SessionCommand, SessionHandle};
pub use operation::{OperationSlots, OperationState};
pub use provider::{
    CompletionReceiver, CompletionSender, JoinSessionResult, LocalPlayerIdentity, NamedSession,
    OnlineSessionProvider, OperationKind, ProviderCompletion, ProviderError, RequestTicket,
    SharedProvider, UniqueNetId,
};
pub use settings::{
    AdvertisementType, ComparisonOp, SearchPredicate, SearchResult, SessionId, SessionSearch,
    SessionSettings, SettingValue,
};

/// Logical name of the one game session a player tracks
pub const NAME_GAME_SESSION: &str = "GameSession";

/// Custom attribute used as game-mode filter
pub const MATCH_TYPE_KEY: &str = "MatchType";

/// The only match type this client hosts and joins
pub const FREE_FOR_ALL: &str = "FreeForAll";

/// Search key selecting presence-enabled sessions
pub const SEARCH_PRESENCE: &str = "presence";

pub const MAX_PUBLIC_CONNECTIONS: u32 = 4;

pub const MAX_SEARCH_RESULTS: u32 = 10_000;

/// Map opened as listen server once a session is created
pub const LOBBY_MAP_URL: &str = "/Game/ThirdPerson/Maps/Lobby?listen";

/// Errors surfaced to callers of the session client
#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error("Local player {0} has no preferred network id")]
    MissingIdentity(String),

    #[error("{0} request already pending")]
    OperationPending(OperationKind),

    #[error("Provider error: {0}")]
    Provider(#[from] ProviderError),

    #[error("Session worker is not running")]
    WorkerUnavailable,
}

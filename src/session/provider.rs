//! Online service provider interface
//!
//! The provider performs session work out of band. Each request method only
//! *issues* the work and returns; the outcome arrives later as exactly one
//! [`ProviderCompletion`] on the completion channel the provider was built with.
//! The [`RequestTicket`] passed in is echoed back so the client can match the
//! completion to the request that caused it.

use super::settings::{SearchResult, SessionSearch, SessionSettings};
use std::fmt;
use std::sync::Arc;
use tokio::sync::mpsc;

/// Opaque per-player network identity required by every provider call
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct UniqueNetId(pub String);

impl fmt::Display for UniqueNetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Asynchronous request kinds, one completion slot each
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OperationKind {
    Destroy,
    Create,
    Find,
    Join,
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            OperationKind::Destroy => write!(f, "Destroy"),
            OperationKind::Create => write!(f, "Create"),
            OperationKind::Find => write!(f, "Find"),
            OperationKind::Join => write!(f, "Join"),
        }
    }
}

/// Identifies one issued request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct RequestTicket {
    pub kind: OperationKind,
    pub seq: u64,
}

impl fmt::Display for RequestTicket {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.seq)
    }
}

/// Outcome code of a join request
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JoinSessionResult {
    Success,
    SessionIsFull,
    SessionDoesNotExist,
    CouldNotRetrieveAddress,
    AlreadyInSession,
    #[default]
    UnknownError,
}

impl fmt::Display for JoinSessionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JoinSessionResult::Success => write!(f, "Success"),
            JoinSessionResult::SessionIsFull => write!(f, "SessionIsFull"),
            JoinSessionResult::SessionDoesNotExist => write!(f, "SessionDoesNotExist"),
            JoinSessionResult::CouldNotRetrieveAddress => write!(f, "CouldNotRetrieveAddress"),
            JoinSessionResult::AlreadyInSession => write!(f, "AlreadyInSession"),
            JoinSessionResult::UnknownError => write!(f, "UnknownError"),
        }
    }
}

/// Completion delivered by the provider, once per issued request
#[derive(Debug, Clone)]
pub enum ProviderCompletion {
    DestroySession {
        ticket: RequestTicket,
        session_name: String,
        success: bool,
    },
    CreateSession {
        ticket: RequestTicket,
        session_name: String,
        success: bool,
    },
    FindSessions {
        ticket: RequestTicket,
        success: bool,
        results: Vec<SearchResult>,
    },
    JoinSession {
        ticket: RequestTicket,
        session_name: String,
        result: JoinSessionResult,
    },
}

impl ProviderCompletion {
    pub fn ticket(&self) -> RequestTicket {
        match self {
            ProviderCompletion::DestroySession { ticket, .. }
            | ProviderCompletion::CreateSession { ticket, .. }
            | ProviderCompletion::FindSessions { ticket, .. }
            | ProviderCompletion::JoinSession { ticket, .. } => *ticket,
        }
    }
}

/// Sending half used by providers to deliver completions
pub type CompletionSender = mpsc::UnboundedSender<ProviderCompletion>;
pub type CompletionReceiver = mpsc::UnboundedReceiver<ProviderCompletion>;

/// Local view of a session this player created or joined
#[derive(Debug, Clone, PartialEq)]
pub struct NamedSession {
    pub session_name: String,
    pub session_id: String,
    pub owning_user_name: String,
    pub is_host: bool,
}

/// Synchronous failure while issuing a request
#[derive(Debug, Clone, thiserror::Error)]
pub enum ProviderError {
    #[error("Online service unavailable: {0}")]
    Unavailable(String),

    #[error("Unknown player: {0}")]
    UnknownPlayer(String),

    #[error("Completion channel closed")]
    ChannelClosed,
}

/// Capabilities of an online session service
///
/// Implementations must deliver exactly one [`ProviderCompletion`] for every
/// request method that returned `Ok(())`, and none for those that returned an error.
pub trait OnlineSessionProvider: Send + Sync + 'static {
    /// Name of the backing subsystem, for diagnostics
    fn subsystem_name(&self) -> &str;

    /// Whether the session interface can currently be used
    fn is_available(&self) -> bool {
        true
    }

    fn create_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        settings: &SessionSettings,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError>;

    fn find_sessions(
        &self,
        player: &UniqueNetId,
        search: &SessionSearch,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError>;

    fn join_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        result: &SearchResult,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError>;

    fn destroy_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError>;

    /// Local session registered under `session_name`, if any
    fn get_named_session(&self, player: &UniqueNetId, session_name: &str) -> Option<NamedSession>;

    /// Connectable address of a joined session
    fn get_resolved_connect_string(&self, player: &UniqueNetId, session_name: &str)
        -> Option<String>;
}

/// Shared provider reference as held by a session client
pub type SharedProvider = Arc<dyn OnlineSessionProvider>;

/// Source of the local player's preferred network identity
pub trait LocalPlayerIdentity: Send + Sync + 'static {
    fn preferred_unique_net_id(&self) -> Option<UniqueNetId>;

    fn display_name(&self) -> String;
}

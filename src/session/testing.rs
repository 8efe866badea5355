//! Recording fakes for session client tests

use super::provider::{
    LocalPlayerIdentity, NamedSession, OnlineSessionProvider, OperationKind, ProviderError,
    RequestTicket, UniqueNetId,
};
use super::settings::{SearchResult, SessionId, SessionSearch, SessionSettings, SettingValue};
use super::{MATCH_TYPE_KEY, NAME_GAME_SESSION};
use crate::travel::{TravelTrigger, TravelType};
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Clone)]
pub enum ProviderCall {
    Create {
        ticket: RequestTicket,
        player: UniqueNetId,
        session_name: String,
        settings: SessionSettings,
    },
    Find {
        ticket: RequestTicket,
        player: UniqueNetId,
        search: SessionSearch,
    },
    Join {
        ticket: RequestTicket,
        player: UniqueNetId,
        session_name: String,
        session_id: String,
    },
    Destroy {
        ticket: RequestTicket,
        player: UniqueNetId,
        session_name: String,
    },
}

impl ProviderCall {
    pub fn ticket(&self) -> RequestTicket {
        match self {
            ProviderCall::Create { ticket, .. }
            | ProviderCall::Find { ticket, .. }
            | ProviderCall::Join { ticket, .. }
            | ProviderCall::Destroy { ticket, .. } => *ticket,
        }
    }
}

#[derive(Debug)]
struct RecorderState {
    calls: Vec<ProviderCall>,
    available: bool,
    has_named_session: bool,
    connect_string: Option<String>,
    fail_next: bool,
}

/// Provider that records requests and never completes them on its own
#[derive(Debug)]
pub struct RecordingProvider {
    state: Mutex<RecorderState>,
}

impl RecordingProvider {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(RecorderState {
                calls: Vec::new(),
                available: true,
                has_named_session: false,
                connect_string: None,
                fail_next: false,
            }),
        }
    }

    pub fn calls(&self) -> Vec<ProviderCall> {
        self.state.lock().unwrap().calls.clone()
    }

    pub fn kinds(&self) -> Vec<OperationKind> {
        self.calls().iter().map(|call| call.ticket().kind).collect()
    }

    pub fn set_available(&self, available: bool) {
        self.state.lock().unwrap().available = available;
    }

    pub fn set_named_session(&self, present: bool) {
        self.state.lock().unwrap().has_named_session = present;
    }

    pub fn set_connect_string(&self, address: Option<&str>) {
        self.state.lock().unwrap().connect_string = address.map(str::to_string);
    }

    pub fn fail_next_request(&self) {
        self.state.lock().unwrap().fail_next = true;
    }

    fn record(&self, call: ProviderCall) -> Result<(), ProviderError> {
        let mut state = self.state.lock().unwrap();
        if std::mem::take(&mut state.fail_next) {
            return Err(ProviderError::Unavailable("scripted failure".into()));
        }
        state.calls.push(call);
        Ok(())
    }
}

impl OnlineSessionProvider for RecordingProvider {
    fn subsystem_name(&self) -> &str {
        "RECORDING"
    }

    fn is_available(&self) -> bool {
        self.state.lock().unwrap().available
    }

    fn create_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        settings: &SessionSettings,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Create {
            ticket,
            player: player.clone(),
            session_name: session_name.to_string(),
            settings: settings.clone(),
        })
    }

    fn find_sessions(
        &self,
        player: &UniqueNetId,
        search: &SessionSearch,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Find {
            ticket,
            player: player.clone(),
            search: search.clone(),
        })
    }

    fn join_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        result: &SearchResult,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Join {
            ticket,
            player: player.clone(),
            session_name: session_name.to_string(),
            session_id: result.session_id_str().to_string(),
        })
    }

    fn destroy_session(
        &self,
        player: &UniqueNetId,
        session_name: &str,
        ticket: RequestTicket,
    ) -> Result<(), ProviderError> {
        self.record(ProviderCall::Destroy {
            ticket,
            player: player.clone(),
            session_name: session_name.to_string(),
        })
    }

    fn get_named_session(&self, player: &UniqueNetId, session_name: &str) -> Option<NamedSession> {
        let state = self.state.lock().unwrap();
        state.has_named_session.then(|| NamedSession {
            session_name: session_name.to_string(),
            session_id: "existing".to_string(),
            owning_user_name: player.to_string(),
            is_host: true,
        })
    }

    fn get_resolved_connect_string(
        &self,
        _player: &UniqueNetId,
        session_name: &str,
    ) -> Option<String> {
        if session_name != NAME_GAME_SESSION {
            return None;
        }
        self.state.lock().unwrap().connect_string.clone()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum TravelCall {
    Server(String),
    Client(String, TravelType),
}

#[derive(Debug, Default)]
pub struct RecordingTravel {
    calls: Mutex<Vec<TravelCall>>,
}

impl RecordingTravel {
    pub fn calls(&self) -> Vec<TravelCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl TravelTrigger for RecordingTravel {
    fn server_travel(&self, map_url: &str) {
        self.calls
            .lock()
            .unwrap()
            .push(TravelCall::Server(map_url.to_string()));
    }

    fn client_travel(&self, address: &str, travel_type: TravelType) {
        self.calls
            .lock()
            .unwrap()
            .push(TravelCall::Client(address.to_string(), travel_type));
    }
}

#[derive(Debug)]
pub struct FakePlayer {
    id: Option<UniqueNetId>,
}

impl FakePlayer {
    pub fn with_id(id: &str) -> Self {
        Self {
            id: Some(UniqueNetId(id.to_string())),
        }
    }

    pub fn without_id() -> Self {
        Self { id: None }
    }
}

impl LocalPlayerIdentity for FakePlayer {
    fn preferred_unique_net_id(&self) -> Option<UniqueNetId> {
        self.id.clone()
    }

    fn display_name(&self) -> String {
        "fake-player".to_string()
    }
}

pub fn search_result(id: &str, user: &str, match_type: Option<&str>) -> SearchResult {
    let mut settings = HashMap::new();
    if let Some(mt) = match_type {
        settings.insert(MATCH_TYPE_KEY.to_string(), SettingValue::Text(mt.to_string()));
    }
    SearchResult {
        session_id: SessionId(id.to_string()),
        owning_user_name: user.to_string(),
        settings,
        ping_ms: None,
    }
}

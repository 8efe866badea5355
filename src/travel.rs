//! Travel trigger, the engine hook that changes the process's network role

use std::fmt;
use tracing::info;

/// How a client travel URL is interpreted
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TravelType {
    /// The URL is a literal address
    Absolute,
}

/// Network role of the local process
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum NetRole {
    #[default]
    Standalone,
    ListenServer {
        map_url: String,
    },
    Client {
        address: String,
    },
}

impl fmt::Display for NetRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NetRole::Standalone => write!(f, "standalone"),
            NetRole::ListenServer { map_url } => write!(f, "listen server on {}", map_url),
            NetRole::Client { address } => write!(f, "client of {}", address),
        }
    }
}

/// Both transitions are one-way for the process that performs them
pub trait TravelTrigger: Send + Sync + 'static {
    /// Starts hosting `map_url` (carrying the `?listen` option)
    fn server_travel(&self, map_url: &str);

    /// Connects to a resolved address
    fn client_travel(&self, address: &str, travel_type: TravelType);
}

/// Travel trigger of the standalone binary, which has no engine to hand over to
#[derive(Debug, Clone)]
pub struct EngineTravel {
    player: String,
}

impl EngineTravel {
    pub fn new(player: impl Into<String>) -> Self {
        Self {
            player: player.into(),
        }
    }
}

impl TravelTrigger for EngineTravel {
    fn server_travel(&self, map_url: &str) {
        info!("{}: server travel to {}", self.player, map_url);
    }

    fn client_travel(&self, address: &str, travel_type: TravelType) {
        info!(
            "{}: client travel ({:?}) to {}",
            self.player, travel_type, address
        );
    }
}

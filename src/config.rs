//! Application configuration
//!
//! Runtime settings for the binary live in a TOML file under the user's home
//! directory. A missing file is created with defaults; missing keys fall back to
//! their defaults, so older files keep loading after new settings are added.
//! Session policy (connections, match type, lobby map) is not configurable.

use color_eyre::{eyre::eyre, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info, warn};

const CONFIG_DIR: &str = ".config/mpsession";
const CONFIG_FILE: &str = "config.toml";

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct PlayerConfig {
    /// Display name of the hosting player
    pub host_name: String,
    /// Display name of the joining player
    pub guest_name: String,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self {
            host_name: "Host".to_string(),
            guest_name: "Guest".to_string(),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct LoopbackConfig {
    /// Delay before a request completes
    pub latency_ms: u64,
    /// First port handed to hosted sessions
    pub base_port: u16,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            latency_ms: 150,
            base_port: 7777,
        }
    }
}

impl LoopbackConfig {
    pub fn latency(&self) -> Duration {
        Duration::from_millis(self.latency_ms)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct DiagnosticsConfig {
    /// Screen messages buffered before new ones are dropped
    pub overlay_capacity: usize,
}

impl Default for DiagnosticsConfig {
    fn default() -> Self {
        Self {
            overlay_capacity: 64,
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum RunMode {
    Host,
    Join,
    #[default]
    Demo,
}

impl fmt::Display for RunMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RunMode::Host => write!(f, "host"),
            RunMode::Join => write!(f, "join"),
            RunMode::Demo => write!(f, "demo"),
        }
    }
}

impl FromStr for RunMode {
    type Err = color_eyre::Report;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "host" => Ok(RunMode::Host),
            "join" => Ok(RunMode::Join),
            "demo" => Ok(RunMode::Demo),
            other => Err(eyre!("Unknown run mode '{}', expected host, join or demo", other)),
        }
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(default)]
pub struct RunConfig {
    pub mode: RunMode,
    /// Upper bound for a run before giving up on travel
    pub timeout_secs: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            mode: RunMode::Demo,
            timeout_secs: 10,
        }
    }
}

impl RunConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

#[derive(Deserialize, Serialize, Clone, Debug, Default, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub player: PlayerConfig,
    pub loopback: LoopbackConfig,
    pub diagnostics: DiagnosticsConfig,
    pub run: RunConfig,
}

impl AppConfig {
    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| eyre!("Failed to parse config: {}", e))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| eyre!("Failed to serialize config: {}", e))
    }

    pub fn config_path() -> PathBuf {
        let mut path = get_home_dir();
        path.push(CONFIG_DIR);
        path.push(CONFIG_FILE);
        path
    }

    /// Loads the config file, writing defaults first if it does not exist
    pub async fn load_or_create() -> Result<Self> {
        let path = Self::config_path();

        if !tokio::fs::try_exists(&path)
            .await
            .map_err(|e| eyre!("Failed to check if config file exists: {}", e))?
        {
            info!("No config at {}, creating default", path.display());
            let config = AppConfig::default();
            config.save_to(&path).await?;
            return Ok(config);
        }

        let content = tokio::fs::read_to_string(&path)
            .await
            .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;
        let config = Self::from_toml_str(&content)?;
        debug!("Loaded config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    pub async fn save_to(&self, path: &PathBuf) -> Result<()> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| eyre!("Failed to create config directory: {}", e))?;
        }

        let content = self.to_toml_string()?;
        tokio::fs::write(path, content)
            .await
            .map_err(|e| eyre!("Failed to write config file: {}", e))?;

        info!("Config saved to {}", path.display());
        Ok(())
    }
}

fn get_home_dir() -> PathBuf {
    dirs::home_dir().unwrap_or_else(|| {
        warn!("Could not determine home directory, using current directory");
        PathBuf::from(".")
    })
}

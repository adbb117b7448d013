//! Roomsync configuration management

use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{Error, Result};

/// Main roomsync configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoomsyncConfig {
    /// Slack endpoint configuration
    #[serde(default)]
    pub slack: SlackConfig,

    /// HipChat endpoint configuration
    #[serde(default)]
    pub hipchat: HipchatConfig,
}

/// Slack endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SlackConfig {
    /// API token for the relay bot
    #[serde(default)]
    pub token: String,

    /// Channel ID to relay (e.g. "C0123456789")
    #[serde(default)]
    pub channel: String,
}

impl Default for SlackConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel: String::new(),
        }
    }
}

/// HipChat endpoint configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HipchatConfig {
    /// API token for the relay integration
    #[serde(default)]
    pub token: String,

    /// Room ID to relay (numeric id as a string, e.g. "42")
    #[serde(default)]
    pub channel: String,

    /// Public base URL the HipChat platform reaches us at
    #[serde(default = "default_base_url")]
    pub base_url: String,

    /// Port the webhook HTTP surface listens on
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for HipchatConfig {
    fn default() -> Self {
        Self {
            token: String::new(),
            channel: String::new(),
            base_url: default_base_url(),
            port: default_port(),
        }
    }
}

fn default_base_url() -> String {
    "https://roomsync.cloud.play-net.org".to_string()
}

fn default_port() -> u16 {
    8080
}

impl RoomsyncConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))
    }
}

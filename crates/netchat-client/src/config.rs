//! Client configuration.
//!
//! All settings live in a single `config.toml` file at
//! `~/.config/netchat/config.toml` by default; command-line flags override
//! individual values.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration for the netchat client.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Server address (host:port).
    pub server_addr: String,

    /// Display name to register on connect.
    pub nickname: Option<String>,

    /// Connection timeout in seconds.
    pub timeout: u64,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            server_addr: "127.0.0.1:7878".to_string(),
            nickname: None,
            timeout: 5,
        }
    }
}

impl ClientConfig {
    /// Loads configuration from the default path, falling back to defaults
    /// when no file exists.
    pub fn load() -> Result<Self, String> {
        let path = Self::default_path();
        if path.exists() {
            Self::load_from(&path)
        } else {
            Ok(Self::default())
        }
    }

    /// Loads configuration from a specific path.
    pub fn load_from(path: &Path) -> Result<Self, String> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| format!("failed to read config: {}", e))?;
        toml::from_str(&content).map_err(|e| format!("failed to parse config: {}", e))
    }

    /// Returns the default configuration file path.
    pub fn default_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("netchat")
            .join("config.toml")
    }
}

//! Application configuration data model (`keeper.toml`).
//!
//! Loader and precedence logic lives in `config::mod`; this module only holds
//! struct definitions and their defaults.

use serde::Deserialize;
use std::path::PathBuf;

use super::defaults::{
    DEFAULT_API_TIMEOUT_SECS, DEFAULT_JULES_API_KEY_ENV, DEFAULT_JULES_BASE_URL,
    DEFAULT_SERVER_LISTEN,
};

/// Top-level runtime configuration.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    pub jules: JulesConfig,
    pub storage: StorageConfig,
    pub network: NetworkConfig,
    pub server: ServerConfig,
}

/// Session data source connection settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JulesConfig {
    pub base_url: String,
    /// Inline key. Prefer `api_key_env` so secrets stay out of config files.
    pub api_key: String,
    pub api_key_env: Option<String>,
}

impl Default for JulesConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_JULES_BASE_URL.into(),
            api_key: String::new(),
            api_key_env: Some(DEFAULT_JULES_API_KEY_ENV.into()),
        }
    }
}

/// Where persisted keeper state lives.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Defaults to the platform data dir (`~/.local/share/session-keeper`).
    pub state_dir: Option<PathBuf>,
}

/// Network/HTTP timeout policy.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    pub api_timeout_secs: u64,
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            api_timeout_secs: DEFAULT_API_TIMEOUT_SECS,
        }
    }
}

/// Supervisor gateway HTTP route settings.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen: DEFAULT_SERVER_LISTEN.into(),
        }
    }
}

//! Configuration loading from TOML files and environment variables.
//!
//! Application config is loaded in this order of precedence (highest wins):
//! 1. Environment variables (`KEEPER_JULES_BASE_URL`, `KEEPER_STATE_DIR`,
//!    `KEEPER_API_TIMEOUT_SECS`, `KEEPER_LISTEN`; the Jules key comes from
//!    `jules.api_key_env`, `JULES_API_KEY` by default)
//! 2. TOML file specified via --config CLI flag
//! 3. ./keeper.toml in the current directory
//! 4. $XDG_CONFIG_HOME/session-keeper/keeper.toml (or ~/.config/...)
//! 5. Built-in defaults
//!
//! The auto-pilot settings themselves (`SupervisionConfig`) are not part of
//! the TOML file; they are persisted as JSON through [`crate::store`].

use std::path::{Path, PathBuf};

use crate::error::ConfigError;

mod defaults;
mod env;
mod supervision;
mod types;

use defaults::{CONFIG_FILE_NAME, STATE_DIR_NAME};
pub use supervision::SupervisionConfig;
pub use types::{Config, JulesConfig, NetworkConfig, ServerConfig, StorageConfig};

/// Where the effective config text came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigSource {
    Explicit(PathBuf),
    Local,
    Global(PathBuf),
    BuiltInDefaults,
}

/// Load configuration from disk and environment.
///
/// `path_override` is an explicit config file path (from --config flag).
pub fn load_config(path_override: Option<&str>) -> Result<Config, ConfigError> {
    Ok(load_config_with_source(path_override)?.0)
}

/// Load configuration and report which file was used.
pub fn load_config_with_source(
    path_override: Option<&str>,
) -> Result<(Config, ConfigSource), ConfigError> {
    load_config_from_sources(
        path_override,
        |path| std::fs::read_to_string(path),
        |name| std::env::var(name).ok(),
        dirs::config_dir,
    )
}

fn load_config_from_sources<FRead, FEnv, FRoot>(
    path_override: Option<&str>,
    read_file: FRead,
    env_lookup: FEnv,
    config_root: FRoot,
) -> Result<(Config, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FEnv: Fn(&str) -> Option<String>,
    FRoot: Fn() -> Option<PathBuf>,
{
    let (text, source) = read_config_text(path_override, &read_file, &config_root)?;
    let mut config: Config = toml::from_str(&text)?;
    env::apply_runtime_env_overrides(&mut config, &env_lookup)?;
    env::resolve_jules_api_key(&mut config, &env_lookup);
    config.jules.base_url = config.jules.base_url.trim_end_matches('/').to_string();
    Ok((config, source))
}

fn read_config_text<FRead, FRoot>(
    path_override: Option<&str>,
    read_file: &FRead,
    config_root: &FRoot,
) -> Result<(String, ConfigSource), ConfigError>
where
    FRead: Fn(&Path) -> Result<String, std::io::Error>,
    FRoot: Fn() -> Option<PathBuf>,
{
    // An explicit path must exist; every other source is best-effort.
    if let Some(p) = path_override {
        let path = PathBuf::from(p);
        let text = read_file(&path)?;
        return Ok((text, ConfigSource::Explicit(path)));
    }
    if let Ok(text) = read_file(Path::new(CONFIG_FILE_NAME)) {
        return Ok((text, ConfigSource::Local));
    }
    if let Some(dir) = config_root() {
        let global = dir.join(STATE_DIR_NAME).join(CONFIG_FILE_NAME);
        if let Ok(text) = read_file(&global) {
            return Ok((text, ConfigSource::Global(global)));
        }
    }
    Ok((String::new(), ConfigSource::BuiltInDefaults))
}

/// Resolve the directory holding persisted keeper state.
///
/// Uses `storage.state_dir` when set, else the platform data dir, else a
/// local `.session-keeper/` directory.
pub fn resolve_state_dir(config: &Config) -> PathBuf {
    if let Some(dir) = &config.storage.state_dir {
        return dir.clone();
    }
    dirs::data_dir()
        .map(|dir| dir.join(STATE_DIR_NAME))
        .unwrap_or_else(|| PathBuf::from(format!(".{STATE_DIR_NAME}")))
}

//! Environment variable overrides applied after file parsing.

use crate::error::ConfigError;

use super::Config;

pub(super) const ENV_JULES_BASE_URL: &str = "KEEPER_JULES_BASE_URL";
pub(super) const ENV_STATE_DIR: &str = "KEEPER_STATE_DIR";
pub(super) const ENV_API_TIMEOUT_SECS: &str = "KEEPER_API_TIMEOUT_SECS";
pub(super) const ENV_SERVER_LISTEN: &str = "KEEPER_LISTEN";

pub(super) fn apply_runtime_env_overrides<FEnv>(
    config: &mut Config,
    env_lookup: &FEnv,
) -> Result<(), ConfigError>
where
    FEnv: Fn(&str) -> Option<String>,
{
    if let Some(url) = non_empty_env(env_lookup, ENV_JULES_BASE_URL) {
        config.jules.base_url = url;
    }
    if let Some(dir) = non_empty_env(env_lookup, ENV_STATE_DIR) {
        config.storage.state_dir = Some(dir.into());
    }
    if let Some(listen) = non_empty_env(env_lookup, ENV_SERVER_LISTEN) {
        config.server.listen = listen;
    }
    if let Some(timeout) = non_empty_env(env_lookup, ENV_API_TIMEOUT_SECS) {
        let parsed = timeout.parse::<u64>().map_err(|_| {
            ConfigError::Invalid(format!(
                "invalid {ENV_API_TIMEOUT_SECS} value `{timeout}`: expected positive integer seconds"
            ))
        })?;
        // Zero would mean "no timeout" to reqwest.
        config.network.api_timeout_secs = parsed.max(1);
    }
    Ok(())
}

/// Resolve the Jules API key: inline value wins, then the configured env var.
pub(super) fn resolve_jules_api_key<FEnv>(config: &mut Config, env_lookup: &FEnv)
where
    FEnv: Fn(&str) -> Option<String>,
{
    if !config.jules.api_key.trim().is_empty() {
        config.jules.api_key = config.jules.api_key.trim().to_string();
        return;
    }
    if let Some(var) = config.jules.api_key_env.clone() {
        if let Some(key) = non_empty_env(env_lookup, &var) {
            config.jules.api_key = key;
        }
    }
}

fn non_empty_env<FEnv>(env_lookup: &FEnv, name: &str) -> Option<String>
where
    FEnv: Fn(&str) -> Option<String>,
{
    env_lookup(name)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

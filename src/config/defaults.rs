//! Default configuration constants.
//!
//! Keeping defaults in one module lets the TOML loader, the persisted
//! supervision config, and tests share the same literals.

/// Jules REST API root.
pub(super) const DEFAULT_JULES_BASE_URL: &str = "https://jules.googleapis.com/v1alpha";
/// Environment variable consulted for the Jules API key.
pub(super) const DEFAULT_JULES_API_KEY_ENV: &str = "JULES_API_KEY";
/// Default timeout for session data source requests.
pub(super) const DEFAULT_API_TIMEOUT_SECS: u64 = 30;
/// Default listen address for the supervisor gateway route.
pub(super) const DEFAULT_SERVER_LISTEN: &str = "127.0.0.1:3000";
/// Directory name used under the platform data dir for persisted state.
pub(super) const STATE_DIR_NAME: &str = "session-keeper";
/// Config file name looked up locally and under the config root.
pub(super) const CONFIG_FILE_NAME: &str = "keeper.toml";

pub(super) const DEFAULT_CHECK_INTERVAL_SECONDS: u64 = 30;
pub(super) const DEFAULT_INACTIVITY_THRESHOLD_MINUTES: f64 = 1.0;
pub(super) const DEFAULT_ACTIVE_WORK_THRESHOLD_MINUTES: f64 = 30.0;
pub(super) const DEFAULT_CONTEXT_MESSAGE_COUNT: usize = 20;

pub(super) const MIN_CHECK_INTERVAL_SECONDS: u64 = 10;
pub(super) const MIN_INACTIVITY_THRESHOLD_MINUTES: f64 = 0.5;
pub(super) const MIN_ACTIVE_WORK_THRESHOLD_MINUTES: f64 = 1.0;
pub(super) const MAX_CONTEXT_MESSAGE_COUNT: usize = 50;

/// Encouragement messages used when no custom list applies.
pub(super) fn default_nudge_messages() -> Vec<String> {
    [
        "Great! Please keep going as you advise!",
        "Yes! Please continue to proceed as you recommend!",
        "This looks correct. Please proceed.",
        "Excellent plan. Go ahead.",
        "Looks good to me. Continue.",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

//! Persisted auto-pilot configuration (`SupervisionConfig`).
//!
//! Stored as a flat JSON object with camelCase keys. Readers apply the
//! documented default for any field that is missing or malformed, so older or
//! hand-edited records never fail to load.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::ConfigError;
use crate::supervisor::ProviderKind;

use super::defaults::{
    default_nudge_messages, DEFAULT_ACTIVE_WORK_THRESHOLD_MINUTES,
    DEFAULT_CHECK_INTERVAL_SECONDS, DEFAULT_CONTEXT_MESSAGE_COUNT,
    DEFAULT_INACTIVITY_THRESHOLD_MINUTES, MAX_CONTEXT_MESSAGE_COUNT,
    MIN_ACTIVE_WORK_THRESHOLD_MINUTES, MIN_CHECK_INTERVAL_SECONDS,
    MIN_INACTIVITY_THRESHOLD_MINUTES,
};

/// Auto-pilot settings read by the supervision loop on every pass.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SupervisionConfig {
    pub is_enabled: bool,
    /// Move focus to the session being acted upon.
    pub auto_switch: bool,
    pub check_interval_seconds: u64,
    pub inactivity_threshold_minutes: f64,
    /// Threshold for sessions whose raw state is `IN_PROGRESS`.
    pub active_work_threshold_minutes: f64,
    /// Global fallback nudge messages.
    pub messages: Vec<String>,
    /// Per-session message lists; a non-empty entry replaces `messages`.
    pub custom_messages: BTreeMap<String, Vec<String>>,
    pub smart_pilot_enabled: bool,
    pub supervisor_provider: ProviderKind,
    pub supervisor_api_key: String,
    pub supervisor_model: Option<String>,
    /// Sliding window size for stateless supervisor history.
    pub context_message_count: usize,
}

impl Default for SupervisionConfig {
    fn default() -> Self {
        Self {
            is_enabled: false,
            auto_switch: true,
            check_interval_seconds: DEFAULT_CHECK_INTERVAL_SECONDS,
            inactivity_threshold_minutes: DEFAULT_INACTIVITY_THRESHOLD_MINUTES,
            active_work_threshold_minutes: DEFAULT_ACTIVE_WORK_THRESHOLD_MINUTES,
            messages: default_nudge_messages(),
            custom_messages: BTreeMap::new(),
            smart_pilot_enabled: false,
            supervisor_provider: ProviderKind::OpenAiChat,
            supervisor_api_key: String::new(),
            supervisor_model: None,
            context_message_count: DEFAULT_CONTEXT_MESSAGE_COUNT,
        }
    }
}

impl SupervisionConfig {
    /// Reject out-of-range values before they are saved or used.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.check_interval_seconds < MIN_CHECK_INTERVAL_SECONDS {
            return Err(ConfigError::Invalid(format!(
                "checkIntervalSeconds must be at least {MIN_CHECK_INTERVAL_SECONDS}, got {}",
                self.check_interval_seconds
            )));
        }
        if below_minimum(self.inactivity_threshold_minutes, MIN_INACTIVITY_THRESHOLD_MINUTES) {
            return Err(ConfigError::Invalid(format!(
                "inactivityThresholdMinutes must be at least {MIN_INACTIVITY_THRESHOLD_MINUTES}, got {}",
                self.inactivity_threshold_minutes
            )));
        }
        if below_minimum(self.active_work_threshold_minutes, MIN_ACTIVE_WORK_THRESHOLD_MINUTES) {
            return Err(ConfigError::Invalid(format!(
                "activeWorkThresholdMinutes must be at least {MIN_ACTIVE_WORK_THRESHOLD_MINUTES}, got {}",
                self.active_work_threshold_minutes
            )));
        }
        if !(1..=MAX_CONTEXT_MESSAGE_COUNT).contains(&self.context_message_count) {
            return Err(ConfigError::Invalid(format!(
                "contextMessageCount must be between 1 and {MAX_CONTEXT_MESSAGE_COUNT}, got {}",
                self.context_message_count
            )));
        }
        if self.messages.iter().all(|m| m.trim().is_empty()) {
            return Err(ConfigError::Invalid(
                "messages must contain at least one nudge message".to_string(),
            ));
        }
        if self.smart_pilot_enabled && self.supervisor_api_key.trim().is_empty() {
            return Err(ConfigError::Invalid(
                "smartPilotEnabled requires supervisorApiKey".to_string(),
            ));
        }
        Ok(())
    }

    /// Scheduler period, never shorter than the documented minimum.
    pub fn check_interval(&self) -> Duration {
        Duration::from_secs(self.check_interval_seconds.max(MIN_CHECK_INTERVAL_SECONDS))
    }

    /// History window for stateless providers, clamped to `1..=50`.
    pub fn context_window(&self) -> usize {
        self.context_message_count.clamp(1, MAX_CONTEXT_MESSAGE_COUNT)
    }

    /// True when the smart supervisor path should be attempted.
    pub fn smart_pilot_ready(&self) -> bool {
        self.smart_pilot_enabled && !self.supervisor_api_key.trim().is_empty()
    }

    /// Messages the static nudge path draws from for `session_id`.
    ///
    /// A non-empty custom list fully replaces the global list.
    pub fn messages_for(&self, session_id: &str) -> &[String] {
        match self.custom_messages.get(session_id) {
            Some(custom) if !custom.is_empty() => custom,
            _ => &self.messages,
        }
    }

    /// Replace the global list (`session_id == None`) or one session's list.
    ///
    /// Blank lines are dropped, matching how the list editor splits input.
    pub fn set_messages(&mut self, session_id: Option<&str>, messages: Vec<String>) {
        let cleaned: Vec<String> = messages
            .into_iter()
            .filter(|m| !m.trim().is_empty())
            .collect();
        match session_id {
            None => self.messages = cleaned,
            Some(id) => {
                self.custom_messages.insert(id.to_string(), cleaned);
            }
        }
    }

    /// Apply one `key = value` edit from the CLI. Accepts camelCase or
    /// snake_case key names.
    pub fn apply_setting(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        let value = value.trim();
        let normalized: String = key
            .chars()
            .filter(|c| *c != '_' && *c != '-')
            .flat_map(char::to_lowercase)
            .collect();
        match normalized.as_str() {
            "isenabled" | "enabled" => self.is_enabled = parse_bool(key, value)?,
            "autoswitch" => self.auto_switch = parse_bool(key, value)?,
            "checkintervalseconds" => self.check_interval_seconds = parse_num(key, value)?,
            "inactivitythresholdminutes" => {
                self.inactivity_threshold_minutes = parse_num(key, value)?
            }
            "activeworkthresholdminutes" => {
                self.active_work_threshold_minutes = parse_num(key, value)?
            }
            "smartpilotenabled" => self.smart_pilot_enabled = parse_bool(key, value)?,
            "supervisorprovider" => {
                self.supervisor_provider = value.parse().map_err(ConfigError::Invalid)?
            }
            "supervisorapikey" => self.supervisor_api_key = value.to_string(),
            "supervisormodel" => {
                self.supervisor_model = (!value.is_empty()).then(|| value.to_string())
            }
            "contextmessagecount" => self.context_message_count = parse_num(key, value)?,
            _ => {
                return Err(ConfigError::Invalid(format!(
                    "unknown supervision setting `{key}`"
                )))
            }
        }
        Ok(())
    }
}

/// NaN counts as below the minimum.
fn below_minimum(value: f64, min: f64) -> bool {
    value.is_nan() || value < min
}

fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
    match value.to_ascii_lowercase().as_str() {
        "true" | "on" | "yes" | "1" => Ok(true),
        "false" | "off" | "no" | "0" => Ok(false),
        _ => Err(ConfigError::Invalid(format!(
            "`{key}` expects a boolean, got `{value}`"
        ))),
    }
}

fn parse_num<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
    value
        .parse::<T>()
        .map_err(|_| ConfigError::Invalid(format!("`{key}` expects a number, got `{value}`")))
}

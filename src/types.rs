//! Shared data model: sessions, activities, and supervisor chat turns.
//!
//! Sessions and activities are the normalized view produced by the session
//! data source. Chat turns are the provider-neutral message shape exchanged
//! with the supervisor gateway and persisted in supervisor memory.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Sessions
// ---------------------------------------------------------------------------

/// Raw provider state for a session that is still producing output.
pub const RAW_STATE_IN_PROGRESS: &str = "IN_PROGRESS";
/// Raw provider state for a session blocked on plan approval.
pub const RAW_STATE_AWAITING_PLAN_APPROVAL: &str = "AWAITING_PLAN_APPROVAL";

/// Normalized lifecycle status of a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Paused,
    Completed,
    Failed,
    AwaitingApproval,
}

impl SessionStatus {
    /// Statuses the keeper brings back to life with a resume call.
    pub fn is_resumable(self) -> bool {
        matches!(self, Self::Paused | Self::Completed | Self::Failed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::AwaitingApproval => "awaiting_approval",
        }
    }
}

/// One unit of agent work against a source repository.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub source_id: String,
    pub status: SessionStatus,
    /// Original provider state string (e.g. `IN_PROGRESS`).
    #[serde(default)]
    pub raw_state: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub last_activity_at: Option<DateTime<Utc>>,
}

impl Session {
    /// Timestamp idle time is measured from: `last_activity_at`, else `updated_at`.
    pub fn idle_reference(&self) -> Option<DateTime<Utc>> {
        self.last_activity_at.or(self.updated_at)
    }

    pub fn raw_state_is(&self, state: &str) -> bool {
        self.raw_state.as_deref() == Some(state)
    }

    /// First eight characters of the id, used in log lines.
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }
}

/// Truncate a session id for display without splitting a character.
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

// ---------------------------------------------------------------------------
// Activities
// ---------------------------------------------------------------------------

/// Kind of activity event within a session.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    Message,
    Plan,
    Progress,
    Result,
    Error,
}

impl ActivityKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Message => "message",
            Self::Plan => "plan",
            Self::Progress => "progress",
            Self::Result => "result",
            Self::Error => "error",
        }
    }
}

/// Who produced an activity.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ActivityRole {
    User,
    Agent,
}

/// One timestamped event within a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Activity {
    pub id: String,
    pub session_id: String,
    pub kind: ActivityKind,
    pub role: ActivityRole,
    pub content: String,
    /// Unified diff patch extracted from artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub diff: Option<String>,
    /// Bash command output extracted from artifacts.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bash_output: Option<String>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

/// Payload for sending a message into a session.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CreateActivityRequest {
    pub session_id: String,
    pub content: String,
    /// Always `"message"` for nudges.
    #[serde(rename = "type")]
    pub kind: String,
}

impl CreateActivityRequest {
    pub fn message(session_id: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            content: content.into(),
            kind: "message".to_string(),
        }
    }
}

// ---------------------------------------------------------------------------
// Supervisor chat turns
// ---------------------------------------------------------------------------

/// Conversation participant role for supervisor turns.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    User,
    Assistant,
}

impl ChatRole {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// A single `{role, content}` turn.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: ChatRole,
    pub content: String,
}

impl ChatMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: ChatRole::Assistant,
            content: content.into(),
        }
    }
}

//! Rolling activity log of keeper decisions.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;
use tracing::{debug, info, warn};

/// Entries kept before the oldest is dropped.
pub const LOG_CAPACITY: usize = 50;

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogKind {
    /// Progress chatter; traced but never stored.
    Info,
    Action,
    Skip,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LogEntry {
    pub time: DateTime<Utc>,
    pub kind: LogKind,
    pub message: String,
}

/// Newest-first, capped list of what the keeper did.
#[derive(Debug, Default)]
pub struct ActivityLog {
    entries: VecDeque<LogEntry>,
}

impl ActivityLog {
    /// Trace `message` and keep it unless it is [`LogKind::Info`].
    pub fn record(&mut self, kind: LogKind, message: impl Into<String>) {
        let message = message.into();
        match kind {
            LogKind::Info => debug!(target: "session_keeper::activity", "{message}"),
            LogKind::Action => info!(target: "session_keeper::activity", "{message}"),
            LogKind::Skip => debug!(target: "session_keeper::activity", skipped = true, "{message}"),
            LogKind::Error => warn!(target: "session_keeper::activity", "{message}"),
        }
        if kind == LogKind::Info {
            return;
        }
        self.entries.push_front(LogEntry {
            time: Utc::now(),
            kind,
            message,
        });
        self.entries.truncate(LOG_CAPACITY);
    }

    /// Entries, newest first.
    pub fn entries(&self) -> Vec<LogEntry> {
        self.entries.iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

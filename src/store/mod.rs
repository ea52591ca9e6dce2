//! Persisted keeper state: supervision config and per-session supervisor memory.
//!
//! The supervision loop only touches state through the [`ConfigStore`] and
//! [`MemoryStore`] traits. Production code uses [`JsonFileStore`]; tests and
//! embedders can inject [`InMemoryStore`].
//!
//! Both records are last-write-wins with no versioning. Readers merge stored
//! values over defaults field by field, so a missing or malformed field falls
//! back to its default instead of failing the whole load.

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;

use crate::config::SupervisionConfig;
use crate::error::StoreError;
use crate::supervisor::ContinuationHandles;
use crate::types::ChatMessage;

mod file;
mod in_memory;

pub use file::JsonFileStore;
pub(crate) use file::{read_json_value, write_json_atomic};
pub use in_memory::InMemoryStore;

/// Supervisor memory keyed by session id.
pub type MemoryMap = BTreeMap<String, SupervisorMemory>;

/// Conversational state the keeper keeps for one supervised session.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct SupervisorMemory {
    /// High-water mark of activities already framed for the supervisor.
    pub last_processed_activity_timestamp: Option<DateTime<Utc>>,
    /// Replayed on every stateless call; display-only for the stateful provider.
    pub history: Vec<ChatMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thread_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assistant_id: Option<String>,
}

impl SupervisorMemory {
    /// Move the high-water mark forward. Never moves it backwards.
    pub fn advance_high_water(&mut self, timestamp: DateTime<Utc>) {
        match self.last_processed_activity_timestamp {
            Some(current) if current >= timestamp => {}
            _ => self.last_processed_activity_timestamp = Some(timestamp),
        }
    }

    /// Continuation handles to pass back to a stateful provider.
    pub fn handles(&self) -> ContinuationHandles {
        ContinuationHandles {
            thread_id: self.thread_id.clone(),
            assistant_id: self.assistant_id.clone(),
        }
    }

    /// Store handles returned by the provider, keeping old ones it did not echo.
    pub fn remember_handles(&mut self, handles: &ContinuationHandles) {
        if let Some(thread_id) = &handles.thread_id {
            self.thread_id = Some(thread_id.clone());
        }
        if let Some(assistant_id) = &handles.assistant_id {
            self.assistant_id = Some(assistant_id.clone());
        }
    }

    /// Append turns and keep only the most recent `limit` entries.
    pub fn push_history(&mut self, turns: impl IntoIterator<Item = ChatMessage>, limit: usize) {
        self.history.extend(turns);
        truncate_oldest(&mut self.history, limit);
    }
}

/// Drop the oldest entries so at most `limit` remain.
pub fn truncate_oldest<T>(items: &mut Vec<T>, limit: usize) {
    if items.len() > limit {
        let excess = items.len() - limit;
        items.drain(..excess);
    }
}

/// Storage for the persisted [`SupervisionConfig`] record.
pub trait ConfigStore: Send + Sync {
    fn load_config(&self) -> Result<SupervisionConfig, StoreError>;
    fn save_config(&self, config: &SupervisionConfig) -> Result<(), StoreError>;
}

/// Storage for the persisted supervisor memory record.
pub trait MemoryStore: Send + Sync {
    fn load_memory(&self) -> Result<MemoryMap, StoreError>;
    fn save_memory(&self, memory: &MemoryMap) -> Result<(), StoreError>;
}

/// Deserialize `stored` over `T::default()`, keeping only fields that parse.
pub fn merge_with_defaults<T>(stored: Value) -> T
where
    T: Default + Serialize + DeserializeOwned,
{
    let Ok(Value::Object(mut base)) = serde_json::to_value(T::default()) else {
        return T::default();
    };
    let Value::Object(stored) = stored else {
        return T::default();
    };
    for (key, value) in stored {
        let previous = base.insert(key.clone(), value);
        if serde_json::from_value::<T>(Value::Object(base.clone())).is_err() {
            match previous {
                Some(previous) => base.insert(key, previous),
                None => base.remove(&key),
            };
        }
    }
    serde_json::from_value(Value::Object(base)).unwrap_or_default()
}

/// Parse a memory record, dropping nothing but malformed fields.
pub(crate) fn memory_from_value(stored: Value) -> MemoryMap {
    let Value::Object(entries) = stored else {
        return MemoryMap::new();
    };
    entries
        .into_iter()
        .map(|(session_id, entry)| (session_id, merge_with_defaults(entry)))
        .collect()
}

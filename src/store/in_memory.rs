//! Process-local state store.

use std::sync::Mutex;

use super::{ConfigStore, MemoryMap, MemoryStore};
use crate::config::SupervisionConfig;
use crate::error::StoreError;

/// Keeps both records in memory. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    config: Mutex<SupervisionConfig>,
    memory: Mutex<MemoryMap>,
    memory_saves: Mutex<usize>,
}

impl InMemoryStore {
    pub fn new(config: SupervisionConfig) -> Self {
        Self {
            config: Mutex::new(config),
            ..Self::default()
        }
    }

    pub fn with_memory(self, memory: MemoryMap) -> Self {
        *lock(&self.memory) = memory;
        self
    }

    /// Snapshot of the stored memory record.
    pub fn memory(&self) -> MemoryMap {
        lock(&self.memory).clone()
    }

    /// Number of `save_memory` calls so far.
    pub fn memory_saves(&self) -> usize {
        *lock(&self.memory_saves)
    }
}

impl ConfigStore for InMemoryStore {
    fn load_config(&self) -> Result<SupervisionConfig, StoreError> {
        Ok(lock(&self.config).clone())
    }

    fn save_config(&self, config: &SupervisionConfig) -> Result<(), StoreError> {
        *lock(&self.config) = config.clone();
        Ok(())
    }
}

impl MemoryStore for InMemoryStore {
    fn load_memory(&self) -> Result<MemoryMap, StoreError> {
        Ok(lock(&self.memory).clone())
    }

    fn save_memory(&self, memory: &MemoryMap) -> Result<(), StoreError> {
        *lock(&self.memory) = memory.clone();
        *lock(&self.memory_saves) += 1;
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

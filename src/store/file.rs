//! JSON-file backed state store.

use serde::Serialize;
use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::warn;

use super::{memory_from_value, merge_with_defaults, ConfigStore, MemoryMap, MemoryStore};
use crate::config::SupervisionConfig;
use crate::error::StoreError;

const CONFIG_FILE: &str = "supervision-config.json";
const MEMORY_FILE: &str = "supervisor-memory.json";

/// Stores each record as one JSON file under a state directory.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Open/create a store rooted at `dir`.
    pub fn open(dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        let dir = dir.as_ref().to_path_buf();
        fs::create_dir_all(&dir)?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn config_path(&self) -> PathBuf {
        self.dir.join(CONFIG_FILE)
    }

    fn memory_path(&self) -> PathBuf {
        self.dir.join(MEMORY_FILE)
    }
}

impl ConfigStore for JsonFileStore {
    fn load_config(&self) -> Result<SupervisionConfig, StoreError> {
        Ok(read_json_value(&self.config_path())?
            .map(merge_with_defaults)
            .unwrap_or_default())
    }

    fn save_config(&self, config: &SupervisionConfig) -> Result<(), StoreError> {
        write_json_atomic(&self.config_path(), config)
    }
}

impl MemoryStore for JsonFileStore {
    fn load_memory(&self) -> Result<MemoryMap, StoreError> {
        Ok(read_json_value(&self.memory_path())?
            .map(memory_from_value)
            .unwrap_or_default())
    }

    fn save_memory(&self, memory: &MemoryMap) -> Result<(), StoreError> {
        write_json_atomic(&self.memory_path(), memory)
    }
}

/// Read a JSON file. Missing files and unparsable content both yield `None`.
pub(crate) fn read_json_value(path: &Path) -> Result<Option<Value>, StoreError> {
    let raw = match fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(StoreError::Io(e)),
    };
    match serde_json::from_str(&raw) {
        Ok(value) => Ok(Some(value)),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "ignoring unparsable state file");
            Ok(None)
        }
    }
}

/// Write pretty JSON through a sibling temp file and rename into place.
pub(crate) fn write_json_atomic<T: Serialize + ?Sized>(
    path: &Path,
    value: &T,
) -> Result<(), StoreError> {
    let json = serde_json::to_vec_pretty(value)?;
    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json)?;
    fs::rename(&tmp_path, path)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::SupervisorMemory;
    use crate::testsupport::TestTempDir;
    use crate::types::ChatMessage;

    #[test]
    fn missing_files_load_defaults() {
        let tmp = TestTempDir::new("store-missing");
        let store = JsonFileStore::open(tmp.path()).expect("open");
        assert_eq!(store.load_config().unwrap(), SupervisionConfig::default());
        assert!(store.load_memory().unwrap().is_empty());
    }

    #[test]
    fn config_round_trips_through_disk() {
        let tmp = TestTempDir::new("store-config");
        let store = JsonFileStore::open(tmp.path()).expect("open");
        let mut config = SupervisionConfig::default();
        config.is_enabled = true;
        config.set_messages(Some("abc"), vec!["keep going".into()]);
        store.save_config(&config).expect("save");
        assert_eq!(store.load_config().unwrap(), config);
        assert!(!tmp.child("supervision-config.json.tmp").exists());
    }

    #[test]
    fn memory_round_trips_through_disk() {
        let tmp = TestTempDir::new("store-memory");
        let store = JsonFileStore::open(tmp.path()).expect("open");
        let mut memory = MemoryMap::new();
        let mut entry = SupervisorMemory::default();
        entry.push_history([ChatMessage::user("hi"), ChatMessage::assistant("go on")], 10);
        memory.insert("s1".into(), entry);
        store.save_memory(&memory).expect("save");
        assert_eq!(store.load_memory().unwrap(), memory);
    }

    #[test]
    fn corrupt_config_file_falls_back_to_defaults() {
        let tmp = TestTempDir::new("store-corrupt");
        tmp.write_text("supervision-config.json", "{not json");
        let store = JsonFileStore::open(tmp.path()).expect("open");
        assert_eq!(store.load_config().unwrap(), SupervisionConfig::default());
    }
}

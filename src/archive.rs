//! Archived session ids.
//!
//! The Jules API has no archive concept, so hidden sessions are tracked
//! locally as a JSON array of ids. The supervision loop never acts on an
//! archived session.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::store::{read_json_value, write_json_atomic};

const ARCHIVE_FILE: &str = "archived-sessions.json";

/// File-backed set of archived session ids.
#[derive(Debug, Clone)]
pub struct ArchiveStore {
    path: PathBuf,
}

impl ArchiveStore {
    /// Open the archive file under `state_dir`, creating the directory if needed.
    pub fn open(state_dir: impl AsRef<Path>) -> Result<Self, StoreError> {
        std::fs::create_dir_all(state_dir.as_ref())?;
        Ok(Self {
            path: state_dir.as_ref().join(ARCHIVE_FILE),
        })
    }

    /// Current archived ids. A missing or unreadable file means none.
    pub fn load(&self) -> Result<BTreeSet<String>, StoreError> {
        let ids = read_json_value(&self.path)?
            .and_then(|value| serde_json::from_value::<Vec<String>>(value).ok())
            .unwrap_or_default();
        Ok(ids.into_iter().collect())
    }

    pub fn contains(&self, session_id: &str) -> Result<bool, StoreError> {
        Ok(self.load()?.contains(session_id))
    }

    /// Archive a session. Returns false when it was already archived.
    pub fn archive(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut ids = self.load()?;
        let inserted = ids.insert(session_id.to_string());
        if inserted {
            self.save(&ids)?;
        }
        Ok(inserted)
    }

    /// Unarchive a session. Returns false when it was not archived.
    pub fn unarchive(&self, session_id: &str) -> Result<bool, StoreError> {
        let mut ids = self.load()?;
        let removed = ids.remove(session_id);
        if removed {
            self.save(&ids)?;
        }
        Ok(removed)
    }

    fn save(&self, ids: &BTreeSet<String>) -> Result<(), StoreError> {
        let list: Vec<&String> = ids.iter().collect();
        write_json_atomic(&self.path, &list)
    }
}

/// Source of archived ids consulted once per pass.
pub trait ArchiveFilter: Send + Sync {
    fn archived_ids(&self) -> Result<BTreeSet<String>, StoreError>;
}

impl ArchiveFilter for ArchiveStore {
    fn archived_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        self.load()
    }
}

impl ArchiveFilter for BTreeSet<String> {
    fn archived_ids(&self) -> Result<BTreeSet<String>, StoreError> {
        Ok(self.clone())
    }
}

//! In-process storage, mainly for tests.

use std::collections::BTreeMap;
use std::sync::Mutex;

use crate::error::{FolioError, FolioResult};
use crate::storage::HistoryStorage;
use crate::versioning::VersionHistory;

/// Keeps serialized snapshots in a map
///
/// Histories are stored as JSON text so a save captures the state at that
/// moment, the same as a file backend would.
#[derive(Default)]
pub struct InMemoryStorage {
    snapshots: Mutex<BTreeMap<String, String>>,
    saves: Mutex<usize>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successful saves so far.
    pub fn save_count(&self) -> usize {
        self.saves.lock().map(|n| *n).unwrap_or(0)
    }
}

impl HistoryStorage for InMemoryStorage {
    fn save(&self, history: &VersionHistory) -> FolioResult<()> {
        let data = serde_json::to_string(history)?;
        self.snapshots
            .lock()
            .map_err(|_| FolioError::poisoned("snapshot"))?
            .insert(history.content_id.clone(), data);
        *self.saves.lock().map_err(|_| FolioError::poisoned("save counter"))? += 1;
        Ok(())
    }

    fn load(&self, content_id: &str) -> FolioResult<Option<VersionHistory>> {
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|_| FolioError::poisoned("snapshot"))?;
        match snapshots.get(content_id) {
            Some(data) => Ok(Some(serde_json::from_str(data)?)),
            None => Ok(None),
        }
    }

    fn list_ids(&self) -> FolioResult<Vec<String>> {
        let snapshots = self
            .snapshots
            .lock()
            .map_err(|_| FolioError::poisoned("snapshot"))?;
        Ok(snapshots.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::ContentVersion;

    #[test]
    fn test_snapshot_is_a_copy() {
        let storage = InMemoryStorage::new();
        let mut history = VersionHistory::new("c1", "T", ContentVersion::initial("x", "alice", "main"));
        storage.save(&history).unwrap();

        history.title = "Changed after save".to_string();

        let loaded = storage.load("c1").unwrap().unwrap();
        assert_eq!(loaded.title, "T");
        assert_eq!(storage.save_count(), 1);
        assert_eq!(storage.list_ids().unwrap(), vec!["c1".to_string()]);
    }
}

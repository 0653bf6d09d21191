//! One pretty-printed JSON file per content id.

use std::fs;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{FolioError, FolioResult};
use crate::storage::HistoryStorage;
use crate::versioning::VersionHistory;

const EXTENSION: &str = "json";

/// Directory of `<content_id>.json` snapshots
pub struct JsonFileStorage {
    root: PathBuf,
}

impl JsonFileStorage {
    /// Use `root` as the storage directory, creating it if needed.
    pub fn new(root: impl AsRef<Path>) -> FolioResult<Self> {
        fs::create_dir_all(root.as_ref())?;
        Ok(Self {
            root: root.as_ref().to_path_buf(),
        })
    }

    fn file_path(&self, content_id: &str) -> FolioResult<PathBuf> {
        let unsafe_id = content_id.is_empty()
            || content_id == "."
            || content_id == ".."
            || content_id.contains(['/', '\\']);
        if unsafe_id {
            return Err(FolioError::validation(format!(
                "content id '{}' cannot be used as a file name",
                content_id
            )));
        }
        Ok(self.root.join(format!("{}.{}", content_id, EXTENSION)))
    }
}

impl HistoryStorage for JsonFileStorage {
    fn save(&self, history: &VersionHistory) -> FolioResult<()> {
        let path = self.file_path(&history.content_id)?;
        let data = serde_json::to_vec_pretty(history)?;

        // Write to a sibling temp file and rename so readers never see a partial file
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, data)?;
        fs::rename(&tmp, &path)?;

        debug!(content_id = %history.content_id, path = %path.display(), "Saved history");
        Ok(())
    }

    fn load(&self, content_id: &str) -> FolioResult<Option<VersionHistory>> {
        let path = self.file_path(content_id)?;
        if !path.exists() {
            return Ok(None);
        }
        let data = fs::read(&path)?;
        let history = serde_json::from_slice(&data).map_err(|e| {
            FolioError::storage_read(format!("corrupt history file {}: {}", path.display(), e))
        })?;
        Ok(Some(history))
    }

    fn list_ids(&self) -> FolioResult<Vec<String>> {
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some(EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                ids.push(stem.to_string());
            }
        }
        ids.sort();
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::ContentVersion;

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).unwrap();

        let history = VersionHistory::new("blog_001", "Blog", ContentVersion::initial("Hi", "alice", "main"));
        storage.save(&history).unwrap();

        assert!(dir.path().join("blog_001.json").exists());
        let loaded = storage.load("blog_001").unwrap().unwrap();
        assert_eq!(loaded, history);
        assert!(storage.load("missing").unwrap().is_none());
    }

    #[test]
    fn test_snapshot_layout() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).unwrap();
        let history = VersionHistory::new("c1", "T", ContentVersion::initial("a b", "alice", "main"));
        storage.save(&history).unwrap();

        let raw = std::fs::read_to_string(dir.path().join("c1.json")).unwrap();
        let value: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value["content_id"], "c1");
        assert_eq!(value["total_versions"], 1);
        assert_eq!(value["versions"][0]["word_count"], 2);
        assert_eq!(value["branches"]["main"]["is_active"], true);
        assert_eq!(value["authors"][0], "alice");
    }

    #[test]
    fn test_list_ids_ignores_other_files() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).unwrap();
        for id in ["b", "a"] {
            let history = VersionHistory::new(id, "T", ContentVersion::initial("x", "alice", "main"));
            storage.save(&history).unwrap();
        }
        std::fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();

        assert_eq!(storage.list_ids().unwrap(), vec!["a".to_string(), "b".to_string()]);
        assert_eq!(storage.load_all().unwrap().len(), 2);
    }

    #[test]
    fn test_rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).unwrap();
        assert!(storage.load("../escape").is_err());
        assert!(storage.load("").is_err());
    }

    #[test]
    fn test_corrupt_file_is_storage_error() {
        let dir = tempfile::tempdir().unwrap();
        let storage = JsonFileStorage::new(dir.path()).unwrap();
        std::fs::write(dir.path().join("broken.json"), "{not json").unwrap();

        let err = storage.load("broken").unwrap_err();
        assert!(matches!(err, FolioError::Storage { .. }));
    }
}

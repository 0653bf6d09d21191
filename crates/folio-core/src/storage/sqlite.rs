//! SQLite-backed history storage.
//!
//! Each content id is one row holding the JSON snapshot of its history.

use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use crate::error::{FolioError, FolioResult};
use crate::storage::HistoryStorage;
use crate::versioning::VersionHistory;

/// SQLite-backed history store
pub struct SqliteStorage {
    conn: Mutex<Connection>,
}

impl SqliteStorage {
    /// Open (or create) a database at the given path
    pub fn new(path: impl AsRef<Path>) -> FolioResult<Self> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        let conn = Connection::open(path)?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Create an in-memory database (for testing)
    pub fn in_memory() -> FolioResult<Self> {
        let conn = Connection::open_in_memory()?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.init_schema()?;
        Ok(store)
    }

    fn conn(&self) -> FolioResult<MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| FolioError::poisoned("sqlite connection"))
    }

    fn init_schema(&self) -> FolioResult<()> {
        let conn = self.conn()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS content_histories (
                content_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                current_version_id TEXT NOT NULL,
                total_versions INTEGER NOT NULL,
                last_modified TEXT NOT NULL,
                snapshot TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_histories_modified
                ON content_histories(last_modified);
        "#,
        )?;
        Ok(())
    }
}

impl HistoryStorage for SqliteStorage {
    fn save(&self, history: &VersionHistory) -> FolioResult<()> {
        let snapshot = serde_json::to_string(history)?;
        let conn = self.conn()?;
        conn.execute(
            r#"INSERT INTO content_histories
               (content_id, title, current_version_id, total_versions, last_modified, snapshot)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(content_id) DO UPDATE SET
                   title = excluded.title,
                   current_version_id = excluded.current_version_id,
                   total_versions = excluded.total_versions,
                   last_modified = excluded.last_modified,
                   snapshot = excluded.snapshot"#,
            params![
                history.content_id,
                history.title,
                history.current_version_id,
                history.total_versions as i64,
                history.last_modified.to_rfc3339(),
                snapshot,
            ],
        )?;
        Ok(())
    }

    fn load(&self, content_id: &str) -> FolioResult<Option<VersionHistory>> {
        let conn = self.conn()?;
        let snapshot: Option<String> = conn
            .query_row(
                "SELECT snapshot FROM content_histories WHERE content_id = ?1",
                params![content_id],
                |row| row.get(0),
            )
            .optional()?;

        match snapshot {
            Some(data) => Ok(Some(serde_json::from_str(&data)?)),
            None => Ok(None),
        }
    }

    fn list_ids(&self) -> FolioResult<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT content_id FROM content_histories ORDER BY content_id ASC")?;
        let ids = stmt.query_map([], |row| row.get::<_, String>(0))?;
        ids.map(|r| r.map_err(FolioError::from)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::versioning::{ChangeKind, ContentVersion};

    #[test]
    fn test_save_load_round_trip() {
        let store = SqliteStorage::in_memory().unwrap();
        let history = VersionHistory::new("c1", "Title", ContentVersion::initial("Hello", "alice", "main"));

        store.save(&history).unwrap();
        let loaded = store.load("c1").unwrap().unwrap();
        assert_eq!(loaded, history);
        assert!(store.load("c2").unwrap().is_none());
    }

    #[test]
    fn test_save_overwrites_snapshot() {
        let store = SqliteStorage::in_memory().unwrap();
        let mut history = VersionHistory::new("c1", "Title", ContentVersion::initial("v1", "alice", "main"));
        store.save(&history).unwrap();

        let v1 = history.versions[0].clone();
        history.append(ContentVersion::child_of(&v1, "v2", "bob", ChangeKind::Edit, "edit", "main"));
        store.save(&history).unwrap();

        let loaded = store.load("c1").unwrap().unwrap();
        assert_eq!(loaded.total_versions, 2);
        assert_eq!(store.list_ids().unwrap(), vec!["c1".to_string()]);
    }

    #[test]
    fn test_file_backed_database() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("folio.db");
        {
            let store = SqliteStorage::new(&path).unwrap();
            let history = VersionHistory::new("c1", "T", ContentVersion::initial("x", "alice", "main"));
            store.save(&history).unwrap();
        }

        let reopened = SqliteStorage::new(&path).unwrap();
        assert_eq!(reopened.load_all().unwrap().len(), 1);
    }
}

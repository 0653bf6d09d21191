//! Persistence for version histories.
//!
//! A backend stores one complete [`VersionHistory`] snapshot per content id and
//! overwrites it on every save. [`VersionControl`](crate::VersionControl)
//! calls [`HistoryStorage::save`] after each mutating operation.

mod json_file;
mod memory;
mod sqlite;

pub use json_file::JsonFileStorage;
pub use memory::InMemoryStorage;
pub use sqlite::SqliteStorage;

use std::sync::Arc;

use crate::config::{StorageBackend, StorageConfig};
use crate::error::FolioResult;
use crate::versioning::VersionHistory;

/// Trait for version history storage backends
#[cfg_attr(test, mockall::automock)]
pub trait HistoryStorage: Send + Sync {
    /// Write the full history snapshot, replacing any previous one
    fn save(&self, history: &VersionHistory) -> FolioResult<()>;

    /// Load the history of one content id
    fn load(&self, content_id: &str) -> FolioResult<Option<VersionHistory>>;

    /// Content ids that have a stored history
    fn list_ids(&self) -> FolioResult<Vec<String>>;

    /// Load every stored history
    fn load_all(&self) -> FolioResult<Vec<VersionHistory>> {
        let mut histories = Vec::new();
        for id in self.list_ids()? {
            if let Some(history) = self.load(&id)? {
                histories.push(history);
            }
        }
        Ok(histories)
    }
}

/// Build the backend selected by `config`.
pub fn from_config(config: &StorageConfig) -> FolioResult<Arc<dyn HistoryStorage>> {
    let storage: Arc<dyn HistoryStorage> = match config.backend {
        StorageBackend::Json => Arc::new(JsonFileStorage::new(&config.path)?),
        StorageBackend::Sqlite => Arc::new(SqliteStorage::new(&config.path)?),
        StorageBackend::Memory => Arc::new(InMemoryStorage::new()),
    };
    Ok(storage)
}

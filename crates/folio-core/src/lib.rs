//! folio-core - Branching version control for text content.
//!
//! This crate provides the version, branch and history types, line diffs in
//! several output formats, last-writer-wins merging with conflict detection,
//! and pluggable persistence for content histories.
//!
//! # Example
//!
//! ```
//! use folio_core::{DiffFormat, VersionControl};
//!
//! let store = VersionControl::in_memory();
//! let v1 = store.create_content("article", "Title", "line1\nline2", "alice", None)?;
//! let v2 = store.commit_changes("article", "line1\nline2\nline3", "alice", "Add line", None)?;
//!
//! let diff = store.get_diff("article", &v1.version_id, &v2.version_id, DiffFormat::Unified)?;
//! assert_eq!(diff.lines_added, 1);
//! # Ok::<(), folio_core::FolioError>(())
//! ```

pub mod config;
pub mod diff;
pub mod error;
pub mod events;
pub mod merge;
pub mod storage;
pub mod versioning;

// Re-export commonly used types
pub use config::{FolioConfig, StorageBackend, StorageConfig};
pub use diff::{DiffFormat, LineChange, LineChangeType, VersionDiff};
pub use error::{ErrorCode, FolioError, FolioResult};
pub use events::{EventBus, EventSubscriber, VersionEvent, VersionEventKind};
pub use merge::{MergeConflict, MergeOutcome};
pub use storage::{HistoryStorage, InMemoryStorage, JsonFileStorage, SqliteStorage};
pub use versioning::{
    ChangeKind, ChangesSummary, Comment, ContentBranch, ContentStatus, ContentVersion,
    HistorySummary, VersionControl, VersionHistory,
};

//! Content versioning: immutable version snapshots, branches and the store
//! that ties them together.
//!
//! Every commit, merge or revert appends a new [`ContentVersion`] to the
//! content's [`VersionHistory`]; existing versions are never removed.

mod history;
mod store;
mod version;

pub use history::{ContentBranch, HistorySummary, VersionHistory};
pub use store::VersionControl;
pub use version::{content_hash, ChangeKind, ChangesSummary, Comment, ContentStatus, ContentVersion};

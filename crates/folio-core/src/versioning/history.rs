//! Branches and the per-content history aggregate.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{FolioError, FolioResult};
use crate::versioning::{ChangeKind, ContentVersion};

/// A named line of development.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentBranch {
    pub branch_name: String,
    /// Version the branch was created from
    pub base_version_id: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
    pub description: String,
    pub is_active: bool,
    #[serde(default)]
    pub merged_into: Option<String>,
    #[serde(default)]
    pub merged_at: Option<DateTime<Utc>>,
}

impl ContentBranch {
    pub fn new(
        branch_name: impl Into<String>,
        base_version_id: impl Into<String>,
        created_by: impl Into<String>,
        description: impl Into<String>,
    ) -> Self {
        Self {
            branch_name: branch_name.into(),
            base_version_id: base_version_id.into(),
            created_by: created_by.into(),
            created_at: Utc::now(),
            description: description.into(),
            is_active: true,
            merged_into: None,
            merged_at: None,
        }
    }

    /// Deactivate the branch after it was merged into `target`.
    pub fn mark_merged(&mut self, target: impl Into<String>) {
        self.is_active = false;
        self.merged_into = Some(target.into());
        self.merged_at = Some(Utc::now());
    }
}

/// Complete version history of one content entity.
///
/// This is the unit of persistence: storage backends always read and write a
/// whole `VersionHistory`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VersionHistory {
    pub content_id: String,
    pub title: String,
    pub current_version_id: String,
    pub total_versions: usize,
    pub total_commits: usize,
    pub created_at: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
    pub authors: BTreeSet<String>,
    /// Every version ever created, in creation order
    pub versions: Vec<ContentVersion>,
    pub branches: BTreeMap<String, ContentBranch>,
}

impl VersionHistory {
    /// Start a history from its first version.
    pub fn new(
        content_id: impl Into<String>,
        title: impl Into<String>,
        initial: ContentVersion,
    ) -> Self {
        let now = Utc::now();
        let main = ContentBranch::new(
            initial.branch.clone(),
            initial.version_id.clone(),
            initial.author.clone(),
            "Main branch",
        );

        let mut branches = BTreeMap::new();
        branches.insert(main.branch_name.clone(), main);

        Self {
            content_id: content_id.into(),
            title: title.into(),
            current_version_id: initial.version_id.clone(),
            total_versions: 1,
            total_commits: 1,
            created_at: now,
            last_modified: now,
            authors: BTreeSet::from([initial.author.clone()]),
            versions: vec![initial],
            branches,
        }
    }

    /// Append a version and make it current.
    pub fn append(&mut self, version: ContentVersion) {
        self.authors.insert(version.author.clone());
        self.current_version_id = version.version_id.clone();
        self.last_modified = Utc::now();
        self.versions.push(version);
        self.total_commits += 1;
        self.total_versions = self.versions.len();
    }

    pub fn version(&self, version_id: &str) -> FolioResult<&ContentVersion> {
        self.versions
            .iter()
            .find(|v| v.version_id == version_id)
            .ok_or_else(|| FolioError::version_not_found(version_id))
    }

    pub fn version_mut(&mut self, version_id: &str) -> FolioResult<&mut ContentVersion> {
        self.versions
            .iter_mut()
            .find(|v| v.version_id == version_id)
            .ok_or_else(|| FolioError::version_not_found(version_id))
    }

    pub fn current_version(&self) -> FolioResult<&ContentVersion> {
        self.version(&self.current_version_id)
    }

    pub fn branch(&self, name: &str) -> FolioResult<&ContentBranch> {
        self.branches
            .get(name)
            .ok_or_else(|| FolioError::branch_not_found(name))
    }

    /// Latest version on a branch.
    ///
    /// Versions are stored in creation order, so the last one carrying the
    /// branch name is the newest. A branch with no commits of its own resolves
    /// to its base version.
    pub fn latest_on_branch(&self, name: &str) -> FolioResult<&ContentVersion> {
        let branch = self.branch(name)?;
        match self.versions.iter().rev().find(|v| v.branch == name) {
            Some(version) => Ok(version),
            None => self.version(&branch.base_version_id),
        }
    }

    /// Versions newest first, optionally filtered to one branch and capped.
    pub fn newest_first(&self, branch: Option<&str>, limit: Option<usize>) -> Vec<ContentVersion> {
        self.versions
            .iter()
            .rev()
            .filter(|v| branch.map_or(true, |b| v.branch == b))
            .take(limit.unwrap_or(usize::MAX))
            .cloned()
            .collect()
    }

    /// Aggregate counts over this history.
    pub fn summary(&self) -> HistorySummary {
        let count = |kind: ChangeKind| self.versions.iter().filter(|v| v.change_type == kind).count();
        let merged_branches = self.branches.values().filter(|b| b.merged_into.is_some()).count();

        HistorySummary {
            content_id: self.content_id.clone(),
            title: self.title.clone(),
            total_versions: self.total_versions,
            total_commits: self.total_commits,
            edits: count(ChangeKind::Edit),
            merges: count(ChangeKind::Merge),
            reverts: count(ChangeKind::Revert),
            active_branches: self.branches.values().filter(|b| b.is_active).count(),
            merged_branches,
            authors: self.authors.iter().cloned().collect(),
            first_created: self.created_at,
            last_modified: self.last_modified,
        }
    }
}

/// Summary of a content entity's history
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistorySummary {
    pub content_id: String,
    pub title: String,
    pub total_versions: usize,
    pub total_commits: usize,
    pub edits: usize,
    pub merges: usize,
    pub reverts: usize,
    pub active_branches: usize,
    pub merged_branches: usize,
    pub authors: Vec<String>,
    pub first_created: DateTime<Utc>,
    pub last_modified: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_history() -> VersionHistory {
        let v1 = ContentVersion::initial("one", "alice", "main");
        VersionHistory::new("c1", "Title", v1)
    }

    #[test]
    fn test_new_history_invariants() {
        let history = sample_history();

        assert_eq!(history.total_versions, 1);
        assert_eq!(history.versions.len(), 1);
        assert_eq!(history.current_version_id, history.versions[0].version_id);
        assert!(history.branches.contains_key("main"));
        assert!(history.authors.contains("alice"));
    }

    #[test]
    fn test_append_updates_counters() {
        let mut history = sample_history();
        let v1 = history.versions[0].clone();
        let v2 = ContentVersion::child_of(&v1, "two", "bob", ChangeKind::Edit, "edit", "main");
        let v2_id = v2.version_id.clone();

        history.append(v2);

        assert_eq!(history.total_versions, 2);
        assert_eq!(history.total_commits, 2);
        assert_eq!(history.current_version_id, v2_id);
        assert_eq!(history.authors.len(), 2);
    }

    #[test]
    fn test_latest_on_empty_branch_is_base() {
        let mut history = sample_history();
        let base = history.versions[0].version_id.clone();
        history
            .branches
            .insert("feat".to_string(), ContentBranch::new("feat", &base, "bob", "feature"));

        assert_eq!(history.latest_on_branch("feat").unwrap().version_id, base);
        assert!(history.latest_on_branch("missing").unwrap_err().is_not_found());
    }

    #[test]
    fn test_newest_first_filters_and_limits() {
        let mut history = sample_history();
        let mut parent = history.versions[0].clone();
        for (i, branch) in ["main", "feat", "main"].iter().enumerate() {
            let v = ContentVersion::child_of(&parent, format!("v{}", i), "alice", ChangeKind::Edit, "edit", *branch);
            parent = v.clone();
            history.append(v);
        }

        let all = history.newest_first(None, None);
        assert_eq!(all.len(), 4);
        assert_eq!(all[0].content, "v2");

        let main = history.newest_first(Some("main"), Some(2));
        assert_eq!(main.len(), 2);
        assert!(main.iter().all(|v| v.branch == "main"));
        assert_eq!(main[1].content, "v0");
    }

    #[test]
    fn test_summary_counts() {
        let mut history = sample_history();
        let v1 = history.versions[0].clone();
        history.append(ContentVersion::child_of(&v1, "x", "bob", ChangeKind::Revert, "r", "main"));

        let summary = history.summary();
        assert_eq!(summary.total_versions, 2);
        assert_eq!(summary.reverts, 1);
        assert_eq!(summary.edits, 0);
        assert_eq!(summary.active_branches, 1);
        assert_eq!(summary.authors, vec!["alice".to_string(), "bob".to_string()]);
    }
}

//! The version store: owns every content history and all operations on them.

use chrono::Utc;
use serde_json::json;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::{Arc, Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::config::FolioConfig;
use crate::diff::{self, DiffFormat, VersionDiff};
use crate::error::{FolioError, FolioResult};
use crate::events::{EventBus, EventSubscriber, VersionEvent, VersionEventKind};
use crate::merge::{self, MergeOutcome};
use crate::storage::{self, HistoryStorage, InMemoryStorage};
use crate::versioning::{
    ChangeKind, Comment, ContentBranch, ContentStatus, ContentVersion, HistorySummary,
    VersionHistory,
};

/// Per-content state guarded by its own lock.
#[derive(Clone)]
struct ContentEntry {
    history: VersionHistory,
    /// Branch used by commits that don't name one. Not persisted.
    current_branch: String,
}

/// Claim on a content id that is being created. Released on drop.
struct Reservation<'a> {
    creating: &'a Mutex<HashSet<String>>,
    content_id: String,
}

impl Drop for Reservation<'_> {
    fn drop(&mut self) {
        if let Ok(mut ids) = self.creating.lock() {
            ids.remove(&self.content_id);
        }
    }
}

/// Result of a mutation closure: whether the draft must be written through.
enum Applied<T> {
    Saved(T),
    Unchanged(T),
}

/// Branching version control over named content entities.
///
/// Each content id has its own mutex; a mutating call holds it across the
/// change and the write-through to storage, so concurrent writers to the same
/// content are serialized and writers to different content never contend.
/// The map of entries is only write-locked to insert a history that is
/// already saved. Mutations are applied to a copy and only become visible once the save
/// succeeded.
pub struct VersionControl {
    config: FolioConfig,
    storage: Arc<dyn HistoryStorage>,
    contents: RwLock<HashMap<String, Arc<Mutex<ContentEntry>>>>,
    /// Ids whose initial save is in flight.
    creating: Mutex<HashSet<String>>,
    events: EventBus,
}

impl VersionControl {
    /// Create an empty store on top of `storage`.
    ///
    /// Histories already present in `storage` are not loaded; use
    /// [`VersionControl::open`] for that.
    pub fn new(storage: Arc<dyn HistoryStorage>, config: FolioConfig) -> Self {
        let events = EventBus::with_capacity(config.event_capacity);
        Self {
            config,
            storage,
            contents: RwLock::new(HashMap::new()),
            creating: Mutex::new(HashSet::new()),
            events,
        }
    }

    /// Create a store and load every history found in `storage`.
    pub fn open(storage: Arc<dyn HistoryStorage>, config: FolioConfig) -> FolioResult<Self> {
        let store = Self::new(storage, config);
        let histories = store.storage.load_all()?;
        let count = histories.len();
        {
            let mut contents = store.contents_write()?;
            for history in histories {
                let current_branch = history
                    .current_version()
                    .map(|v| v.branch.clone())
                    .unwrap_or_else(|_| store.config.default_branch.clone());
                contents.insert(
                    history.content_id.clone(),
                    Arc::new(Mutex::new(ContentEntry {
                        history,
                        current_branch,
                    })),
                );
            }
        }
        info!(count, "Content version control opened");
        Ok(store)
    }

    /// Create a store with the backend described by `config`.
    pub fn from_config(config: FolioConfig) -> FolioResult<Self> {
        let storage = storage::from_config(&config.storage)?;
        debug!(backend = ?config.storage.backend, path = %config.storage.path.display(), "Opening storage");
        Self::open(storage, config)
    }

    /// Create a store that only keeps histories in memory.
    pub fn in_memory() -> Self {
        Self::new(Arc::new(InMemoryStorage::new()), FolioConfig::default())
    }

    pub fn config(&self) -> &FolioConfig {
        &self.config
    }

    /// Subscribe to lifecycle events.
    pub fn subscribe(&self) -> EventSubscriber {
        self.events.subscribe()
    }

    /// Subscribe to lifecycle events of one content entity.
    pub fn subscribe_content(&self, content_id: &str) -> EventSubscriber {
        self.events.subscribe_content(content_id)
    }

    /// Create new content with its initial version.
    pub fn create_content(
        &self,
        content_id: &str,
        title: &str,
        initial_content: &str,
        author: &str,
        metadata: Option<HashMap<String, serde_json::Value>>,
    ) -> FolioResult<ContentVersion> {
        if content_id.trim().is_empty() {
            return Err(FolioError::validation("content id must not be empty"));
        }

        let reservation = self.reserve(content_id)?;
        if self.contents_read()?.contains_key(content_id) {
            return Err(FolioError::content_exists(content_id));
        }

        let version = ContentVersion::initial(initial_content, author, &self.config.default_branch)
            .with_metadata(metadata.unwrap_or_default());
        let history = VersionHistory::new(content_id, title, version.clone());
        self.storage.save(&history)?;

        self.contents_write()?.insert(
            content_id.to_string(),
            Arc::new(Mutex::new(ContentEntry {
                history,
                current_branch: self.config.default_branch.clone(),
            })),
        );
        drop(reservation);

        info!(content_id, version_id = %version.version_id, "Content created");
        self.emit(
            content_id,
            author,
            VersionEventKind::ContentCreated {
                version_id: version.version_id.clone(),
                title: title.to_string(),
            },
        );
        Ok(version)
    }

    /// Commit new content, creating a version on `branch` (default: the
    /// content's current branch).
    pub fn commit_changes(
        &self,
        content_id: &str,
        new_content: &str,
        author: &str,
        commit_message: &str,
        branch: Option<&str>,
    ) -> FolioResult<ContentVersion> {
        let version = self.mutate(content_id, |entry| {
            let branch = branch
                .map(str::to_string)
                .unwrap_or_else(|| entry.current_branch.clone());
            let parent = entry.history.latest_on_branch(&branch)?;

            let summary = diff::summarize(&diff::line_changes(&parent.content, new_content));
            let version = ContentVersion::child_of(
                parent,
                new_content,
                author,
                ChangeKind::Edit,
                commit_message,
                branch,
            )
            .with_changes_summary(summary);

            entry.history.append(version.clone());
            Ok(Applied::Saved(version))
        })?;

        info!(
            content_id,
            version_id = %version.version_id,
            branch = %version.branch,
            lines_changed = version.changes_summary.map_or(0, |s| s.total()),
            "Changes committed"
        );
        self.emit_committed(content_id, &version);
        Ok(version)
    }

    /// Register a new branch starting at `base_version_id` (default: the
    /// current version).
    pub fn create_branch(
        &self,
        content_id: &str,
        branch_name: &str,
        author: &str,
        description: &str,
        base_version_id: Option<&str>,
    ) -> FolioResult<ContentBranch> {
        if branch_name.trim().is_empty() {
            return Err(FolioError::validation("branch name must not be empty"));
        }

        let branch = self.mutate(content_id, |entry| {
            let history = &mut entry.history;
            if history.branches.contains_key(branch_name) {
                return Err(FolioError::branch_exists(branch_name));
            }

            let base_id = base_version_id.unwrap_or(&history.current_version_id);
            let base = history.version(base_id)?;
            let branch = ContentBranch::new(branch_name, &base.version_id, author, description);

            history
                .branches
                .insert(branch_name.to_string(), branch.clone());
            Ok(Applied::Saved(branch))
        })?;

        info!(content_id, branch = branch_name, base = %branch.base_version_id, "Branch created");
        self.emit(
            content_id,
            author,
            VersionEventKind::BranchCreated {
                branch: branch.branch_name.clone(),
                base_version_id: branch.base_version_id.clone(),
            },
        );
        Ok(branch)
    }

    /// Make `branch_name` the default target for commits and return its
    /// latest version.
    pub fn switch_branch(&self, content_id: &str, branch_name: &str) -> FolioResult<ContentVersion> {
        let entry = self.entry(content_id)?;
        let mut entry = entry.lock().map_err(|_| FolioError::poisoned("content"))?;

        let latest = entry.history.latest_on_branch(branch_name)?.clone();
        entry.current_branch = branch_name.to_string();
        drop(entry);

        debug!(content_id, branch = branch_name, "Switched branch");
        self.emit(
            content_id,
            &latest.author,
            VersionEventKind::BranchSwitched {
                branch: branch_name.to_string(),
            },
        );
        Ok(latest)
    }

    /// Merge `source_branch` into `target_branch`.
    ///
    /// With conflicts and `auto_resolve == false` nothing is written and the
    /// outcome carries the unchanged target version. Otherwise the source
    /// content replaces the target content in a new merge version and the
    /// source branch is deactivated.
    pub fn merge_branches(
        &self,
        content_id: &str,
        source_branch: &str,
        target_branch: &str,
        author: &str,
        merge_message: &str,
        auto_resolve: bool,
    ) -> FolioResult<MergeOutcome> {
        let outcome = self.mutate(content_id, |entry| {
            let history = &mut entry.history;
            let source = history.latest_on_branch(source_branch)?.clone();
            let target = history.latest_on_branch(target_branch)?.clone();

            let mut conflicts = merge::detect_conflicts(&target.content, &source.content);
            if !conflicts.is_empty() && !auto_resolve {
                return Ok(Applied::Unchanged(MergeOutcome {
                    version: target,
                    conflicts,
                    merged: false,
                }));
            }
            if auto_resolve {
                conflicts.iter_mut().for_each(|c| c.resolve_with_incoming());
            }

            let metadata = HashMap::from([
                ("source_branch".to_string(), json!(source_branch)),
                ("source_version".to_string(), json!(source.version_id)),
                ("target_branch".to_string(), json!(target_branch)),
                ("target_version".to_string(), json!(target.version_id)),
                ("auto_resolved".to_string(), json!(auto_resolve)),
            ]);
            let summary = diff::summarize(&diff::line_changes(&target.content, &source.content));
            let version = ContentVersion::child_of(
                &target,
                source.content.as_str(),
                author,
                ChangeKind::Merge,
                format!(
                    "{} (merged {} into {})",
                    merge_message, source_branch, target_branch
                ),
                target_branch,
            )
            .with_metadata(metadata)
            .with_changes_summary(summary);

            history.append(version.clone());
            if let Some(branch) = history.branches.get_mut(source_branch) {
                branch.mark_merged(target_branch);
            }

            Ok(Applied::Saved(MergeOutcome {
                version,
                conflicts,
                merged: true,
            }))
        })?;

        if outcome.blocked() {
            warn!(
                content_id,
                source = source_branch,
                target = target_branch,
                conflicts = outcome.conflicts.len(),
                "Merge conflicts detected"
            );
            self.emit(
                content_id,
                author,
                VersionEventKind::MergeBlocked {
                    source_branch: source_branch.to_string(),
                    target_branch: target_branch.to_string(),
                    conflicts: outcome.conflicts.len(),
                },
            );
        } else {
            info!(
                content_id,
                version_id = %outcome.version.version_id,
                source = source_branch,
                target = target_branch,
                "Merge completed"
            );
            self.emit(
                content_id,
                author,
                VersionEventKind::BranchesMerged {
                    source_branch: source_branch.to_string(),
                    target_branch: target_branch.to_string(),
                    version_id: outcome.version.version_id.clone(),
                    conflicts: outcome.conflicts.len(),
                },
            );
        }
        Ok(outcome)
    }

    /// Create a new version whose content equals that of `version_id`.
    ///
    /// History is preserved: the revert is appended on the current version's
    /// branch with the current version as parent.
    pub fn revert_to_version(
        &self,
        content_id: &str,
        version_id: &str,
        author: &str,
        revert_message: &str,
    ) -> FolioResult<ContentVersion> {
        let version = self.mutate(content_id, |entry| {
            let history = &mut entry.history;
            let target = history.version(version_id)?;
            let current = history.current_version()?;

            let summary = diff::summarize(&diff::line_changes(&current.content, &target.content));
            let version = ContentVersion::child_of(
                current,
                target.content.as_str(),
                author,
                ChangeKind::Revert,
                format!("{} (reverted to {})", revert_message, version_id),
                current.branch.as_str(),
            )
            .with_metadata(HashMap::from([(
                "reverted_to".to_string(),
                json!(version_id),
            )]))
            .with_changes_summary(summary);

            history.append(version.clone());
            Ok(Applied::Saved(version))
        })?;

        info!(content_id, version_id = %version.version_id, reverted_to = version_id, "Content reverted");
        self.emit_committed(content_id, &version);
        Ok(version)
    }

    /// Tag a version. Tagging twice with the same name is a no-op.
    pub fn tag_version(
        &self,
        content_id: &str,
        version_id: &str,
        tag_name: &str,
        author: &str,
        description: Option<&str>,
    ) -> FolioResult<ContentVersion> {
        let (version, newly_tagged) = self.mutate(content_id, |entry| {
            let version = entry.history.version_mut(version_id)?;
            let newly_tagged = !version.has_tag(tag_name);
            if newly_tagged {
                version.tags.push(tag_name.to_string());
                version.metadata.insert(
                    format!("tag_{}", tag_name),
                    json!({
                        "added_by": author,
                        "added_at": Utc::now().to_rfc3339(),
                        "description": description,
                    }),
                );
            }
            Ok(Applied::Saved((version.clone(), newly_tagged)))
        })?;

        if newly_tagged {
            info!(content_id, version_id, tag = tag_name, "Version tagged");
            self.emit(
                content_id,
                author,
                VersionEventKind::VersionTagged {
                    version_id: version_id.to_string(),
                    tag: tag_name.to_string(),
                },
            );
        }
        Ok(version)
    }

    /// Compare two versions.
    pub fn get_diff(
        &self,
        content_id: &str,
        from_version_id: &str,
        to_version_id: &str,
        format: DiffFormat,
    ) -> FolioResult<VersionDiff> {
        let (from, to) = self.read(content_id, |entry| {
            Ok((
                entry.history.version(from_version_id)?.clone(),
                entry.history.version(to_version_id)?.clone(),
            ))
        })?;

        let diff = VersionDiff::between(&from, &to, format, self.config.diff_context_lines)?;
        debug!(
            content_id,
            from = from_version_id,
            to = to_version_id,
            added = diff.lines_added,
            removed = diff.lines_removed,
            modified = diff.lines_modified,
            "Diff calculated"
        );
        Ok(diff)
    }

    /// Compare two versions in the configured default format.
    pub fn get_default_diff(
        &self,
        content_id: &str,
        from_version_id: &str,
        to_version_id: &str,
    ) -> FolioResult<VersionDiff> {
        self.get_diff(
            content_id,
            from_version_id,
            to_version_id,
            self.config.default_diff_format,
        )
    }

    /// Versions newest first, optionally limited to one branch and capped.
    pub fn get_version_history(
        &self,
        content_id: &str,
        branch: Option<&str>,
        limit: Option<usize>,
    ) -> FolioResult<Vec<ContentVersion>> {
        self.read(content_id, |entry| Ok(entry.history.newest_first(branch, limit)))
    }

    pub fn get_version(&self, content_id: &str, version_id: &str) -> FolioResult<ContentVersion> {
        self.read(content_id, |entry| entry.history.version(version_id).cloned())
    }

    pub fn get_current_version(&self, content_id: &str) -> FolioResult<ContentVersion> {
        self.read(content_id, |entry| entry.history.current_version().cloned())
    }

    pub fn get_branches(&self, content_id: &str) -> FolioResult<BTreeMap<String, ContentBranch>> {
        self.read(content_id, |entry| Ok(entry.history.branches.clone()))
    }

    /// Branch that commits go to when no branch is named.
    pub fn current_branch(&self, content_id: &str) -> FolioResult<String> {
        self.read(content_id, |entry| Ok(entry.current_branch.clone()))
    }

    /// A full copy of the history aggregate.
    pub fn get_history(&self, content_id: &str) -> FolioResult<VersionHistory> {
        self.read(content_id, |entry| Ok(entry.history.clone()))
    }

    pub fn get_summary(&self, content_id: &str) -> FolioResult<HistorySummary> {
        self.read(content_id, |entry| Ok(entry.history.summary()))
    }

    /// All content ids, sorted.
    pub fn list_contents(&self) -> FolioResult<Vec<String>> {
        let mut ids: Vec<String> = self.contents_read()?.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }

    /// Attach a review comment to a version.
    pub fn add_comment(
        &self,
        content_id: &str,
        version_id: &str,
        author: &str,
        comment: &str,
        line_number: Option<usize>,
    ) -> FolioResult<Comment> {
        let comment = self.mutate(content_id, |entry| {
            let version = entry.history.version_mut(version_id)?;
            let comment = Comment {
                author: author.to_string(),
                comment: comment.to_string(),
                timestamp: Utc::now(),
                line_number,
            };
            version.comments.push(comment.clone());
            Ok(Applied::Saved(comment))
        })?;

        info!(content_id, version_id, author, "Comment added");
        self.emit(
            content_id,
            author,
            VersionEventKind::CommentAdded {
                version_id: version_id.to_string(),
            },
        );
        Ok(comment)
    }

    /// Add a reviewer to a version. Adding the same reviewer twice is a no-op.
    pub fn add_reviewer(
        &self,
        content_id: &str,
        version_id: &str,
        reviewer: &str,
    ) -> FolioResult<ContentVersion> {
        let (version, added) = self.mutate(content_id, |entry| {
            let version = entry.history.version_mut(version_id)?;
            let added = !version.reviewers.iter().any(|r| r == reviewer);
            if added {
                version.reviewers.push(reviewer.to_string());
            }
            Ok(Applied::Saved((version.clone(), added)))
        })?;

        if added {
            debug!(content_id, version_id, reviewer, "Reviewer added");
            self.emit(
                content_id,
                reviewer,
                VersionEventKind::ReviewerAdded {
                    version_id: version_id.to_string(),
                    reviewer: reviewer.to_string(),
                },
            );
        }
        Ok(version)
    }

    /// Change the review status of a version, keeping an audit trail in
    /// `metadata["status_history"]`.
    pub fn update_status(
        &self,
        content_id: &str,
        version_id: &str,
        status: ContentStatus,
        author: &str,
    ) -> FolioResult<ContentVersion> {
        let (version, old_status) = self.mutate(content_id, |entry| {
            let version = entry.history.version_mut(version_id)?;
            let old_status = version.status;
            version.status = status;

            let transition = json!({
                "from": old_status,
                "to": status,
                "changed_by": author,
                "changed_at": Utc::now().to_rfc3339(),
            });
            let trail = version
                .metadata
                .entry("status_history".to_string())
                .or_insert_with(|| json!([]));
            if !trail.is_array() {
                *trail = json!([]);
            }
            if let Some(entries) = trail.as_array_mut() {
                entries.push(transition);
            }

            Ok(Applied::Saved((version.clone(), old_status)))
        })?;

        info!(content_id, version_id, from = %old_status, to = %status, "Version status updated");
        self.emit(
            content_id,
            author,
            VersionEventKind::StatusChanged {
                version_id: version_id.to_string(),
                from: old_status,
                to: status,
            },
        );
        Ok(version)
    }

    fn reserve(&self, content_id: &str) -> FolioResult<Reservation<'_>> {
        let mut ids = self
            .creating
            .lock()
            .map_err(|_| FolioError::poisoned("creation set"))?;
        if !ids.insert(content_id.to_string()) {
            return Err(FolioError::content_exists(content_id));
        }
        Ok(Reservation {
            creating: &self.creating,
            content_id: content_id.to_string(),
        })
    }

    fn contents_read(
        &self,
    ) -> FolioResult<std::sync::RwLockReadGuard<'_, HashMap<String, Arc<Mutex<ContentEntry>>>>> {
        self.contents
            .read()
            .map_err(|_| FolioError::poisoned("content map"))
    }

    fn contents_write(
        &self,
    ) -> FolioResult<std::sync::RwLockWriteGuard<'_, HashMap<String, Arc<Mutex<ContentEntry>>>>> {
        self.contents
            .write()
            .map_err(|_| FolioError::poisoned("content map"))
    }

    fn entry(&self, content_id: &str) -> FolioResult<Arc<Mutex<ContentEntry>>> {
        self.contents_read()?
            .get(content_id)
            .cloned()
            .ok_or_else(|| FolioError::content_not_found(content_id))
    }

    fn read<T>(
        &self,
        content_id: &str,
        f: impl FnOnce(&ContentEntry) -> FolioResult<T>,
    ) -> FolioResult<T> {
        let entry = self.entry(content_id)?;
        let entry = entry.lock().map_err(|_| FolioError::poisoned("content"))?;
        f(&entry)
    }

    /// Apply `f` to a copy of the entry, write it through, then publish it.
    fn mutate<T>(
        &self,
        content_id: &str,
        f: impl FnOnce(&mut ContentEntry) -> FolioResult<Applied<T>>,
    ) -> FolioResult<T> {
        let entry = self.entry(content_id)?;
        let mut guard = entry.lock().map_err(|_| FolioError::poisoned("content"))?;

        let mut draft = guard.clone();
        match f(&mut draft)? {
            Applied::Saved(value) => {
                self.storage.save(&draft.history)?;
                *guard = draft;
                Ok(value)
            }
            Applied::Unchanged(value) => Ok(value),
        }
    }

    fn emit(&self, content_id: &str, actor: &str, kind: VersionEventKind) {
        if !self.events.has_subscribers() {
            return;
        }
        self.events.emit(VersionEvent::new(content_id, actor, kind));
    }

    fn emit_committed(&self, content_id: &str, version: &ContentVersion) {
        self.emit(
            content_id,
            &version.author,
            VersionEventKind::VersionCommitted {
                version_id: version.version_id.clone(),
                branch: version.branch.clone(),
                change_type: version.change_type,
            },
        );
    }
}

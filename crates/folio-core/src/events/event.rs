//! Content lifecycle events
//!
//! Emitted after each mutating operation on a content history has been
//! persisted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::versioning::{ChangeKind, ContentStatus};

/// Envelope shared by every lifecycle event
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionEvent {
    /// Unique event ID
    pub event_id: String,
    /// Content the event relates to
    pub content_id: String,
    /// Who triggered the operation
    pub actor: String,
    /// When the event occurred
    pub timestamp: DateTime<Utc>,
    #[serde(flatten)]
    pub kind: VersionEventKind,
}

/// What happened
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum VersionEventKind {
    ContentCreated {
        version_id: String,
        title: String,
    },
    /// A new version was appended (edit, merge or revert)
    VersionCommitted {
        version_id: String,
        branch: String,
        change_type: ChangeKind,
    },
    BranchCreated {
        branch: String,
        base_version_id: String,
    },
    BranchSwitched {
        branch: String,
    },
    BranchesMerged {
        source_branch: String,
        target_branch: String,
        version_id: String,
        conflicts: usize,
    },
    /// Conflicts stopped a merge; nothing was written
    MergeBlocked {
        source_branch: String,
        target_branch: String,
        conflicts: usize,
    },
    VersionTagged {
        version_id: String,
        tag: String,
    },
    CommentAdded {
        version_id: String,
    },
    ReviewerAdded {
        version_id: String,
        reviewer: String,
    },
    StatusChanged {
        version_id: String,
        from: ContentStatus,
        to: ContentStatus,
    },
}

impl VersionEvent {
    pub fn new(content_id: impl Into<String>, actor: impl Into<String>, kind: VersionEventKind) -> Self {
        Self {
            event_id: Uuid::new_v4().to_string(),
            content_id: content_id.into(),
            actor: actor.into(),
            timestamp: Utc::now(),
            kind,
        }
    }

    /// Get the event type as a string for filtering
    pub fn event_type(&self) -> &'static str {
        match self.kind {
            VersionEventKind::ContentCreated { .. } => "content.created",
            VersionEventKind::VersionCommitted { .. } => "version.committed",
            VersionEventKind::BranchCreated { .. } => "branch.created",
            VersionEventKind::BranchSwitched { .. } => "branch.switched",
            VersionEventKind::BranchesMerged { .. } => "branch.merged",
            VersionEventKind::MergeBlocked { .. } => "merge.blocked",
            VersionEventKind::VersionTagged { .. } => "version.tagged",
            VersionEventKind::CommentAdded { .. } => "version.commented",
            VersionEventKind::ReviewerAdded { .. } => "version.reviewer_added",
            VersionEventKind::StatusChanged { .. } => "version.status_changed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_serialization() {
        let event = VersionEvent::new(
            "c1",
            "alice",
            VersionEventKind::VersionTagged {
                version_id: "v1".to_string(),
                tag: "release".to_string(),
            },
        );

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "version_tagged");
        assert_eq!(json["content_id"], "c1");
        assert_eq!(json["tag"], "release");

        let back: VersionEvent = serde_json::from_value(json).unwrap();
        assert_eq!(back.kind, event.kind);
        assert_eq!(back.event_type(), "version.tagged");
    }
}

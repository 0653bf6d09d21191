//! Content version types.
//!
//! A [`ContentVersion`] is an immutable snapshot of a piece of content. Only the
//! review fields (tags, metadata, status, reviewers, comments) change after a
//! version has been created.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::FolioError;

/// Operation that created a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    /// First version of a content entity
    Creation,
    /// Regular commit
    Edit,
    /// Result of merging one branch into another
    Merge,
    /// Content restored from an earlier version
    Revert,
}

impl ChangeKind {
    /// Convert to string for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Creation => "creation",
            Self::Edit => "edit",
            Self::Merge => "merge",
            Self::Revert => "revert",
        }
    }
}

/// Review lifecycle status of a version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ContentStatus {
    #[default]
    Draft,
    InReview,
    Approved,
    Published,
    Archived,
    Rejected,
}

impl ContentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::InReview => "in_review",
            Self::Approved => "approved",
            Self::Published => "published",
            Self::Archived => "archived",
            Self::Rejected => "rejected",
        }
    }
}

impl fmt::Display for ContentStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentStatus {
    type Err = FolioError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "in_review" => Ok(Self::InReview),
            "approved" => Ok(Self::Approved),
            "published" => Ok(Self::Published),
            "archived" => Ok(Self::Archived),
            "rejected" => Ok(Self::Rejected),
            other => Err(FolioError::validation(format!(
                "unknown content status '{}'",
                other
            ))),
        }
    }
}

/// Line counts of a commit relative to its parent.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChangesSummary {
    pub added: usize,
    pub removed: usize,
    pub modified: usize,
}

impl ChangesSummary {
    /// Total number of changed lines.
    pub fn total(&self) -> usize {
        self.added + self.removed + self.modified
    }
}

/// A review comment attached to a version.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    pub author: String,
    pub comment: String,
    pub timestamp: DateTime<Utc>,
    /// Line the comment refers to, for inline comments
    #[serde(default)]
    pub line_number: Option<usize>,
}

/// An immutable snapshot of content at a point in time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContentVersion {
    /// Unique version identifier
    pub version_id: String,
    /// Position along the branch line (1 for the first version)
    pub version_number: u32,
    /// Full text at this version
    pub content: String,
    /// SHA-256 of `content`, hex encoded
    pub content_hash: String,
    pub author: String,
    pub timestamp: DateTime<Utc>,
    pub change_type: ChangeKind,
    pub commit_message: String,
    /// None only for the first version of a content entity
    pub parent_version_id: Option<String>,
    pub branch: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default)]
    pub metadata: HashMap<String, serde_json::Value>,
    #[serde(default)]
    pub changes_summary: Option<ChangesSummary>,
    pub word_count: usize,
    pub character_count: usize,
    #[serde(default)]
    pub status: ContentStatus,
    #[serde(default)]
    pub reviewers: Vec<String>,
    #[serde(default)]
    pub comments: Vec<Comment>,
}

impl ContentVersion {
    /// Create the first version of a content entity.
    pub fn initial(
        content: impl Into<String>,
        author: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self::build(
            content.into(),
            author.into(),
            ChangeKind::Creation,
            "Initial content creation".to_string(),
            None,
            1,
            branch.into(),
        )
    }

    /// Create a version that follows `parent`.
    ///
    /// The new version is placed on `branch`, which may differ from the
    /// parent's branch (first commit on a new branch, merges).
    pub fn child_of(
        parent: &ContentVersion,
        content: impl Into<String>,
        author: impl Into<String>,
        change_type: ChangeKind,
        commit_message: impl Into<String>,
        branch: impl Into<String>,
    ) -> Self {
        Self::build(
            content.into(),
            author.into(),
            change_type,
            commit_message.into(),
            Some(parent.version_id.clone()),
            parent.version_number + 1,
            branch.into(),
        )
    }

    fn build(
        content: String,
        author: String,
        change_type: ChangeKind,
        commit_message: String,
        parent_version_id: Option<String>,
        version_number: u32,
        branch: String,
    ) -> Self {
        Self {
            version_id: Uuid::new_v4().to_string(),
            version_number,
            content_hash: content_hash(&content),
            word_count: content.split_whitespace().count(),
            character_count: content.chars().count(),
            content,
            author,
            timestamp: Utc::now(),
            change_type,
            commit_message,
            parent_version_id,
            branch,
            tags: Vec::new(),
            metadata: HashMap::new(),
            changes_summary: None,
            status: ContentStatus::Draft,
            reviewers: Vec::new(),
            comments: Vec::new(),
        }
    }

    /// Builder: set metadata
    pub fn with_metadata(mut self, metadata: HashMap<String, serde_json::Value>) -> Self {
        self.metadata = metadata;
        self
    }

    /// Builder: set the change summary
    pub fn with_changes_summary(mut self, summary: ChangesSummary) -> Self {
        self.changes_summary = Some(summary);
        self
    }

    /// Whether the stored hash still matches the content.
    pub fn verify_hash(&self) -> bool {
        self.content_hash == content_hash(&self.content)
    }

    pub fn has_tag(&self, tag: &str) -> bool {
        self.tags.iter().any(|t| t == tag)
    }
}

/// SHA-256 hex digest of a content string.
pub fn content_hash(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

//! Error types for folio operations.
//!
//! Every failure carries a structured [`ErrorCode`] so callers can branch on
//! the kind of failure without matching message text.

use thiserror::Error;

/// Result type alias for folio operations.
pub type FolioResult<T> = Result<T, FolioError>;

/// What kind of entity a lookup failed to find.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    Content,
    Version,
    Branch,
}

impl EntityKind {
    /// Human readable name used in error messages.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Content => "Content",
            Self::Version => "Version",
            Self::Branch => "Branch",
        }
    }
}

/// Main error type for all folio operations.
#[derive(Error, Debug)]
pub enum FolioError {
    /// A referenced content id, version id or branch does not exist.
    #[error("{} not found: {id}", .kind.as_str())]
    NotFound {
        kind: EntityKind,
        id: String,
        code: ErrorCode,
    },

    /// The entity being created already exists.
    #[error("{} already exists: {id}", .kind.as_str())]
    Conflict {
        kind: EntityKind,
        id: String,
        code: ErrorCode,
    },

    /// Input validation failed.
    #[error("Validation error: {message}")]
    Validation { message: String, code: ErrorCode },

    /// Storage backend operation failed.
    #[error("Storage error: {message}")]
    Storage {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Content (CNT_xxx)
    ContentNotFound,
    ContentExists,

    // Version (VER_xxx)
    VersionNotFound,

    // Branch (BRN_xxx)
    BranchNotFound,
    BranchExists,

    // Validation (VAL_xxx)
    ValInvalidInput,

    // Storage (STO_xxx)
    StoReadFailed,
    StoWriteFailed,
    StoDatabase,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::ContentNotFound => "CNT_001",
            ErrorCode::ContentExists => "CNT_002",
            ErrorCode::VersionNotFound => "VER_001",
            ErrorCode::BranchNotFound => "BRN_001",
            ErrorCode::BranchExists => "BRN_002",
            ErrorCode::ValInvalidInput => "VAL_001",
            ErrorCode::StoReadFailed => "STO_001",
            ErrorCode::StoWriteFailed => "STO_002",
            ErrorCode::StoDatabase => "STO_003",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl FolioError {
    /// Create a content not found error.
    pub fn content_not_found(content_id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Content,
            id: content_id.into(),
            code: ErrorCode::ContentNotFound,
        }
    }

    /// Create a version not found error.
    pub fn version_not_found(version_id: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Version,
            id: version_id.into(),
            code: ErrorCode::VersionNotFound,
        }
    }

    /// Create a branch not found error.
    pub fn branch_not_found(branch: impl Into<String>) -> Self {
        Self::NotFound {
            kind: EntityKind::Branch,
            id: branch.into(),
            code: ErrorCode::BranchNotFound,
        }
    }

    /// Create a duplicate branch error.
    pub fn branch_exists(branch: impl Into<String>) -> Self {
        Self::Conflict {
            kind: EntityKind::Branch,
            id: branch.into(),
            code: ErrorCode::BranchExists,
        }
    }

    /// Create a duplicate content error.
    pub fn content_exists(content_id: impl Into<String>) -> Self {
        Self::Conflict {
            kind: EntityKind::Content,
            id: content_id.into(),
            code: ErrorCode::ContentExists,
        }
    }

    /// Create a validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
            code: ErrorCode::ValInvalidInput,
        }
    }

    /// Create a storage read error.
    pub fn storage_read(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::StoReadFailed,
            source: None,
        }
    }

    /// Create a storage write error.
    pub fn storage_write(message: impl Into<String>) -> Self {
        Self::Storage {
            message: message.into(),
            code: ErrorCode::StoWriteFailed,
            source: None,
        }
    }

    /// Create an error for a poisoned lock.
    pub fn poisoned(what: &str) -> Self {
        Self::Internal(format!("{} lock poisoned", what))
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::NotFound { code, .. } => *code,
            Self::Conflict { code, .. } => *code,
            Self::Validation { code, .. } => *code,
            Self::Storage { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether this is a not found error of any kind.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Get a user-friendly suggestion for resolving this error.
    pub fn suggestion(&self) -> Option<&str> {
        match self {
            Self::NotFound {
                kind: EntityKind::Content,
                ..
            } => Some("Create the content with create_content before committing to it"),
            Self::NotFound {
                kind: EntityKind::Version,
                ..
            } => Some("Check the version id against get_version_history"),
            Self::NotFound {
                kind: EntityKind::Branch,
                ..
            } => Some("List branches with get_branches or create the branch first"),
            Self::Conflict {
                kind: EntityKind::Branch,
                ..
            } => Some("Pick a different branch name or switch to the existing branch"),
            Self::Conflict {
                kind: EntityKind::Content,
                ..
            } => Some("Commit to the existing content instead of recreating it"),
            Self::Storage { .. } => Some("Check that the storage path exists and is writable"),
            _ => None,
        }
    }
}

impl From<rusqlite::Error> for FolioError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Storage {
            message: err.to_string(),
            code: ErrorCode::StoDatabase,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_errors() {
        let err = FolioError::content_not_found("blog-1");
        assert_eq!(err.code(), ErrorCode::ContentNotFound);
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "Content not found: blog-1");
        assert!(err.suggestion().is_some());

        let err = FolioError::branch_not_found("feat");
        assert_eq!(err.code(), ErrorCode::BranchNotFound);
        assert_eq!(err.to_string(), "Branch not found: feat");
    }

    #[test]
    fn test_conflict_error() {
        let err = FolioError::branch_exists("main");
        assert_eq!(err.code(), ErrorCode::BranchExists);
        assert!(!err.is_not_found());
        assert_eq!(err.to_string(), "Branch already exists: main");
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::ContentNotFound.as_str(), "CNT_001");
        assert_eq!(ErrorCode::BranchExists.as_str(), "BRN_002");
        assert_eq!(FolioError::poisoned("history").code(), ErrorCode::Internal);
    }
}

//! Configuration system for folio.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::diff::DiffFormat;
use crate::error::{FolioError, FolioResult};

/// Events a slow subscriber may fall behind by before it misses some.
pub const DEFAULT_EVENT_CAPACITY: usize = 1024;

/// Storage backend type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// One JSON file per content id in `path`
    #[default]
    Json,
    /// SQLite database file at `path`
    Sqlite,
    /// Process memory only; `path` is ignored
    Memory,
}

/// Where version histories are persisted.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub backend: StorageBackend,
    /// Directory (json) or database file (sqlite).
    pub path: PathBuf,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::Json,
            path: folio_dir().join("content_versions"),
        }
    }
}

fn folio_dir() -> PathBuf {
    dirs::home_dir()
        .map(|h| h.join(".folio"))
        .unwrap_or_else(|| PathBuf::from(".folio"))
}

/// Main folio configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FolioConfig {
    /// Storage configuration.
    pub storage: StorageConfig,
    /// Branch created together with new content.
    pub default_branch: String,
    /// Unchanged lines shown around each hunk in unified and context diffs.
    pub diff_context_lines: usize,
    /// Format used by callers that do not pick one.
    pub default_diff_format: DiffFormat,
    /// Capacity of the lifecycle event channel.
    pub event_capacity: usize,
}

impl Default for FolioConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::default(),
            default_branch: "main".to_string(),
            diff_context_lines: 3,
            default_diff_format: DiffFormat::Unified,
            event_capacity: DEFAULT_EVENT_CAPACITY,
        }
    }
}

impl FolioConfig {
    /// Load configuration from a file (TOML, JSON, or YAML).
    pub fn from_file(path: impl AsRef<std::path::Path>) -> FolioResult<Self> {
        let content = std::fs::read_to_string(path.as_ref())?;
        let ext = path.as_ref().extension().and_then(|e| e.to_str());

        let config: Self = match ext {
            Some("toml") => {
                toml::from_str(&content).map_err(|e| FolioError::Configuration(e.to_string()))?
            }
            Some("json") => serde_json::from_str(&content)
                .map_err(|e| FolioError::Configuration(e.to_string()))?,
            Some("yaml" | "yml") => serde_yaml::from_str(&content)
                .map_err(|e| FolioError::Configuration(e.to_string()))?,
            _ => {
                return Err(FolioError::Configuration(
                    "Unsupported config file format. Use .toml, .json, or .yaml".to_string(),
                ))
            }
        };
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from environment variables.
    pub fn from_env() -> FolioResult<Self> {
        let mut config = Self::default();

        if let Ok(backend) = std::env::var("FOLIO_STORAGE_BACKEND") {
            config.storage.backend = match backend.to_lowercase().as_str() {
                "json" => StorageBackend::Json,
                "sqlite" => StorageBackend::Sqlite,
                "memory" => StorageBackend::Memory,
                other => {
                    return Err(FolioError::Configuration(format!(
                        "Unknown storage backend '{}'. Use json, sqlite or memory",
                        other
                    )))
                }
            };
        }
        if let Ok(path) = std::env::var("FOLIO_STORAGE_PATH") {
            config.storage.path = PathBuf::from(path);
        }
        if let Ok(branch) = std::env::var("FOLIO_DEFAULT_BRANCH") {
            config.default_branch = branch;
        }
        if let Ok(lines) = std::env::var("FOLIO_DIFF_CONTEXT") {
            config.diff_context_lines = lines.parse().map_err(|_| {
                FolioError::Configuration(format!("FOLIO_DIFF_CONTEXT must be a number, got '{}'", lines))
            })?;
        }
        if let Ok(format) = std::env::var("FOLIO_DIFF_FORMAT") {
            config.default_diff_format = DiffFormat::from_name(&format);
        }

        config.validate()?;
        Ok(config)
    }

    /// Build configuration using builder pattern.
    pub fn builder() -> FolioConfigBuilder {
        FolioConfigBuilder::default()
    }

    fn validate(&self) -> FolioResult<()> {
        if self.default_branch.trim().is_empty() {
            return Err(FolioError::Configuration(
                "default_branch must not be empty".to_string(),
            ));
        }
        if self.event_capacity == 0 {
            return Err(FolioError::Configuration(
                "event_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for FolioConfig.
#[derive(Default)]
pub struct FolioConfigBuilder {
    config: FolioConfig,
}

impl FolioConfigBuilder {
    /// Set storage backend and location.
    pub fn storage(mut self, backend: StorageBackend, path: impl Into<PathBuf>) -> Self {
        self.config.storage = StorageConfig {
            backend,
            path: path.into(),
        };
        self
    }

    /// Keep histories in memory only.
    pub fn in_memory(mut self) -> Self {
        self.config.storage.backend = StorageBackend::Memory;
        self
    }

    /// Set the branch new content starts on.
    pub fn default_branch(mut self, branch: impl Into<String>) -> Self {
        self.config.default_branch = branch.into();
        self
    }

    /// Set diff context lines.
    pub fn diff_context_lines(mut self, lines: usize) -> Self {
        self.config.diff_context_lines = lines;
        self
    }

    /// Set the default diff format.
    pub fn default_diff_format(mut self, format: DiffFormat) -> Self {
        self.config.default_diff_format = format;
        self
    }

    /// Set event channel capacity.
    pub fn event_capacity(mut self, capacity: usize) -> Self {
        self.config.event_capacity = capacity;
        self
    }

    /// Build the configuration.
    pub fn build(self) -> FolioResult<FolioConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = FolioConfig::default();
        assert_eq!(config.default_branch, "main");
        assert_eq!(config.diff_context_lines, 3);
        assert_eq!(config.storage.backend, StorageBackend::Json);
        assert!(config.storage.path.ends_with("content_versions"));
    }

    #[test]
    fn test_builder() {
        let config = FolioConfig::builder()
            .storage(StorageBackend::Sqlite, "/tmp/folio.db")
            .default_branch("trunk")
            .diff_context_lines(1)
            .build()
            .unwrap();

        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.default_branch, "trunk");
        assert_eq!(config.diff_context_lines, 1);
    }

    #[test]
    fn test_builder_rejects_empty_branch() {
        let err = FolioConfig::builder().default_branch("  ").build().unwrap_err();
        assert!(matches!(err, FolioError::Configuration(_)));
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.toml");
        std::fs::write(
            &path,
            r#"
default_branch = "trunk"
default_diff_format = "context"

[storage]
backend = "memory"
"#,
        )
        .unwrap();

        let config = FolioConfig::from_file(&path).unwrap();
        assert_eq!(config.default_branch, "trunk");
        assert_eq!(config.default_diff_format, DiffFormat::Context);
        assert_eq!(config.storage.backend, StorageBackend::Memory);
        assert_eq!(config.diff_context_lines, 3);
    }

    #[test]
    fn test_from_yaml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.yaml");
        std::fs::write(&path, "storage:\n  backend: sqlite\n  path: /tmp/x.db\n").unwrap();

        let config = FolioConfig::from_file(&path).unwrap();
        assert_eq!(config.storage.backend, StorageBackend::Sqlite);
        assert_eq!(config.storage.path, PathBuf::from("/tmp/x.db"));
    }

    #[test]
    fn test_unsupported_extension() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("folio.ini");
        std::fs::write(&path, "x=1").unwrap();
        assert!(matches!(
            FolioConfig::from_file(&path),
            Err(FolioError::Configuration(_))
        ));
    }
}

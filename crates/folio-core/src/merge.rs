//! Branch merge support.
//!
//! Conflict detection is position-wise: line `i` of the target and line `i`
//! of the source conflict when both are non-empty and differ. Merging is not
//! three-way; a merge that goes ahead takes the source content wholesale.

use serde::{Deserialize, Serialize};

use crate::versioning::ContentVersion;

/// A same-position line divergence between two branches.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub conflict_id: String,
    /// Human readable location, e.g. "Line 3"
    pub section: String,
    /// 1-based line number
    pub line_number: usize,
    /// Line on the target branch
    pub current_content: String,
    /// Line on the source branch
    pub incoming_content: String,
    #[serde(default)]
    pub base_content: Option<String>,
    #[serde(default)]
    pub resolved: bool,
    #[serde(default)]
    pub resolution: Option<String>,
}

impl MergeConflict {
    /// Resolve in favour of the incoming (source) line.
    pub fn resolve_with_incoming(&mut self) {
        self.resolution = Some(self.incoming_content.clone());
        self.resolved = true;
    }
}

/// Result of a merge attempt.
#[derive(Debug, Clone)]
pub struct MergeOutcome {
    /// The merge version, or the unchanged target version when blocked
    pub version: ContentVersion,
    pub conflicts: Vec<MergeConflict>,
    /// Whether a merge version was created
    pub merged: bool,
}

impl MergeOutcome {
    /// True when conflicts stopped the merge and nothing was written.
    pub fn blocked(&self) -> bool {
        !self.merged
    }
}

/// Find conflicting lines between target and source content.
pub fn detect_conflicts(target: &str, source: &str) -> Vec<MergeConflict> {
    let target_lines: Vec<&str> = target.lines().collect();
    let source_lines: Vec<&str> = source.lines().collect();
    let max_lines = target_lines.len().max(source_lines.len());

    (0..max_lines)
        .filter_map(|i| {
            let current = target_lines.get(i).copied().unwrap_or("");
            let incoming = source_lines.get(i).copied().unwrap_or("");
            if current.is_empty() || incoming.is_empty() || current == incoming {
                return None;
            }
            Some(MergeConflict {
                conflict_id: format!("conflict_{}", i),
                section: format!("Line {}", i + 1),
                line_number: i + 1,
                current_content: current.to_string(),
                incoming_content: incoming.to_string(),
                base_content: None,
                resolved: false,
                resolution: None,
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_detects_same_position_divergence() {
        let conflicts = detect_conflicts("line1\nline2\nline3", "line1\nlineX\nline3");
        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].line_number, 2);
        assert_eq!(conflicts[0].section, "Line 2");
        assert_eq!(conflicts[0].current_content, "line2");
        assert_eq!(conflicts[0].incoming_content, "lineX");
        assert!(!conflicts[0].resolved);
    }

    #[test]
    fn test_appended_or_blank_lines_do_not_conflict() {
        assert!(detect_conflicts("a\nb", "a\nb\nc").is_empty());
        assert!(detect_conflicts("a\n\nc", "a\nb\nc").is_empty());
        assert!(detect_conflicts("", "anything").is_empty());
    }

    #[test]
    fn test_resolve_with_incoming() {
        let mut conflict = detect_conflicts("x", "y").remove(0);
        conflict.resolve_with_incoming();
        assert!(conflict.resolved);
        assert_eq!(conflict.resolution.as_deref(), Some("y"));
    }
}

//! Line-oriented diffing between content versions.
//!
//! Line changes come from a Myers diff over `str::lines()`. Similarity is the
//! character-level matching ratio `2 * M / T`, which is symmetric in its
//! arguments.
//!
//! Every diff runs with [`DIFF_TIMEOUT`]. Past it, `similar` stops searching for
//! the minimal edit script and approximates the rest, so cost stays bounded on
//! long, heavily edited documents.

mod render;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use similar::{Algorithm, DiffOp, DiffTag, TextDiff};
use std::time::Duration;

use crate::error::FolioResult;
use crate::versioning::{ChangesSummary, ContentVersion};

pub use render::DiffFormat;

/// Time budget for a single line or character diff.
pub const DIFF_TIMEOUT: Duration = Duration::from_millis(500);

fn line_diff<'a>(old: &'a [&'a str], new: &'a [&'a str]) -> TextDiff<'a, 'a, 'a, str> {
    TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_slices(old, new)
}

/// Classification of a single line change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineChangeType {
    Added,
    Removed,
    Modified,
}

/// One line-level difference between two texts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineChange {
    pub change_type: LineChangeType,
    /// 1-based; new-side line for added/modified, old-side line for removed
    pub line_number: usize,
    pub old_content: Option<String>,
    pub new_content: Option<String>,
}

/// Differences between two versions of the same content.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VersionDiff {
    pub from_version_id: String,
    pub to_version_id: String,
    pub changes: Vec<LineChange>,
    pub lines_added: usize,
    pub lines_removed: usize,
    pub lines_modified: usize,
    pub words_added: usize,
    pub words_removed: usize,
    /// 0.0 (nothing in common) to 1.0 (identical)
    pub similarity_score: f64,
    pub format: DiffFormat,
    pub diff_text: String,
    pub generated_at: DateTime<Utc>,
}

impl VersionDiff {
    /// Compare two versions and render the result in `format`.
    pub fn between(
        from: &ContentVersion,
        to: &ContentVersion,
        format: DiffFormat,
        context_lines: usize,
    ) -> FolioResult<Self> {
        let old_lines: Vec<&str> = from.content.lines().collect();
        let new_lines: Vec<&str> = to.content.lines().collect();
        let lines = line_diff(&old_lines, &new_lines);

        let changes = classify(lines.ops(), &old_lines, &new_lines);
        let summary = summarize(&changes);

        let from_words = from.content.split_whitespace().count();
        let to_words = to.content.split_whitespace().count();

        let diff_text = format.render(
            &render::DiffInput {
                from_label: &from.version_id,
                to_label: &to.version_id,
                lines: &lines,
                changes: &changes,
            },
            context_lines,
        )?;

        Ok(Self {
            from_version_id: from.version_id.clone(),
            to_version_id: to.version_id.clone(),
            lines_added: summary.added,
            lines_removed: summary.removed,
            lines_modified: summary.modified,
            words_added: to_words.saturating_sub(from_words),
            words_removed: from_words.saturating_sub(to_words),
            similarity_score: similarity(&from.content, &to.content),
            changes,
            format,
            diff_text,
            generated_at: Utc::now(),
        })
    }
}

/// Line changes needed to turn `old` into `new`.
pub fn line_changes(old: &str, new: &str) -> Vec<LineChange> {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();
    classify(line_diff(&old_lines, &new_lines).ops(), &old_lines, &new_lines)
}

/// Count changes per type.
pub fn summarize(changes: &[LineChange]) -> ChangesSummary {
    changes
        .iter()
        .fold(ChangesSummary::default(), |mut acc, change| {
            match change.change_type {
                LineChangeType::Added => acc.added += 1,
                LineChangeType::Removed => acc.removed += 1,
                LineChangeType::Modified => acc.modified += 1,
            }
            acc
        })
}

/// Character-level similarity ratio in `[0, 1]`.
pub fn similarity(a: &str, b: &str) -> f64 {
    let chars = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .timeout(DIFF_TIMEOUT)
        .diff_chars(a, b);
    f64::from(chars.ratio())
}

/// Turn diff ops into line changes.
///
/// A deletion immediately followed by an insertion is a replacement: lines are
/// paired up as modifications and any surplus becomes added or removed lines.
fn classify(ops: &[DiffOp], old: &[&str], new: &[&str]) -> Vec<LineChange> {
    let mut changes = Vec::new();
    let mut iter = ops.iter().map(DiffOp::as_tag_tuple).peekable();

    while let Some((tag, old_range, new_range)) = iter.next() {
        match tag {
            DiffTag::Equal => {}
            DiffTag::Insert => push_added(&mut changes, new, new_range),
            DiffTag::Delete => {
                let followed_by_insert =
                    matches!(iter.peek(), Some((DiffTag::Insert, _, _)));
                if followed_by_insert {
                    if let Some((_, _, insert_range)) = iter.next() {
                        push_replaced(&mut changes, old, new, old_range, insert_range);
                    }
                } else {
                    push_removed(&mut changes, old, old_range);
                }
            }
            DiffTag::Replace => push_replaced(&mut changes, old, new, old_range, new_range),
        }
    }

    changes
}

fn push_added(changes: &mut Vec<LineChange>, new: &[&str], range: std::ops::Range<usize>) {
    for idx in range {
        changes.push(LineChange {
            change_type: LineChangeType::Added,
            line_number: idx + 1,
            old_content: None,
            new_content: Some(new[idx].to_string()),
        });
    }
}

fn push_removed(changes: &mut Vec<LineChange>, old: &[&str], range: std::ops::Range<usize>) {
    for idx in range {
        changes.push(LineChange {
            change_type: LineChangeType::Removed,
            line_number: idx + 1,
            old_content: Some(old[idx].to_string()),
            new_content: None,
        });
    }
}

fn push_replaced(
    changes: &mut Vec<LineChange>,
    old: &[&str],
    new: &[&str],
    old_range: std::ops::Range<usize>,
    new_range: std::ops::Range<usize>,
) {
    let paired = old_range.len().min(new_range.len());
    for k in 0..paired {
        let (o, n) = (old_range.start + k, new_range.start + k);
        changes.push(LineChange {
            change_type: LineChangeType::Modified,
            line_number: n + 1,
            old_content: Some(old[o].to_string()),
            new_content: Some(new[n].to_string()),
        });
    }
    push_removed(changes, old, old_range.start + paired..old_range.end);
    push_added(changes, new, new_range.start + paired..new_range.end);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_appended_line_is_added() {
        let changes = line_changes("line1\nline2", "line1\nline2\nline3");
        assert_eq!(changes.len(), 1);
        assert_eq!(changes[0].change_type, LineChangeType::Added);
        assert_eq!(changes[0].line_number, 3);
        assert_eq!(changes[0].new_content.as_deref(), Some("line3"));
    }

    #[test]
    fn test_edited_line_is_modified() {
        let summary = summarize(&line_changes("a\nb\nc", "a\nB\nc"));
        assert_eq!(summary, ChangesSummary { added: 0, removed: 0, modified: 1 });
    }

    #[test]
    fn test_removed_lines() {
        let changes = line_changes("a\nb\nc\nd", "a\nd");
        let summary = summarize(&changes);
        assert_eq!(summary.removed, 2);
        assert_eq!(summary.added, 0);
        assert_eq!(changes[0].line_number, 2);
        assert_eq!(changes[0].old_content.as_deref(), Some("b"));
    }

    #[test]
    fn test_identical_texts_have_no_changes() {
        assert!(line_changes("same\ntext", "same\ntext").is_empty());
        assert_eq!(similarity("same", "same"), 1.0);
        assert_eq!(similarity("", ""), 1.0);
    }

    #[test]
    fn test_similarity_bounds_and_symmetry() {
        let a = "The quick brown fox";
        let b = "The quick red fox jumps";
        let ab = similarity(a, b);
        let ba = similarity(b, a);
        assert!(ab > 0.0 && ab < 1.0);
        assert_eq!(ab, ba);
        assert_eq!(similarity("abc", "xyz"), 0.0);
    }

    #[test]
    fn test_version_diff_counts() {
        let v1 = ContentVersion::initial("one two\nthree", "alice", "main");
        let v2 = ContentVersion::child_of(
            &v1,
            "one two\nthree four\nfive",
            "alice",
            crate::versioning::ChangeKind::Edit,
            "more",
            "main",
        );

        let diff = VersionDiff::between(&v1, &v2, DiffFormat::Unified, 3).unwrap();
        assert_eq!(diff.lines_modified, 1);
        assert_eq!(diff.lines_added, 1);
        assert_eq!(diff.lines_removed, 0);
        assert_eq!(diff.words_added, 2);
        assert_eq!(diff.words_removed, 0);
        assert!(diff.diff_text.contains("+three four"));
        assert!(diff.diff_text.contains("-three"));
    }

    /// Deterministic pseudo-random text with short lines.
    fn noise(seed: u64, len: usize) -> String {
        let mut state = seed;
        (0..len)
            .map(|i| {
                state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                if i % 60 == 59 {
                    '\n'
                } else {
                    (b'a' + ((state >> 33) % 26) as u8) as char
                }
            })
            .collect()
    }

    #[test]
    fn test_large_unrelated_texts_stay_within_budget() {
        let a = noise(1, 80_000);
        let b = noise(2, 80_000);

        let started = std::time::Instant::now();
        let score = similarity(&a, &b);
        let changes = line_changes(&a, &b);
        let elapsed = started.elapsed();

        assert!(score > 0.0 && score < 1.0);
        assert!(!changes.is_empty());
        assert!(
            elapsed < DIFF_TIMEOUT * 20,
            "diff took {:?}",
            elapsed
        );
    }
}

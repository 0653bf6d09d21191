//! Human-readable diff renderings.

use serde::{Deserialize, Serialize};
use similar::{DiffOp, DiffTag, TextDiff};
use std::fmt::Write;

use crate::diff::LineChange;
use crate::error::FolioResult;

/// Column width of each side in the plain-text side-by-side view.
const SIDE_BY_SIDE_WIDTH: usize = 40;

/// Output format of [`VersionDiff::diff_text`](crate::diff::VersionDiff).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffFormat {
    #[default]
    Unified,
    Context,
    Html,
    SideBySide,
    Json,
}

impl DiffFormat {
    /// Parse a format name. Unknown names fall back to unified.
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "context" => Self::Context,
            "html" => Self::Html,
            "side_by_side" | "side-by-side" => Self::SideBySide,
            "json" => Self::Json,
            _ => Self::Unified,
        }
    }

    pub(crate) fn render(&self, input: &DiffInput<'_>, context_lines: usize) -> FolioResult<String> {
        let text = match self {
            Self::Unified => unified(input, context_lines),
            Self::Context => context(input, context_lines),
            Self::Html => html(input),
            Self::SideBySide => side_by_side(input),
            Self::Json => serde_json::to_string_pretty(input.changes)?,
        };
        Ok(text)
    }
}

/// Everything a renderer needs, borrowed from the diff computation.
pub(crate) struct DiffInput<'a> {
    pub from_label: &'a str,
    pub to_label: &'a str,
    /// Line diff over `str::lines()` of both versions
    pub lines: &'a TextDiff<'a, 'a, 'a, str>,
    pub changes: &'a [LineChange],
}

impl<'a> DiffInput<'a> {
    fn old_lines(&self) -> &[&'a str] {
        self.lines.old_slices()
    }

    fn new_lines(&self) -> &[&'a str] {
        self.lines.new_slices()
    }
}

fn hunk_bounds(group: &[DiffOp]) -> (usize, usize, usize, usize) {
    let first = group.first().map(DiffOp::as_tag_tuple);
    let last = group.last().map(DiffOp::as_tag_tuple);
    match (first, last) {
        (Some((_, o1, n1)), Some((_, o2, n2))) => (o1.start, o2.end, n1.start, n2.end),
        _ => (0, 0, 0, 0),
    }
}

fn context_range(start: usize, stop: usize) -> String {
    let length = stop - start;
    let beginning = if length == 0 { start } else { start + 1 };
    if length <= 1 {
        format!("{}", beginning)
    } else {
        format!("{},{}", beginning, beginning + length - 1)
    }
}

fn unified(input: &DiffInput<'_>, context_lines: usize) -> String {
    input
        .lines
        .unified_diff()
        .context_radius(context_lines)
        .header(input.from_label, input.to_label)
        .to_string()
}

fn context(input: &DiffInput<'_>, context_lines: usize) -> String {
    let groups = input.lines.grouped_ops(context_lines);
    let mut out = String::new();
    if groups.is_empty() {
        return out;
    }

    let _ = writeln!(out, "*** {}", input.from_label);
    let _ = writeln!(out, "--- {}", input.to_label);

    for group in &groups {
        let (o1, o2, n1, n2) = hunk_bounds(group);
        let tags: Vec<_> = group.iter().map(|op| op.as_tag_tuple()).collect();

        let _ = writeln!(out, "***************");
        let _ = writeln!(out, "*** {} ****", context_range(o1, o2));
        if tags
            .iter()
            .any(|(tag, _, _)| matches!(tag, DiffTag::Delete | DiffTag::Replace))
        {
            for (tag, old_range, _) in &tags {
                if *tag == DiffTag::Insert {
                    continue;
                }
                for line in &input.old_lines()[old_range.clone()] {
                    let _ = writeln!(out, "{}{}", context_prefix(*tag), line);
                }
            }
        }

        let _ = writeln!(out, "--- {} ----", context_range(n1, n2));
        if tags
            .iter()
            .any(|(tag, _, _)| matches!(tag, DiffTag::Insert | DiffTag::Replace))
        {
            for (tag, _, new_range) in &tags {
                if *tag == DiffTag::Delete {
                    continue;
                }
                for line in &input.new_lines()[new_range.clone()] {
                    let _ = writeln!(out, "{}{}", context_prefix(*tag), line);
                }
            }
        }
    }

    out
}

fn context_prefix(tag: DiffTag) -> &'static str {
    match tag {
        DiffTag::Equal => "  ",
        DiffTag::Delete => "- ",
        DiffTag::Insert => "+ ",
        DiffTag::Replace => "! ",
    }
}

fn escape_html(text: &str) -> String {
    let mut escaped = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => escaped.push_str("&amp;"),
            '<' => escaped.push_str("&lt;"),
            '>' => escaped.push_str("&gt;"),
            '"' => escaped.push_str("&quot;"),
            _ => escaped.push(c),
        }
    }
    escaped
}

/// Visit every row of a two-column view: `(marker, left, right)`.
fn for_each_row<'a>(input: &DiffInput<'a>, mut row: impl FnMut(DiffTag, Option<&'a str>, Option<&'a str>)) {
    let (old_lines, new_lines) = (input.old_lines(), input.new_lines());
    for op in input.lines.ops() {
        let (tag, old_range, new_range) = op.as_tag_tuple();
        let rows = old_range.len().max(new_range.len());
        for k in 0..rows {
            let left = old_range
                .clone()
                .nth(k)
                .map(|idx| old_lines[idx]);
            let right = new_range
                .clone()
                .nth(k)
                .map(|idx| new_lines[idx]);
            row(tag, left, right);
        }
    }
}

fn html(input: &DiffInput<'_>) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "<table class=\"diff\">");
    let _ = writeln!(
        out,
        "<thead><tr><th>{}</th><th>{}</th></tr></thead>",
        escape_html(input.from_label),
        escape_html(input.to_label)
    );
    let _ = writeln!(out, "<tbody>");
    for_each_row(input, |tag, left, right| {
        let class = match tag {
            DiffTag::Equal => "equal",
            DiffTag::Delete => "sub",
            DiffTag::Insert => "add",
            DiffTag::Replace => "chg",
        };
        let _ = writeln!(
            out,
            "<tr class=\"{}\"><td>{}</td><td>{}</td></tr>",
            class,
            left.map(escape_html).unwrap_or_default(),
            right.map(escape_html).unwrap_or_default()
        );
    });
    let _ = writeln!(out, "</tbody>");
    let _ = write!(out, "</table>");
    out
}

fn side_by_side(input: &DiffInput<'_>) -> String {
    let mut out = String::new();
    for_each_row(input, |tag, left, right| {
        let marker = match (tag, left, right) {
            (DiffTag::Equal, _, _) => ' ',
            (_, Some(_), Some(_)) => '|',
            (_, Some(_), None) => '<',
            _ => '>',
        };
        let _ = writeln!(
            out,
            "{:<width$} {} {}",
            left.unwrap_or(""),
            marker,
            right.unwrap_or(""),
            width = SIDE_BY_SIDE_WIDTH
        );
    });
    out
}

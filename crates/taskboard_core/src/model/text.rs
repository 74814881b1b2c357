//! Normalization for user-entered labels and tags.

use once_cell::sync::Lazy;
use regex::Regex;

static WHITESPACE_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+").expect("valid ws regex"));
static TAG_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[a-z0-9][a-z0-9_\-]*$").expect("valid tag regex"));

/// Maximum characters kept for project, board, and list names.
pub const MAX_NAME_CHARS: usize = 150;
/// Maximum characters kept for task and subtask titles.
pub const MAX_TITLE_CHARS: usize = 255;

/// Trims and collapses internal whitespace. Returns `None` when blank.
pub fn normalize_label(value: &str) -> Option<String> {
    let collapsed = WHITESPACE_RE.replace_all(value.trim(), " ");
    if collapsed.is_empty() {
        None
    } else {
        Some(collapsed.into_owned())
    }
}

/// Lowercases a tag and checks it against the tag grammar.
pub fn normalize_tag(value: &str) -> Option<String> {
    let lowered = value.trim().to_lowercase();
    TAG_RE.is_match(&lowered).then_some(lowered)
}

/// Normalizes tags, dropping duplicates while keeping first-seen order.
///
/// Returns the first offending raw value when any tag is invalid.
pub fn normalize_tags(tags: &[String]) -> Result<Vec<String>, String> {
    let mut result: Vec<String> = Vec::with_capacity(tags.len());
    for raw in tags {
        let tag = normalize_tag(raw).ok_or_else(|| raw.clone())?;
        if !result.contains(&tag) {
            result.push(tag);
        }
    }
    Ok(result)
}

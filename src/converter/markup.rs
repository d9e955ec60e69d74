//!
//! Small text helpers shared by the family grammars.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

use regex::Regex;

/// Byte offset of the earliest marker token found in `content`
pub fn first_marker_offset(content: &str, markers: &[&str]) -> Option<usize> {
    markers.iter().filter_map(|marker| content.find(marker)).min()
}

///
/// Delete every match of `block` and trim the result.
///
/// Deletion repeats until no match is left, because removing one block can
/// splice its neighbours into a new one. This keeps cleanup idempotent.
pub fn remove_blocks(content: &str, block: &Regex) -> String {
    let mut text = content.to_string();
    while block.is_match(&text) {
        text = block.replace_all(&text, "").into_owned();
    }
    text.trim().to_string()
}

///
/// Length of the first complete JSON value at the start of `text`.
///
/// Only objects and arrays are considered, so bare words are never mistaken
/// for a payload. Returns `None` for truncated or malformed input.
pub fn leading_json_len(text: &str) -> Option<usize> {
    if !text.starts_with(['{', '[']) {
        return None;
    }
    let mut values = serde_json::Deserializer::from_str(text).into_iter::<serde_json::Value>();
    match values.next() {
        Some(Ok(_)) => Some(values.byte_offset()),
        _ => None,
    }
}

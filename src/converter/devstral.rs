//!
//! Devstral tool-call grammar: `[TOOL_CALLS]name[ARGS]{json}`.
//!
//! A call runs from its `[TOOL_CALLS]` marker to the end of the JSON value
//! after `[ARGS]`. When the arguments are not JSON the call runs to the next
//! `[TOOL_CALLS]` marker or the end of the content.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use super::markup::leading_json_len;
use super::tool_call::RawToolCall;

/* --- types ----------------------------------------------------------------------------------- */

/// One `[TOOL_CALLS]` segment located in the content
struct Segment<'a> {
    /** byte offset of the `[TOOL_CALLS]` marker */
    start: usize,
    /** byte offset one past the end of the call markup */
    end: usize,
    name: &'a str,
    /** `None` until `[ARGS]` has been seen */
    arguments: Option<&'a str>,
    /** arguments form a complete JSON value */
    json_complete: bool,
}

/* --- constants ------------------------------------------------------------------------------ */

pub const MODEL_PATTERNS: &[&str] = &[".*devstral.*"];

const CALLS_MARKER: &str = "[TOOL_CALLS]";
const ARGS_MARKER: &str = "[ARGS]";

/* --- start of code -------------------------------------------------------------------------- */

fn segments(content: &str) -> Vec<Segment<'_>> {
    let starts: Vec<usize> = content.match_indices(CALLS_MARKER).map(|(i, _)| i).collect();
    let mut found = Vec::with_capacity(starts.len());

    for (n, &start) in starts.iter().enumerate() {
        let limit = starts.get(n + 1).copied().unwrap_or(content.len());
        let body_start = start + CALLS_MARKER.len();
        let body = &content[body_start..limit];

        let Some(args_at) = body.find(ARGS_MARKER) else {
            found.push(Segment { start, end: limit, name: body.trim(), arguments: None, json_complete: false });
            continue;
        };

        let name = body[..args_at].trim();
        let after = &body[args_at + ARGS_MARKER.len()..];
        let leading_ws = after.len() - after.trim_start().len();
        let args_text = after.trim_start();

        let segment = match leading_json_len(args_text) {
            Some(len) => Segment {
                start,
                end: body_start + args_at + ARGS_MARKER.len() + leading_ws + len,
                name,
                arguments: Some(&args_text[..len]),
                json_complete: true,
            },
            None => Segment { start, end: limit, name, arguments: Some(args_text.trim_end()), json_complete: false },
        };
        found.push(segment);
    }
    found
}

///
/// Extract one call per `[TOOL_CALLS]…[ARGS]…` segment.
///
/// Segments without `[ARGS]` are not calls yet and are skipped.
pub fn extract(content: &str) -> Vec<RawToolCall> {
    segments(content)
        .into_iter()
        .filter_map(|segment| {
            let arguments = segment.arguments?;
            (!segment.name.is_empty()).then(|| RawToolCall::new(segment.name, arguments))
        })
        .collect()
}

pub fn marker_offset(content: &str) -> Option<usize> {
    content.find(CALLS_MARKER)
}

///
/// True once some segment has a name and a complete JSON argument value.
pub fn is_complete(content: &str) -> bool {
    segments(content).iter().any(|s| s.json_complete && !s.name.is_empty())
}

pub fn strip_markup(content: &str) -> String {
    let mut text = content.to_string();
    while text.contains(CALLS_MARKER) {
        let mut kept = String::with_capacity(text.len());
        let mut cursor = 0;
        for segment in segments(&text) {
            kept.push_str(&text[cursor..segment.start]);
            cursor = segment.end;
        }
        kept.push_str(&text[cursor..]);
        text = kept;
    }
    text.trim().to_string()
}

/* --- tests ----------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_arguments() {
        let calls = extract("[TOOL_CALLS]read_file[ARGS]{\"path\": \"src/main.rs\"}");
        assert_eq!(calls, vec![RawToolCall::new("read_file", "{\"path\": \"src/main.rs\"}")]);
    }

    #[test]
    fn test_extract_multiple_calls() {
        let content = "[TOOL_CALLS]a[ARGS]{\"x\":1}[TOOL_CALLS]b[ARGS]{\"y\":2}";
        let names: Vec<String> = extract(content).into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["a", "b"]);
    }

    #[test]
    fn test_extract_non_json_arguments() {
        assert_eq!(extract("[TOOL_CALLS]run[ARGS]not-json"), vec![RawToolCall::new("run", "not-json")]);
    }

    #[test]
    fn test_completion_requires_full_json() {
        assert!(!is_complete("[TOOL_CALLS]run"));
        assert!(!is_complete("[TOOL_CALLS]run[ARGS]{\"cmd\": \"l"));
        assert!(is_complete("[TOOL_CALLS]run[ARGS]{\"cmd\": \"ls\"}"));
    }

    #[test]
    fn test_strip_markup_keeps_trailing_prose() {
        let content = "Sure. [TOOL_CALLS]run[ARGS] {\"cmd\": \"ls\"} Then I will report.";
        let once = strip_markup(content);
        assert_eq!(once, "Sure.  Then I will report.");
        assert_eq!(strip_markup(&once), once);
    }

    #[test]
    fn test_strip_markup_removes_incomplete_segment() {
        assert_eq!(strip_markup("Working [TOOL_CALLS]run[ARGS]{\"cmd\":"), "Working");
    }
}

//!
//! Qwen3 tool-call grammar: one JSON object per `<tool_call>` block.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

use std::sync::LazyLock;

use regex::Regex;

use super::markup::{first_marker_offset, remove_blocks};
use super::tool_call::RawToolCall;

pub const MODEL_PATTERNS: &[&str] = &[".*qwen3.*", ".*jan[-_]nano.*"];

const MARKERS: &[&str] = &["<tool_call>", "</tool_call>"];

static BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("valid regex"));

pub fn extract(content: &str) -> Vec<RawToolCall> {
    BLOCK
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .map(|payload| RawToolCall::from_json_payload(payload.as_str()))
        .collect()
}

pub fn marker_offset(content: &str) -> Option<usize> {
    first_marker_offset(content, MARKERS)
}

pub fn is_complete(content: &str) -> bool {
    BLOCK.is_match(content)
}

pub fn strip_markup(content: &str) -> String {
    remove_blocks(content, &BLOCK)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_json_payloads() {
        let content = "<tool_call>\n{\"name\": \"get_time\", \"arguments\": {\"tz\": \"UTC\"}}\n</tool_call>\
                       <tool_call>{\"name\": \"get_date\", \"arguments\": {}}</tool_call>";
        let calls = extract(content);
        assert_eq!(
            calls,
            vec![
                RawToolCall::new("get_time", r#"{"tz":"UTC"}"#),
                RawToolCall::new("get_date", "{}"),
            ]
        );
    }

    #[test]
    fn test_invalid_payload_keeps_raw_text() {
        let calls = extract("<tool_call>call me maybe</tool_call>");
        assert_eq!(calls, vec![RawToolCall::new("", "call me maybe")]);
    }

    #[test]
    fn test_strip_markup() {
        let content = "Checking <tool_call>{\"name\":\"x\"}</tool_call> now";
        assert_eq!(strip_markup(content), "Checking  now");
        assert!(is_complete(content));
        assert!(!is_complete("<tool_call>{\"name\":"));
    }
}

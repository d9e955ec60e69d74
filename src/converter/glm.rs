//!
//! GLM tool-call grammar.
//!
//! GLM models use two dialects, sometimes mixed in one reply:
//!
//! ```text
//! <tool_call>fetch_weather
//! <arg_key>city</arg_key>
//! <arg_value>Berlin</arg_value>
//! </tool_call>
//!
//! [TOOL_REQUEST]
//! {"name": "fetch_weather", "arguments": {"city": "Berlin"}}
//! [END_TOOL_REQUEST]
//! ```
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::LazyLock;

use regex::Regex;

use super::markup::{first_marker_offset, remove_blocks};
use super::tool_call::RawToolCall;

/* --- constants ------------------------------------------------------------------------------ */

pub const MODEL_PATTERNS: &[&str] = &["glm-.*", "chatglm-.*", ".*glm.*"];

const MARKERS: &[&str] = &[
    "<tool_call>",
    "</tool_call>",
    "<arg_key>",
    "</arg_key>",
    "<arg_value>",
    "</arg_value>",
    "[TOOL_REQUEST]",
    "[END_TOOL_REQUEST]",
];

const ARG_KEY_OPEN: &str = "<arg_key>";

static LEGACY_BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("valid regex"));

static REQUEST_BLOCK: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)\[TOOL_REQUEST\](.*?)\[END_TOOL_REQUEST\]").expect("valid regex")
});

static ARG_PAIR: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?s)<arg_key>\s*(.*?)\s*</arg_key>\s*<arg_value>\s*(.*?)\s*</arg_value>")
        .expect("valid regex")
});

/* --- start of code -------------------------------------------------------------------------- */

///
/// Extract GLM tool calls in document order.
pub fn extract(content: &str) -> Vec<RawToolCall> {
    let mut found: Vec<(usize, RawToolCall)> = Vec::new();

    for caps in LEGACY_BLOCK.captures_iter(content) {
        let (Some(block), Some(inner)) = (caps.get(0), caps.get(1)) else { continue };
        if let Some(call) = parse_legacy_body(inner.as_str()) {
            found.push((block.start(), call));
        }
    }

    for caps in REQUEST_BLOCK.captures_iter(content) {
        let (Some(block), Some(inner)) = (caps.get(0), caps.get(1)) else { continue };
        // a payload without a recoverable name is still a call
        found.push((block.start(), RawToolCall::from_json_payload(inner.as_str())));
    }

    found.sort_by_key(|(start, _)| *start);
    tracing::debug!("GLM grammar extracted {} tool call(s)", found.len());
    found.into_iter().map(|(_, call)| call).collect()
}

fn parse_legacy_body(body: &str) -> Option<RawToolCall> {
    let trimmed = body.trim();
    // some GLM builds put a JSON payload inside the legacy wrapper
    if trimmed.starts_with('{') {
        return Some(RawToolCall::from_json_payload(trimmed));
    }

    let name = trimmed.split(ARG_KEY_OPEN).next().unwrap_or_default().trim();
    if name.is_empty() {
        return None;
    }

    let pairs = ARG_PAIR.captures_iter(trimmed).filter_map(|caps| {
        let key = caps.get(1)?.as_str();
        let value = caps.get(2)?.as_str();
        Some((key, value))
    });
    Some(RawToolCall::from_string_pairs(name, pairs))
}

pub fn marker_offset(content: &str) -> Option<usize> {
    first_marker_offset(content, MARKERS)
}

pub fn is_complete(content: &str) -> bool {
    LEGACY_BLOCK.is_match(content) || REQUEST_BLOCK.is_match(content)
}

///
/// Remove both GLM dialects from `content`.
pub fn strip_markup(content: &str) -> String {
    let mut text = content.to_string();
    loop {
        let next = remove_blocks(&remove_blocks(&text, &LEGACY_BLOCK), &REQUEST_BLOCK);
        if next == text {
            return next;
        }
        text = next;
    }
}

/* --- tests ----------------------------------------------------------------------------------- */

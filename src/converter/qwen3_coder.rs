//!
//! Qwen3-Coder tool-call grammar.
//!
//! ```text
//! <tool_call>
//!   <function=search_products>
//!     <parameter=query>waterproof running shoes</parameter>
//!     <parameter=limit>10</parameter>
//!   </function>
//! </tool_call>
//! ```
//!
//! Parameter values that are valid JSON keep their JSON type (`10` stays a
//! number); anything else becomes a string.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::LazyLock;

use regex::Regex;
use serde_json::{Map, Value};

use super::markup::{first_marker_offset, remove_blocks};
use super::tool_call::RawToolCall;

/* --- constants ------------------------------------------------------------------------------ */

pub const MODEL_PATTERNS: &[&str] = &[".*qwen3[-_]coder.*"];

const MARKERS: &[&str] =
    &["<tool_call>", "</tool_call>", "<function=", "</function>", "<parameter=", "</parameter>"];

static BLOCK: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<tool_call>(.*?)</tool_call>").expect("valid regex"));

static FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<function=([^>]+)>(.*?)</function>").expect("valid regex"));

/** model ran out of tokens before closing the function element */
static UNCLOSED_FUNCTION: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<function=([^>]+)>(.*)").expect("valid regex"));

static PARAMETER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)<parameter=([^>]+)>(.*?)</parameter>").expect("valid regex"));

static STRAY_CLOSERS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</(?:function|parameter)>").expect("valid regex"));

/* --- start of code -------------------------------------------------------------------------- */

///
/// Extract one call per `<tool_call>` block that names a function.
pub fn extract(content: &str) -> Vec<RawToolCall> {
    BLOCK
        .captures_iter(content)
        .filter_map(|caps| caps.get(1))
        .filter_map(|block| parse_block(block.as_str()))
        .collect()
}

fn parse_block(block: &str) -> Option<RawToolCall> {
    let caps = FUNCTION.captures(block).or_else(|| UNCLOSED_FUNCTION.captures(block));
    let Some(caps) = caps else {
        let trimmed = block.trim();
        // plain Qwen3 JSON payload in a coder reply
        return trimmed.starts_with('{').then(|| RawToolCall::from_json_payload(trimmed));
    };

    let name = caps.get(1)?.as_str().trim();
    let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();

    let mut parameters = Map::new();
    for param in PARAMETER.captures_iter(body) {
        let (Some(key), Some(value)) = (param.get(1), param.get(2)) else { continue };
        parameters.insert(key.as_str().trim().to_string(), decode_value(value.as_str().trim()));
    }
    Some(RawToolCall::from_object(name, parameters))
}

fn decode_value(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

pub fn marker_offset(content: &str) -> Option<usize> {
    first_marker_offset(content, MARKERS)
}

pub fn is_complete(content: &str) -> bool {
    BLOCK.is_match(content)
}

///
/// Remove `<tool_call>` blocks and any stray function/parameter closers.
pub fn strip_markup(content: &str) -> String {
    let mut text = content.to_string();
    loop {
        let without_blocks = remove_blocks(&text, &BLOCK);
        let next = remove_blocks(&without_blocks, &STRAY_CLOSERS);
        if next == text {
            return next;
        }
        text = next;
    }
}

/* --- tests ----------------------------------------------------------------------------------- */

//!
//! Claude-style `<invoke>` tool-call grammar.
//!
//! Claude behind an OpenAI-compatible gateway normally answers with standard
//! `tool_calls`. Some gateways leak the XML form instead, which this grammar
//! covers.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

use std::sync::LazyLock;

use regex::Regex;

use super::markup::{first_marker_offset, remove_blocks};
use super::tool_call::RawToolCall;

pub const MODEL_PATTERNS: &[&str] = &["claude-.*", "anthropic/claude-.*", ".*claude.*"];

const MARKERS: &[&str] = &["<invoke", "</invoke>", "<parameter", "</parameter>"];

static INVOKE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"(?s)<invoke name="([^"]+)">(.*?)</invoke>"#).expect("valid regex"));

static PARAMETER: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"(?s)<parameter name="([^"]+)">(.*?)</parameter>"#).expect("valid regex")
});

static WRAPPER_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"</?function_calls>").expect("valid regex"));

pub fn extract(content: &str) -> Vec<RawToolCall> {
    INVOKE
        .captures_iter(content)
        .filter_map(|caps| {
            let name = caps.get(1)?.as_str().trim();
            let body = caps.get(2).map(|m| m.as_str()).unwrap_or_default();
            let pairs = PARAMETER.captures_iter(body).filter_map(|param| {
                Some((param.get(1)?.as_str().trim(), param.get(2)?.as_str().trim()))
            });
            Some(RawToolCall::from_string_pairs(name, pairs))
        })
        .collect()
}

pub fn marker_offset(content: &str) -> Option<usize> {
    first_marker_offset(content, MARKERS)
}

pub fn is_complete(content: &str) -> bool {
    INVOKE.is_match(content)
}

pub fn strip_markup(content: &str) -> String {
    let mut text = content.to_string();
    loop {
        let next = remove_blocks(&remove_blocks(&text, &INVOKE), &WRAPPER_TAG);
        if next == text {
            return next;
        }
        text = next;
    }
}

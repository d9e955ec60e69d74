//!
//! Closed set of tool-call formats and their uniform converter interface.
//!
//! Every format offers the same five operations: model matching, parsing,
//! partial-marker detection, completion detection and markup cleanup. The
//! dispatch is a plain `match`, so adding a family means adding a variant
//! and a grammar module.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::fmt;
use std::sync::LazyLock;

use regex::Regex;

use super::tool_call::{RawToolCall, ToolCall, build_tool_calls};
use super::{claude, devstral, glm, qwen3, qwen3_coder};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Model family tool-call format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ToolCallFormat {
    /// `<tool_call>name<arg_key>…` and `[TOOL_REQUEST]{json}[END_TOOL_REQUEST]`
    Glm,
    /// `<tool_call><function=name><parameter=key>…`
    Qwen3Coder,
    /// `<tool_call>{json}</tool_call>`
    Qwen3,
    /// `[TOOL_CALLS]name[ARGS]{json}`
    Devstral,
    /// `<invoke name="…"><parameter name="…">…`
    Claude,
    /// already standard, never rewritten
    OpenAi,
    /// fallback for unknown models
    Passthrough,
}

/* --- constants ------------------------------------------------------------------------------ */

const OPENAI_PATTERNS: &[&str] = &["gpt-.*", "openai/gpt-.*", "text-davinci-.*", "code-davinci-.*"];

/** compiled `^(?:…)` forms of every family's model patterns, in variant order */
static COMPILED_PATTERNS: LazyLock<Vec<(ToolCallFormat, Regex)>> = LazyLock::new(|| {
    ToolCallFormat::ALL
        .iter()
        .flat_map(|format| {
            format.model_patterns().iter().map(move |pattern| {
                (*format, Regex::new(&format!("^(?:{})", pattern)).expect("valid regex"))
            })
        })
        .collect()
});

/* --- start of code -------------------------------------------------------------------------- */

impl ToolCallFormat {
    pub const ALL: [ToolCallFormat; 7] = [
        ToolCallFormat::Glm,
        ToolCallFormat::Qwen3Coder,
        ToolCallFormat::Qwen3,
        ToolCallFormat::Devstral,
        ToolCallFormat::Claude,
        ToolCallFormat::OpenAi,
        ToolCallFormat::Passthrough,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            ToolCallFormat::Glm => "glm",
            ToolCallFormat::Qwen3Coder => "qwen3-coder",
            ToolCallFormat::Qwen3 => "qwen3",
            ToolCallFormat::Devstral => "devstral",
            ToolCallFormat::Claude => "claude",
            ToolCallFormat::OpenAi => "openai",
            ToolCallFormat::Passthrough => "passthrough",
        }
    }

    /// Model-name patterns, matched case-insensitively from the start of the name
    pub fn model_patterns(&self) -> &'static [&'static str] {
        match self {
            ToolCallFormat::Glm => glm::MODEL_PATTERNS,
            ToolCallFormat::Qwen3Coder => qwen3_coder::MODEL_PATTERNS,
            ToolCallFormat::Qwen3 => qwen3::MODEL_PATTERNS,
            ToolCallFormat::Devstral => devstral::MODEL_PATTERNS,
            ToolCallFormat::Claude => claude::MODEL_PATTERNS,
            ToolCallFormat::OpenAi => OPENAI_PATTERNS,
            ToolCallFormat::Passthrough => &[],
        }
    }

    ///
    /// Check whether this format handles `model`.
    ///
    /// Empty names never match, except for [`ToolCallFormat::Passthrough`]
    /// which matches everything.
    pub fn matches(&self, model: &str) -> bool {
        if *self == ToolCallFormat::Passthrough {
            return true;
        }
        if model.is_empty() {
            return false;
        }
        let lowered = model.to_lowercase();
        COMPILED_PATTERNS
            .iter()
            .filter(|(format, _)| format == self)
            .any(|(_, pattern)| pattern.is_match(&lowered))
    }

    /// True when the family emits textual markup that needs conversion
    pub fn emits_markup(&self) -> bool {
        !matches!(self, ToolCallFormat::OpenAi | ToolCallFormat::Passthrough)
    }

    /// Raw `(name, arguments text)` pairs in document order
    pub fn extract(&self, content: &str) -> Vec<RawToolCall> {
        match self {
            ToolCallFormat::Glm => glm::extract(content),
            ToolCallFormat::Qwen3Coder => qwen3_coder::extract(content),
            ToolCallFormat::Qwen3 => qwen3::extract(content),
            ToolCallFormat::Devstral => devstral::extract(content),
            ToolCallFormat::Claude => claude::extract(content),
            ToolCallFormat::OpenAi | ToolCallFormat::Passthrough => Vec::new(),
        }
    }

    ///
    /// Parse every tool call in `content` into the standard schema.
    ///
    /// Never fails. Payloads that are not valid JSON end up as JSON string
    /// arguments.
    pub fn parse(&self, content: &str) -> Vec<ToolCall> {
        let calls = build_tool_calls(self.extract(content));
        if !calls.is_empty() {
            tracing::debug!("{} extracted {} tool call(s)", self, calls.len());
        }
        calls
    }

    /// Byte offset of the first marker token of this family, if any
    pub fn marker_offset(&self, content: &str) -> Option<usize> {
        match self {
            ToolCallFormat::Glm => glm::marker_offset(content),
            ToolCallFormat::Qwen3Coder => qwen3_coder::marker_offset(content),
            ToolCallFormat::Qwen3 => qwen3::marker_offset(content),
            ToolCallFormat::Devstral => devstral::marker_offset(content),
            ToolCallFormat::Claude => claude::marker_offset(content),
            ToolCallFormat::OpenAi | ToolCallFormat::Passthrough => None,
        }
    }

    /// Any marker token of this family is present, complete markup or not
    pub fn has_partial_marker(&self, content: &str) -> bool {
        self.marker_offset(content).is_some()
    }

    /// At least one full open/close marker pair is present
    pub fn is_complete(&self, content: &str) -> bool {
        match self {
            ToolCallFormat::Glm => glm::is_complete(content),
            ToolCallFormat::Qwen3Coder => qwen3_coder::is_complete(content),
            ToolCallFormat::Qwen3 => qwen3::is_complete(content),
            ToolCallFormat::Devstral => devstral::is_complete(content),
            ToolCallFormat::Claude => claude::is_complete(content),
            ToolCallFormat::OpenAi | ToolCallFormat::Passthrough => false,
        }
    }

    ///
    /// Remove this family's markup and trim. Idempotent.
    ///
    /// Formats without markup return the content unchanged.
    pub fn clean_content(&self, content: &str) -> String {
        match self {
            ToolCallFormat::Glm => glm::strip_markup(content),
            ToolCallFormat::Qwen3Coder => qwen3_coder::strip_markup(content),
            ToolCallFormat::Qwen3 => qwen3::strip_markup(content),
            ToolCallFormat::Devstral => devstral::strip_markup(content),
            ToolCallFormat::Claude => claude::strip_markup(content),
            ToolCallFormat::OpenAi | ToolCallFormat::Passthrough => content.to_string(),
        }
    }
}

impl fmt::Display for ToolCallFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/* --- tests ----------------------------------------------------------------------------------- */

//!
//! Standard OpenAI tool-call representation and construction helpers.
//!
//! Family grammars only extract `(name, arguments text)` pairs ([`RawToolCall`]);
//! this module turns those pairs into the wire-level [`ToolCall`] shape with a
//! deterministic id and a JSON-encoded `arguments` string.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/* --- types ----------------------------------------------------------------------------------- */

///
/// Tool call in the standard OpenAI chat completions schema.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolCall {
    /** call identifier, stable within one parse */
    pub id: String,
    /** always "function" */
    #[serde(rename = "type")]
    pub kind: String,
    /** function name and JSON-encoded arguments */
    pub function: FunctionCall,
}

///
/// Function part of a [`ToolCall`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FunctionCall {
    /** function name */
    pub name: String,
    /** arguments, always a JSON document encoded as a string */
    pub arguments: String,
}

///
/// Tool call as extracted by a family grammar, before id assignment.
///
/// `arguments` holds the payload text as found in the markup (or as assembled
/// from key/value markup). It is expected to be JSON but is not required to be.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawToolCall {
    /** function name */
    pub name: String,
    /** argument payload text */
    pub arguments: String,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Tool call ids are reduced into this range */
const TOOL_CALL_ID_MODULUS: u64 = 1_000_000_000;

const FNV_OFFSET_BASIS: u64 = 0xcbf2_9ce4_8422_2325;
const FNV_PRIME: u64 = 0x0000_0100_0000_01b3;

/** recovers `"name": "..."` from a JSON object that failed to parse */
static JSON_NAME_FRAGMENT: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#""name"\s*:\s*"((?:[^"\\]|\\.)*)""#).expect("valid regex"));

/* --- start of code -------------------------------------------------------------------------- */

impl RawToolCall {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self { name: name.into(), arguments: arguments.into() }
    }

    ///
    /// Build a raw call from ordered key/value string pairs (GLM legacy, Claude).
    pub fn from_string_pairs<K, V>(name: impl Into<String>, pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        let map: serde_json::Map<String, Value> =
            pairs.into_iter().map(|(k, v)| (k.into(), Value::String(v.into()))).collect();
        Self::from_object(name, map)
    }

    ///
    /// Build a raw call from an already structured argument object.
    pub fn from_object(name: impl Into<String>, arguments: serde_json::Map<String, Value>) -> Self {
        Self::new(name, Value::Object(arguments).to_string())
    }

    ///
    /// Parse a `{"name": ..., "arguments": ...}` payload (Qwen3, GLM `[TOOL_REQUEST]`).
    ///
    /// Invalid JSON never drops the call: the name is recovered from a `"name"`
    /// fragment when present and the whole payload becomes the arguments text.
    pub fn from_json_payload(payload: &str) -> Self {
        let payload = payload.trim();
        match serde_json::from_str::<Value>(payload) {
            Ok(Value::Object(mut object)) => {
                let name = match object.remove("name") {
                    Some(Value::String(name)) => name,
                    Some(other) => other.to_string(),
                    None => String::new(),
                };
                let arguments = match object.remove("arguments").or_else(|| object.remove("parameters")) {
                    Some(Value::String(text)) => text,
                    Some(value) => value.to_string(),
                    None => "{}".to_string(),
                };
                Self::new(name.trim(), arguments)
            }
            _ => {
                tracing::debug!("Tool call payload is not a JSON object, keeping raw text");
                let name = JSON_NAME_FRAGMENT
                    .captures(payload)
                    .and_then(|c| c.get(1))
                    .map(|m| m.as_str().to_string())
                    .unwrap_or_default();
                Self::new(name, payload)
            }
        }
    }

    ///
    /// Turn the raw call into a standard [`ToolCall`].
    ///
    /// # Arguments
    ///  * `ordinal` - position of the call in the parsed document
    pub fn into_tool_call(self, ordinal: usize) -> ToolCall {
        let id = tool_call_id(&self.name, ordinal);
        ToolCall {
            id,
            kind: "function".to_string(),
            function: FunctionCall { arguments: encode_arguments(&self.arguments), name: self.name },
        }
    }
}

///
/// Assign ids in document order and build the final tool calls.
pub fn build_tool_calls(raw: Vec<RawToolCall>) -> Vec<ToolCall> {
    raw.into_iter().enumerate().map(|(ordinal, call)| call.into_tool_call(ordinal)).collect()
}

///
/// Encode an arguments payload as the JSON string carried by `function.arguments`.
///
/// Valid JSON is re-serialized compactly; anything else is encoded as a JSON
/// string literal holding the raw text.
pub fn encode_arguments(text: &str) -> String {
    let trimmed = text.trim();
    match serde_json::from_str::<Value>(trimmed) {
        Ok(value) => value.to_string(),
        Err(_) => Value::String(trimmed.to_string()).to_string(),
    }
}

///
/// Deterministic tool call id derived from name and ordinal.
///
/// Uses FNV-1a so ids are identical across processes. Uniqueness is best effort.
pub fn tool_call_id(name: &str, ordinal: usize) -> String {
    let key = format!("{}_{}", name, ordinal);
    let hash = key
        .bytes()
        .fold(FNV_OFFSET_BASIS, |acc, byte| (acc ^ u64::from(byte)).wrapping_mul(FNV_PRIME));
    format!("call_{:09}", hash % TOOL_CALL_ID_MODULUS)
}

/* --- tests ----------------------------------------------------------------------------------- */

//!
//! Conversion of complete (non-streaming) chat completion responses.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use serde_json::Value;

use super::format::ToolCallFormat;
use super::registry::ConverterRegistry;
use super::sanitizer::ContentSanitizer;

/* --- types ----------------------------------------------------------------------------------- */

/// What happened to one choice
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChoiceOutcome {
    /// nothing changed
    Untouched,
    /// only think-tag cleanup changed the content
    Sanitized,
    /// tool calls were synthesized
    ToolCalls(usize),
}

/// Summary of a whole-response transformation
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TransformSummary {
    /** the document was modified */
    pub changed: bool,
    /** number of tool calls synthesized over all choices */
    pub tool_calls: usize,
}

/* --- start of code -------------------------------------------------------------------------- */

///
/// Apply the response-level contract to one `choices[]` entry in place.
///
/// Markup with at least one parsed call replaces the content with the cleaned
/// remainder (removed when empty), sets `tool_calls` and forces
/// `finish_reason` to `"tool_calls"`. Markup that yields no calls, and content
/// without markup, only receive think-tag cleanup. OpenAI responses are
/// left exactly as the backend sent them.
pub fn apply_to_choice(format: ToolCallFormat, sanitizer: ContentSanitizer, choice: &mut Value) -> ChoiceOutcome {
    if format == ToolCallFormat::OpenAi {
        return ChoiceOutcome::Untouched;
    }
    let Some(content) = choice.pointer("/message/content").and_then(Value::as_str).map(str::to_string) else {
        return ChoiceOutcome::Untouched;
    };

    let calls = if format.has_partial_marker(&content) { format.parse(&content) } else { Vec::new() };

    if calls.is_empty() {
        let cleaned = sanitizer.sanitize(&content);
        if cleaned == content {
            return ChoiceOutcome::Untouched;
        }
        if let Some(message) = choice.get_mut("message").and_then(Value::as_object_mut) {
            message.insert("content".to_string(), Value::String(cleaned));
        }
        return ChoiceOutcome::Sanitized;
    }

    let remainder = sanitizer.sanitize(&format.clean_content(&content)).trim().to_string();
    let count = calls.len();
    tracing::debug!("Converted {} {} tool call(s) in response choice", count, format);

    let Some(message) = choice.get_mut("message").and_then(Value::as_object_mut) else {
        return ChoiceOutcome::Untouched;
    };
    if remainder.is_empty() {
        message.remove("content");
    } else {
        message.insert("content".to_string(), Value::String(remainder));
    }
    message.insert("tool_calls".to_string(), serde_json::to_value(calls).unwrap_or(Value::Null));

    if let Some(choice) = choice.as_object_mut() {
        choice.insert("finish_reason".to_string(), Value::String("tool_calls".to_string()));
    }
    ChoiceOutcome::ToolCalls(count)
}

///
/// Transform every choice of a response document in place.
///
/// # Arguments
///  * `registry` - converter registry
///  * `body` - parsed response document
///  * `format` - converter fixed by the caller, or `None` to select by the
///    document's own `model` field
pub fn transform_response(
    registry: &ConverterRegistry,
    body: &mut Value,
    format: Option<ToolCallFormat>,
) -> TransformSummary {
    let format = format.unwrap_or_else(|| registry.select(registry.detect_model(body).unwrap_or_default()));
    let sanitizer = registry.sanitizer();

    let mut summary = TransformSummary::default();
    let Some(choices) = body.get_mut("choices").and_then(Value::as_array_mut) else {
        return summary;
    };
    for choice in choices.iter_mut() {
        match apply_to_choice(format, sanitizer, choice) {
            ChoiceOutcome::Untouched => {}
            ChoiceOutcome::Sanitized => summary.changed = true,
            ChoiceOutcome::ToolCalls(n) => {
                summary.changed = true;
                summary.tool_calls += n;
            }
        }
    }
    summary
}

///
/// Transform a raw response body.
///
/// Returns `None` when the body is not JSON or nothing changed, in which case
/// the caller must send the original bytes.
pub fn transform_json_bytes(
    registry: &ConverterRegistry,
    bytes: &[u8],
    format: Option<ToolCallFormat>,
) -> Option<(Vec<u8>, TransformSummary)> {
    let mut body: Value = match serde_json::from_slice(bytes) {
        Ok(body) => body,
        Err(e) => {
            tracing::debug!("Response body is not JSON, passing through: {}", e);
            return None;
        }
    };
    let summary = transform_response(registry, &mut body, format);
    if !summary.changed {
        return None;
    }
    serde_json::to_vec(&body).ok().map(|bytes| (bytes, summary))
}

/* --- tests ----------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_glm_message_converted_and_content_removed() {
        let registry = ConverterRegistry::default();
        let mut body = json!({
            "model": "glm-4.5",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": "<tool_call>f\n<arg_key>k</arg_key>\n<arg_value>v</arg_value>\n</tool_call>"
                },
                "finish_reason": "stop"
            }]
        });
        let summary = transform_response(&registry, &mut body, None);
        assert_eq!(summary, TransformSummary { changed: true, tool_calls: 1 });

        let choice = &body["choices"][0];
        assert!(choice["message"].get("content").is_none());
        assert_eq!(choice["message"]["tool_calls"][0]["function"]["arguments"], r#"{"k":"v"}"#);
        assert_eq!(choice["finish_reason"], "tool_calls");
    }

    #[test]
    fn test_marker_without_calls_only_sanitizes() {
        let mut choice = json!({"message": {"content": "<think></think>half <tool_call>"}, "finish_reason": "stop"});
        let outcome = apply_to_choice(ToolCallFormat::Glm, ContentSanitizer::default(), &mut choice);
        assert_eq!(outcome, ChoiceOutcome::Sanitized);
        assert_eq!(choice["message"]["content"], "half <tool_call>");
        assert_eq!(choice["finish_reason"], "stop");
        assert!(choice["message"].get("tool_calls").is_none());
    }

    #[test]
    fn test_openai_choice_untouched() {
        let mut choice = json!({"message": {"content": "<think></think>hi"}});
        let outcome = apply_to_choice(ToolCallFormat::OpenAi, ContentSanitizer::default(), &mut choice);
        assert_eq!(outcome, ChoiceOutcome::Untouched);
    }

    #[test]
    fn test_choice_without_content_untouched() {
        let mut choice = json!({"message": {"role": "assistant", "content": null}});
        let before = choice.clone();
        assert_eq!(apply_to_choice(ToolCallFormat::Glm, ContentSanitizer::default(), &mut choice), ChoiceOutcome::Untouched);
        assert_eq!(choice, before);
    }

    #[test]
    fn test_unchanged_body_yields_none() {
        let registry = ConverterRegistry::default();
        let raw = br#"{"model":"glm-4","choices":[{"message":{"content":"Hello"}}]}"#;
        assert!(transform_json_bytes(&registry, raw, None).is_none());
        assert!(transform_json_bytes(&registry, b"not json", None).is_none());
    }
}

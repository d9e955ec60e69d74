//! Conversion engine tests
//!
//! Properties that hold across every model family: registry ordering,
//! idempotent cleanup, think-span sanitizing and untouched marker-free
//! responses, plus the non-streaming end-to-end cases.

use callmux::converter::{ContentSanitizer, ConverterRegistry, ToolCallFormat, transform_json_bytes, transform_response};
use serde_json::{Value, json};

/// Markup samples for every family, with prose and think spans mixed in
const SAMPLES: &[&str] = &[
    "plain answer without any markup",
    "Let me look.\n<tool_call>get_weather<arg_key>city</arg_key><arg_value>Paris</arg_value></tool_call>",
    "[TOOL_REQUEST]{\"name\": \"search\", \"arguments\": {\"q\": \"rust\"}}[END_TOOL_REQUEST] done",
    "<tool_call>{\"name\": \"lookup\", \"arguments\": {\"id\": 7}}</tool_call>",
    "<tool_call>\n<function=run>\n<parameter=cmd>\nls -la\n</parameter>\n</function>\n</tool_call>",
    "before [TOOL_CALLS]read_file[ARGS]{\"path\": \"/tmp/x\"} after",
    "<invoke name=\"calc\"><parameter name=\"expr\">1+1</parameter></invoke>",
    "<think>planning</think>Answer <think> </think>here</think>",
    "<tool_call>unterminated<arg_key>a",
    "</function> stray </parameter> closers",
];

fn response(model: &str, content: Value) -> Value {
    json!({
        "id": "chatcmpl-1",
        "object": "chat.completion",
        "created": 1700000000,
        "model": model,
        "choices": [{
            "index": 0,
            "message": {"role": "assistant", "content": content},
            "finish_reason": "stop"
        }],
        "usage": {"prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15}
    })
}

#[test]
fn test_most_specific_family_wins() {
    let registry = ConverterRegistry::default();
    let cases = [
        ("qwen3-coder-30b-a3b", ToolCallFormat::Qwen3Coder),
        ("Qwen3_Coder-480B", ToolCallFormat::Qwen3Coder),
        ("qwen3-8b", ToolCallFormat::Qwen3),
        ("jan-nano-4b", ToolCallFormat::Qwen3),
        ("devstral-small-2505", ToolCallFormat::Devstral),
        ("GLM-4.5-Air", ToolCallFormat::Glm),
        ("zai-org/glm-4.6", ToolCallFormat::Glm),
        ("claude-3-5-sonnet", ToolCallFormat::Claude),
        ("gpt-4o-mini", ToolCallFormat::OpenAi),
        ("llama-3.1-8b", ToolCallFormat::Passthrough),
        ("", ToolCallFormat::Passthrough),
    ];
    for (model, expected) in cases {
        assert_eq!(registry.select(model), expected, "model {:?}", model);
    }
}

#[test]
fn test_every_selected_format_matches_its_model() {
    let registry = ConverterRegistry::default();
    for model in ["qwen3-coder", "qwen3", "devstral", "glm-4", "claude-opus", "gpt-5", "mistral"] {
        let format = registry.select(model);
        assert!(format.matches(model));
        // nothing earlier in the order claims the model
        let position = registry.formats().iter().position(|f| *f == format).unwrap();
        assert!(registry.formats()[..position].iter().all(|f| !f.matches(model)));
    }
}

#[test]
fn test_clean_content_idempotent_for_every_family() {
    for format in ToolCallFormat::ALL {
        for sample in SAMPLES {
            let once = format.clean_content(sample);
            assert_eq!(format.clean_content(&once), once, "{} on {:?}", format, sample);
        }
    }
}

#[test]
fn test_sanitize_never_leaves_empty_think_span() {
    let inputs = [
        "<think></think>",
        "a<think>\n\t </think>b",
        "<think><think></think></think>",
        "<think> <think>x</think> </think>",
        "</think>orphan<think>",
        "keep <think>reasoning</think> text",
    ];
    for remove in [true, false] {
        let sanitizer = ContentSanitizer::new(remove);
        for input in inputs {
            let out = sanitizer.sanitize(input);
            let compact: String = out.chars().filter(|c| !c.is_whitespace()).collect();
            assert!(!compact.contains("<think></think>"), "flag {} input {:?} -> {:?}", remove, input, out);
            assert_eq!(sanitizer.sanitize(&out), out);
        }
    }
}

#[test]
fn test_think_content_kept_when_flag_off() {
    let sanitizer = ContentSanitizer::new(false);
    assert_eq!(sanitizer.sanitize("keep <think>reasoning</think> text"), "keep <think>reasoning</think> text");
    assert_eq!(ContentSanitizer::new(true).sanitize("keep <think>reasoning</think> text"), "keep  text");
}

#[test]
fn test_response_without_markers_is_identical() {
    let registry = ConverterRegistry::default();
    for model in ["glm-4.5", "qwen3-8b", "devstral", "claude-3", "gpt-4o", "llama3"] {
        let original = response(model, json!("The capital of France is Paris."));
        let mut body = original.clone();
        let summary = transform_response(&registry, &mut body, None);
        assert!(!summary.changed);
        assert_eq!(body, original);

        let bytes = serde_json::to_vec(&original).unwrap();
        assert!(transform_json_bytes(&registry, &bytes, None).is_none());
    }
}

#[test]
fn test_non_streaming_glm_call() {
    let registry = ConverterRegistry::default();
    let mut body = response(
        "glm-4.5",
        json!("<tool_call>fetch_x<arg_key>q</arg_key><arg_value>v</arg_value></tool_call>"),
    );

    let summary = transform_response(&registry, &mut body, None);
    assert_eq!(summary.tool_calls, 1);

    let choice = &body["choices"][0];
    assert_eq!(choice["finish_reason"], "tool_calls");
    assert!(choice["message"].get("content").is_none(), "empty content must be omitted");
    let calls = choice["message"]["tool_calls"].as_array().unwrap();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["type"], "function");
    assert_eq!(calls[0]["function"]["name"], "fetch_x");
    assert_eq!(calls[0]["function"]["arguments"], "{\"q\":\"v\"}");
    assert!(calls[0]["id"].as_str().unwrap().starts_with("call_"));
    // unrelated fields survive
    assert_eq!(body["usage"]["total_tokens"], 15);
}

#[test]
fn test_field_order_preserved() {
    let registry = ConverterRegistry::default();
    let original = response("qwen3-32b", json!("<tool_call>{\"name\":\"f\",\"arguments\":{}}</tool_call>"));
    let bytes = serde_json::to_vec(&original).unwrap();

    let (converted, _) = transform_json_bytes(&registry, &bytes, None).unwrap();
    let body: Value = serde_json::from_slice(&converted).unwrap();
    let keys: Vec<&String> = body.as_object().unwrap().keys().collect();
    assert_eq!(keys, ["id", "object", "created", "model", "choices", "usage"]);
}

#[test]
fn test_devstral_invalid_arguments_become_string() {
    let calls = ToolCallFormat::Devstral.parse("[TOOL_CALLS]run[ARGS]not-json");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function.name, "run");
    assert_eq!(calls[0].function.arguments, "\"not-json\"");
}

#[test]
fn test_prose_kept_around_calls() {
    let registry = ConverterRegistry::default();
    let mut body = response(
        "devstral-medium",
        json!("I'll read it. [TOOL_CALLS]read_file[ARGS]{\"path\":\"a.txt\"}"),
    );
    transform_response(&registry, &mut body, None);

    let message = &body["choices"][0]["message"];
    assert_eq!(message["content"], "I'll read it.");
    assert_eq!(message["tool_calls"][0]["function"]["arguments"], "{\"path\":\"a.txt\"}");
}

#[test]
fn test_multiple_calls_in_document_order_with_distinct_ids() {
    let content = "<tool_call>a<arg_key>x</arg_key><arg_value>1</arg_value></tool_call>\
                   [TOOL_REQUEST]{\"name\":\"b\",\"arguments\":{}}[END_TOOL_REQUEST]\
                   <tool_call>a<arg_key>x</arg_key><arg_value>2</arg_value></tool_call>";
    let calls = ToolCallFormat::Glm.parse(content);

    let names: Vec<&str> = calls.iter().map(|c| c.function.name.as_str()).collect();
    assert_eq!(names, ["a", "b", "a"]);
    assert_ne!(calls[0].id, calls[2].id);
    // ids are stable across parses
    assert_eq!(ToolCallFormat::Glm.parse(content)[1].id, calls[1].id);
}

#[test]
fn test_openai_response_left_alone() {
    let registry = ConverterRegistry::default();
    let original = response("gpt-4o", json!("<tool_call>x<arg_key>a</arg_key><arg_value>b</arg_value></tool_call>"));
    let mut body = original.clone();
    transform_response(&registry, &mut body, None);
    assert_eq!(body, original);
}

#[test]
fn test_non_json_body_passes_through() {
    let registry = ConverterRegistry::default();
    assert!(transform_json_bytes(&registry, b"<html>bad gateway</html>", None).is_none());
}

#[test]
fn test_fixed_format_overrides_model() {
    let registry = ConverterRegistry::default();
    let mut body = response("my-finetune", json!("<tool_call>{\"name\":\"f\",\"arguments\":{\"k\":1}}</tool_call>"));
    let summary = transform_response(&registry, &mut body, Some(ToolCallFormat::Qwen3));
    assert_eq!(summary.tool_calls, 1);
    assert_eq!(body["choices"][0]["message"]["tool_calls"][0]["function"]["arguments"], "{\"k\":1}");
}

#[test]
fn test_unknown_model_still_sanitized() {
    let registry = ConverterRegistry::default();
    let mut body = response("llama-3.1-8b", json!("<think></think>Hello"));

    let summary = transform_response(&registry, &mut body, None);
    assert!(summary.changed);
    assert_eq!(summary.tool_calls, 0);
    assert_eq!(body["choices"][0]["message"]["content"], "Hello");
    assert_eq!(body["choices"][0]["finish_reason"], "stop");
}

#[test]
fn test_glm_nameless_request_kept_with_raw_arguments() {
    let calls = ToolCallFormat::Glm.parse("[TOOL_REQUEST]{broken payload[END_TOOL_REQUEST]");
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].function.name, "");
    assert_eq!(calls[0].function.arguments, "\"{broken payload\"");
}

//!
//! Streaming tool-call state machine.
//!
//! One [`StreamingToolCallHandler`] is owned by one streaming request and sees
//! its chunks strictly in arrival order. Plain text is forwarded untouched.
//! Once a family marker shows up, content is held back until the markup is
//! complete, then a single chunk carrying the standard `tool_calls` replaces
//! everything that was held back.
//!
//! ```text
//! Idle ──marker──▶ Accumulating ──complete──▶ Emitted ──▶ Closed
//!   │                                  │
//!   └──no markup family──▶ Passthrough ◀┘ (complete but nothing parsed)
//! ```
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::Arc;

use serde_json::{Value, json};

use super::format::ToolCallFormat;
use super::registry::ConverterRegistry;
use super::tool_call::ToolCall;

/* --- types ----------------------------------------------------------------------------------- */

/// Lifecycle of one stream
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamPhase {
    /// no marker seen yet, content is forwarded
    Idle,
    /// conversion ruled out for this stream
    Passthrough,
    /// marker seen, markup incomplete, content held back
    Accumulating,
    /// tool calls sent, waiting for the terminal chunk
    Emitted,
    /// terminal chunk sent, everything else is dropped
    Closed,
}

/// What to send downstream for one upstream chunk
#[derive(Debug, Clone, PartialEq)]
pub enum ChunkAction {
    /// send the upstream chunk unchanged
    Forward,
    /// send nothing
    Suppress,
    /// send this chunk instead
    Replace(Value),
}

///
/// Per-stream converter state.
#[derive(Debug)]
pub struct StreamingToolCallHandler {
    /** shared registry, used to bind the converter on the first content chunk */
    registry: Arc<ConverterRegistry>,
    /** converter bound to this stream */
    format: Option<ToolCallFormat>,
    phase: StreamPhase,
    /** content not yet known to be free of markup */
    buffer: String,
    /** prefix of `buffer` that has already been sent to the client */
    forwarded: usize,
    tool_call_detected: bool,
    tool_call_complete: bool,
    /** number of tool calls emitted */
    tool_calls: usize,
    /** completion id seen on upstream chunks */
    id: Option<String>,
    /** model seen on upstream chunks, also used for late binding */
    model: Option<String>,
    /** creation timestamp seen on upstream chunks */
    created: Option<Value>,
}

/* --- constants ------------------------------------------------------------------------------ */

/** bytes kept after forwarding so markers split across chunks are still found */
const MARKER_LOOKBEHIND: usize = 32;

const CHUNK_OBJECT: &str = "chat.completion.chunk";

/* --- start of code -------------------------------------------------------------------------- */

impl StreamingToolCallHandler {
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self {
            registry,
            format: None,
            phase: StreamPhase::Idle,
            buffer: String::new(),
            forwarded: 0,
            tool_call_detected: false,
            tool_call_complete: false,
            tool_calls: 0,
            id: None,
            model: None,
            created: None,
        }
    }

    pub fn phase(&self) -> StreamPhase {
        self.phase
    }

    pub fn format(&self) -> Option<ToolCallFormat> {
        self.format
    }

    pub fn tool_call_detected(&self) -> bool {
        self.tool_call_detected
    }

    pub fn tool_call_complete(&self) -> bool {
        self.tool_call_complete
    }

    pub fn tool_calls_emitted(&self) -> usize {
        self.tool_calls
    }

    ///
    /// Feed one parsed upstream chunk.
    ///
    /// Chunks without `choices` (usage reports and the like) are always forwarded
    /// while the stream is open.
    pub fn process_chunk(&mut self, chunk: &Value) -> ChunkAction {
        self.remember_metadata(chunk);

        if self.phase == StreamPhase::Closed {
            return ChunkAction::Suppress;
        }

        let Some(choice) = chunk.get("choices").and_then(Value::as_array).and_then(|c| c.first()) else {
            return ChunkAction::Forward;
        };

        match choice.pointer("/delta/content").and_then(Value::as_str).filter(|c| !c.is_empty()) {
            Some(content) => self.on_content(content),
            None => self.on_control(),
        }
    }

    ///
    /// End of stream (`[DONE]` or transport EOF).
    ///
    /// Returns the terminal chunk still owed to the client, if any. Markup that
    /// never completed is discarded.
    pub fn finalize(&mut self) -> Option<Value> {
        let owed = matches!(self.phase, StreamPhase::Accumulating | StreamPhase::Emitted);
        if self.phase == StreamPhase::Accumulating {
            tracing::debug!("Stream ended with incomplete tool call markup, discarding {} bytes", self.buffer.len());
        }
        self.phase = StreamPhase::Closed;
        self.buffer.clear();
        owed.then(|| self.terminal_chunk())
    }

    fn on_control(&mut self) -> ChunkAction {
        if self.phase == StreamPhase::Emitted {
            self.phase = StreamPhase::Closed;
            return ChunkAction::Replace(self.terminal_chunk());
        }
        ChunkAction::Forward
    }

    fn on_content(&mut self, content: &str) -> ChunkAction {
        match self.phase {
            StreamPhase::Passthrough => ChunkAction::Forward,
            StreamPhase::Emitted | StreamPhase::Closed => ChunkAction::Suppress,
            StreamPhase::Accumulating => {
                self.buffer.push_str(content);
                match self.format {
                    Some(format) if format.is_complete(&self.buffer) => self.emit(format),
                    _ => ChunkAction::Suppress,
                }
            }
            StreamPhase::Idle => {
                let format = self.bind_format();
                if !format.emits_markup() {
                    self.phase = StreamPhase::Passthrough;
                    return ChunkAction::Forward;
                }

                self.buffer.push_str(content);
                if !format.has_partial_marker(&self.buffer) {
                    self.keep_lookbehind();
                    return ChunkAction::Forward;
                }

                self.tool_call_detected = true;
                if format.is_complete(&self.buffer) {
                    self.emit(format)
                } else {
                    tracing::debug!("Detected {} tool call markup, buffering", format);
                    self.phase = StreamPhase::Accumulating;
                    ChunkAction::Suppress
                }
            }
        }
    }

    fn bind_format(&mut self) -> ToolCallFormat {
        if let Some(format) = self.format {
            return format;
        }
        let format = self.registry.select(self.model.as_deref().unwrap_or_default());
        self.format = Some(format);
        format
    }

    /// Everything in the buffer was forwarded; keep only a short tail.
    fn keep_lookbehind(&mut self) {
        if self.buffer.len() > MARKER_LOOKBEHIND {
            let mut cut = self.buffer.len() - MARKER_LOOKBEHIND;
            while !self.buffer.is_char_boundary(cut) {
                cut += 1;
            }
            self.buffer.drain(..cut);
        }
        self.forwarded = self.buffer.len();
    }

    fn emit(&mut self, format: ToolCallFormat) -> ChunkAction {
        self.tool_call_complete = true;

        let start = format.marker_offset(&self.buffer).map_or(self.forwarded, |m| m.min(self.forwarded));
        let region = self.buffer[start..].to_string();
        let calls = format.parse(&region);
        let sanitizer = self.registry.sanitizer();

        if calls.is_empty() {
            // complete markup that yields nothing goes out as text
            let held_back = sanitizer.sanitize(&self.buffer[self.forwarded..]);
            tracing::debug!("{} markup produced no tool calls, flushing {} bytes", format, held_back.len());
            self.phase = StreamPhase::Passthrough;
            self.buffer.clear();
            self.forwarded = 0;
            if held_back.is_empty() {
                return ChunkAction::Suppress;
            }
            return ChunkAction::Replace(self.content_chunk(&held_back));
        }

        let remainder = sanitizer.sanitize(&format.clean_content(&region)).trim().to_string();
        tracing::debug!("Emitting {} {} tool call(s) on stream", calls.len(), format);
        self.tool_calls = calls.len();
        self.phase = StreamPhase::Emitted;
        self.buffer.clear();
        self.forwarded = 0;
        ChunkAction::Replace(self.tool_call_chunk(&remainder, &calls))
    }

    fn remember_metadata(&mut self, chunk: &Value) {
        if let Some(id) = chunk.get("id").and_then(Value::as_str) {
            self.id.get_or_insert_with(|| id.to_string());
        }
        if let Some(model) = chunk.get("model").and_then(Value::as_str).filter(|m| !m.is_empty()) {
            self.model.get_or_insert_with(|| model.to_string());
        }
        if let Some(created) = chunk.get("created").filter(|c| c.is_number()) {
            self.created.get_or_insert_with(|| created.clone());
        }
    }

    fn chunk_with_choice(&self, delta: Value, finish_reason: Value) -> Value {
        let created = self.created.clone().unwrap_or_else(|| Value::from(chrono::Utc::now().timestamp()));
        json!({
            "id": self.id.clone().unwrap_or_else(|| format!("chatcmpl-{}", created)),
            "object": CHUNK_OBJECT,
            "created": created,
            "model": self.model.clone().unwrap_or_default(),
            "choices": [{
                "index": 0,
                "delta": delta,
                "finish_reason": finish_reason,
            }],
        })
    }

    fn tool_call_chunk(&self, remainder: &str, calls: &[ToolCall]) -> Value {
        let tool_calls: Vec<Value> = calls
            .iter()
            .enumerate()
            .map(|(index, call)| {
                json!({
                    "index": index,
                    "id": call.id,
                    "type": call.kind,
                    "function": {
                        "name": call.function.name,
                        "arguments": call.function.arguments,
                    },
                })
            })
            .collect();
        let content = if remainder.is_empty() { Value::Null } else { Value::from(remainder) };
        self.chunk_with_choice(
            json!({"role": "assistant", "content": content, "tool_calls": tool_calls}),
            Value::from("tool_calls"),
        )
    }

    fn content_chunk(&self, content: &str) -> Value {
        self.chunk_with_choice(json!({"content": content}), Value::Null)
    }

    fn terminal_chunk(&self) -> Value {
        self.chunk_with_choice(json!({}), Value::from("stop"))
    }
}

/* --- tests ----------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    fn handler() -> StreamingToolCallHandler {
        StreamingToolCallHandler::new(Arc::new(ConverterRegistry::default()))
    }

    fn content(model: &str, text: &str) -> Value {
        json!({
            "id": "chatcmpl-1",
            "created": 1700000000,
            "model": model,
            "choices": [{"index": 0, "delta": {"content": text}, "finish_reason": null}]
        })
    }

    fn finish(reason: &str) -> Value {
        json!({"id": "chatcmpl-1", "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]})
    }

    #[test]
    fn test_plain_stream_forwards_everything() {
        let mut h = handler();
        assert_eq!(h.process_chunk(&content("glm-4.5", "Hello ")), ChunkAction::Forward);
        assert_eq!(h.process_chunk(&content("glm-4.5", "world")), ChunkAction::Forward);
        assert_eq!(h.process_chunk(&finish("stop")), ChunkAction::Forward);
        assert_eq!(h.finalize(), None);
        assert!(!h.tool_call_detected());
    }

    #[test]
    fn test_split_tool_call_emitted_once_complete() {
        let mut h = handler();
        assert_eq!(h.process_chunk(&content("glm-4.5", "Let me check. ")), ChunkAction::Forward);
        assert_eq!(h.process_chunk(&content("glm-4.5", "<tool_call>fetch")), ChunkAction::Suppress);
        assert_eq!(h.phase(), StreamPhase::Accumulating);
        assert_eq!(
            h.process_chunk(&content("glm-4.5", "<arg_key>q</arg_key><arg_value>v</arg_value>")),
            ChunkAction::Suppress
        );

        let ChunkAction::Replace(chunk) = h.process_chunk(&content("glm-4.5", "</tool_call>")) else {
            panic!("expected a tool call chunk");
        };
        let choice = &chunk["choices"][0];
        assert_eq!(choice["finish_reason"], "tool_calls");
        assert_eq!(choice["delta"]["content"], Value::Null);
        assert_eq!(choice["delta"]["tool_calls"][0]["index"], 0);
        assert_eq!(choice["delta"]["tool_calls"][0]["function"]["name"], "fetch");
        assert_eq!(choice["delta"]["tool_calls"][0]["function"]["arguments"], r#"{"q":"v"}"#);
        assert_eq!(chunk["id"], "chatcmpl-1");
        assert_eq!(chunk["created"], 1700000000);
        assert!(h.tool_call_complete());

        assert_eq!(h.process_chunk(&content("glm-4.5", "trailing text")), ChunkAction::Suppress);

        let ChunkAction::Replace(terminal) = h.process_chunk(&finish("stop")) else {
            panic!("expected a terminal chunk");
        };
        assert_eq!(terminal["choices"][0]["finish_reason"], "stop");
        assert_eq!(terminal["choices"][0]["delta"], json!({}));
        assert_eq!(h.phase(), StreamPhase::Closed);
        assert_eq!(h.process_chunk(&finish("stop")), ChunkAction::Suppress);
        assert_eq!(h.finalize(), None);
    }

    #[test]
    fn test_unforwarded_prose_kept_in_tool_call_chunk() {
        let mut h = handler();
        let action = h.process_chunk(&content(
            "qwen3-8b",
            "On it. <tool_call>{\"name\": \"now\", \"arguments\": {}}</tool_call>",
        ));
        let ChunkAction::Replace(chunk) = action else { panic!("expected a tool call chunk") };
        assert_eq!(chunk["choices"][0]["delta"]["content"], "On it.");
    }

    #[test]
    fn test_marker_split_across_chunks_detected() {
        let mut h = handler();
        assert_eq!(h.process_chunk(&content("glm-4", "Looking <tool_")), ChunkAction::Forward);
        assert_eq!(h.process_chunk(&content("glm-4", "call>search")), ChunkAction::Suppress);
        assert!(h.tool_call_detected());
    }

    #[test]
    fn test_truncated_markup_finalizes_with_stop() {
        let mut h = handler();
        assert_eq!(h.process_chunk(&content("glm-4", "<tool_call>fetch_x")), ChunkAction::Suppress);
        let terminal = h.finalize().expect("terminal chunk owed");
        assert_eq!(terminal["choices"][0]["finish_reason"], "stop");
        assert_eq!(terminal["choices"][0]["delta"], json!({}));
        assert_eq!(h.finalize(), None);
    }

    #[test]
    fn test_model_remembered_from_role_chunk() {
        let mut h = handler();
        let role = json!({"model": "devstral-small", "choices": [{"index": 0, "delta": {"role": "assistant"}}]});
        assert_eq!(h.process_chunk(&role), ChunkAction::Forward);
        let bare = json!({"choices": [{"index": 0, "delta": {"content": "[TOOL_CALLS]ls[ARGS]{}"}}]});
        assert!(matches!(h.process_chunk(&bare), ChunkAction::Replace(_)));
        assert_eq!(h.format(), Some(ToolCallFormat::Devstral));
    }

    #[test]
    fn test_openai_model_never_buffers() {
        let mut h = handler();
        assert_eq!(h.process_chunk(&content("gpt-4o", "<tool_call>x")), ChunkAction::Forward);
        assert_eq!(h.phase(), StreamPhase::Passthrough);
    }

    #[test]
    fn test_complete_markup_without_calls_flushed_as_text() {
        let mut h = handler();
        let action = h.process_chunk(&content("qwen3-coder-30b", "see <tool_call>nothing</tool_call>"));
        let ChunkAction::Replace(chunk) = action else { panic!("expected flushed text") };
        assert_eq!(chunk["choices"][0]["delta"]["content"], "see <tool_call>nothing</tool_call>");
        assert_eq!(chunk["choices"][0]["finish_reason"], Value::Null);
        assert_eq!(h.phase(), StreamPhase::Passthrough);
        assert_eq!(h.process_chunk(&content("qwen3-coder-30b", "<tool_call>")), ChunkAction::Forward);
    }

    #[test]
    fn test_chunk_without_choices_forwarded() {
        let mut h = handler();
        let usage = json!({"usage": {"total_tokens": 3}, "choices": []});
        assert_eq!(h.process_chunk(&usage), ChunkAction::Forward);
    }
}

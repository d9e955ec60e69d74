//!
//! Server-sent events framing for proxied chat completion streams.
//!
//! Upstream bytes are split into lines, each line is decoded and classified,
//! and `data:` payloads run through the streaming tool-call state machine.
//! Output is already framed text ready to be written to the client.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::sync::Arc;

use serde_json::Value;

use crate::converter::{ChunkAction, ConverterRegistry, StreamingToolCallHandler};

/* --- types ----------------------------------------------------------------------------------- */

///
/// One decoded upstream line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SseLine<'a> {
    /// keep-alive separator
    Blank,
    /// `data: [DONE]`
    Done,
    /// payload of a `data:` line
    Data(&'a str),
    /// comments, `event:`, `id:` and anything else
    Other,
}

///
/// Per-request SSE processor.
///
/// Created in passthrough mode when conversion is disabled; framing is the
/// same in both modes.
#[derive(Debug)]
pub struct SseStreamProcessor {
    /** state machine, absent in passthrough mode */
    handler: Option<StreamingToolCallHandler>,
    /** the `[DONE]` sentinel was written */
    finished: bool,
}

///
/// Incremental splitter from transport chunks to lines.
#[derive(Debug, Default)]
pub struct LineSplitter {
    /** bytes after the last newline */
    pending: Vec<u8>,
}

/* --- constants ------------------------------------------------------------------------------ */

const DATA_PREFIX: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const DONE_FRAME: &str = "data: [DONE]\n\n";

/* --- start of code -------------------------------------------------------------------------- */

///
/// Decode one line as UTF-8, falling back to Latin-1.
///
/// The fallback maps every byte to the code point of the same value, so it
/// cannot fail.
pub fn decode_line(bytes: &[u8]) -> String {
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            tracing::debug!("Upstream line is not valid UTF-8, decoding as Latin-1");
            bytes.iter().map(|&b| char::from(b)).collect()
        }
    }
}

pub fn classify_line(line: &str) -> SseLine<'_> {
    if line.trim().is_empty() {
        return SseLine::Blank;
    }
    let Some(payload) = line.strip_prefix(DATA_PREFIX) else {
        return SseLine::Other;
    };
    let payload = payload.strip_prefix(' ').unwrap_or(payload);
    if payload.trim() == DONE_SENTINEL { SseLine::Done } else { SseLine::Data(payload) }
}

/// Frame a JSON value as one SSE event
pub fn data_frame(value: &Value) -> String {
    format!("data: {}\n\n", value)
}

impl SseStreamProcessor {
    pub fn new(registry: Arc<ConverterRegistry>) -> Self {
        Self { handler: Some(StreamingToolCallHandler::new(registry)), finished: false }
    }

    pub fn passthrough() -> Self {
        Self { handler: None, finished: false }
    }

    pub fn is_finished(&self) -> bool {
        self.finished
    }

    pub fn tool_calls_emitted(&self) -> usize {
        self.handler.as_ref().map_or(0, StreamingToolCallHandler::tool_calls_emitted)
    }

    ///
    /// Process one upstream line (without its line terminator).
    ///
    /// # Returns
    ///  * framed output to write, possibly empty; nothing after `[DONE]`
    pub fn process_line(&mut self, line: &[u8]) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        let text = decode_line(line);
        match classify_line(&text) {
            SseLine::Blank => vec!["\n".to_string()],
            SseLine::Other => vec![format!("{}\n\n", text)],
            SseLine::Done => {
                let mut out = self.finalize_frames();
                out.push(DONE_FRAME.to_string());
                self.finished = true;
                out
            }
            SseLine::Data(payload) => {
                let Some(handler) = self.handler.as_mut() else {
                    return vec![format!("{}\n\n", text)];
                };
                let chunk: Value = match serde_json::from_str(payload) {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        tracing::debug!("Passing through non-JSON data line: {}", e);
                        return vec![format!("{}\n\n", text)];
                    }
                };
                match handler.process_chunk(&chunk) {
                    ChunkAction::Forward => vec![format!("{}\n\n", text)],
                    ChunkAction::Suppress => Vec::new(),
                    ChunkAction::Replace(replacement) => vec![data_frame(&replacement)],
                }
            }
        }
    }

    ///
    /// Upstream closed without `[DONE]`.
    ///
    /// Emits any terminal chunk still owed; no sentinel is invented.
    pub fn finish(&mut self) -> Vec<String> {
        if self.finished {
            return Vec::new();
        }
        self.finished = true;
        self.finalize_frames()
    }

    fn finalize_frames(&mut self) -> Vec<String> {
        self.handler
            .as_mut()
            .and_then(StreamingToolCallHandler::finalize)
            .map(|chunk| data_frame(&chunk))
            .into_iter()
            .collect()
    }
}

impl LineSplitter {
    pub fn new() -> Self {
        Self::default()
    }

    ///
    /// Feed a transport chunk, returning every line it completes.
    ///
    /// Lines are split on `\n`; a trailing `\r` is removed.
    pub fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);
        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Remaining partial line at end of input
    pub fn finish(&mut self) -> Option<Vec<u8>> {
        let mut rest = std::mem::take(&mut self.pending);
        if rest.last() == Some(&b'\r') {
            rest.pop();
        }
        (!rest.is_empty()).then_some(rest)
    }
}

/* --- tests ----------------------------------------------------------------------------------- */

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_line() {
        assert_eq!(classify_line(""), SseLine::Blank);
        assert_eq!(classify_line("data: [DONE]"), SseLine::Done);
        assert_eq!(classify_line("data:[DONE]"), SseLine::Done);
        assert_eq!(classify_line("data: {\"a\":1}"), SseLine::Data("{\"a\":1}"));
        assert_eq!(classify_line(": keep-alive"), SseLine::Other);
        assert_eq!(classify_line("event: message"), SseLine::Other);
    }

    #[test]
    fn test_decode_line_falls_back_to_latin1() {
        assert_eq!(decode_line("zażółć".as_bytes()), "zażółć");
        assert_eq!(decode_line(&[b'c', b'a', b'f', 0xE9]), "café");
    }

    #[test]
    fn test_framing_of_non_data_lines() {
        let mut processor = SseStreamProcessor::new(Arc::new(ConverterRegistry::default()));
        assert_eq!(processor.process_line(b""), vec!["\n"]);
        assert_eq!(processor.process_line(b": ping"), vec![": ping\n\n"]);
        assert_eq!(processor.process_line(b"data: not json"), vec!["data: not json\n\n"]);
    }

    #[test]
    fn test_nothing_after_done() {
        let mut processor = SseStreamProcessor::passthrough();
        assert_eq!(processor.process_line(b"data: [DONE]"), vec![DONE_FRAME]);
        assert!(processor.is_finished());
        assert!(processor.process_line(b"data: {}").is_empty());
        assert!(processor.finish().is_empty());
    }

    #[test]
    fn test_line_splitter_handles_partial_lines_and_crlf() {
        let mut splitter = LineSplitter::new();
        assert!(splitter.push(b"data: {\"a\"").is_empty());
        assert_eq!(splitter.push(b":1}\r\n\r\ndata: x"), vec![b"data: {\"a\":1}".to_vec(), Vec::new()]);
        assert_eq!(splitter.finish(), Some(b"data: x".to_vec()));
        assert_eq!(splitter.finish(), None);
    }
}

//!
//! Tool-call conversion engine.
//!
//! Rewrites model-specific tool-call markup (GLM, Qwen3, Qwen3-Coder, Devstral,
//! Claude-style XML) into the standard OpenAI `tool_calls` field. Each family
//! grammar is a pure function from content to raw `(name, arguments)` pairs;
//! [`ToolCallFormat`] puts them behind one interface, [`ConverterRegistry`]
//! picks the format for a model, and the response and streaming modules apply
//! it to whole documents and to SSE chunk sequences.
//!
//! Nothing in this module returns an error. Malformed markup degrades to
//! passthrough.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- modules --------------------------------------------------------------------------------- */

pub mod claude;
pub mod devstral;
pub mod format;
pub mod glm;
mod markup;
pub mod qwen3;
pub mod qwen3_coder;
pub mod registry;
pub mod response;
pub mod sanitizer;
pub mod streaming;
pub mod tool_call;

/* --- start of code -------------------------------------------------------------------------- */

pub use format::ToolCallFormat;
pub use registry::ConverterRegistry;
pub use response::{TransformSummary, transform_json_bytes, transform_response};
pub use sanitizer::ContentSanitizer;
pub use streaming::{ChunkAction, StreamPhase, StreamingToolCallHandler};
pub use tool_call::{FunctionCall, RawToolCall, ToolCall};

//!
//! HTTP server implementation for the tool-call conversion proxy.
//!
//! Every route forwards to the configured OpenAI-compatible backend. Chat
//! completion responses go through the conversion engine: whole JSON bodies
//! through the response transformer, SSE streams through the stream
//! processor, fed by a producer task over a bounded channel.
//!
//! Authors:
//!   Jaro <yarenty@gmail.com>
//!
//! Copyright (c) 2026 SkyCorp

/* --- uses ------------------------------------------------------------------------------------ */

use std::convert::Infallible;
use std::fmt::Display;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Json;
use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri, header};
use axum::response::{IntoResponse, Response};
use bytes::Bytes;
use futures::Stream;
use reqwest::Client;
use serde_json::{Value, json};
use tokio::sync::mpsc;
use tokio_stream::StreamExt;
use tokio_stream::wrappers::ReceiverStream;

use crate::config::Config;
use crate::converter::{ContentSanitizer, ConverterRegistry, transform_json_bytes};
use crate::error::{ProxyError, Result};
use crate::sse::{LineSplitter, SseStreamProcessor};

/* --- types ----------------------------------------------------------------------------------- */

///
/// Application state shared by all handlers.
///
/// The registry is built once here and handed to every request by reference
/// counting; per-stream state lives in the request's own task.
pub struct AppState {
    /** application configuration */
    pub config: Config,
    /** converter registry, shared read-only */
    pub registry: Arc<ConverterRegistry>,
    /** HTTP client for backend requests */
    pub http_client: Client,
    /** metrics for monitoring */
    pub metrics: AppMetrics,
}

///
/// Application metrics reported by `/health`.
#[derive(Debug, Default)]
pub struct AppMetrics {
    /** total number of requests forwarded */
    pub total_requests: AtomicU64,
    /** requests answered as SSE streams */
    pub streaming_requests: AtomicU64,
    /** responses in which tool calls were synthesized */
    pub converted_responses: AtomicU64,
    /** requests that failed before the backend answered */
    pub failed_requests: AtomicU64,
}

///
/// One request on its way to the backend.
struct ForwardRequest {
    /** request method */
    method: Method,
    /** backend path including the query string */
    path_and_query: String,
    /** client headers, filtered before sending */
    headers: HeaderMap,
    /** raw request body */
    body: Bytes,
}

/// What the proxy does to the backend's answer
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ResponseMode {
    /** mirror the response, no conversion */
    Plain,
    /** mirror the response, streaming honoured, no conversion */
    PlainStreaming,
    /** tool-call conversion on JSON bodies and SSE streams */
    Convert,
}

/* --- constants ------------------------------------------------------------------------------ */

/** Channel buffer size for streaming responses */
const STREAMING_CHANNEL_BUFFER: usize = 100;

/** Connect timeout for backend connections */
const CONNECT_TIMEOUT_SECS: u64 = 10;

/** Request headers never forwarded to the backend */
static SKIPPED_REQUEST_HEADERS: [HeaderName; 4] =
    [header::HOST, header::CONTENT_LENGTH, header::ACCEPT_ENCODING, header::CONNECTION];

/** Response headers never mirrored back to the client */
static SKIPPED_RESPONSE_HEADERS: [HeaderName; 2] = [header::CONTENT_LENGTH, header::CONNECTION];

/** Hop-by-hop headers (RFC 9110 section 7.6.1) */
const HOP_BY_HOP_HEADERS: [&str; 6] =
    ["keep-alive", "proxy-authenticate", "proxy-authorization", "te", "trailer", "transfer-encoding"];

const EVENT_STREAM: &str = "text/event-stream";

/* --- start of code -------------------------------------------------------------------------- */

impl AppState {
    ///
    /// Create new application state.
    ///
    /// # Arguments
    ///  * `config` - application configuration
    ///
    /// # Returns
    ///  * Application state with the registry and HTTP client
    ///  * `ProxyError::Http` if the client cannot be built
    pub fn new(config: Config) -> Result<Self> {
        let sanitizer = ContentSanitizer::new(config.conversion.remove_think_tags);
        let registry = Arc::new(ConverterRegistry::new(sanitizer));
        let http_client = Self::create_http_client()?;

        Ok(Self { config, registry, http_client, metrics: AppMetrics::default() })
    }

    ///
    /// Create HTTP client.
    ///
    /// Total timeouts are set per request since streaming and non-streaming
    /// requests use different ceilings.
    fn create_http_client() -> Result<Client> {
        Client::builder()
            .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECS))
            .build()
            .map_err(|e| ProxyError::Http(format!("Failed to create HTTP client: {}", e)))
    }

    fn conversion_mode(&self) -> ResponseMode {
        if self.config.conversion.enabled { ResponseMode::Convert } else { ResponseMode::PlainStreaming }
    }
}

impl AppMetrics {
    fn increment(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> Value {
        json!({
            "total_requests": self.total_requests.load(Ordering::Relaxed),
            "streaming_requests": self.streaming_requests.load(Ordering::Relaxed),
            "converted_responses": self.converted_responses.load(Ordering::Relaxed),
            "failed_requests": self.failed_requests.load(Ordering::Relaxed),
        })
    }
}

///
/// Handle `POST /v1/chat/completions` and `POST /chat/completions`.
///
/// Forwarded to the backend's `/v1/chat/completions`; tool-call markup in the
/// answer is converted when conversion is enabled.
pub async fn chat_completions(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    log_incoming_request("chat/completions", &body);
    let mode = state.conversion_mode();
    let request = ForwardRequest::new(Method::POST, upstream_path("/v1/chat/completions", &uri), headers, body);
    forward(state, request, mode).await
}

/// Handle `POST /v1/completions` (no conversion, streaming honoured)
pub async fn completions(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    log_incoming_request("completions", &body);
    let request = ForwardRequest::new(Method::POST, upstream_path("/v1/completions", &uri), headers, body);
    forward(state, request, ResponseMode::PlainStreaming).await
}

pub async fn embeddings(
    State(state): State<Arc<AppState>>,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let request = ForwardRequest::new(Method::POST, upstream_path("/v1/embeddings", &uri), headers, body);
    forward(state, request, ResponseMode::Plain).await
}

/// Handle `GET /v1/models` by asking the backend
pub async fn models(State(state): State<Arc<AppState>>, uri: Uri, headers: HeaderMap) -> Response {
    let request = ForwardRequest::new(Method::GET, upstream_path("/v1/models", &uri), headers, Bytes::new());
    forward(state, request, ResponseMode::Plain).await
}

///
/// Transparent passthrough for every other path and method.
pub async fn passthrough(
    State(state): State<Arc<AppState>>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let path_and_query = uri.path_and_query().map_or_else(|| uri.path().to_string(), |pq| pq.as_str().to_string());
    tracing::debug!("Passthrough {} {}", method, path_and_query);
    let request = ForwardRequest::new(method, path_and_query, headers, body);
    forward(state, request, ResponseMode::Plain).await
}

///
/// Handle health check endpoint.
///
/// Answered locally; the backend is not contacted.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    Json(json!({
        "status": "healthy",
        "service": "callmux",
        "backend": state.config.backend.backend_url(),
        "conversion_enabled": state.config.conversion.enabled,
        "metrics": state.metrics.snapshot(),
    }))
}

impl ForwardRequest {
    fn new(method: Method, path_and_query: String, headers: HeaderMap, body: Bytes) -> Self {
        Self { method, path_and_query, headers, body }
    }

    /// Streaming is requested through the body's `"stream"` flag
    fn wants_stream(&self) -> bool {
        serde_json::from_slice::<Value>(&self.body)
            .ok()
            .and_then(|body| body.get("stream").and_then(Value::as_bool))
            .unwrap_or(false)
    }
}

///
/// Forward a request and shape the backend's answer per `mode`.
///
/// Failures are turned into an OpenAI-style error body here, so the handlers
/// always return a response.
async fn forward(state: Arc<AppState>, request: ForwardRequest, mode: ResponseMode) -> Response {
    AppMetrics::increment(&state.metrics.total_requests);
    let stream = mode != ResponseMode::Plain && request.wants_stream();

    let result = if stream {
        forward_streaming(state.clone(), request, mode).await
    } else {
        forward_regular(&state, request, mode).await
    };

    result.unwrap_or_else(|e| {
        AppMetrics::increment(&state.metrics.failed_requests);
        tracing::error!("Proxy error: {}", e);
        create_error_response(&e)
    })
}

fn build_backend_request(state: &AppState, request: ForwardRequest) -> reqwest::RequestBuilder {
    let url = format!("{}{}", state.config.backend.backend_url(), request.path_and_query);
    tracing::debug!("Forwarding {} {}", request.method, url);
    state
        .http_client
        .request(request.method, url)
        .headers(filter_headers(&request.headers, &SKIPPED_REQUEST_HEADERS))
        .body(request.body)
}

///
/// Non-streaming request: one total timeout, the body read whole.
async fn forward_regular(state: &AppState, request: ForwardRequest, mode: ResponseMode) -> Result<Response> {
    let timeout = state.config.backend.request_timeout();
    let response = build_backend_request(state, request)
        .timeout(timeout)
        .send()
        .await
        .map_err(|e| map_request_error(e, timeout))?;

    let status = response.status();
    let headers = response.headers().clone();
    let body = response.bytes().await.map_err(|e| map_request_error(e, timeout))?;

    let body = match mode {
        ResponseMode::Convert => convert_body(state, body),
        ResponseMode::Plain | ResponseMode::PlainStreaming => body,
    };

    Ok(mirror_response(status, &headers, Body::from(body)))
}

fn convert_body(state: &AppState, body: Bytes) -> Bytes {
    match transform_json_bytes(&state.registry, &body, None) {
        Some((converted, summary)) => {
            if summary.tool_calls > 0 {
                AppMetrics::increment(&state.metrics.converted_responses);
                tracing::info!("Converted {} tool call(s) in response", summary.tool_calls);
            }
            Bytes::from(converted)
        }
        None => body,
    }
}

///
/// Streaming request: the producer task reads upstream lines, runs them
/// through the stream processor and writes framed text into the channel.
async fn forward_streaming(state: Arc<AppState>, request: ForwardRequest, mode: ResponseMode) -> Result<Response> {
    let idle_timeout = state.config.backend.streaming_timeout();
    let send = build_backend_request(&state, request).send();
    let response = match idle_timeout {
        Some(limit) => tokio::time::timeout(limit, send)
            .await
            .map_err(|_| ProxyError::Timeout(limit.as_secs()))?
            .map_err(|e| map_request_error(e, limit))?,
        None => send.await?,
    };

    let status = response.status();
    if !status.is_success() {
        // backend errors are mirrored as-is
        tracing::warn!("Backend answered streaming request with {}", status);
        let headers = response.headers().clone();
        let body = response.bytes().await?;
        return Ok(mirror_response(status, &headers, Body::from(body)));
    }

    AppMetrics::increment(&state.metrics.streaming_requests);
    let processor = match mode {
        ResponseMode::Convert => SseStreamProcessor::new(state.registry.clone()),
        ResponseMode::Plain | ResponseMode::PlainStreaming => SseStreamProcessor::passthrough(),
    };

    let (tx, rx) = mpsc::channel::<std::result::Result<String, Infallible>>(STREAMING_CHANNEL_BUFFER);
    let state_clone = state.clone();
    tokio::spawn(async move {
        let emitted = pump_sse(Box::pin(response.bytes_stream()), processor, idle_timeout, tx).await;
        if emitted > 0 {
            AppMetrics::increment(&state_clone.metrics.converted_responses);
            tracing::info!("Converted {} streamed tool call(s)", emitted);
        }
    });

    let mut response = Response::new(Body::from_stream(ReceiverStream::new(rx)));
    *response.status_mut() = status;
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(EVENT_STREAM));
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    Ok(response)
}

///
/// Pump an upstream SSE body through `processor` into `tx`.
///
/// Stops at `[DONE]`, end of input, an upstream error, an idle gap longer
/// than `idle_timeout`, or when the receiver is gone (client disconnected).
/// Except in the last case, any frame the processor still owes is flushed.
///
/// # Returns
///  * number of tool calls the processor synthesized
pub async fn pump_sse<S, E>(
    mut upstream: S,
    mut processor: SseStreamProcessor,
    idle_timeout: Option<Duration>,
    tx: mpsc::Sender<std::result::Result<String, Infallible>>,
) -> usize
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    let mut splitter = LineSplitter::new();

    while !processor.is_finished() {
        let chunk = match next_chunk(&mut upstream, idle_timeout).await {
            Ok(Some(chunk)) => chunk,
            Ok(None) => break,
            Err(e) => {
                tracing::error!("Closing stream early: {}", e);
                break;
            }
        };

        for line in splitter.push(&chunk) {
            for frame in processor.process_line(&line) {
                if tx.send(Ok(frame)).await.is_err() {
                    tracing::debug!("Client disconnected, aborting upstream read");
                    return processor.tool_calls_emitted();
                }
            }
        }
    }

    let mut tail = Vec::new();
    if let Some(rest) = splitter.finish() {
        tail.extend(processor.process_line(&rest));
    }
    tail.extend(processor.finish());
    for frame in tail {
        if tx.send(Ok(frame)).await.is_err() {
            break;
        }
    }

    processor.tool_calls_emitted()
}

///
/// Next upstream chunk, `None` at end of input.
///
/// An idle gap longer than `idle_timeout` is a [`ProxyError::Timeout`], a
/// transport failure mid-body a [`ProxyError::Upstream`].
async fn next_chunk<S, E>(upstream: &mut S, idle_timeout: Option<Duration>) -> Result<Option<Bytes>>
where
    S: Stream<Item = std::result::Result<Bytes, E>> + Unpin,
    E: Display,
{
    let next = match idle_timeout {
        Some(limit) => {
            tokio::time::timeout(limit, upstream.next()).await.map_err(|_| ProxyError::Timeout(limit.as_secs()))?
        }
        None => upstream.next().await,
    };
    next.transpose().map_err(|e| ProxyError::Upstream(format!("stream chunk error: {}", e)))
}

/// Backend path with the client's query string appended
fn upstream_path(path: &str, uri: &Uri) -> String {
    match uri.query() {
        Some(query) => format!("{}?{}", path, query),
        None => path.to_string(),
    }
}

fn is_hop_by_hop(name: &HeaderName) -> bool {
    HOP_BY_HOP_HEADERS.contains(&name.as_str())
}

/// Copy `headers` without hop-by-hop headers and the names in `skipped`
fn filter_headers(headers: &HeaderMap, skipped: &[HeaderName]) -> HeaderMap {
    headers
        .iter()
        .filter(|(name, _)| !is_hop_by_hop(name) && !skipped.contains(name))
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}

/// Response carrying the backend's status and headers; `Content-Length`
/// follows the new body
fn mirror_response(status: StatusCode, headers: &HeaderMap, body: Body) -> Response {
    let mut response = Response::new(body);
    *response.status_mut() = status;
    *response.headers_mut() = filter_headers(headers, &SKIPPED_RESPONSE_HEADERS);
    response
}

fn map_request_error(error: reqwest::Error, timeout: Duration) -> ProxyError {
    if error.is_timeout() { ProxyError::Timeout(timeout.as_secs()) } else { ProxyError::Request(error) }
}

fn log_incoming_request(endpoint: &str, body: &Bytes) {
    let Ok(request) = serde_json::from_slice::<Value>(body) else {
        tracing::debug!("=== {} request ({} bytes, not JSON) ===", endpoint, body.len());
        return;
    };
    let model = request.get("model").and_then(Value::as_str).unwrap_or("unknown");
    let stream = request.get("stream").and_then(Value::as_bool).unwrap_or(false);
    let tools = request.get("tools").and_then(Value::as_array).map_or(0, Vec::len);
    tracing::debug!("=== {} request: model={}, stream={}, tools={} ===", endpoint, model, stream, tools);
}

///
/// Create an error response.
///
/// # Arguments
///  * `error` - error to convert to HTTP response
///
/// # Returns
///  * HTTP error response with an OpenAI-style JSON error body
pub fn create_error_response(error: &ProxyError) -> Response {
    let (status_code, error_type) = match error {
        e if e.is_timeout() => (StatusCode::GATEWAY_TIMEOUT, "timeout_error"),
        ProxyError::Upstream(_) | ProxyError::Request(_) | ProxyError::Http(_) => {
            (StatusCode::BAD_GATEWAY, "upstream_error")
        }
        ProxyError::Config(_) | ProxyError::Timeout(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, "internal_error")
        }
    };

    let error_response = json!({
      "error": {
        "message": error.to_string(),
        "type": error_type,
        "code": status_code.as_u16()
      }
    });

    (status_code, Json(error_response)).into_response()
}

/* --- tests ----------------------------------------------------------------------------------- */

//! Mock OpenAI-compatible gateway for integration tests
//!
//! Serves a scripted chat completion, streaming body, and embedding, and
//! records what the client sent.

use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode, header};
use axum::response::{IntoResponse, Response};
use axum::{Json, Router, routing};
use bytes::Bytes;
use futures::StreamExt;
use relay_config::GatewayConfig;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use url::Url;

/// What the mock answers with
#[derive(Debug, Clone)]
pub struct Script {
    /// Body of a non-streaming chat completion
    pub completion: Value,
    /// Streaming body, one network write per entry
    pub stream_writes: Vec<String>,
    /// Pause before each streaming write
    pub write_delay: Duration,
    /// Pause before answering at all
    pub response_delay: Duration,
    /// Answer every request with this status and body instead
    pub failure: Option<(StatusCode, String)>,
    /// Body of an embeddings response
    pub embedding: Value,
}

impl Default for Script {
    fn default() -> Self {
        Self {
            completion: json!({
                "id": "chatcmpl-mock",
                "object": "chat.completion",
                "created": 1_700_000_000,
                "model": "mock-model",
                "choices": [{
                    "index": 0,
                    "message": {"role": "assistant", "content": "hi"},
                    "finish_reason": "stop"
                }],
                "usage": {"prompt_tokens": 1, "completion_tokens": 1, "total_tokens": 2}
            }),
            stream_writes: vec![
                text_chunk("Hel"),
                text_chunk("lo"),
                finish_chunk("stop"),
                usage_chunk(3, 2, 5),
                done(),
            ],
            write_delay: Duration::ZERO,
            response_delay: Duration::ZERO,
            failure: None,
            embedding: json!({
                "object": "list",
                "data": [{"object": "embedding", "embedding": [0.1, 0.2, 0.3], "index": 0}],
                "model": "mock-embed"
            }),
        }
    }
}

impl Script {
    /// Answer every request with `status` and a plain-text body
    pub fn failing(status: StatusCode, body: &str) -> Self {
        Self {
            failure: Some((status, body.to_owned())),
            ..Self::default()
        }
    }

    /// Stream the given writes instead of the default body
    pub fn streaming(writes: Vec<String>) -> Self {
        Self {
            stream_writes: writes,
            ..Self::default()
        }
    }
}

/// `data: {chunk}` event carrying one SSE payload
pub fn sse(payload: &Value) -> String {
    format!("data: {payload}\n\n")
}

/// Chunk appending `text` to the first choice
pub fn text_chunk(text: &str) -> String {
    sse(&json!({
        "id": "chatcmpl-mock",
        "object": "chat.completion.chunk",
        "model": "mock-model",
        "choices": [{"index": 0, "delta": {"content": text}}]
    }))
}

/// Chunk carrying one tool call fragment
pub fn tool_chunk(index: u32, id: Option<&str>, name: Option<&str>, arguments: &str) -> String {
    let mut function = json!({"arguments": arguments});
    if let Some(name) = name {
        function["name"] = json!(name);
    }
    let mut call = json!({"index": index, "function": function});
    if let Some(id) = id {
        call["id"] = json!(id);
        call["type"] = json!("function");
    }

    sse(&json!({
        "id": "chatcmpl-mock",
        "choices": [{"index": 0, "delta": {"tool_calls": [call]}}]
    }))
}

/// Chunk closing the first choice
pub fn finish_chunk(reason: &str) -> String {
    sse(&json!({
        "id": "chatcmpl-mock",
        "choices": [{"index": 0, "delta": {}, "finish_reason": reason}]
    }))
}

/// Usage-only chunk, as sent with `stream_options.include_usage`
pub fn usage_chunk(prompt: u32, completion: u32, total: u32) -> String {
    sse(&json!({
        "id": "chatcmpl-mock",
        "choices": [],
        "usage": {"prompt_tokens": prompt, "completion_tokens": completion, "total_tokens": total}
    }))
}

/// Stream terminator
pub fn done() -> String {
    "data: [DONE]\n\n".to_owned()
}

/// Mock gateway listening on an ephemeral port
pub struct MockGateway {
    addr: SocketAddr,
    shutdown: CancellationToken,
    state: Arc<MockState>,
    // Owned runtime for tests that drive a blocking client
    runtime: Option<tokio::runtime::Runtime>,
}

struct MockState {
    script: Script,
    chat_count: AtomicU32,
    embedding_count: AtomicU32,
    last_authorization: Mutex<Option<String>>,
    last_request: Mutex<Option<Value>>,
    stream_closed: AtomicBool,
}

impl MockGateway {
    /// Start with the default script on the current runtime
    pub async fn start() -> anyhow::Result<Self> {
        Self::start_with(Script::default()).await
    }

    /// Start with a custom script on the current runtime
    pub async fn start_with(script: Script) -> anyhow::Result<Self> {
        let state = Arc::new(MockState {
            script,
            chat_count: AtomicU32::new(0),
            embedding_count: AtomicU32::new(0),
            last_authorization: Mutex::new(None),
            last_request: Mutex::new(None),
            stream_closed: AtomicBool::new(false),
        });

        let app = Router::new()
            .route("/v1/chat/completions", routing::post(handle_chat))
            .route("/v1/embeddings", routing::post(handle_embeddings))
            .with_state(Arc::clone(&state));

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;
        let shutdown = CancellationToken::new();
        let shutdown_clone = shutdown.clone();

        tokio::spawn(async move {
            axum::serve(listener, app)
                .with_graceful_shutdown(async move {
                    shutdown_clone.cancelled().await;
                })
                .await
                .ok();
        });

        Ok(Self {
            addr,
            shutdown,
            state,
            runtime: None,
        })
    }

    /// Start on a private runtime, for tests using the blocking client
    pub fn start_blocking(script: Script) -> anyhow::Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .enable_all()
            .build()?;

        let mut mock = runtime.block_on(Self::start_with(script))?;
        mock.runtime = Some(runtime);
        Ok(mock)
    }

    /// Gateway base URL, without `/v1`
    pub fn endpoint(&self) -> Url {
        Url::parse(&format!("http://{}", self.addr)).unwrap()
    }

    /// Gateway settings pointing at this mock
    pub fn config(&self) -> GatewayConfig {
        GatewayConfig::new(self.endpoint())
    }

    /// Chat completion requests received
    pub fn chat_count(&self) -> u32 {
        self.state.chat_count.load(Ordering::Relaxed)
    }

    /// Embedding requests received
    pub fn embedding_count(&self) -> u32 {
        self.state.embedding_count.load(Ordering::Relaxed)
    }

    /// `Authorization` header of the latest request
    pub fn last_authorization(&self) -> Option<String> {
        self.state.last_authorization.lock().unwrap().clone()
    }

    /// JSON body of the latest request
    pub fn last_request(&self) -> Option<Value> {
        self.state.last_request.lock().unwrap().clone()
    }

    /// Whether the server has let go of the latest streaming body
    pub fn stream_closed(&self) -> bool {
        self.state.stream_closed.load(Ordering::SeqCst)
    }
}

impl Drop for MockGateway {
    fn drop(&mut self) {
        self.shutdown.cancel();
    }
}

/// Flags the streaming body as released when dropped
struct CloseGuard(Arc<MockState>);

impl Drop for CloseGuard {
    fn drop(&mut self) {
        self.0.stream_closed.store(true, Ordering::SeqCst);
    }
}

fn record(state: &MockState, headers: &HeaderMap, body: Value) {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);
    *state.last_authorization.lock().unwrap() = auth;
    *state.last_request.lock().unwrap() = Some(body);
}

async fn handle_chat(State(state): State<Arc<MockState>>, headers: HeaderMap, Json(body): Json<Value>) -> Response {
    state.chat_count.fetch_add(1, Ordering::Relaxed);
    let stream = body["stream"].as_bool().unwrap_or(false);
    record(&state, &headers, body);

    if !state.script.response_delay.is_zero() {
        tokio::time::sleep(state.script.response_delay).await;
    }
    if let Some((status, body)) = &state.script.failure {
        return (*status, body.clone()).into_response();
    }

    if stream {
        streaming_response(&state)
    } else {
        Json(state.script.completion.clone()).into_response()
    }
}

fn streaming_response(state: &Arc<MockState>) -> Response {
    state.stream_closed.store(false, Ordering::SeqCst);
    let guard = CloseGuard(Arc::clone(state));
    let delay = state.script.write_delay;

    let writes = futures::stream::iter(state.script.stream_writes.clone())
        .then(move |write| async move {
            if !delay.is_zero() {
                tokio::time::sleep(delay).await;
            }
            Ok::<_, Infallible>(Bytes::from(write))
        })
        .map(move |write| {
            let _ = &guard;
            write
        });

    (
        StatusCode::OK,
        [(header::CONTENT_TYPE, "text/event-stream")],
        Body::from_stream(writes),
    )
        .into_response()
}

async fn handle_embeddings(
    State(state): State<Arc<MockState>>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    state.embedding_count.fetch_add(1, Ordering::Relaxed);
    record(&state, &headers, body);

    if let Some((status, body)) = &state.script.failure {
        return (*status, body.clone()).into_response();
    }
    Json(state.script.embedding.clone()).into_response()
}

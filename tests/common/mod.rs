//! In-process fakes for the memory service and an OpenAI-compatible LLM
//! endpoint, plus helpers to drive the router.

#![allow(dead_code)]

use std::convert::Infallible;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use axum::{
    Json, Router,
    body::{Body, Bytes},
    extract::State,
    http::{HeaderMap, Request, StatusCode, Uri, header},
    response::{IntoResponse, Response},
    routing::post,
};
use futures_util::{StreamExt, stream};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tower::ServiceExt;

use memchat::config::{Config, MemoryWriteMode};
use memchat::server::{AppState, build_router};

pub const OPENAI_PATH: &str = "/v1/chat/completions";
pub const OLLAMA_PATH: &str = "/ollama/v1/chat/completions";

/// Ordered record of calls across fakes, for checking cross-service ordering.
pub type EventLog = Arc<Mutex<Vec<&'static str>>>;

pub fn event_log() -> EventLog {
    Arc::new(Mutex::new(Vec::new()))
}

async fn spawn_router(router: Router) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{addr}")
}

// ── Fake memory service ───────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct MemoryCalls {
    pub adds: Vec<String>,
    pub retrieves: Vec<String>,
    pub deletes: Vec<String>,
}

#[derive(Clone)]
struct MemoryState {
    calls: Arc<Mutex<MemoryCalls>>,
    snippets: Arc<Vec<String>>,
    status: StatusCode,
    add_delay: Duration,
    log: Option<EventLog>,
}

pub struct FakeMemory {
    pub url: String,
    pub calls: Arc<Mutex<MemoryCalls>>,
}

impl FakeMemory {
    pub fn adds(&self) -> Vec<String> {
        self.calls.lock().unwrap().adds.clone()
    }

    pub fn retrieves(&self) -> Vec<String> {
        self.calls.lock().unwrap().retrieves.clone()
    }

    pub fn deletes(&self) -> Vec<String> {
        self.calls.lock().unwrap().deletes.clone()
    }

    pub fn total_calls(&self) -> usize {
        let c = self.calls.lock().unwrap();
        c.adds.len() + c.retrieves.len() + c.deletes.len()
    }
}

/// Memory service answering every call with `status`; retrieve returns
/// `snippets` as `{"memories": [...]}`.
pub async fn spawn_memory(snippets: &[&str], status: StatusCode) -> FakeMemory {
    spawn_memory_with(snippets, status, Duration::ZERO, None).await
}

/// Like [`spawn_memory`], but `/add` waits `add_delay` before answering and
/// pushes `"add_done"` onto `log` once it does.
pub async fn spawn_memory_with(
    snippets: &[&str],
    status: StatusCode,
    add_delay: Duration,
    log: Option<EventLog>,
) -> FakeMemory {
    let state = MemoryState {
        calls: Arc::new(Mutex::new(MemoryCalls::default())),
        snippets: Arc::new(snippets.iter().map(|s| s.to_string()).collect()),
        status,
        add_delay,
        log,
    };
    let calls = state.calls.clone();
    let router = Router::new()
        .route("/add", post(memory_add))
        .route("/retrieve", post(memory_retrieve))
        .route("/delete", post(memory_delete))
        .with_state(state);
    FakeMemory { url: spawn_router(router).await, calls }
}

/// Memory service answering retrieve with an arbitrary JSON body.
pub async fn spawn_memory_raw(retrieve_body: Value) -> FakeMemory {
    let calls = Arc::new(Mutex::new(MemoryCalls::default()));
    let recorded = calls.clone();
    let router = Router::new().route(
        "/retrieve",
        post(move |Json(body): Json<Value>| {
            let recorded = recorded.clone();
            let retrieve_body = retrieve_body.clone();
            async move {
                let query = body["query"].as_str().unwrap_or_default().to_string();
                recorded.lock().unwrap().retrieves.push(query);
                Json(retrieve_body)
            }
        }),
    );
    FakeMemory { url: spawn_router(router).await, calls }
}

async fn memory_add(State(s): State<MemoryState>, Json(body): Json<Value>) -> StatusCode {
    let content = body["content"].as_str().unwrap_or_default().to_string();
    if !s.add_delay.is_zero() {
        tokio::time::sleep(s.add_delay).await;
    }
    s.calls.lock().unwrap().adds.push(content);
    if let Some(log) = &s.log {
        log.lock().unwrap().push("add_done");
    }
    s.status
}

async fn memory_retrieve(State(s): State<MemoryState>, Json(body): Json<Value>) -> Response {
    let query = body["query"].as_str().unwrap_or_default().to_string();
    s.calls.lock().unwrap().retrieves.push(query);
    if !s.status.is_success() {
        return (s.status, "memory backend down").into_response();
    }
    Json(json!({ "memories": *s.snippets })).into_response()
}

async fn memory_delete(State(s): State<MemoryState>, Json(body): Json<Value>) -> StatusCode {
    let id = body["id"].as_str().unwrap_or_default().to_string();
    s.calls.lock().unwrap().deletes.push(id);
    s.status
}

// ── Fake LLM endpoint ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct LlmCall {
    pub path: String,
    pub auth: Option<String>,
    pub body: Value,
}

impl LlmCall {
    pub fn model(&self) -> &str {
        self.body["model"].as_str().unwrap_or_default()
    }

    pub fn messages(&self) -> Vec<(String, String)> {
        self.body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| {
                (
                    m["role"].as_str().unwrap().to_string(),
                    m["content"].as_str().unwrap().to_string(),
                )
            })
            .collect()
    }
}

#[derive(Clone)]
pub enum LlmScript {
    /// Reply 200 with this raw SSE body.
    Sse(String),
    /// Reply 200, send this SSE prefix, then never finish the body.
    SseThenStall(String),
    /// Reply with an error status and an OpenAI error envelope.
    Fail(StatusCode),
    /// Reply with an error status whose body never completes.
    FailThenStall(StatusCode),
}

#[derive(Clone)]
struct LlmState {
    calls: Arc<Mutex<Vec<LlmCall>>>,
    script: LlmScript,
    log: Option<EventLog>,
}

pub struct FakeLlm {
    pub url: String,
    pub calls: Arc<Mutex<Vec<LlmCall>>>,
}

impl FakeLlm {
    pub fn calls(&self) -> Vec<LlmCall> {
        self.calls.lock().unwrap().clone()
    }
}

/// OpenAI-compatible endpoint serving both [`OPENAI_PATH`] and [`OLLAMA_PATH`].
pub async fn spawn_llm(script: LlmScript) -> FakeLlm {
    spawn_llm_with(script, None).await
}

/// Like [`spawn_llm`], pushing `"llm_called"` onto `log` on every request.
pub async fn spawn_llm_with(script: LlmScript, log: Option<EventLog>) -> FakeLlm {
    let state = LlmState { calls: Arc::new(Mutex::new(Vec::new())), script, log };
    let calls = state.calls.clone();
    let router = Router::new()
        .route(OPENAI_PATH, post(llm_completions))
        .route(OLLAMA_PATH, post(llm_completions))
        .with_state(state);
    FakeLlm { url: spawn_router(router).await, calls }
}

/// Body that sends `prefix` and then stays open without further data.
fn stalled_body(prefix: String) -> Body {
    let head = stream::iter([Ok::<_, Infallible>(Bytes::from(prefix))]);
    Body::from_stream(head.chain(stream::pending()))
}

async fn llm_completions(
    State(s): State<LlmState>,
    uri: Uri,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let auth = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    s.calls.lock().unwrap().push(LlmCall { path: uri.path().to_string(), auth, body });
    if let Some(log) = &s.log {
        log.lock().unwrap().push("llm_called");
    }

    let event_stream = [(header::CONTENT_TYPE, "text/event-stream")];
    match s.script {
        LlmScript::Sse(body) => (event_stream, body).into_response(),
        LlmScript::SseThenStall(prefix) => (event_stream, stalled_body(prefix)).into_response(),
        LlmScript::Fail(status) => (
            status,
            Json(json!({ "error": { "message": "invalid model", "code": "model_not_found" } })),
        )
            .into_response(),
        LlmScript::FailThenStall(status) => {
            (status, stalled_body("{\"error\":".to_string())).into_response()
        }
    }
}

pub fn sse_data(value: &Value) -> String {
    format!("data: {value}\n\n")
}

/// One SSE event carrying a content delta.
pub fn sse_delta(text: &str) -> String {
    sse_data(&json!({
        "object": "chat.completion.chunk",
        "choices": [{ "index": 0, "delta": { "content": text } }]
    }))
}

/// SSE body streaming `deltas`, a `stop` finish, usage and `[DONE]`.
pub fn sse_reply(deltas: &[&str]) -> String {
    let mut out = sse_data(&json!({
        "choices": [{ "index": 0, "delta": { "role": "assistant" } }]
    }));
    for d in deltas {
        out.push_str(&sse_delta(d));
    }
    out.push_str(&sse_data(&json!({
        "choices": [{ "index": 0, "delta": {}, "finish_reason": "stop" }]
    })));
    out.push_str(&sse_data(&json!({
        "choices": [],
        "usage": { "prompt_tokens": 12, "completion_tokens": 2 }
    })));
    out.push_str("data: [DONE]\n\n");
    out
}

// ── App under test ────────────────────────────────────────────────────────────

pub fn app_config(memory_url: &str, llm_url: &str) -> Config {
    let mut config = Config::defaults();
    config.memory.base_url = memory_url.to_string();
    config.memory.timeout_seconds = 2;
    config.llm.request_timeout_seconds = 5;
    config.llm.stream_idle_timeout_seconds = 5;
    config.llm.openai.api_base_url = format!("{llm_url}{OPENAI_PATH}");
    config.llm.ollama.api_base_url = format!("{llm_url}{OLLAMA_PATH}");
    config.openai_api_key = Some("sk-test".to_string());
    config
}

pub fn app(config: &Config) -> Router {
    build_router(AppState::from_config(config).unwrap())
}

/// Router plus the state it was built from, for tests that inspect
/// background work.
pub fn app_with_state(
    memory_url: &str,
    llm_url: &str,
    mode: MemoryWriteMode,
) -> (Router, AppState) {
    let mut config = app_config(memory_url, llm_url);
    config.memory.write_mode = mode;
    let state = AppState::from_config(&config).unwrap();
    (build_router(state.clone()), state)
}

pub fn chat_request(body: &Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/api/chat")
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

pub async fn post_chat(app: Router, body: Value) -> (StatusCode, HeaderMap, String) {
    send(app, chat_request(&body)).await
}

pub async fn send(app: Router, req: Request<Body>) -> (StatusCode, HeaderMap, String) {
    let resp = app.oneshot(req).await.unwrap();
    let status = resp.status();
    let headers = resp.headers().clone();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, headers, String::from_utf8(bytes.to_vec()).unwrap())
}

/// Text deltas (`0:` parts) decoded from a data-stream body, in order.
pub fn text_parts(body: &str) -> Vec<String> {
    body.lines()
        .filter_map(|l| l.strip_prefix("0:"))
        .map(|json| serde_json::from_str::<String>(json).unwrap())
        .collect()
}

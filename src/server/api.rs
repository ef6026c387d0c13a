//! Axum handlers for `/api/*` routes.

use axum::{
    Json,
    body::Body,
    extract::State,
    http::{HeaderName, StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Serialize;
use serde_json::json;
use tracing::{error, info, warn};

use crate::chat::augment::augment;
use crate::chat::stream::{self, CONTENT_TYPE, DATA_STREAM_HEADER, DATA_STREAM_VERSION};
use crate::chat::ChatRequest;
use crate::memory::{ALL_MEMORIES, MemoryAck};

use super::AppState;

/// Entry in `GET /api/models`.
#[derive(Debug, Serialize)]
pub(super) struct ModelOption {
    id: &'static str,
    label: &'static str,
    provider: &'static str,
}

const MODEL_OPTIONS: &[ModelOption] = &[
    ModelOption { id: "openai:gpt-4o", label: "OpenAI (GPT-4o)", provider: "openai" },
    ModelOption { id: "ollama:llama3", label: "Ollama (Llama 3)", provider: "ollama" },
    ModelOption { id: "ollama:mistral", label: "Ollama (Mistral)", provider: "ollama" },
];

// ── Handlers ──────────────────────────────────────────────────────────────────

/// POST /api/chat
///
/// Augments the last user turn, stores it, then streams the reply. A provider
/// failure before the first byte is a plain 500; later failures end the body
/// with an error part.
pub(super) async fn chat(State(state): State<AppState>, Json(req): Json<ChatRequest>) -> Response {
    if req.messages.is_empty() {
        return (StatusCode::BAD_REQUEST, "messages must not be empty").into_response();
    }

    let messages = augment(
        &req.messages,
        req.use_memory,
        &state.memory,
        state.write_mode,
        &state.tasks,
    )
    .await;

    let provider = state.providers.resolve(&req.model);
    info!(
        provider = provider.name(),
        model = %provider.model(),
        messages = messages.len(),
        use_memory = req.use_memory,
        "chat request"
    );

    match provider.stream_chat(&messages).await {
        Ok(events) => {
            let body = Body::from_stream(stream::proxy(
                events,
                stream::new_message_id(),
                state.stream_idle_timeout,
            ));
            (
                [
                    (header::CONTENT_TYPE, CONTENT_TYPE),
                    (HeaderName::from_static(DATA_STREAM_HEADER), DATA_STREAM_VERSION),
                ],
                body,
            )
                .into_response()
        }
        Err(e) => {
            error!(provider = provider.name(), model = %provider.model(), error = %e, "chat error");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error processing request").into_response()
        }
    }
}

/// DELETE /api/memory
///
/// Clears everything; there is no per-item scope.
pub(super) async fn delete_memory(State(state): State<AppState>) -> Response {
    match state.memory.delete_memory(ALL_MEMORIES).await {
        MemoryAck::Accepted => {
            info!("long-term memory cleared");
            (StatusCode::OK, Json(json!({ "success": true }))).into_response()
        }
        MemoryAck::Failed => {
            warn!("memory delete failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Error deleting memory").into_response()
        }
    }
}

/// GET /api/health
pub(super) async fn health(State(state): State<AppState>) -> Response {
    let body = json!({ "status": "ok", "memory_url": state.memory.base_url() });
    (StatusCode::OK, Json(body)).into_response()
}

/// GET /api/models
pub(super) async fn models() -> Json<&'static [ModelOption]> {
    Json(MODEL_OPTIONS)
}

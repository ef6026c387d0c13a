//! Axum HTTP server: chat streaming and memory management endpoints.
//!
//! ## URL layout
//!
//! ```text
//! POST   /api/chat     augmented, streamed chat completion
//! DELETE /api/memory   wipe long-term memory ("all")
//! GET    /api/health
//! GET    /api/models   selectable model list for the client picker
//! ```
//!
//! The [`CancellationToken`] passed to [`serve`] drives axum's graceful
//! shutdown. Background memory writes still in flight are awaited before
//! `serve` returns.

mod api;

use std::sync::Arc;
use std::time::Duration;

use axum::{
    Router,
    routing::{delete, get, post},
};
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::info;

use crate::config::{Config, MemoryWriteMode};
use crate::error::AppError;
use crate::llm::providers::ProviderResolver;
use crate::memory::MemoryClient;

// ── Shared request state ──────────────────────────────────────────────────────

/// Router state injected into every handler via [`axum::extract::State`].
///
/// Shared fields are reference-counted and read-only after startup.
#[derive(Clone)]
pub struct AppState {
    pub memory: Arc<MemoryClient>,
    pub providers: Arc<ProviderResolver>,
    pub write_mode: MemoryWriteMode,
    pub stream_idle_timeout: Duration,
    /// Detached work (background memory writes) drained on shutdown.
    pub tasks: TaskTracker,
}

impl AppState {
    /// Build clients from resolved config. No network calls are made.
    pub fn from_config(config: &Config) -> Result<Self, AppError> {
        let memory = MemoryClient::from_config(&config.memory)
            .map_err(|e| AppError::Config(format!("failed to build memory client: {e}")))?;
        let providers = ProviderResolver::new(&config.llm, config.openai_api_key.clone())
            .map_err(|e| AppError::Config(e.to_string()))?;
        Ok(Self {
            memory: Arc::new(memory),
            providers: Arc::new(providers),
            write_mode: config.memory.write_mode,
            stream_idle_timeout: Duration::from_secs(config.llm.stream_idle_timeout_seconds),
            tasks: TaskTracker::new(),
        })
    }
}

// ── Server loop ───────────────────────────────────────────────────────────────

pub async fn serve(
    bind_addr: &str,
    state: AppState,
    shutdown: CancellationToken,
) -> Result<(), AppError> {
    let listener = TcpListener::bind(bind_addr)
        .await
        .map_err(|e| AppError::Server(format!("bind failed on {bind_addr}: {e}")))?;

    info!(%bind_addr, "http server listening");

    let tasks = state.tasks.clone();
    axum::serve(listener, build_router(state))
        .with_graceful_shutdown(async move { shutdown.cancelled().await })
        .await
        .map_err(|e| AppError::Server(format!("server error: {e}")))?;

    tasks.close();
    if !tasks.is_empty() {
        info!(pending = tasks.len(), "waiting for background memory writes");
    }
    tasks.wait().await;

    info!("http server shut down");
    Ok(())
}

// ── Router ────────────────────────────────────────────────────────────────────

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/api/chat",   post(api::chat))
        .route("/api/memory", delete(api::delete_memory))
        .route("/api/health", get(api::health))
        .route("/api/models", get(api::models))
        .with_state(state)
}

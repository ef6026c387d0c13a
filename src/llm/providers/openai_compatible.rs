//! OpenAI-compatible streaming chat completions (`/v1/chat/completions`).
//!
//! Sends `stream: true` and decodes the server-sent-event body into
//! [`StreamEvent`]s. All OpenAI wire types are private to this module.

use std::time::Duration;

use eventsource_stream::Eventsource;
use futures_util::{Stream, StreamExt};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use tracing::{debug, error, trace, warn};

use crate::chat::ChatMessage;
use crate::llm::{FinishReason, ProviderError, StreamEvent, TextStream, Usage};

// ── Public provider ───────────────────────────────────────────────────────────

/// Adapter for any HTTP endpoint implementing `/v1/chat/completions`.
///
/// Cheap to clone: `reqwest::Client` is an `Arc` internally and is shared by
/// every handle the resolver hands out.
#[derive(Debug, Clone)]
pub struct OpenAiCompatibleProvider {
    client: Client,
    api_base_url: String,
    model: String,
    request_timeout_seconds: u64,
    api_key: Option<String>,
}

impl OpenAiCompatibleProvider {
    /// `api_key` is sent as `Authorization: Bearer <key>` when present.
    pub fn new(
        client: Client,
        api_base_url: String,
        model: String,
        request_timeout_seconds: u64,
        api_key: Option<String>,
    ) -> Self {
        Self { client, api_base_url, model, request_timeout_seconds, api_key }
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn api_base_url(&self) -> &str {
        &self.api_base_url
    }

    /// Send `messages` and return the decoded event stream.
    ///
    /// The timeout covers the wait for response headers only; the body is
    /// governed by the caller's idle timeout so long replies are not cut.
    pub async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TextStream, ProviderError> {
        let payload = ChatCompletionRequest {
            model: &self.model,
            messages: messages
                .iter()
                .map(|m| WireMessage { role: m.role.as_str(), content: &m.content })
                .collect(),
            stream: true,
            stream_options: StreamOptions { include_usage: true },
        };

        debug!(
            url = %self.api_base_url,
            model = %self.model,
            messages = messages.len(),
            "sending streaming LLM request"
        );
        if tracing::enabled!(tracing::Level::TRACE) {
            let json = serde_json::to_string_pretty(&payload)
                .unwrap_or_else(|e| format!("<serialization failed: {e}>"));
            trace!(payload = %json, "full LLM request payload");
        }

        let mut req = self.client.post(&self.api_base_url).json(&payload);
        if let Some(key) = &self.api_key {
            req = req.bearer_auth(key);
        }

        let timeout = Duration::from_secs(self.request_timeout_seconds);
        let response = tokio::time::timeout(timeout, req.send())
            .await
            .map_err(|_| {
                error!(url = %self.api_base_url, "LLM request timed out before response");
                ProviderError::Timeout(self.request_timeout_seconds)
            })?
            .map_err(|e| {
                error!(url = %self.api_base_url, error = %e, "LLM HTTP request failed (transport)");
                ProviderError::Request(e.to_string())
            })?;

        let response = check_status(response, timeout).await?;
        Ok(decode_sse(response.bytes_stream()))
    }
}

/// Decode an OpenAI SSE byte stream into provider events.
///
/// Emits one [`StreamEvent::TextDelta`] per non-empty content delta and a
/// single [`StreamEvent::Finish`] once the server signals completion
/// (`data: [DONE]` or a `finish_reason`). A body that closes cleanly with
/// neither simply ends the stream; transport errors are reported as items.
pub(crate) fn decode_sse<S, B, E>(bytes: S) -> TextStream
where
    S: Stream<Item = Result<B, E>> + Send + 'static,
    B: AsRef<[u8]> + Send + 'static,
    E: std::fmt::Display + Send + 'static,
{
    Box::pin(async_stream::stream! {
        let mut events = Box::pin(bytes.eventsource());
        let mut reason: Option<FinishReason> = None;
        let mut usage: Option<Usage> = None;
        let mut done = false;

        while let Some(event) = events.next().await {
            let event = match event {
                Ok(ev) => ev,
                Err(e) => {
                    yield Err(ProviderError::Stream(e.to_string()));
                    return;
                }
            };

            let data = event.data.trim();
            trace!(data = %data, "LLM SSE event");
            if data.is_empty() {
                continue;
            }
            if data == "[DONE]" {
                done = true;
                break;
            }

            let chunk: ChatCompletionChunk = match serde_json::from_str(data) {
                Ok(c) => c,
                Err(e) => {
                    yield Err(ProviderError::Stream(format!("malformed chunk: {e}")));
                    return;
                }
            };

            if let Some(err) = chunk.error {
                yield Err(ProviderError::Stream(err.message()));
                return;
            }

            if let Some(u) = chunk.usage {
                usage = Some(Usage {
                    prompt_tokens: u.prompt_tokens,
                    completion_tokens: u.completion_tokens,
                });
            }

            for choice in chunk.choices {
                if let Some(text) = choice.delta.and_then(|d| d.content) {
                    if !text.is_empty() {
                        yield Ok(StreamEvent::TextDelta(text));
                    }
                }
                if let Some(r) = choice.finish_reason {
                    reason = Some(FinishReason::from_openai(&r));
                }
            }
        }

        if done || reason.is_some() {
            yield Ok(StreamEvent::Finish {
                reason: reason.unwrap_or(FinishReason::Unknown),
                usage,
            });
        } else {
            warn!("LLM stream closed without finish signal");
        }
    })
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct WireMessage<'a> {
    role: &'a str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct StreamOptions {
    include_usage: bool,
}

#[derive(Debug, Serialize)]
struct ChatCompletionRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    stream: bool,
    stream_options: StreamOptions,
}

#[derive(Debug, Deserialize)]
struct ChatCompletionChunk {
    #[serde(default)]
    choices: Vec<ChunkChoice>,
    #[serde(default)]
    usage: Option<ChunkUsage>,
    #[serde(default)]
    error: Option<ChunkError>,
}

#[derive(Debug, Deserialize)]
struct ChunkChoice {
    #[serde(default)]
    delta: Option<ChunkDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ChunkUsage {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
}

/// In-stream error: either `{"message": ...}` or a bare string.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ChunkError {
    Object { message: String },
    Text(String),
}

impl ChunkError {
    fn message(self) -> String {
        match self {
            ChunkError::Object { message } | ChunkError::Text(message) => message,
        }
    }
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
    #[serde(default)]
    code: Option<serde_json::Value>,
}

/// Return the response if successful, or a structured error.
///
/// Reading the error body is bounded by `read_timeout`; a stalled body is
/// reported without its content.
async fn check_status(
    response: reqwest::Response,
    read_timeout: Duration,
) -> Result<reqwest::Response, ProviderError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = match tokio::time::timeout(read_timeout, response.text()).await {
        Ok(Ok(text)) => text,
        Ok(Err(_)) | Err(_) => "<failed to read error body>".to_string(),
    };

    let message = if let Ok(env) = serde_json::from_str::<ErrorEnvelope>(&body) {
        let code = env
            .error
            .code
            .map(|v| match v {
                serde_json::Value::String(s) => format!(" [code={s}]"),
                other => format!(" [code={other}]"),
            })
            .unwrap_or_default();
        format!("HTTP {status}{code}: {}", env.error.message)
    } else {
        format!("HTTP {status}: {body}")
    };

    error!(%status, %message, "LLM request returned HTTP error");
    Err(ProviderError::Status(message))
}

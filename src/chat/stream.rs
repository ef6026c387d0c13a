//! Streaming proxy. Forwards provider events to the client as they arrive.
//!
//! The body uses the data-stream line protocol the browser chat hook reads:
//! one `<type>:<json>\n` line per part.
//!
//! ```text
//! f:{"messageId":"msg-…"}          start of step, always first
//! 0:"Hel"                          text delta, one per provider delta
//! e:{"finishReason":…,"usage":…,"isContinued":false}
//! d:{"finishReason":…,"usage":…}   end of message, always last on success
//! 3:"An error occurred."           error, replaces e/d after a failure
//! ```
//!
//! Nothing is buffered beyond the current part. An idle gap longer than the
//! configured timeout, or a provider error after streaming began, ends the
//! body with a single error part.

use std::convert::Infallible;
use std::time::Duration;

use axum::body::Bytes;
use futures_util::{Stream, StreamExt};
use serde_json::json;
use tracing::{debug, error, warn};

use crate::llm::{FinishReason, StreamEvent, TextStream, Usage};

/// Response header announcing the data-stream protocol version.
pub const DATA_STREAM_HEADER: &str = "x-vercel-ai-data-stream";
pub const DATA_STREAM_VERSION: &str = "v1";
pub const CONTENT_TYPE: &str = "text/plain; charset=utf-8";

/// Message sent to the client in place of provider error details.
pub const STREAM_ERROR_MESSAGE: &str = "An error occurred.";

// ── Part encoders ─────────────────────────────────────────────────────────────

fn part(code: char, value: &serde_json::Value) -> Bytes {
    Bytes::from(format!("{code}:{value}\n"))
}

pub fn start_step_part(message_id: &str) -> Bytes {
    part('f', &json!({ "messageId": message_id }))
}

pub fn text_part(text: &str) -> Bytes {
    part('0', &json!(text))
}

pub fn error_part(message: &str) -> Bytes {
    part('3', &json!(message))
}

fn usage_json(usage: Option<Usage>) -> serde_json::Value {
    match usage {
        Some(u) => json!({
            "promptTokens": u.prompt_tokens,
            "completionTokens": u.completion_tokens,
        }),
        None => json!({ "promptTokens": null, "completionTokens": null }),
    }
}

pub fn finish_step_part(reason: FinishReason, usage: Option<Usage>) -> Bytes {
    part(
        'e',
        &json!({
            "finishReason": reason.as_str(),
            "usage": usage_json(usage),
            "isContinued": false,
        }),
    )
}

pub fn finish_message_part(reason: FinishReason, usage: Option<Usage>) -> Bytes {
    part('d', &json!({ "finishReason": reason.as_str(), "usage": usage_json(usage) }))
}

pub fn new_message_id() -> String {
    format!("msg-{}", uuid::Uuid::new_v4().simple())
}

// ── Proxy ─────────────────────────────────────────────────────────────────────

/// Adapt provider events into body chunks.
///
/// Order is preserved exactly; every text delta becomes its own chunk. The
/// returned stream ends exactly once: after the finish parts, after an error
/// part, or after an idle timeout.
pub fn proxy(
    mut events: TextStream,
    message_id: String,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<Bytes, Infallible>> + Send + 'static {
    async_stream::stream! {
        yield Ok(start_step_part(&message_id));
        let mut deltas = 0usize;

        loop {
            match tokio::time::timeout(idle_timeout, events.next()).await {
                Ok(Some(Ok(StreamEvent::TextDelta(text)))) => {
                    deltas += 1;
                    yield Ok(text_part(&text));
                }
                Ok(Some(Ok(StreamEvent::Finish { reason, usage }))) => {
                    debug!(
                        %message_id,
                        deltas,
                        finish_reason = reason.as_str(),
                        ?usage,
                        "stream finished"
                    );
                    yield Ok(finish_step_part(reason, usage));
                    yield Ok(finish_message_part(reason, usage));
                    return;
                }
                Ok(Some(Err(e))) => {
                    error!(%message_id, deltas, error = %e, "provider failed mid-stream");
                    yield Ok(error_part(STREAM_ERROR_MESSAGE));
                    return;
                }
                Ok(None) => {
                    debug!(%message_id, deltas, "provider stream ended without finish event");
                    yield Ok(finish_step_part(FinishReason::Unknown, None));
                    yield Ok(finish_message_part(FinishReason::Unknown, None));
                    return;
                }
                Err(_) => {
                    warn!(
                        %message_id,
                        deltas,
                        timeout_secs = idle_timeout.as_secs(),
                        "provider stream idle timeout"
                    );
                    yield Ok(error_part(STREAM_ERROR_MESSAGE));
                    return;
                }
            }
        }
    }
}

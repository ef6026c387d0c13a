//! LLM provider abstraction.
//!
//! `LlmProvider` is an enum over concrete provider implementations; callers
//! match on it instead of holding trait objects. Both backends speak the
//! OpenAI chat-completions protocol, the local one wrapping the generic
//! adapter with its own endpoint and placeholder key.
//!
//! Handles are lazy: building one makes no network call. The request goes out
//! in [`LlmProvider::stream_chat`].

pub mod providers;
pub mod selector;

use std::pin::Pin;

use futures_util::Stream;
use thiserror::Error;

use crate::chat::ChatMessage;

pub use selector::ModelSelector;

// ── Error ─────────────────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider request failed: {0}")]
    Request(String),
    #[error("provider returned {0}")]
    Status(String),
    #[error("provider stream failed: {0}")]
    Stream(String),
    #[error("provider timed out after {0}s")]
    Timeout(u64),
}

// ── Stream events ─────────────────────────────────────────────────────────────

/// Why the provider stopped generating.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FinishReason {
    Stop,
    Length,
    ContentFilter,
    ToolCalls,
    Other,
    Unknown,
}

impl FinishReason {
    /// Map an OpenAI `finish_reason` string.
    pub fn from_openai(reason: &str) -> Self {
        match reason {
            "stop" => FinishReason::Stop,
            "length" => FinishReason::Length,
            "content_filter" => FinishReason::ContentFilter,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            _ => FinishReason::Other,
        }
    }

    /// Name used on the client wire format.
    pub fn as_str(self) -> &'static str {
        match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ContentFilter => "content-filter",
            FinishReason::ToolCalls => "tool-calls",
            FinishReason::Other => "other",
            FinishReason::Unknown => "unknown",
        }
    }
}

/// Token accounting reported at the end of a stream.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Usage {
    pub prompt_tokens: u64,
    pub completion_tokens: u64,
}

/// Incremental unit of provider output.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    TextDelta(String),
    Finish {
        reason: FinishReason,
        usage: Option<Usage>,
    },
}

/// Provider output as an ordered, single-consumer stream.
pub type TextStream =
    Pin<Box<dyn Stream<Item = Result<StreamEvent, ProviderError>> + Send + 'static>>;

// ── Provider enum ─────────────────────────────────────────────────────────────

/// All available provider backends.
#[derive(Debug, Clone)]
pub enum LlmProvider {
    /// Hosted OpenAI chat completions.
    OpenAi(providers::openai_compatible::OpenAiCompatibleProvider),
    /// Local Ollama server through its OpenAI-compatible endpoint.
    Ollama(providers::ollama::OllamaProvider),
}

impl LlmProvider {
    /// Start a streamed completion for `messages`.
    ///
    /// `Err` means nothing was produced (transport failure, timeout, HTTP
    /// error status). Once `Ok`, failures surface as items of the stream.
    pub async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TextStream, ProviderError> {
        match self {
            LlmProvider::OpenAi(p) => p.stream_chat(messages).await,
            LlmProvider::Ollama(p) => p.stream_chat(messages).await,
        }
    }

    pub fn model(&self) -> &str {
        match self {
            LlmProvider::OpenAi(p) => p.model(),
            LlmProvider::Ollama(p) => p.model(),
        }
    }

    /// Short provider label for logs.
    pub fn name(&self) -> &'static str {
        match self {
            LlmProvider::OpenAi(_) => "openai",
            LlmProvider::Ollama(_) => "ollama",
        }
    }
}

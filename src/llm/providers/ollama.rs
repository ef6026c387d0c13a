//! Local Ollama provider.
//!
//! Wraps the generic OpenAI-compatible adapter with the `[llm.ollama]`
//! endpoint and the placeholder credential Ollama requires but ignores.

use reqwest::Client;

use crate::chat::ChatMessage;
use crate::llm::{ProviderError, TextStream};

use super::openai_compatible::OpenAiCompatibleProvider;

#[derive(Debug, Clone)]
pub struct OllamaProvider {
    inner: OpenAiCompatibleProvider,
}

impl OllamaProvider {
    pub fn new(
        client: Client,
        api_base_url: String,
        model: String,
        request_timeout_seconds: u64,
        api_key: String,
    ) -> Self {
        let inner = OpenAiCompatibleProvider::new(
            client,
            api_base_url,
            model,
            request_timeout_seconds,
            Some(api_key),
        );
        Self { inner }
    }

    pub fn model(&self) -> &str {
        self.inner.model()
    }

    pub fn api_base_url(&self) -> &str {
        self.inner.api_base_url()
    }

    pub async fn stream_chat(&self, messages: &[ChatMessage]) -> Result<TextStream, ProviderError> {
        self.inner.stream_chat(messages).await
    }
}

//! LLM provider implementations and the selector → provider resolver.
//!
//! [`ProviderResolver`] is built once at startup. `resolve` is then called per
//! request and is infallible: it parses the selector and clones a lazy handle
//! around the shared HTTP client. Adding a backend = new module + new
//! [`ModelSelector`] variant + new match arm.

pub mod ollama;
pub mod openai_compatible;

use reqwest::Client;
use tracing::debug;

use crate::config::LlmConfig;
use crate::llm::{LlmProvider, ModelSelector, ProviderError};

/// Maps model selector strings to provider handles.
#[derive(Debug, Clone)]
pub struct ProviderResolver {
    client: Client,
    config: LlmConfig,
    openai_api_key: Option<String>,
}

impl ProviderResolver {
    /// `openai_api_key` comes from `OPENAI_API_KEY` env, never TOML.
    pub fn new(config: &LlmConfig, openai_api_key: Option<String>) -> Result<Self, ProviderError> {
        // No overall timeout: it would cut long streamed bodies. Time-to-headers
        // and idle gaps are bounded separately.
        let client = Client::builder()
            .build()
            .map_err(|e| ProviderError::Request(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config: config.clone(), openai_api_key })
    }

    /// Parse `selector` with the configured default models.
    pub fn select(&self, selector: &str) -> ModelSelector {
        ModelSelector::parse_with_defaults(
            selector,
            &self.config.openai.default_model,
            &self.config.ollama.default_model,
        )
    }

    /// Resolve `selector` to a provider handle. No network call is made.
    pub fn resolve(&self, selector: &str) -> LlmProvider {
        let selected = self.select(selector);
        debug!(%selector, ?selected, "model resolved");
        let timeout = self.config.request_timeout_seconds;
        match selected {
            ModelSelector::Hosted(model) => LlmProvider::OpenAi(
                openai_compatible::OpenAiCompatibleProvider::new(
                    self.client.clone(),
                    self.config.openai.api_base_url.clone(),
                    model,
                    timeout,
                    self.openai_api_key.clone(),
                ),
            ),
            ModelSelector::LocalCompatible(model) => {
                LlmProvider::Ollama(ollama::OllamaProvider::new(
                    self.client.clone(),
                    self.config.ollama.api_base_url.clone(),
                    model,
                    timeout,
                    self.config.ollama_api_key.clone(),
                ))
            }
        }
    }
}

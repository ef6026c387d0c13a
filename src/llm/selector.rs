//! Model selector parsing.
//!
//! The client sends a free-form string (`"gpt-4o"`, `"openai:gpt-4o"`,
//! `"ollama"`, `"ollama:llama3:8b"`). [`ModelSelector::parse`] turns it into a
//! closed variant and never fails: anything unrecognised is a hosted model
//! name, and a missing model name falls back to the provider default.

/// Prefix routing a selector to the local OpenAI-compatible server.
pub const LOCAL_PREFIX: &str = "ollama";
/// Optional explicit prefix for the hosted provider.
pub const HOSTED_PREFIX: &str = "openai";

pub const DEFAULT_HOSTED_MODEL: &str = "gpt-4o";
pub const DEFAULT_LOCAL_MODEL: &str = "llama3";

/// Which backend a request goes to, and with which model.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ModelSelector {
    Hosted(String),
    LocalCompatible(String),
}

impl ModelSelector {
    /// Parse with the built-in default model names.
    pub fn parse(selector: &str) -> Self {
        Self::parse_with_defaults(selector, DEFAULT_HOSTED_MODEL, DEFAULT_LOCAL_MODEL)
    }

    /// Parse with configured default model names.
    ///
    /// Only the first `:` splits provider from model, so Ollama tags survive:
    /// `"ollama:llama3:8b"` selects local model `"llama3:8b"`.
    pub fn parse_with_defaults(selector: &str, hosted_default: &str, local_default: &str) -> Self {
        let selector = selector.trim();
        let (prefix, rest) = match selector.split_once(':') {
            Some((prefix, rest)) => (prefix, Some(rest.trim())),
            None => (selector, None),
        };
        let or_default = |model: Option<&str>, default: &str| {
            model
                .filter(|m| !m.is_empty())
                .unwrap_or(default)
                .to_string()
        };

        if prefix.eq_ignore_ascii_case(LOCAL_PREFIX) {
            ModelSelector::LocalCompatible(or_default(rest, local_default))
        } else if prefix.eq_ignore_ascii_case(HOSTED_PREFIX) {
            ModelSelector::Hosted(or_default(rest, hosted_default))
        } else {
            ModelSelector::Hosted(or_default(Some(selector), hosted_default))
        }
    }

    pub fn model(&self) -> &str {
        match self {
            ModelSelector::Hosted(m) | ModelSelector::LocalCompatible(m) => m,
        }
    }
}

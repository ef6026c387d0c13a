//! Configuration loading with env-var overrides.
//!
//! Reads `config/default.toml` (or the file named by `MEMCHAT_CONFIG`)
//! relative to the current working directory, then applies `MEMCHAT_BIND`,
//! `MEMCHAT_LOG_LEVEL` and `MEM_MACHINE_URL` overrides. The hosted provider
//! key comes from `OPENAI_API_KEY` only, never from TOML.

use std::{
    env, fs,
    path::{Path, PathBuf},
};

use serde::Deserialize;

use crate::error::AppError;

/// HTTP listener configuration.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Socket address to bind, e.g. `127.0.0.1:3000`.
    pub bind: String,
}

/// When the user turn is written to the memory service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MemoryWriteMode {
    /// Awaited before the model call starts. The reply is delayed by the
    /// memory write latency.
    Inline,
    /// Spawned as a detached task; the reply does not wait for it.
    Background,
}

/// Memory service client configuration.
#[derive(Debug, Clone)]
pub struct MemoryConfig {
    /// Base URL of the memory service (`{base}/add`, `{base}/retrieve`, …).
    pub base_url: String,
    /// Per-request HTTP timeout in seconds.
    pub timeout_seconds: u64,
    pub write_mode: MemoryWriteMode,
}

/// One OpenAI-compatible backend (`[llm.openai]` / `[llm.ollama]`).
#[derive(Debug, Clone)]
pub struct ProviderConfig {
    /// Full chat completions endpoint URL.
    pub api_base_url: String,
    /// Model used when the selector names the provider but no model.
    pub default_model: String,
}

/// LLM provider configuration.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Seconds allowed until the provider returns response headers.
    pub request_timeout_seconds: u64,
    /// Max seconds between two stream events before the stream is cut.
    pub stream_idle_timeout_seconds: u64,
    pub openai: ProviderConfig,
    pub ollama: ProviderConfig,
    /// Placeholder credential the local endpoint expects but ignores.
    pub ollama_api_key: String,
}

/// Fully-resolved process configuration.
#[derive(Debug, Clone)]
pub struct Config {
    pub log_level: String,
    /// Set when `MEMCHAT_LOG_LEVEL` was given; `log_level` then takes
    /// precedence over `RUST_LOG`.
    pub log_level_pinned: bool,
    pub server: ServerConfig,
    pub memory: MemoryConfig,
    pub llm: LlmConfig,
    /// From `OPENAI_API_KEY`; `None` when unset.
    pub openai_api_key: Option<String>,
}

/// Environment-sourced overrides. Tests build this directly instead of
/// mutating process env.
#[derive(Debug, Clone, Default)]
pub struct EnvOverrides {
    pub bind: Option<String>,
    pub log_level: Option<String>,
    pub memory_url: Option<String>,
    pub openai_api_key: Option<String>,
}

impl EnvOverrides {
    pub fn from_env() -> Self {
        Self {
            bind: env::var("MEMCHAT_BIND").ok(),
            log_level: env::var("MEMCHAT_LOG_LEVEL").ok(),
            memory_url: env::var("MEM_MACHINE_URL").ok(),
            openai_api_key: env::var("OPENAI_API_KEY").ok().filter(|k| !k.is_empty()),
        }
    }
}

/// Raw TOML shape, the `serde` target before resolution.
#[derive(Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    server: RawServer,
    #[serde(default)]
    memory: RawMemory,
    #[serde(default)]
    llm: RawLlm,
}

#[derive(Deserialize)]
struct RawServer {
    #[serde(default = "default_bind")]
    bind: String,
    #[serde(default = "default_log_level")]
    log_level: String,
}

impl Default for RawServer {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            log_level: default_log_level(),
        }
    }
}

#[derive(Deserialize)]
struct RawMemory {
    #[serde(default = "default_memory_base_url")]
    base_url: String,
    #[serde(default = "default_memory_timeout_seconds")]
    timeout_seconds: u64,
    #[serde(default = "default_write_mode")]
    write_mode: MemoryWriteMode,
}

impl Default for RawMemory {
    fn default() -> Self {
        Self {
            base_url: default_memory_base_url(),
            timeout_seconds: default_memory_timeout_seconds(),
            write_mode: default_write_mode(),
        }
    }
}

#[derive(Deserialize)]
struct RawLlm {
    #[serde(default = "default_request_timeout_seconds")]
    request_timeout_seconds: u64,
    #[serde(default = "default_stream_idle_timeout_seconds")]
    stream_idle_timeout_seconds: u64,
    #[serde(default = "default_openai")]
    openai: RawProvider,
    #[serde(default = "default_ollama")]
    ollama: RawOllama,
}

impl Default for RawLlm {
    fn default() -> Self {
        Self {
            request_timeout_seconds: default_request_timeout_seconds(),
            stream_idle_timeout_seconds: default_stream_idle_timeout_seconds(),
            openai: default_openai(),
            ollama: default_ollama(),
        }
    }
}

#[derive(Deserialize)]
struct RawProvider {
    #[serde(default = "default_openai_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_openai_model")]
    default_model: String,
}

#[derive(Deserialize)]
struct RawOllama {
    #[serde(default = "default_ollama_api_base_url")]
    api_base_url: String,
    #[serde(default = "default_ollama_model")]
    default_model: String,
    #[serde(default = "default_ollama_api_key")]
    api_key: String,
}

fn default_bind() -> String {
    "127.0.0.1:3000".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_memory_base_url() -> String {
    "http://localhost:8000".to_string()
}

fn default_memory_timeout_seconds() -> u64 {
    10
}

fn default_write_mode() -> MemoryWriteMode {
    MemoryWriteMode::Inline
}

fn default_request_timeout_seconds() -> u64 {
    60
}

fn default_stream_idle_timeout_seconds() -> u64 {
    120
}

fn default_openai_api_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".to_string()
}

fn default_openai_model() -> String {
    "gpt-4o".to_string()
}

fn default_ollama_api_base_url() -> String {
    "http://localhost:11434/v1/chat/completions".to_string()
}

fn default_ollama_model() -> String {
    "llama3".to_string()
}

fn default_ollama_api_key() -> String {
    "ollama".to_string()
}

fn default_openai() -> RawProvider {
    RawProvider {
        api_base_url: default_openai_api_base_url(),
        default_model: default_openai_model(),
    }
}

fn default_ollama() -> RawOllama {
    RawOllama {
        api_base_url: default_ollama_api_base_url(),
        default_model: default_ollama_model(),
        api_key: default_ollama_api_key(),
    }
}

/// Load config from `MEMCHAT_CONFIG` or `config/default.toml`, then apply
/// env-var overrides.
pub fn load() -> Result<Config, AppError> {
    let path = env::var("MEMCHAT_CONFIG")
        .map(PathBuf::from)
        .unwrap_or_else(|_| PathBuf::from("config/default.toml"));
    load_from(&path, EnvOverrides::from_env())
}

/// Internal loader. Accepts an explicit path and overrides.
pub fn load_from(path: &Path, overrides: EnvOverrides) -> Result<Config, AppError> {
    let raw = fs::read_to_string(path)
        .map_err(|e| AppError::Config(format!("cannot read {}: {e}", path.display())))?;

    let parsed: RawConfig = toml::from_str(&raw)
        .map_err(|e| AppError::Config(format!("parse error in {}: {e}", path.display())))?;

    let config = resolve(parsed, overrides);
    if config.memory.base_url.trim().is_empty() {
        return Err(AppError::Config("memory base_url must not be empty".into()));
    }
    Ok(config)
}

fn resolve(parsed: RawConfig, overrides: EnvOverrides) -> Config {
    Config {
        log_level_pinned: overrides.log_level.is_some(),
        log_level: overrides.log_level.unwrap_or(parsed.server.log_level),
        server: ServerConfig {
            bind: overrides.bind.unwrap_or(parsed.server.bind),
        },
        memory: MemoryConfig {
            base_url: overrides.memory_url.unwrap_or(parsed.memory.base_url),
            timeout_seconds: parsed.memory.timeout_seconds,
            write_mode: parsed.memory.write_mode,
        },
        llm: LlmConfig {
            request_timeout_seconds: parsed.llm.request_timeout_seconds,
            stream_idle_timeout_seconds: parsed.llm.stream_idle_timeout_seconds,
            openai: ProviderConfig {
                api_base_url: parsed.llm.openai.api_base_url,
                default_model: parsed.llm.openai.default_model,
            },
            ollama: ProviderConfig {
                api_base_url: parsed.llm.ollama.api_base_url,
                default_model: parsed.llm.ollama.default_model,
            },
            ollama_api_key: parsed.llm.ollama.api_key,
        },
        openai_api_key: overrides.openai_api_key,
    }
}

impl Config {
    /// Built-in defaults with no file and no env. Used by tests and as the
    /// reference for `config/default.toml`.
    pub fn defaults() -> Self {
        resolve(RawConfig::default(), EnvOverrides::default())
    }
}

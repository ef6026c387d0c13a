//! Memory service client: add, retrieve and delete against an external
//! long-term memory HTTP API.
//!
//! Every operation is advisory. Transport errors and non-success statuses are
//! logged and folded into a plain value ([`MemoryAck::Failed`] or an empty
//! snippet list); nothing here returns `Err` to the caller.

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::MemoryConfig;

/// Reserved delete scope meaning "wipe everything".
pub const ALL_MEMORIES: &str = "all";

/// Outcome of a best-effort write (`add` / `delete`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryAck {
    /// The service answered with a 2xx status.
    Accepted,
    /// Transport failure or non-success status; already logged.
    Failed,
}

impl MemoryAck {
    pub fn is_accepted(self) -> bool {
        matches!(self, MemoryAck::Accepted)
    }
}

/// HTTP client for the memory service.
///
/// Built once at startup and shared behind an `Arc`; `reqwest::Client` pools
/// connections internally.
#[derive(Debug, Clone)]
pub struct MemoryClient {
    client: Client,
    base_url: String,
}

impl MemoryClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Ok(Self { client, base_url })
    }

    pub fn from_config(config: &MemoryConfig) -> Result<Self, reqwest::Error> {
        Self::new(config.base_url.clone(), Duration::from_secs(config.timeout_seconds))
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Store `content` in long-term memory.
    pub async fn add_memory(&self, content: &str) -> MemoryAck {
        self.post_ack("add", &AddRequest { content }).await
    }

    /// Fetch snippets relevant to `query`. Empty on any failure.
    pub async fn retrieve_context(&self, query: &str) -> Vec<String> {
        let url = self.endpoint("retrieve");
        let response = match self.client.post(&url).json(&RetrieveRequest { query }).send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(%url, error = %e, "memory retrieve failed (transport)");
                return Vec::new();
            }
        };

        let status = response.status();
        if !status.is_success() {
            warn!(%url, %status, "memory retrieve returned non-success status");
            return Vec::new();
        }

        let body = match response.json::<Value>().await {
            Ok(v) => v,
            Err(e) => {
                warn!(%url, error = %e, "memory retrieve returned unparsable body");
                return Vec::new();
            }
        };

        let snippets = parse_memories(&body);
        debug!(snippets = snippets.len(), "memory context retrieved");
        snippets
    }

    /// Delete memories in `scope`; [`ALL_MEMORIES`] resets everything.
    pub async fn delete_memory(&self, scope: &str) -> MemoryAck {
        self.post_ack("delete", &DeleteRequest { id: scope }).await
    }

    async fn post_ack<T: Serialize + ?Sized>(&self, op: &str, body: &T) -> MemoryAck {
        let url = self.endpoint(op);
        match self.client.post(&url).json(body).send().await {
            Ok(response) if response.status().is_success() => {
                debug!(%op, "memory write accepted");
                MemoryAck::Accepted
            }
            Ok(response) => {
                warn!(%op, %url, status = %response.status(), "memory write rejected");
                MemoryAck::Failed
            }
            Err(e) => {
                warn!(%op, %url, error = %e, "memory write failed (transport)");
                MemoryAck::Failed
            }
        }
    }

    fn endpoint(&self, op: &str) -> String {
        format!("{}/{op}", self.base_url)
    }
}

/// Pull string snippets out of `{"memories": [...]}`. A missing or
/// non-array field yields nothing; non-string entries are skipped.
fn parse_memories(body: &Value) -> Vec<String> {
    body.get("memories")
        .and_then(Value::as_array)
        .map(|items| {
            items
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        })
        .unwrap_or_default()
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AddRequest<'a> {
    content: &'a str,
}

#[derive(Serialize)]
struct RetrieveRequest<'a> {
    query: &'a str,
}

#[derive(Serialize)]
struct DeleteRequest<'a> {
    id: &'a str,
}

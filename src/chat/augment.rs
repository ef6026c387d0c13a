//! Memory augmentation of the outgoing message set.
//!
//! When memory is enabled and the latest turn is from the user, relevant
//! snippets are fetched and appended to a copy of that turn, and the original
//! turn is written back to the memory service. The caller's slice is never
//! touched.

use tokio_util::task::TaskTracker;
use tracing::{debug, info};

use crate::chat::{ChatMessage, Role};
use crate::config::MemoryWriteMode;
use crate::memory::MemoryClient;

/// Header line that introduces retrieved snippets.
pub const CONTEXT_LABEL: &str = "Retrieved Memories:";

/// Render snippets as the block appended to the user turn, or `None` when
/// there is nothing to add.
pub fn context_block(snippets: &[String]) -> Option<String> {
    if snippets.is_empty() {
        return None;
    }
    Some(format!("\n\n{CONTEXT_LABEL}\n{}\n\n", snippets.join("\n")))
}

/// Build the message set sent to the model.
///
/// Without `use_memory`, or when the last message is not a user turn, the
/// result equals `messages` and the memory service is not contacted.
/// Background writes are spawned on `tasks` so shutdown can drain them.
pub async fn augment(
    messages: &[ChatMessage],
    use_memory: bool,
    memory: &MemoryClient,
    write_mode: MemoryWriteMode,
    tasks: &TaskTracker,
) -> Vec<ChatMessage> {
    let mut out = messages.to_vec();
    let Some(last) = out.last_mut() else {
        return out;
    };
    if !use_memory || last.role != Role::User {
        return out;
    }

    let original = last.content.clone();
    let snippets = memory.retrieve_context(&original).await;
    if let Some(block) = context_block(&snippets) {
        debug!(snippets = snippets.len(), "appending memory context to user turn");
        last.content.push_str(&block);
    }

    remember(memory, original, write_mode, tasks).await;
    out
}

/// Store the user turn. Failures are already logged by the client and never
/// reach the chat turn.
async fn remember(
    memory: &MemoryClient,
    content: String,
    write_mode: MemoryWriteMode,
    tasks: &TaskTracker,
) {
    match write_mode {
        MemoryWriteMode::Inline => {
            let ack = memory.add_memory(&content).await;
            debug!(accepted = ack.is_accepted(), "user turn stored inline");
        }
        MemoryWriteMode::Background => {
            let memory = memory.clone();
            tasks.spawn(async move {
                let ack = memory.add_memory(&content).await;
                info!(accepted = ack.is_accepted(), "user turn stored in background");
            });
        }
    }
}

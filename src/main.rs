//! memchat: memory-augmented chat backend entry point.
//!
//! Startup sequence:
//!   1. Load .env (if present)
//!   2. Load config
//!   3. Init logger at configured level
//!   4. Build memory client + provider resolver
//!   5. Spawn Ctrl-C → shutdown signal watcher
//!   6. Serve HTTP until shutdown

use tokio_util::sync::CancellationToken;
use tracing::info;

use memchat::{config, error, logger, server};

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}

async fn run() -> Result<(), error::AppError> {
    // .env is optional.
    let _ = dotenvy::dotenv();

    let config = config::load()?;

    logger::init(&config.log_level, config.log_level_pinned)?;

    info!(
        bind = %config.server.bind,
        memory_url = %config.memory.base_url,
        write_mode = ?config.memory.write_mode,
        hosted_default = %config.llm.openai.default_model,
        local_default = %config.llm.ollama.default_model,
        openai_key_set = config.openai_api_key.is_some(),
        "config loaded"
    );

    let state = server::AppState::from_config(&config)?;

    let shutdown = CancellationToken::new();
    let ctrlc_token = shutdown.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("ctrl-c received, initiating shutdown");
            ctrlc_token.cancel();
        }
    });

    server::serve(&config.server.bind, state, shutdown).await
}

//! Logging initialisation via tracing-subscriber.
//!
//! Call [`init`] once at startup, after config is resolved.

use tracing_subscriber::EnvFilter;

use crate::error::AppError;

/// Initialise the global tracing subscriber.
///
/// `level` accepts a plain level (`"info"`, `"debug"`…) or a full filter
/// directive (`"memchat=debug,reqwest=warn"`).
///
/// With `prefer_level` (set when `MEMCHAT_LOG_LEVEL` is given) the configured
/// level wins over `RUST_LOG`. Otherwise a valid `RUST_LOG` wins and `level`
/// is the fallback.
pub fn init(level: &str, prefer_level: bool) -> Result<(), AppError> {
    let rust_log = std::env::var(EnvFilter::DEFAULT_ENV).ok();
    let filter = build_filter(level, rust_log.as_deref(), prefer_level)?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|e| AppError::Logger(format!("failed to set subscriber: {e}")))
}

/// Choose between the configured level and `RUST_LOG`.
///
/// An invalid configured level is only an error when no usable `RUST_LOG`
/// can stand in for it.
fn build_filter(
    level: &str,
    rust_log: Option<&str>,
    prefer_level: bool,
) -> Result<EnvFilter, AppError> {
    let from_env = rust_log
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(EnvFilter::try_new);

    match (prefer_level, EnvFilter::try_new(level), from_env) {
        (true, Ok(configured), _) => Ok(configured),
        (_, _, Some(Ok(env))) => Ok(env),
        (false, Ok(configured), _) => Ok(configured),
        (_, Err(e), _) => Err(AppError::Logger(format!("invalid log level '{level}': {e}"))),
    }
}

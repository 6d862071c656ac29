use std::path::PathBuf;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{
    fmt, layer::SubscriberExt, registry::LookupSpan, util::SubscriberInitExt, EnvFilter, Layer,
};

use crate::errors::{Result, ServerError};

/// File name of the rolling request log
const ACCESS_LOG: &str = "access.log";

/// Default log directory: `~/.seq2seq/logs`
pub fn default_log_dir() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".seq2seq")
        .join("logs")
}

/// `RUST_LOG` when set, otherwise the configured level
fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level))
}

/// Compact console output shared by both modes
fn stdout_layer<S>() -> impl Layer<S> + Send + Sync + 'static
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a> + 'static,
{
    fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_line_number(false)
}

/// Stdout plus a daily rolling `access.log` under `log_dir`
/// (default `~/.seq2seq/logs`). No ANSI colors in the file.
pub fn init_production_logging(level: &str, log_dir: Option<PathBuf>) -> Result<()> {
    let log_dir = log_dir.unwrap_or_else(default_log_dir);
    std::fs::create_dir_all(&log_dir)?;

    let file_layer = fmt::layer()
        .with_writer(RollingFileAppender::new(Rotation::DAILY, &log_dir, ACCESS_LOG))
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true);

    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(file_layer)
        .with(stdout_layer())
        .try_init()
        .map_err(|e| ServerError::Tracing(e.to_string()))?;

    tracing::info!(log_dir = %log_dir.display(), level = %level, "Server logging initialized");
    Ok(())
}

/// Stdout only; used when file logging is disabled and by `init-config`
pub fn init_simple_logging(level: &str) -> Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(level))
        .with(stdout_layer())
        .try_init()
        .map_err(|e| ServerError::Tracing(e.to_string()))
}

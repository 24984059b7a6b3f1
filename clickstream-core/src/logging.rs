//! File logging for clickstream
//!
//! Log files live in the XDG state directory (`~/.local/state/clickstream/`).
//! The appender rotates daily, so there is no single `clickstream.log`: each
//! UTC day gets its own file named `clickstream.log.YYYY-MM-DD`, and only the
//! newest `[logging] max_files` of them are kept.

use crate::config::{Config, LoggingConfig};
use crate::error::{Error, Result};
use chrono::{NaiveDate, Utc};
use std::path::PathBuf;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Prefix shared by every rotated log file.
pub const LOG_FILE_PREFIX: &str = "clickstream.log";

/// Directory holding the rotated log files.
pub fn log_dir() -> PathBuf {
    Config::state_dir()
}

/// File the appender writes to on `date` (UTC).
pub fn log_file_for(date: NaiveDate) -> PathBuf {
    log_dir().join(format!("{}.{}", LOG_FILE_PREFIX, date.format("%Y-%m-%d")))
}

/// File receiving today's log lines.
pub fn current_log_file() -> PathBuf {
    log_file_for(Utc::now().date_naive())
}

/// Install the global subscriber writing to the daily log file.
///
/// `RUST_LOG` takes precedence over the configured level. Fails with
/// [`Error::Config`] when the level does not parse or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<LoggingGuard> {
    let filter = env_filter(std::env::var("RUST_LOG").ok(), &config.level)?;

    let dir = log_dir();
    std::fs::create_dir_all(&dir)?;
    let appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .max_log_files(config.max_files.max(1))
        .build(&dir)
        .map_err(|e| Error::Config(format!("cannot open log file in {}: {}", dir.display(), e)))?;
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_line_number(true),
        )
        .try_init()
        .map_err(|e| Error::Config(format!("logging already initialised: {}", e)))?;

    tracing::info!(
        file = %current_log_file().display(),
        level = %config.level,
        max_files = config.max_files,
        "Logging to daily file"
    );

    Ok(LoggingGuard { _guard: guard })
}

/// Stdout logging for tests; safe to call more than once.
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Flushes buffered log lines when dropped.
pub struct LoggingGuard {
    _guard: WorkerGuard,
}

fn env_filter(from_env: Option<String>, level: &str) -> Result<EnvFilter> {
    let directives = from_env.filter(|d| !d.trim().is_empty());
    let directives = directives.as_deref().unwrap_or(level);
    EnvFilter::try_new(directives)
        .map_err(|e| Error::Config(format!("invalid log filter {:?}: {}", directives, e)))
}

//! Tracing subscriber set-up.
//!
//! Console output goes to stderr so command output on stdout stays clean.
//! `RUST_LOG` wins over the configured level when it is set.

use anyhow::{Context, Result};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

use crate::config::{LogFormat, LogSection};

const LOG_FILE_PREFIX: &str = "cardboard.log";

fn make_filter(rust_log: Option<&str>, level: &str) -> Result<EnvFilter> {
    match rust_log {
        Some(directives) if !directives.trim().is_empty() => {
            EnvFilter::try_new(directives).context("Invalid RUST_LOG directives")
        }
        _ => EnvFilter::try_new(level).with_context(|| format!("Invalid log level '{}'", level)),
    }
}

/// Install the global subscriber.
///
/// The returned guard flushes the log file on drop; keep it alive for the
/// lifetime of the process.
pub fn init_tracing(log: &LogSection) -> Result<Option<WorkerGuard>> {
    let rust_log = std::env::var("RUST_LOG").ok();
    let filter = make_filter(rust_log.as_deref(), &log.level)?;

    let (file_layer, guard) = match &log.directory {
        Some(dir) => {
            std::fs::create_dir_all(dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
            let appender = tracing_appender::rolling::daily(dir, LOG_FILE_PREFIX);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer().json().with_ansi(false).with_writer(writer);
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let registry = tracing_subscriber::registry().with(filter).with(file_layer);
    match log.format {
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .try_init(),
        LogFormat::Pretty => registry
            .with(fmt::layer().with_writer(std::io::stderr))
            .try_init(),
    }
    .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_filter_uses_configured_level_without_rust_log() {
        let filter = make_filter(None, "debug").unwrap();
        assert_eq!(filter.to_string(), "debug");
    }

    #[test]
    fn test_filter_prefers_rust_log() {
        let filter = make_filter(Some("cardboard=trace"), "info").unwrap();
        assert_eq!(filter.to_string(), "cardboard=trace");
    }

    #[test]
    fn test_blank_rust_log_falls_back_to_level() {
        let filter = make_filter(Some("  "), "warn").unwrap();
        assert_eq!(filter.to_string(), "warn");
    }

    #[test]
    fn test_invalid_level_is_error() {
        assert!(make_filter(None, "cardboard=notalevel").is_err());
    }
}

//! Tracing setup: console output plus an optional size-rotated log file.

use anyhow::{Context, Result};
use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::{LogFileConfig, LogFormat};

/// Open the rotating log file behind a non-blocking writer
///
/// Buffered lines are flushed when the returned guard is dropped, so the
/// guard has to live as long as logging does.
pub fn file_writer(config: &LogFileConfig) -> Result<Option<(NonBlocking, WorkerGuard)>> {
    let Some(path) = &config.path else {
        return Ok(None);
    };

    let condition = RollingConditionBasic::new().max_size(config.max_bytes);
    let appender = BasicRollingFileAppender::new(path, condition, config.backups)
        .with_context(|| format!("Failed to open log file {}", path.display()))?;

    Ok(Some(tracing_appender::non_blocking(appender)))
}

/// Install the global subscriber
///
/// `RUST_LOG` overrides the default `info` filter for both sinks.
pub fn init_tracing(format: LogFormat, file: &LogFileConfig) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let (pretty, json) = match format {
        LogFormat::Pretty => (Some(fmt::layer()), None),
        LogFormat::Json => (None, Some(fmt::layer().json())),
    };

    let (file_layer, guard) = match file_writer(file)? {
        Some((writer, guard)) => (
            Some(fmt::layer().with_ansi(false).with_writer(writer)),
            Some(guard),
        ),
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(pretty)
        .with(json)
        .with(file_layer)
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn file_config(dir: &Path, max_bytes: u64) -> LogFileConfig {
        LogFileConfig {
            path: Some(dir.join("bot.log")),
            max_bytes,
            backups: 2,
        }
    }

    fn log_lines(config: &LogFileConfig, lines: usize) {
        let (writer, guard) = file_writer(config)
            .unwrap()
            .expect("file sink should be enabled");
        let subscriber = fmt().with_ansi(false).with_writer(writer).finish();
        tracing::subscriber::with_default(subscriber, || {
            for line in 0..lines {
                tracing::info!(line, "Survey relayed to review channel");
            }
        });
        drop(guard);
    }

    #[test]
    fn test_file_sink_disabled() {
        let config = LogFileConfig {
            path: None,
            ..LogFileConfig::default()
        };
        assert!(file_writer(&config).unwrap().is_none());
    }

    #[test]
    fn test_events_reach_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), 1_000_000);

        log_lines(&config, 3);

        let contents = std::fs::read_to_string(dir.path().join("bot.log")).unwrap();
        assert_eq!(contents.matches("Survey relayed to review channel").count(), 3);
        assert!(contents.contains("line=2"));
    }

    #[test]
    fn test_file_rotates_by_size() {
        let dir = tempfile::tempdir().unwrap();
        let config = file_config(dir.path(), 256);

        log_lines(&config, 100);

        assert!(dir.path().join("bot.log").exists());
        assert!(dir.path().join("bot.log.1").exists());
        assert!(dir.path().join("bot.log.2").exists());
        assert!(!dir.path().join("bot.log.3").exists());
    }
}

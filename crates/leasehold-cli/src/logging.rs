//! Logging setup for the leasehold binary
//!
//! Console output is always on. When a log directory is configured, events
//! are also written to `leasehold.log` there with daily rotation.

use std::path::PathBuf;

use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer, Registry, fmt};

const LOG_FILE_NAME: &str = "leasehold.log";

/// Logging configuration for the binary.
#[derive(Debug, Clone)]
pub struct LoggingConfig {
    /// Directory for the rolling log file; `None` disables file logging
    pub log_dir: Option<PathBuf>,
    /// Level used when `RUST_LOG` is not set
    pub level: Level,
}

impl LoggingConfig {
    pub fn new(log_dir: Option<PathBuf>, level: &str) -> Self {
        Self {
            log_dir,
            level: level.parse().unwrap_or(Level::INFO),
        }
    }

    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(self.level.to_string()))
    }
}

/// Keeps the file appender worker alive; dropping it flushes buffered output.
pub struct LoggingGuard {
    _file_guard: Option<WorkerGuard>,
}

/// Install the global subscriber
pub fn init_logging(config: &LoggingConfig) -> anyhow::Result<LoggingGuard> {
    let mut layers: Vec<Box<dyn Layer<Registry> + Send + Sync>> = Vec::new();

    let console_layer = fmt::layer()
        .with_target(true)
        .with_thread_names(true)
        .with_filter(config.filter());
    layers.push(Box::new(console_layer));

    let file_guard = match &config.log_dir {
        Some(log_dir) => {
            std::fs::create_dir_all(log_dir)?;

            let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_NAME);
            let (writer, guard) = tracing_appender::non_blocking(appender);

            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_target(true)
                .with_thread_names(true)
                .with_file(true)
                .with_line_number(true)
                .with_ansi(false)
                .with_filter(config.filter());
            layers.push(Box::new(file_layer));
            Some(guard)
        }
        None => None,
    };

    Registry::default()
        .with(layers)
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialize logging: {}", e))?;

    if let Some(log_dir) = &config.log_dir {
        tracing::info!(log_dir = %log_dir.display(), "File logging initialized");
    }

    Ok(LoggingGuard {
        _file_guard: file_guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_parsing() {
        assert_eq!(LoggingConfig::new(None, "debug").level, Level::DEBUG);
        assert_eq!(LoggingConfig::new(None, "WARN").level, Level::WARN);
        assert_eq!(LoggingConfig::new(None, "verbose").level, Level::INFO);
    }
}

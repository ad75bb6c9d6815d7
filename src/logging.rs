//! Logging setup for expvard.
//!
//! Logs go to stderr by default, or to a file when one is configured.
//! `RUST_LOG` overrides the configured level.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, fmt};

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Logging configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    /// Log level (trace, debug, info, warn, error, off).
    pub level: String,
    /// Whether logging is enabled.
    pub enabled: bool,
    /// Log file. `None` logs to stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: DEFAULT_LOG_LEVEL.to_string(),
            enabled: true,
            file: None,
        }
    }
}

impl LogConfig {
    /// Parses log level from string.
    #[must_use]
    pub fn parse_level(value: &str) -> String {
        match value.to_lowercase().as_str() {
            "trace" => "trace".to_string(),
            "debug" => "debug".to_string(),
            "info" => "info".to_string(),
            "warn" | "warning" => "warn".to_string(),
            "error" => "error".to_string(),
            "off" | "none" | "disabled" => "off".to_string(),
            _ => DEFAULT_LOG_LEVEL.to_string(),
        }
    }

    /// The configured level, normalized.
    #[must_use]
    pub fn level(&self) -> String {
        Self::parse_level(&self.level)
    }

    /// Whether `init` would install a subscriber.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.enabled && self.level() != "off"
    }
}

/// Splits a log file path into the directory and file name the appender
/// expects.
fn split_log_path(path: &Path) -> io::Result<(PathBuf, PathBuf)> {
    let file_name = path.file_name().ok_or_else(|| {
        io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("log file path has no file name: {}", path.display()),
        )
    })?;
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    Ok((dir, PathBuf::from(file_name)))
}

/// Opens `path` for appending behind a non-blocking writer.
///
/// Lines are flushed when the returned guard is dropped.
fn file_writer(path: &Path) -> io::Result<(NonBlocking, WorkerGuard)> {
    let (dir, file_name) = split_log_path(path)?;
    fs::create_dir_all(&dir)?;
    let appender = tracing_appender::rolling::never(&dir, &file_name);
    Ok(tracing_appender::non_blocking(appender))
}

/// Initializes the logging system.
///
/// Returns the appender guard when logging to a file; it must be held until
/// exit or buffered lines are lost.
///
/// # Errors
/// Returns error if the log file cannot be created or a global subscriber
/// is already installed.
pub fn init(config: &LogConfig) -> io::Result<Option<WorkerGuard>> {
    if !config.is_active() {
        return Ok(None);
    }

    let level = config.level();
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&level));

    let guard = match &config.file {
        Some(path) => {
            let (writer, guard) = file_writer(path)?;

            let file_layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(false)
                .with_line_number(false);

            tracing_subscriber::registry()
                .with(filter)
                .with(file_layer)
                .try_init()
                .map_err(io::Error::other)?;
            Some(guard)
        }
        None => {
            let stderr_layer = fmt::layer().with_writer(io::stderr).with_target(true);

            tracing_subscriber::registry()
                .with(filter)
                .with(stderr_layer)
                .try_init()
                .map_err(io::Error::other)?;
            None
        }
    };

    tracing::info!("expvard logging initialized");
    tracing::info!("Log level: {}", level);
    if let Some(path) = &config.file {
        tracing::info!("Log file: {}", path.display());
    }

    Ok(guard)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_log_config_default() {
        let config = LogConfig::default();
        assert_eq!(config.level, DEFAULT_LOG_LEVEL);
        assert!(config.enabled);
        assert!(config.file.is_none());
        assert!(config.is_active());
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(LogConfig::parse_level("debug"), "debug");
        assert_eq!(LogConfig::parse_level("DEBUG"), "debug");
        assert_eq!(LogConfig::parse_level("warn"), "warn");
        assert_eq!(LogConfig::parse_level("warning"), "warn");
        assert_eq!(LogConfig::parse_level("off"), "off");
        assert_eq!(LogConfig::parse_level("invalid"), DEFAULT_LOG_LEVEL);
    }

    #[test]
    fn test_inactive_configs() {
        let disabled = LogConfig {
            enabled: false,
            ..LogConfig::default()
        };
        assert!(!disabled.is_active());

        let off = LogConfig {
            level: "none".into(),
            ..LogConfig::default()
        };
        assert!(!off.is_active());
        assert!(init(&off).unwrap().is_none());
    }

    #[test]
    fn test_split_log_path() {
        let (dir, name) = split_log_path(Path::new("/var/log/expvard.log")).unwrap();
        assert_eq!(dir, PathBuf::from("/var/log"));
        assert_eq!(name, PathBuf::from("expvard.log"));

        let (dir, name) = split_log_path(Path::new("expvard.log")).unwrap();
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(name, PathBuf::from("expvard.log"));

        assert!(split_log_path(Path::new("/")).is_err());
    }

    #[test]
    fn test_file_writer_flushes_on_guard_drop() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("logs").join("expvard.log");

        let (writer, guard) = file_writer(&path).unwrap();
        let subscriber = tracing_subscriber::registry()
            .with(fmt::layer().with_writer(writer).with_ansi(false));
        tracing::subscriber::with_default(subscriber, || {
            tracing::error!("Failed to start expvar: port in use");
        });
        drop(guard);

        let content = fs::read_to_string(&path).unwrap();
        assert!(content.contains("Failed to start expvar: port in use"));
    }

    #[test]
    fn test_log_config_from_toml() {
        let config: LogConfig = toml::from_str(r#"level = "warning""#).unwrap();
        assert_eq!(config.level(), "warn");
        assert!(config.enabled);
    }
}

//! Logging configuration with rotation support
//!
//! # Example
//!
//! ```rust,no_run
//! use ragline_core::config::LoggingConfig;
//! use ragline_core::logging::init_logging;
//!
//! init_logging(&LoggingConfig {
//!     directory: Some("logs".into()),
//!     ..Default::default()
//! })
//! .unwrap();
//! ```

use crate::config::LoggingConfig;
use crate::error::{Error, Result};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Initialize the global subscriber
///
/// - stdout: compact text, or JSON lines when `json` is set
/// - file: daily-rotated plain text under `directory`, when set
/// - filter: `RUST_LOG` if present, otherwise `level`
///
/// Fails if a global subscriber is already installed.
pub fn init_logging(config: &LoggingConfig) -> Result<()> {
    let file_layer = match &config.directory {
        Some(directory) => {
            let appender = RollingFileAppender::builder()
                .rotation(Rotation::DAILY)
                .filename_prefix(&config.filename_prefix)
                .build(directory)
                .map_err(|e| Error::Internal(format!("Failed to create log appender: {}", e)))?;
            Some(fmt::layer().with_writer(appender).with_ansi(false))
        }
        None => None,
    };

    let compact_layer = (!config.json).then(|| fmt::layer().with_target(false).compact());
    let json_layer = config.json.then(|| fmt::layer().json());

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));

    tracing_subscriber::registry()
        .with(filter)
        .with(compact_layer)
        .with(json_layer)
        .with(file_layer)
        .try_init()
        .map_err(|e| Error::Internal(format!("Failed to init tracing: {}", e)))?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_fails() {
        let dir = tempfile::tempdir().unwrap();
        let config = LoggingConfig {
            directory: Some(dir.path().to_string_lossy().into_owned()),
            level: "debug".into(),
            ..Default::default()
        };

        // Another test may have installed a subscriber first; either way the
        // second call must fail.
        let _ = init_logging(&config);
        assert!(matches!(init_logging(&config), Err(Error::Internal(_))));
    }
}

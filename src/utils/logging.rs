//! Tracing subscriber setup.
//!
//! Log levels follow these conventions:
//! - ERROR: records naming an unknown destination
//! - WARN: malformed packets, rejected enqueues, transmit failures, retry exhaustion
//! - INFO: filter-induced metric overrides, neighbor removal, counter dumps
//! - DEBUG: packet build, enqueue and acknowledgement events
//! - TRACE: skipped TLVs, FSM dispatch

use crate::config::LoggingConfig;
use crate::error::{Result, RtpError};
use std::fs::OpenOptions;
use std::sync::Mutex;
use tracing_subscriber::EnvFilter;

/// Install the global subscriber described by `config`.
///
/// `RUST_LOG` takes precedence over the configured level. File output wins
/// over console output when both are enabled.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.log_level.as_str().to_lowercase()));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true);

    let installed = match (config.log_to_file, config.log_file_path.as_deref()) {
        (true, Some(path)) => {
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)
                .map_err(|e| RtpError::LoggingError(format!("Failed to open log file: {e}")))?;
            let builder = builder.with_ansi(false).with_writer(Mutex::new(file));
            if config.json_format {
                builder.json().try_init()
            } else {
                builder.try_init()
            }
        }
        (true, None) => {
            return Err(RtpError::LoggingError(
                "log_file_path must be set when log_to_file is enabled".to_string(),
            ))
        }
        (false, _) if config.json_format => builder.json().try_init(),
        (false, _) => builder.try_init(),
    };

    installed.map_err(|e| RtpError::LoggingError(e.to_string()))?;
    tracing::info!(app = %config.app_name, level = %config.log_level, "Logging initialized");
    Ok(())
}

/// Initialize the tracing subscriber for tests.
///
/// Uses `try_init` so repeated calls never panic.
pub fn init_for_tests() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("debug"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_test_writer()
        .try_init();
}

//! Tracing setup
//!
//! Console output goes to stderr; when a log file is given every event is
//! also appended to it without ANSI colours. The filter comes from
//! `MQTT_IP_REPORTER_LOG` and falls back to `info`.

use crate::error::ReporterError;
use std::fs::OpenOptions;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Environment variable holding the `EnvFilter` directives.
pub const LOG_ENV_VAR: &str = "MQTT_IP_REPORTER_LOG";

pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Build the filter from [`LOG_ENV_VAR`], or [`DEFAULT_LOG_LEVEL`] when unset
/// or unparsable.
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV_VAR).unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_LEVEL))
}

/// Install the global subscriber.
///
/// # Errors
///
/// - [`ReporterError::Io`] if the log file cannot be opened for appending
/// - [`ReporterError::Config`] if a global subscriber is already installed
pub fn init_logging(log_file: Option<&Path>) -> Result<(), ReporterError> {
    let file_layer = match log_file {
        Some(path) => {
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_target(false)
                    .with_writer(Mutex::new(file)),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(env_filter())
        .with(
            fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .with(file_layer)
        .try_init()
        .map_err(|e| ReporterError::Config(format!("failed to initialise logging: {}", e)))
}

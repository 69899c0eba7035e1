//! Error module
//!
//! Defines the error type shared by the publisher, monitor and lookup modes.
//! Every fallible operation in the library returns [`ReporterError`]; the
//! binary maps it to a process exit code.

use std::path::PathBuf;
use thiserror::Error;

/// The main error type for the IP reporter.
///
/// # Error Categories
///
/// - **Configuration**: missing or malformed config file, missing keys, bad CLI combinations
/// - **Connection**: broker unreachable, authentication rejected, TLS setup, timeouts
/// - **Interface**: the named network interface is absent or has no IPv4 address
/// - **I/O**: output or log file failures
#[derive(Error, Debug)]
pub enum ReporterError {
    /// MQTT connection error from the rumqttc v5 event loop.
    ///
    /// Boxed because `rumqttc::v5::ConnectionError` is large.
    #[error("MQTT connection error: {0}")]
    Connection(#[source] Box<rumqttc::v5::ConnectionError>),

    /// MQTT client request error (subscribe, publish, disconnect).
    #[error("MQTT client error: {0}")]
    Client(#[source] Box<rumqttc::v5::ClientError>),

    /// General I/O error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error, either while parsing the config file or encoding a report.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// The config file does not exist.
    #[error("Config file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    /// The config file parsed but is not usable (missing keys, bad values).
    #[error("Configuration error: {0}")]
    Config(String),

    /// Invalid command-line argument combination.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// TLS configuration error (unreadable CA certificate and similar).
    #[error("TLS configuration error: {0}")]
    Tls(String),

    /// Interface lookup failure.
    #[error("Interface error: {0}")]
    Interface(String),

    /// A bounded broker operation did not finish in time.
    #[error("Timed out: {0}")]
    Timeout(String),
}

impl From<rumqttc::v5::ConnectionError> for ReporterError {
    fn from(err: rumqttc::v5::ConnectionError) -> Self {
        ReporterError::Connection(Box::new(err))
    }
}

impl From<rumqttc::v5::ClientError> for ReporterError {
    fn from(err: rumqttc::v5::ClientError) -> Self {
        ReporterError::Client(Box::new(err))
    }
}

impl ReporterError {
    /// True for errors that mean the broker session is unusable.
    pub fn is_connection_error(&self) -> bool {
        matches!(
            self,
            ReporterError::Connection(_)
                | ReporterError::Client(_)
                | ReporterError::Tls(_)
                | ReporterError::Timeout(_)
        )
    }
}

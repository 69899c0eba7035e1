//! CLI argument parsing module
//!
//! Handles command-line argument parsing using `clap` derive macros.
//! This module defines the `Mode` enum for operation modes and the `Args` struct
//! containing all CLI arguments with validation logic.

use crate::config::DEFAULT_CONFIG_PATH;
use clap::{Parser, ValueEnum};
use std::fmt;
use std::path::PathBuf;

/// Operation mode for the IP reporter.
///
/// - **Monitor**: Subscribe to topics and render received reports to an HTML page
/// - **Publish**: Publish this host's interface address once and exit
/// - **Lookup**: Print an interface address without touching the broker
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Mode {
    /// Subscribe and keep an HTML page of recent reports up to date
    Monitor,
    /// Publish this host's IPv4 address once
    Publish,
    /// Print interface addresses and exit
    Lookup,
}

impl fmt::Display for Mode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Mode::Monitor => write!(f, "monitor"),
            Mode::Publish => write!(f, "publish"),
            Mode::Lookup => write!(f, "lookup"),
        }
    }
}

/// Command-line arguments for the IP reporter.
///
/// Use the `validate()` method after parsing to ensure argument combinations are valid.
///
/// # Example
///
/// ```rust,ignore
/// use clap::Parser;
/// use mqtt_ip_reporter::cli::Args;
///
/// let args = Args::parse();
/// args.validate()?;
/// ```
#[derive(Parser, Debug)]
#[command(name = "mqtt-ip-reporter")]
#[command(about = "Publish and monitor host IP addresses over MQTT")]
#[command(version)]
pub struct Args {
    /// Operation mode: monitor, publish, or lookup
    #[arg(long, value_enum, default_value_t = Mode::Monitor)]
    pub mode: Mode,

    /// Path to the JSON config file
    #[arg(short = 'c', long = "config_file_path", default_value = DEFAULT_CONFIG_PATH)]
    pub config_file_path: PathBuf,

    /// Network interface name (publish/lookup; overrides `ifname` in the config)
    pub ifname: Option<String>,

    /// Topic to publish to (publish only; overrides `topic_list` in the config)
    pub topic: Option<String>,
}

impl Args {
    /// Validate argument combinations.
    ///
    /// - Monitor mode takes no positional arguments
    /// - `TOPIC` is only meaningful in publish mode
    /// - Positional values may not be empty
    pub fn validate(&self) -> Result<(), String> {
        if self.mode == Mode::Monitor && (self.ifname.is_some() || self.topic.is_some()) {
            return Err("monitor mode takes no positional arguments".to_string());
        }

        if self.mode == Mode::Lookup && self.topic.is_some() {
            return Err("TOPIC is only accepted in publish mode".to_string());
        }

        if matches!(self.ifname.as_deref(), Some("")) {
            return Err("IFNAME must not be empty".to_string());
        }

        if matches!(self.topic.as_deref(), Some("")) {
            return Err("TOPIC must not be empty".to_string());
        }

        Ok(())
    }

    /// Topics given on the command line, replacing the config's `topic_list`.
    pub fn topic_override(&self) -> Option<Vec<String>> {
        self.topic.as_ref().map(|t| vec![t.clone()])
    }
}

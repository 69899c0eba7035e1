//! Config file module
//!
//! Loads the JSON config file shared by the monitor and publisher modes and
//! validates it into role-specific settings.
//!
//! The file is a flat JSON object. Which keys are required depends on the
//! role: the monitor needs `clean_start` and `subscribe_qos`, the publisher
//! needs `publish_qos` and `ifname`. Unknown keys are ignored.
//!
//! ```json
//! {
//!     "client_id": "pi-kitchen",
//!     "client_username": "reporter",
//!     "client_pw": "secret",
//!     "hivemq_url": "broker.example.com",
//!     "hivemq_port": 8883,
//!     "clean_start": false,
//!     "topic_list": ["host-ip/#"],
//!     "subscribe_qos": 1,
//!     "sleep_time_s": 10,
//!     "html_file_name": "index.html",
//!     "msg_truncate_value": 20
//! }
//! ```

use crate::error::ReporterError;
use crate::mqtt::{MqttClientConfig, TlsConfig};
use crate::util::u8_to_qos;
use rumqttc::v5::mqttbytes::QoS;
use serde::Deserialize;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default config file path when `-c` is not given.
pub const DEFAULT_CONFIG_PATH: &str = "mqtt_client_config.json";

pub const DEFAULT_SLEEP_TIME_S: u64 = 10;
pub const DEFAULT_HTML_FILE_NAME: &str = "index.html";
pub const DEFAULT_MSG_TRUNCATE_VALUE: usize = 20;
pub const DEFAULT_MONITOR_LOG_FILE: &str = "ip_client.log";
pub const DEFAULT_PUBLISHER_LOG_FILE: &str = "ip_publisher.log";
pub const DEFAULT_CONNECT_TIMEOUT_S: u64 = 10;
pub const DEFAULT_KEEP_ALIVE_S: u64 = 30;
pub const DEFAULT_NAME: &str = "mqtt-ip-reporter";

/// Raw contents of the config file. Every key is optional at this stage;
/// [`ConfigFile::monitor_settings`] and [`ConfigFile::publisher_settings`]
/// enforce the per-role required keys.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ConfigFile {
    pub name: Option<String>,
    pub client_id: Option<String>,
    pub client_username: Option<String>,
    pub client_pw: Option<String>,
    pub hivemq_url: Option<String>,
    pub hivemq_port: Option<u16>,
    pub clean_start: Option<bool>,
    pub topic_list: Option<Vec<String>>,
    pub subscribe_qos: Option<u8>,
    pub publish_qos: Option<u8>,
    pub sleep_time_s: Option<u64>,
    pub html_file_name: Option<PathBuf>,
    pub msg_truncate_value: Option<usize>,
    pub log_file_name: Option<PathBuf>,
    pub ifname: Option<String>,
    pub use_tls: Option<bool>,
    pub ca_cert: Option<PathBuf>,
    pub tls_insecure: Option<bool>,
    pub connect_timeout_s: Option<u64>,
    pub keep_alive_s: Option<u64>,
}

/// Connection settings common to both roles.
#[derive(Debug, Clone)]
pub struct BrokerSettings {
    /// Display name used in log lines.
    pub name: String,
    pub client: MqttClientConfig,
    pub topics: Vec<String>,
    pub connect_timeout: Duration,
}

/// Everything the monitor needs.
#[derive(Debug, Clone)]
pub struct MonitorSettings {
    pub broker: BrokerSettings,
    pub subscribe_qos: QoS,
    pub sleep_time: Duration,
    pub html_file_name: PathBuf,
    pub msg_truncate_value: usize,
    pub log_file_name: PathBuf,
}

/// Everything the publisher needs.
#[derive(Debug, Clone)]
pub struct PublisherSettings {
    pub broker: BrokerSettings,
    pub publish_qos: QoS,
    pub ifname: String,
    pub log_file_name: PathBuf,
}

impl ConfigFile {
    /// Read and parse a config file.
    ///
    /// # Errors
    ///
    /// - [`ReporterError::ConfigNotFound`] if the file does not exist
    /// - [`ReporterError::Config`] if the file is not a JSON object of the expected shape
    /// - [`ReporterError::Io`] for other read failures
    pub fn load(path: &Path) -> Result<Self, ReporterError> {
        let file = File::open(path).map_err(|e| match e.kind() {
            std::io::ErrorKind::NotFound => ReporterError::ConfigNotFound(path.to_path_buf()),
            _ => ReporterError::Io(e),
        })?;
        let reader = BufReader::new(file);

        serde_json::from_reader(reader).map_err(|e| {
            ReporterError::Config(format!(
                "Error parsing config file {}: {}",
                path.display(),
                e
            ))
        })
    }

    /// Parse a config from a JSON string.
    pub fn from_json_str(json: &str) -> Result<Self, ReporterError> {
        serde_json::from_str(json)
            .map_err(|e| ReporterError::Config(format!("Error parsing config: {}", e)))
    }

    /// Validate into monitor settings.
    pub fn monitor_settings(&self) -> Result<MonitorSettings, ReporterError> {
        let mut missing = self.missing_common_keys();
        if self.clean_start.is_none() {
            missing.push("clean_start");
        }
        if self.subscribe_qos.is_none() {
            missing.push("subscribe_qos");
        }
        Self::check_missing(&missing)?;

        let clean_start = self.clean_start.unwrap_or_default();
        let broker = self.broker_settings(clean_start)?;
        let subscribe_qos = Self::qos("subscribe_qos", self.subscribe_qos)?;

        let sleep_time_s = self.sleep_time_s.unwrap_or(DEFAULT_SLEEP_TIME_S);
        if sleep_time_s == 0 {
            return Err(ReporterError::Config(
                "sleep_time_s must be at least 1".to_string(),
            ));
        }
        let msg_truncate_value = self
            .msg_truncate_value
            .unwrap_or(DEFAULT_MSG_TRUNCATE_VALUE);
        if msg_truncate_value == 0 {
            return Err(ReporterError::Config(
                "msg_truncate_value must be at least 1".to_string(),
            ));
        }

        Ok(MonitorSettings {
            broker,
            subscribe_qos,
            sleep_time: Duration::from_secs(sleep_time_s),
            html_file_name: self
                .html_file_name
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_HTML_FILE_NAME)),
            msg_truncate_value,
            log_file_name: self
                .log_file_name
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MONITOR_LOG_FILE)),
        })
    }

    /// Validate into publisher settings.
    pub fn publisher_settings(&self) -> Result<PublisherSettings, ReporterError> {
        let mut missing = self.missing_common_keys();
        if self.publish_qos.is_none() {
            missing.push("publish_qos");
        }
        if self.ifname.is_none() {
            missing.push("ifname");
        }
        Self::check_missing(&missing)?;

        let broker = self.broker_settings(self.clean_start.unwrap_or(false))?;
        let publish_qos = Self::qos("publish_qos", self.publish_qos)?;

        Ok(PublisherSettings {
            broker,
            publish_qos,
            ifname: self.ifname.clone().unwrap_or_default(),
            log_file_name: self
                .log_file_name
                .clone()
                .unwrap_or_else(|| PathBuf::from(DEFAULT_PUBLISHER_LOG_FILE)),
        })
    }

    fn missing_common_keys(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.client_id.is_none() {
            missing.push("client_id");
        }
        if self.client_username.is_none() {
            missing.push("client_username");
        }
        if self.client_pw.is_none() {
            missing.push("client_pw");
        }
        if self.hivemq_url.is_none() {
            missing.push("hivemq_url");
        }
        if self.hivemq_port.is_none() {
            missing.push("hivemq_port");
        }
        if self.topic_list.is_none() {
            missing.push("topic_list");
        }
        missing
    }

    fn check_missing(missing: &[&str]) -> Result<(), ReporterError> {
        if missing.is_empty() {
            Ok(())
        } else {
            Err(ReporterError::Config(format!(
                "missing required keys: {}",
                missing.join(", ")
            )))
        }
    }

    fn qos(key: &str, value: Option<u8>) -> Result<QoS, ReporterError> {
        let value = value.unwrap_or_default();
        u8_to_qos(value).ok_or_else(|| {
            ReporterError::Config(format!("{} must be 0, 1, or 2 (got {})", key, value))
        })
    }

    /// Build connection settings. Callers have already checked the required keys.
    fn broker_settings(&self, clean_start: bool) -> Result<BrokerSettings, ReporterError> {
        let topics = self.topic_list.clone().unwrap_or_default();
        if topics.is_empty() {
            return Err(ReporterError::Config(
                "topic_list must contain at least one topic".to_string(),
            ));
        }
        if let Some(topic) = topics.iter().find(|t| t.is_empty()) {
            return Err(ReporterError::Config(format!(
                "topic_list contains an empty topic: {:?}",
                topic
            )));
        }

        let host = self.hivemq_url.clone().unwrap_or_default();
        if host.is_empty() {
            return Err(ReporterError::Config("hivemq_url is empty".to_string()));
        }

        let keep_alive = Duration::from_secs(self.keep_alive_s.unwrap_or(DEFAULT_KEEP_ALIVE_S));
        let mut client = MqttClientConfig::new(
            host,
            self.hivemq_port.unwrap_or_default(),
            self.client_id.clone().unwrap_or_default(),
        )
        .with_credentials(
            self.client_username.clone().unwrap_or_default(),
            self.client_pw.clone().unwrap_or_default(),
        )
        .with_clean_start(clean_start)
        .with_keep_alive(keep_alive);

        if self.use_tls.unwrap_or(true) {
            let mut tls = TlsConfig::new().with_insecure(self.tls_insecure.unwrap_or(false));
            if let Some(ca_cert) = &self.ca_cert {
                tls = tls.with_ca_cert(ca_cert.clone());
            }
            client = client.with_tls(tls);
        }

        let connect_timeout_s = self
            .connect_timeout_s
            .unwrap_or(DEFAULT_CONNECT_TIMEOUT_S)
            .max(1);

        Ok(BrokerSettings {
            name: self
                .name
                .clone()
                .filter(|n| !n.is_empty())
                .unwrap_or_else(|| DEFAULT_NAME.to_string()),
            client,
            topics,
            connect_timeout: Duration::from_secs(connect_timeout_s),
        })
    }
}

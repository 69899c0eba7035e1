//! Publisher mode
//!
//! One-shot sequence: connect, publish one IP report to every configured
//! topic, wait for the broker to confirm each publish, disconnect.
//!
//! # Example
//!
//! ```rust,ignore
//! use mqtt_ip_reporter::publisher::{IpReport, Publisher};
//!
//! let ip = interface_ipv4("eth0")?;
//! let publisher = Publisher::new(client, topics, QoS::AtLeastOnce, Duration::from_secs(10));
//! let confirmed = publisher.run(&IpReport::now(ip)).await?;
//! ```

use crate::error::ReporterError;
use crate::mqtt::{MqttClient, MqttIncoming};
use crate::util::qos_to_u8;
use chrono::{Local, NaiveDateTime};
use rumqttc::v5::mqttbytes::QoS;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use std::time::Duration;
use tracing::{debug, info};

/// Local-time format used in the report's `timestamp` field.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// The JSON payload published for each topic.
///
/// Serializes as `{"timestamp": "...", "ip_address": "..."}`, keys in that order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IpReport {
    pub timestamp: String,
    pub ip_address: String,
}

impl IpReport {
    pub fn new(ip_address: Ipv4Addr, at: NaiveDateTime) -> Self {
        Self {
            timestamp: at.format(TIMESTAMP_FORMAT).to_string(),
            ip_address: ip_address.to_string(),
        }
    }

    /// Report stamped with the current local time.
    pub fn now(ip_address: Ipv4Addr) -> Self {
        Self::new(ip_address, Local::now().naive_local())
    }

    pub fn to_json(&self) -> Result<String, ReporterError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Publishes a report to a fixed list of topics.
pub struct Publisher {
    client: MqttClient,
    topics: Vec<String>,
    qos: QoS,
    timeout: Duration,
}

impl Publisher {
    /// `timeout` bounds both the wait for CONNACK and the wait for publish
    /// confirmations.
    pub fn new(client: MqttClient, topics: Vec<String>, qos: QoS, timeout: Duration) -> Self {
        Self {
            client,
            topics,
            qos,
            timeout,
        }
    }

    /// Connect, publish `report` to every topic, and disconnect.
    ///
    /// Returns the number of confirmed publishes, which equals the number of
    /// topics on success. The client is disconnected on every path.
    ///
    /// # Errors
    ///
    /// - [`ReporterError::Connection`] if the broker is unreachable or rejects the client
    /// - [`ReporterError::Timeout`] if the broker does not answer in time
    pub async fn run(&self, report: &IpReport) -> Result<usize, ReporterError> {
        let result = self.connect_and_publish(report).await;
        self.client.disconnect_gracefully().await;
        result
    }

    async fn connect_and_publish(&self, report: &IpReport) -> Result<usize, ReporterError> {
        self.client.wait_connected(self.timeout).await?;
        info!("Connected to MQTT broker");

        let payload = report.to_json()?;
        info!("Message to publish: {}", payload);

        let publish_all = async {
            for topic in &self.topics {
                info!("Publishing to topic: {}", topic);
                self.client
                    .publish(topic, payload.as_bytes(), self.qos, false)
                    .await?;
            }
            Ok::<(), ReporterError>(())
        };

        // Requests only leave the client once the event loop is polled, so
        // queueing and confirming run side by side.
        let ((), confirmed) =
            tokio::try_join!(publish_all, self.await_confirmations(self.topics.len()))?;

        info!(
            "{} of {} publishes confirmed (QoS {})",
            confirmed,
            self.topics.len(),
            qos_to_u8(self.qos)
        );
        Ok(confirmed)
    }

    /// Poll until `expected` publishes are confirmed at the configured QoS.
    async fn await_confirmations(&self, expected: usize) -> Result<usize, ReporterError> {
        let wanted = confirmation_event(self.qos);
        let confirm = async {
            let mut confirmed = 0;
            while confirmed < expected {
                let event = self.client.poll().await?;
                if event == wanted {
                    confirmed += 1;
                    debug!("Publish confirmed ({}/{})", confirmed, expected);
                }
            }
            Ok::<usize, ReporterError>(confirmed)
        };

        match tokio::time::timeout(self.timeout, confirm).await {
            Ok(result) => result,
            Err(_) => Err(ReporterError::Timeout(format!(
                "publishes not confirmed within {}s",
                self.timeout.as_secs()
            ))),
        }
    }
}

/// The event that marks a publish as done for a QoS level.
fn confirmation_event(qos: QoS) -> MqttIncoming {
    match qos {
        QoS::AtMostOnce => MqttIncoming::PublishSent,
        QoS::AtLeastOnce => MqttIncoming::PubAck,
        QoS::ExactlyOnce => MqttIncoming::PubComp,
    }
}

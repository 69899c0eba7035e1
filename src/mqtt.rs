//! MQTT client module
//!
//! Wraps the `rumqttc` v5 client with connection management and TLS
//! configuration. Both roles talk MQTT 5 so the monitor can honour the
//! `clean_start` flag.

use crate::error::ReporterError;
use crate::util::DISCONNECT_TIMEOUT_SECS;
use rumqttc::v5::mqttbytes::v5::Packet;
use rumqttc::v5::mqttbytes::QoS;
use rumqttc::v5::{AsyncClient, Event, EventLoop, MqttOptions};
use rumqttc::{Outgoing, Transport};
use std::fs;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Request channel capacity between the client handle and the event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Configuration for establishing an MQTT client connection.
#[derive(Debug, Clone)]
pub struct MqttClientConfig {
    /// The hostname or IP address of the MQTT broker
    pub host: String,

    /// The port number of the MQTT broker
    pub port: u16,

    /// The client identifier. An empty string means "generate one".
    pub client_id: String,

    /// Optional username for MQTT broker authentication
    pub username: Option<String>,

    /// Optional password for MQTT broker authentication
    pub password: Option<String>,

    /// Optional TLS configuration for secure connections
    pub tls: Option<TlsConfig>,

    /// MQTT 5 clean start flag. `false` resumes the broker-side session.
    pub clean_start: bool,

    /// Keep alive interval
    pub keep_alive: Duration,

    /// Maximum packet size in bytes (default: 1MB)
    pub max_packet_size: usize,
}

/// Configuration for TLS/SSL secure connections.
#[derive(Debug, Clone)]
pub struct TlsConfig {
    /// Path to the CA certificate file for server verification.
    pub ca_cert: Option<PathBuf>,

    /// When true, use the default TLS configuration even if a CA is given.
    pub insecure: bool,
}

impl MqttClientConfig {
    /// Creates a new MQTT client configuration with the specified parameters.
    ///
    /// # Example
    ///
    /// ```
    /// use mqtt_ip_reporter::mqtt::MqttClientConfig;
    ///
    /// let config = MqttClientConfig::new(
    ///     "localhost".to_string(),
    ///     1883,
    ///     "my-client".to_string(),
    /// );
    /// assert!(config.clean_start);
    /// ```
    pub fn new(host: String, port: u16, client_id: String) -> Self {
        Self {
            host,
            port,
            client_id,
            username: None,
            password: None,
            tls: None,
            clean_start: true,
            keep_alive: Duration::from_secs(30),
            max_packet_size: 1024 * 1024,
        }
    }

    /// Sets the authentication credentials for the MQTT connection.
    pub fn with_credentials(mut self, username: String, password: String) -> Self {
        self.username = Some(username);
        self.password = Some(password);
        self
    }

    /// Sets the TLS configuration for secure connections.
    pub fn with_tls(mut self, tls: TlsConfig) -> Self {
        self.tls = Some(tls);
        self
    }

    /// Sets the MQTT 5 clean start flag.
    pub fn with_clean_start(mut self, clean_start: bool) -> Self {
        self.clean_start = clean_start;
        self
    }

    /// Sets the keep alive interval.
    pub fn with_keep_alive(mut self, keep_alive: Duration) -> Self {
        self.keep_alive = keep_alive;
        self
    }

    /// Returns true if TLS is configured for this connection.
    pub fn is_tls_enabled(&self) -> bool {
        self.tls.is_some()
    }

    /// Returns true if authentication credentials are configured.
    pub fn has_credentials(&self) -> bool {
        self.username.is_some() && self.password.is_some()
    }
}

impl TlsConfig {
    /// Creates a new TLS configuration with default settings.
    pub fn new() -> Self {
        Self {
            ca_cert: None,
            insecure: false,
        }
    }

    /// Sets the CA certificate path for server verification.
    pub fn with_ca_cert(mut self, path: PathBuf) -> Self {
        self.ca_cert = Some(path);
        self
    }

    /// Sets whether to skip the custom CA check.
    pub fn with_insecure(mut self, insecure: bool) -> Self {
        self.insecure = insecure;
        self
    }
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self::new()
    }
}

/// Incoming event reduced to what the publisher and monitor care about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MqttIncoming {
    Publish {
        topic: String,
        payload: Vec<u8>,
        qos: QoS,
        retain: bool,
    },
    ConnAck,
    SubAck,
    PubAck,
    PubComp,
    /// A publish packet was written to the network.
    PublishSent,
    /// The disconnect packet was written to the network.
    DisconnectSent,
    Other,
}

impl From<Event> for MqttIncoming {
    fn from(event: Event) -> Self {
        match event {
            Event::Incoming(Packet::Publish(p)) => MqttIncoming::Publish {
                topic: String::from_utf8_lossy(&p.topic).into_owned(),
                payload: p.payload.to_vec(),
                qos: p.qos,
                retain: p.retain,
            },
            Event::Incoming(Packet::ConnAck(_)) => MqttIncoming::ConnAck,
            Event::Incoming(Packet::SubAck(_)) => MqttIncoming::SubAck,
            Event::Incoming(Packet::PubAck(_)) => MqttIncoming::PubAck,
            Event::Incoming(Packet::PubComp(_)) => MqttIncoming::PubComp,
            Event::Outgoing(Outgoing::Publish(_)) => MqttIncoming::PublishSent,
            Event::Outgoing(Outgoing::Disconnect) => MqttIncoming::DisconnectSent,
            _ => MqttIncoming::Other,
        }
    }
}

/// MQTT v5 client wrapper around `rumqttc::v5`.
///
/// The event loop sits behind a tokio mutex so one task can own polling
/// while others hold the client for subscribe/publish requests.
pub struct MqttClient {
    client: AsyncClient,
    eventloop: Arc<Mutex<EventLoop>>,
}

impl MqttClient {
    /// Create a new MQTT client with the given configuration.
    ///
    /// No network I/O happens here; `rumqttc` connects on the first poll.
    /// Use [`MqttClient::wait_connected`] to force and confirm the connection.
    ///
    /// # Errors
    ///
    /// Returns [`ReporterError::Tls`] if a configured CA certificate cannot be read.
    pub async fn new(config: MqttClientConfig) -> Result<Self, ReporterError> {
        let client_id = crate::util::generate_client_id(&Some(config.client_id.clone()));

        let mut mqtt_options = MqttOptions::new(&client_id, &config.host, config.port);
        mqtt_options.set_keep_alive(config.keep_alive);
        mqtt_options.set_clean_start(config.clean_start);
        mqtt_options.set_max_packet_size(Some(config.max_packet_size as u32));

        if let (Some(username), Some(password)) = (&config.username, &config.password) {
            mqtt_options.set_credentials(username, password);
        }

        if let Some(tls_config) = &config.tls {
            let transport = Self::build_tls_transport(tls_config)?;
            mqtt_options.set_transport(transport);
        }

        let (client, eventloop) = AsyncClient::new(mqtt_options, REQUEST_CHANNEL_CAPACITY);

        Ok(Self {
            client,
            eventloop: Arc::new(Mutex::new(eventloop)),
        })
    }

    /// Build the TLS transport from a [`TlsConfig`].
    fn build_tls_transport(tls_config: &TlsConfig) -> Result<Transport, ReporterError> {
        let ca_bytes = match &tls_config.ca_cert {
            Some(ca_path) => fs::read(ca_path).map_err(|e| {
                ReporterError::Tls(format!(
                    "Failed to read CA certificate from {:?}: {}",
                    ca_path, e
                ))
            })?,
            None => Vec::new(),
        };

        if tls_config.insecure || ca_bytes.is_empty() {
            Ok(Transport::tls_with_default_config())
        } else {
            Ok(Transport::tls(ca_bytes, None, None))
        }
    }

    /// Poll the event loop until the broker acknowledges the connection.
    ///
    /// # Errors
    ///
    /// - [`ReporterError::Connection`] if the broker is unreachable or rejects the credentials
    /// - [`ReporterError::Timeout`] if no CONNACK arrives within `timeout`
    pub async fn wait_connected(&self, timeout: Duration) -> Result<(), ReporterError> {
        let wait = async {
            loop {
                if self.poll().await? == MqttIncoming::ConnAck {
                    return Ok::<(), ReporterError>(());
                }
            }
        };

        match tokio::time::timeout(timeout, wait).await {
            Ok(result) => result,
            Err(_) => Err(ReporterError::Timeout(format!(
                "no CONNACK from broker within {}s",
                timeout.as_secs()
            ))),
        }
    }

    /// Subscribe to a list of topics with the specified QoS.
    pub async fn subscribe(&self, topics: &[String], qos: QoS) -> Result<(), ReporterError> {
        for topic in topics {
            self.client.subscribe(topic, qos).await?;
        }
        Ok(())
    }

    /// Queue subscribe requests without waiting for channel space.
    ///
    /// For use from the task that polls the event loop, where an awaiting
    /// subscribe could block on a full request channel nobody drains.
    pub fn try_subscribe(&self, topics: &[String], qos: QoS) -> Result<(), ReporterError> {
        for topic in topics {
            self.client.try_subscribe(topic, qos)?;
        }
        Ok(())
    }

    /// Publish a message to a topic.
    pub async fn publish(
        &self,
        topic: &str,
        payload: &[u8],
        qos: QoS,
        retain: bool,
    ) -> Result<(), ReporterError> {
        self.client
            .publish(topic, qos, retain, payload.to_vec())
            .await?;
        Ok(())
    }

    /// Poll for the next event from the broker.
    pub async fn poll(&self) -> Result<MqttIncoming, ReporterError> {
        let mut eventloop = self.eventloop.lock().await;
        let event = eventloop.poll().await?;
        Ok(MqttIncoming::from(event))
    }

    /// Queue a disconnect request.
    pub async fn disconnect(&self) -> Result<(), ReporterError> {
        self.client.disconnect().await?;
        Ok(())
    }

    /// Disconnect and drive the event loop until the packet is on the wire.
    ///
    /// Bounded by [`DISCONNECT_TIMEOUT_SECS`]. Errors are logged, never
    /// returned, so this is safe to call on a client that never connected
    /// or already lost its connection.
    pub async fn disconnect_gracefully(&self) {
        let shutdown = async {
            self.disconnect().await?;
            loop {
                if self.poll().await? == MqttIncoming::DisconnectSent {
                    return Ok::<(), ReporterError>(());
                }
            }
        };

        match tokio::time::timeout(Duration::from_secs(DISCONNECT_TIMEOUT_SECS), shutdown).await {
            Ok(Ok(())) => info!("Disconnected from MQTT broker"),
            Ok(Err(e)) => debug!("Disconnect finished with error: {}", e),
            Err(_) => debug!(
                "Disconnect did not complete within {}s",
                DISCONNECT_TIMEOUT_SECS
            ),
        }
    }
}

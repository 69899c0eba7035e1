//! Monitor mode
//!
//! Subscribes to the configured topics, collects incoming messages in a
//! [`MessageAggregator`], and periodically renders the most recent ones to an
//! HTML file until a shutdown signal arrives.
//!
//! Two tasks share the aggregator:
//! - the delivery task owns the MQTT event loop and appends every publish
//! - the [`RenderLoop`] wakes every `sleep_time_s`, trims, renders and writes
//!
//! The monitor moves through [`MonitorState`]s:
//! `Starting -> Running -> Stopping -> Stopped`. A connect failure while
//! starting is fatal; a failed page write is logged and the loop keeps going.
//!
//! # Example
//!
//! ```rust,ignore
//! use mqtt_ip_reporter::monitor::Monitor;
//! use tokio::sync::broadcast;
//!
//! let (shutdown_tx, shutdown_rx) = broadcast::channel(1);
//! let monitor = Monitor::new(settings, client);
//! let renders = monitor.run(shutdown_rx).await?;
//! ```

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use rumqttc::v5::mqttbytes::QoS;
use tokio::sync::broadcast;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use crate::aggregator::MessageAggregator;
use crate::config::MonitorSettings;
use crate::error::ReporterError;
use crate::mqtt::{MqttClient, MqttIncoming};
use crate::render::{render_page, write_page};
use crate::util::{decode_payload, format_payload_preview, qos_to_u8};

/// Pause after a connection error before polling (and so reconnecting) again.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// How long the delivery task gets to finish on its own during shutdown.
const DELIVERY_JOIN_TIMEOUT: Duration = Duration::from_secs(1);

/// Lifecycle of a [`Monitor`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MonitorState {
    Starting,
    Running,
    Stopping,
    Stopped,
}

impl fmt::Display for MonitorState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MonitorState::Starting => write!(f, "starting"),
            MonitorState::Running => write!(f, "running"),
            MonitorState::Stopping => write!(f, "stopping"),
            MonitorState::Stopped => write!(f, "stopped"),
        }
    }
}

/// Periodic snapshot-render-write loop.
///
/// Needs nothing but the aggregator, so it runs the same with or without a
/// broker behind it.
pub struct RenderLoop {
    aggregator: Arc<MessageAggregator>,
    output: PathBuf,
    interval: Duration,
    truncate: usize,
}

impl RenderLoop {
    pub fn new(
        aggregator: Arc<MessageAggregator>,
        output: PathBuf,
        interval: Duration,
        truncate: usize,
    ) -> Self {
        Self {
            aggregator,
            output,
            interval,
            truncate,
        }
    }

    /// Trim the aggregator, render what is left and write the page.
    ///
    /// Returns the number of entries on the page.
    pub fn render_once(&self) -> Result<usize, ReporterError> {
        let entries = self.aggregator.snapshot_and_trim(Some(self.truncate));
        let html = render_page(&entries);
        write_page(&self.output, &html)?;
        Ok(entries.len())
    }

    /// Render immediately, then every `interval`, until `shutdown` fires.
    ///
    /// The sleep between renders ends as soon as the signal arrives. Write
    /// failures are logged and do not stop the loop. Returns the number of
    /// successful renders.
    pub async fn run(&self, mut shutdown: broadcast::Receiver<()>) -> u64 {
        let mut renders: u64 = 0;

        loop {
            match self.render_once() {
                Ok(count) => {
                    renders += 1;
                    debug!(
                        "Wrote {} address(es) to {}",
                        count,
                        self.output.display()
                    );
                }
                Err(e) => {
                    error!("Failed to write {}: {}", self.output.display(), e);
                }
            }

            tokio::select! {
                _ = shutdown.recv() => break,
                _ = tokio::time::sleep(self.interval) => {}
            }
        }

        renders
    }
}

/// Subscriber role: delivery task plus render loop.
pub struct Monitor {
    settings: MonitorSettings,
    client: Arc<MqttClient>,
    aggregator: Arc<MessageAggregator>,
    state: MonitorState,
}

impl Monitor {
    /// The aggregator is bounded by `msg_truncate_value`, so it never holds
    /// more than one page worth of messages between renders.
    pub fn new(settings: MonitorSettings, client: MqttClient) -> Self {
        let aggregator = Arc::new(MessageAggregator::with_capacity(
            settings.msg_truncate_value,
        ));
        Self {
            settings,
            client: Arc::new(client),
            aggregator,
            state: MonitorState::Starting,
        }
    }

    pub fn state(&self) -> MonitorState {
        self.state
    }

    pub fn aggregator(&self) -> Arc<MessageAggregator> {
        Arc::clone(&self.aggregator)
    }

    /// Run until `shutdown` fires. Returns the number of page renders.
    ///
    /// # Errors
    ///
    /// Fails only while starting: broker unreachable, credentials rejected,
    /// no CONNACK within the connect timeout, or the subscribe request fails.
    pub async fn run(mut self, shutdown: broadcast::Receiver<()>) -> Result<u64, ReporterError> {
        let delivery = match self.start(&shutdown).await {
            Ok(handle) => handle,
            Err(e) => {
                error!("Monitor failed to start: {}", e);
                self.transition(MonitorState::Stopping);
                self.client.disconnect_gracefully().await;
                self.transition(MonitorState::Stopped);
                return Err(e);
            }
        };

        self.transition(MonitorState::Running);
        let render_loop = RenderLoop::new(
            Arc::clone(&self.aggregator),
            self.settings.html_file_name.clone(),
            self.settings.sleep_time,
            self.settings.msg_truncate_value,
        );
        let renders = render_loop.run(shutdown).await;

        self.transition(MonitorState::Stopping);
        self.stop_delivery(delivery).await;
        self.client.disconnect_gracefully().await;
        self.transition(MonitorState::Stopped);

        info!(
            "Monitor stopped after {} render(s), {} message(s) received",
            renders,
            self.aggregator.total_received()
        );
        Ok(renders)
    }

    /// Connect, start the delivery task, subscribe.
    async fn start(
        &mut self,
        shutdown: &broadcast::Receiver<()>,
    ) -> Result<JoinHandle<()>, ReporterError> {
        let broker = &self.settings.broker;
        info!(
            "[{}] Connecting to MQTT broker at {}:{}",
            broker.name, broker.client.host, broker.client.port
        );
        self.client.wait_connected(broker.connect_timeout).await?;
        info!("[{}] Connected to MQTT broker", broker.name);

        // The delivery task must already be polling when the subscribe
        // requests are queued, otherwise they never leave the client.
        let delivery = tokio::spawn(deliver(
            Arc::clone(&self.client),
            Arc::clone(&self.aggregator),
            broker.topics.clone(),
            self.settings.subscribe_qos,
            shutdown.resubscribe(),
        ));

        for topic in &broker.topics {
            info!(
                "Subscribing to topic: {} (QoS {})",
                topic,
                qos_to_u8(self.settings.subscribe_qos)
            );
        }
        if let Err(e) = self
            .client
            .subscribe(&broker.topics, self.settings.subscribe_qos)
            .await
        {
            delivery.abort();
            return Err(e);
        }

        Ok(delivery)
    }

    async fn stop_delivery(&self, mut delivery: JoinHandle<()>) {
        if tokio::time::timeout(DELIVERY_JOIN_TIMEOUT, &mut delivery)
            .await
            .is_err()
        {
            debug!("Delivery task still busy, aborting");
            delivery.abort();
            let _ = delivery.await;
        }
    }

    fn transition(&mut self, next: MonitorState) {
        info!("Monitor state: {} -> {}", self.state, next);
        self.state = next;
    }
}

/// Drive the event loop and feed every incoming publish to the aggregator.
///
/// Re-subscribes after every reconnect, since a broker that lost the session
/// would otherwise stop delivering.
async fn deliver(
    client: Arc<MqttClient>,
    aggregator: Arc<MessageAggregator>,
    topics: Vec<String>,
    qos: QoS,
    mut shutdown: broadcast::Receiver<()>,
) {
    loop {
        tokio::select! {
            _ = shutdown.recv() => break,
            event = client.poll() => match event {
                Ok(MqttIncoming::Publish {
                    topic,
                    payload,
                    qos,
                    retain,
                }) => {
                    debug!(
                        "[on_message] {} {} retain={} {}",
                        topic,
                        qos_to_u8(qos),
                        retain,
                        format_payload_preview(&payload)
                    );
                    aggregator.append(topic, decode_payload(&payload));
                }
                Ok(MqttIncoming::ConnAck) => {
                    info!("Reconnected to MQTT broker, re-subscribing");
                    if let Err(e) = client.try_subscribe(&topics, qos) {
                        warn!("Re-subscribe failed: {}", e);
                    }
                }
                Ok(MqttIncoming::SubAck) => debug!("Subscription acknowledged"),
                Ok(_) => {}
                Err(e) => {
                    warn!("MQTT connection error: {}", e);
                    tokio::select! {
                        _ = shutdown.recv() => break,
                        _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                    }
                }
            }
        }
    }
    debug!("Delivery task exiting");
}

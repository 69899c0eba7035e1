//! Shared helpers for integration tests: an embedded `rumqttd` broker and
//! config builders pointing at it.

#![allow(dead_code)]

use mqtt_ip_reporter::config::ConfigFile;
use mqtt_ip_reporter::mqtt::{MqttClient, MqttClientConfig, MqttIncoming};
use rumqttc::v5::mqttbytes::QoS;
use rumqttd::{Broker, Config, ConnectionSettings, MetricSettings, MetricType, RouterConfig, ServerSettings};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::thread;
use std::time::{Duration, Instant};

/// Embedded MQTT 5 broker on 127.0.0.1, plain TCP, no auth.
///
/// The broker thread is never joined; it dies with the test process.
pub struct TestBroker {
    pub port: u16,
    _thread: thread::JoinHandle<()>,
}

pub async fn start_broker(port: u16) -> TestBroker {
    let mut broker = Broker::new(broker_config(port));
    let handle = thread::spawn(move || {
        if let Err(e) = broker.start() {
            eprintln!("Broker error: {}", e);
        }
    });

    let addr = format!("127.0.0.1:{}", port);
    let deadline = Instant::now() + Duration::from_secs(5);
    while std::net::TcpStream::connect(&addr).is_err() {
        assert!(Instant::now() < deadline, "broker on port {} did not start", port);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    TestBroker {
        port,
        _thread: handle,
    }
}

fn broker_config(port: u16) -> Config {
    let router = RouterConfig {
        max_connections: 100,
        max_outgoing_packet_count: 1000,
        max_segment_size: 1024 * 1024,
        max_segment_count: 10,
        ..Default::default()
    };

    let connections = ConnectionSettings {
        connection_timeout_ms: 60000,
        max_payload_size: 1024 * 1024,
        max_inflight_count: 100,
        auth: None,
        external_auth: None,
        dynamic_filters: true,
    };

    let listen: SocketAddr = format!("127.0.0.1:{}", port).parse().unwrap();
    let mut v5_servers = HashMap::new();
    v5_servers.insert(
        "1".to_string(),
        ServerSettings {
            name: "ip-reporter-test-broker".to_string(),
            listen,
            tls: None,
            next_connection_delay_ms: 1,
            connections,
        },
    );

    // rumqttd's timer needs both meters and alerts once metrics are set.
    let mut metrics = HashMap::new();
    metrics.insert(
        MetricType::Meters,
        serde_json::from_str::<MetricSettings>(r#"{"push_interval": 1}"#).unwrap(),
    );
    metrics.insert(
        MetricType::Alerts,
        serde_json::from_str::<MetricSettings>(r#"{"push_interval": 30}"#).unwrap(),
    );

    Config {
        id: 0,
        router,
        v4: None,
        v5: Some(v5_servers),
        ws: None,
        cluster: None,
        console: None,
        bridge: None,
        prometheus: None,
        metrics: Some(metrics),
    }
}

/// Monitor config JSON for a broker on `port`, TLS off.
pub fn monitor_config(
    port: u16,
    client_id: &str,
    topics: &[&str],
    html_file: &Path,
    sleep_time_s: u64,
    msg_truncate_value: usize,
) -> ConfigFile {
    let json = serde_json::json!({
        "client_id": client_id,
        "client_username": "user",
        "client_pw": "pw",
        "hivemq_url": "127.0.0.1",
        "hivemq_port": port,
        "clean_start": true,
        "topic_list": topics,
        "subscribe_qos": 1,
        "sleep_time_s": sleep_time_s,
        "html_file_name": html_file,
        "msg_truncate_value": msg_truncate_value,
        "use_tls": false,
        "connect_timeout_s": 5
    });
    ConfigFile::from_json_str(&json.to_string()).unwrap()
}

/// Publisher config JSON for a broker on `port`, TLS off.
pub fn publisher_config(port: u16, client_id: &str, topics: &[&str], qos: u8) -> ConfigFile {
    let json = serde_json::json!({
        "client_id": client_id,
        "client_username": "user",
        "client_pw": "pw",
        "hivemq_url": "127.0.0.1",
        "hivemq_port": port,
        "topic_list": topics,
        "publish_qos": qos,
        "ifname": "lo",
        "use_tls": false,
        "connect_timeout_s": 5
    });
    ConfigFile::from_json_str(&json.to_string()).unwrap()
}

/// A connected plain client on `port`.
pub async fn connected_client(port: u16, id: &str) -> MqttClient {
    let client = MqttClient::new(MqttClientConfig::new(
        "127.0.0.1".to_string(),
        port,
        id.to_string(),
    ))
    .await
    .expect("Failed to create client");
    client
        .wait_connected(Duration::from_secs(5))
        .await
        .expect("Failed to connect");
    client
}

/// Publish `messages` in order at QoS 1 and wait for every PUBACK.
pub async fn publish_all(client: &MqttClient, messages: &[(&str, &str)]) {
    for (topic, payload) in messages {
        client
            .publish(topic, payload.as_bytes(), QoS::AtLeastOnce, false)
            .await
            .expect("Failed to publish");
    }

    let mut acked = 0;
    tokio::time::timeout(Duration::from_secs(5), async {
        while acked < messages.len() {
            if client.poll().await.expect("poll failed") == MqttIncoming::PubAck {
                acked += 1;
            }
        }
    })
    .await
    .expect("publishes were not acknowledged");
}

/// Subscribe and wait for the SUBACK.
pub async fn subscribe_and_wait(client: &MqttClient, topic: &str) {
    client
        .subscribe(&[topic.to_string()], QoS::AtLeastOnce)
        .await
        .expect("Failed to subscribe");
    tokio::time::timeout(Duration::from_secs(5), async {
        while client.poll().await.expect("poll failed") != MqttIncoming::SubAck {}
    })
    .await
    .expect("no SUBACK");
}

//! Integration tests for publish mode using an embedded broker

#[path = "../common/mod.rs"]
mod common;

use common::{connected_client, publisher_config, start_broker, subscribe_and_wait};
use mqtt_ip_reporter::mqtt::{MqttClient, MqttIncoming};
use mqtt_ip_reporter::publisher::{IpReport, Publisher, TIMESTAMP_FORMAT};

use chrono::NaiveDateTime;
use std::net::Ipv4Addr;
use std::time::Duration;
use tokio::time::timeout;

/// Collect `count` publishes from `client`.
async fn receive(client: &MqttClient, count: usize) -> Vec<(String, Vec<u8>)> {
    let mut received = Vec::new();
    timeout(Duration::from_secs(5), async {
        while received.len() < count {
            if let MqttIncoming::Publish { topic, payload, .. } =
                client.poll().await.expect("poll failed")
            {
                received.push((topic, payload));
            }
        }
    })
    .await
    .expect("messages not received");
    received
}

async fn publisher_for(port: u16, id: &str, topics: &[&str], qos: u8) -> Publisher {
    let settings = publisher_config(port, id, topics, qos)
        .publisher_settings()
        .unwrap();
    let client = MqttClient::new(settings.broker.client.clone()).await.unwrap();
    Publisher::new(
        client,
        settings.broker.topics.clone(),
        settings.publish_qos,
        settings.broker.connect_timeout,
    )
}

#[tokio::test]
async fn test_report_delivered_to_every_topic() {
    let broker = start_broker(18961).await;

    let subscriber = connected_client(broker.port, "ip-subscriber").await;
    subscribe_and_wait(&subscriber, "host-ip/#").await;

    let publisher = publisher_for(
        broker.port,
        "ip-publisher",
        &["host-ip/kitchen", "host-ip/all"],
        1,
    )
    .await;
    let report = IpReport::now(Ipv4Addr::new(192, 168, 1, 42));

    let (confirmed, received) = tokio::join!(publisher.run(&report), receive(&subscriber, 2));
    assert_eq!(confirmed.unwrap(), 2);

    let mut topics: Vec<&str> = received.iter().map(|(t, _)| t.as_str()).collect();
    topics.sort_unstable();
    assert_eq!(topics, vec!["host-ip/all", "host-ip/kitchen"]);

    for (_, payload) in &received {
        let parsed: IpReport = serde_json::from_slice(payload).unwrap();
        assert_eq!(parsed.ip_address, "192.168.1.42");
        assert!(NaiveDateTime::parse_from_str(&parsed.timestamp, TIMESTAMP_FORMAT).is_ok());
        assert_eq!(parsed, report);
    }
}

#[tokio::test]
async fn test_qos0_publish_confirms_on_write() {
    let broker = start_broker(18962).await;

    let publisher = publisher_for(broker.port, "ip-publisher-q0", &["host-ip/a"], 0).await;
    let confirmed = timeout(
        Duration::from_secs(10),
        publisher.run(&IpReport::now(Ipv4Addr::LOCALHOST)),
    )
    .await
    .expect("publish was not bounded")
    .unwrap();

    assert_eq!(confirmed, 1);
}

#[tokio::test]
async fn test_publish_without_broker_fails() {
    let publisher = publisher_for(18963, "ip-publisher-nobroker", &["host-ip/a"], 1).await;

    let err = timeout(
        Duration::from_secs(10),
        publisher.run(&IpReport::now(Ipv4Addr::LOCALHOST)),
    )
    .await
    .expect("publish was not bounded")
    .unwrap_err();

    assert!(err.is_connection_error());
}

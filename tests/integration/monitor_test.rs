//! Integration tests for monitor mode using an embedded broker

#[path = "../common/mod.rs"]
mod common;

use common::{connected_client, monitor_config, publish_all, start_broker};
use mqtt_ip_reporter::aggregator::MessageAggregator;
use mqtt_ip_reporter::monitor::{Monitor, RenderLoop};
use mqtt_ip_reporter::mqtt::MqttClient;

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tempfile::tempdir;
use tokio::sync::broadcast;
use tokio::time::timeout;

/// Poll `path` until `pred` holds on its contents or `limit` passes.
async fn wait_for_page(path: &Path, limit: Duration, pred: impl Fn(&str) -> bool) -> String {
    let deadline = Instant::now() + limit;
    loop {
        if let Ok(html) = fs::read_to_string(path) {
            if pred(&html) {
                return html;
            }
        }
        assert!(Instant::now() < deadline, "page never matched");
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
}

/// Three messages queued before the first tick, truncate 2: the page holds
/// the last two, oldest first.
#[tokio::test]
async fn test_render_loop_keeps_last_two_in_order() {
    let dir = tempdir().unwrap();
    let html_path = dir.path().join("index.html");
    let aggregator = Arc::new(MessageAggregator::unbounded());
    aggregator.append("t/a", "1");
    aggregator.append("t/b", "2");
    aggregator.append("t/c", "3");

    let render_loop = RenderLoop::new(
        Arc::clone(&aggregator),
        html_path.clone(),
        Duration::from_secs(1),
        2,
    );
    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(async move { render_loop.run(shutdown_rx).await });

    let html = wait_for_page(&html_path, Duration::from_secs(2), |h| h.contains("</html>")).await;
    shutdown_tx.send(()).unwrap();
    handle.await.unwrap();

    assert_eq!(html.matches("<option>").count(), 2);
    assert!(html.contains("<select size=\"2\">"));
    let b = html.find("<option>t/b: 2</option>").expect("t/b missing");
    let c = html.find("<option>t/c: 3</option>").expect("t/c missing");
    assert!(b < c);
    assert!(!html.contains("t/a"));
}

/// Publish through the broker and watch the page pick the messages up.
#[tokio::test]
async fn test_monitor_renders_published_messages() {
    let broker = start_broker(18951).await;
    let dir = tempdir().unwrap();
    let html_path = dir.path().join("index.html");

    let settings = monitor_config(broker.port, "monitor-e2e", &["t/#"], &html_path, 1, 2)
        .monitor_settings()
        .unwrap();
    let client = MqttClient::new(settings.broker.client.clone()).await.unwrap();
    let monitor = Monitor::new(settings, client);
    let aggregator = monitor.aggregator();

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(async move { monitor.run(shutdown_rx).await });

    // First (empty) render means the subscription is in place.
    wait_for_page(&html_path, Duration::from_secs(5), |h| h.contains("</html>")).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let publisher = connected_client(broker.port, "publisher-e2e").await;
    publish_all(&publisher, &[("t/a", "1"), ("t/b", "2"), ("t/c", "3")]).await;
    publisher.disconnect_gracefully().await;

    let html = wait_for_page(&html_path, Duration::from_secs(5), |h| {
        h.contains("<option>t/c: 3</option>")
    })
    .await;

    assert_eq!(html.matches("<option>").count(), 2);
    let b = html.find("<option>t/b: 2</option>").expect("t/b missing");
    let c = html.find("<option>t/c: 3</option>").unwrap();
    assert!(b < c);
    assert_eq!(aggregator.total_received(), 3);

    shutdown_tx.send(()).unwrap();
    let renders = timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();
    assert!(renders >= 2);
}

/// Shutdown during a long sleep ends the monitor without waiting it out.
#[tokio::test]
async fn test_monitor_stops_during_long_sleep() {
    let broker = start_broker(18952).await;
    let dir = tempdir().unwrap();
    let html_path = dir.path().join("index.html");

    let settings = monitor_config(broker.port, "monitor-sleep", &["host-ip/#"], &html_path, 3600, 20)
        .monitor_settings()
        .unwrap();
    let client = MqttClient::new(settings.broker.client.clone()).await.unwrap();
    let monitor = Monitor::new(settings, client);

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(async move { monitor.run(shutdown_rx).await });

    wait_for_page(&html_path, Duration::from_secs(5), |h| h.contains("</html>")).await;

    let signalled = Instant::now();
    shutdown_tx.send(()).unwrap();
    let renders = timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();

    assert_eq!(renders, 1);
    // Delivery join and disconnect are each bounded; the hour-long sleep is not waited.
    assert!(signalled.elapsed() < Duration::from_secs(4));
}

/// No broker listening: the monitor fails while starting and writes no page.
#[tokio::test]
async fn test_monitor_without_broker_fails_to_start() {
    let dir = tempdir().unwrap();
    let html_path = dir.path().join("index.html");

    let settings = monitor_config(18953, "monitor-nobroker", &["host-ip/#"], &html_path, 1, 20)
        .monitor_settings()
        .unwrap();
    let client = MqttClient::new(settings.broker.client.clone()).await.unwrap();

    let (_shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let result = timeout(
        Duration::from_secs(10),
        Monitor::new(settings, client).run(shutdown_rx),
    )
    .await
    .expect("start was not bounded");

    assert!(result.unwrap_err().is_connection_error());
    assert!(!html_path.exists());
}

/// A second client taking over the monitor's session drops its connection.
/// The monitor backs off, reconnects with a clean session and subscribes
/// again, so later publishes still reach the page.
#[tokio::test]
async fn test_monitor_resubscribes_after_session_takeover() {
    let broker = start_broker(18954).await;
    let dir = tempdir().unwrap();
    let html_path = dir.path().join("index.html");

    let settings = monitor_config(broker.port, "monitor-takeover", &["t/#"], &html_path, 1, 20)
        .monitor_settings()
        .unwrap();
    let client = MqttClient::new(settings.broker.client.clone()).await.unwrap();
    let monitor = Monitor::new(settings, client);
    let aggregator = monitor.aggregator();

    let (shutdown_tx, shutdown_rx) = broadcast::channel::<()>(1);
    let handle = tokio::spawn(async move { monitor.run(shutdown_rx).await });

    wait_for_page(&html_path, Duration::from_secs(5), |h| h.contains("</html>")).await;
    tokio::time::sleep(Duration::from_millis(300)).await;

    let intruder = connected_client(broker.port, "monitor-takeover").await;
    intruder.disconnect_gracefully().await;

    // The clean session lost the subscription; only a fresh SUBSCRIBE brings messages back.
    let publisher = connected_client(broker.port, "publisher-takeover").await;
    let deadline = Instant::now() + Duration::from_secs(10);
    let mut sent = 0;
    while aggregator.total_received() == 0 && Instant::now() < deadline {
        sent += 1;
        let payload = sent.to_string();
        publish_all(&publisher, &[("t/after", payload.as_str())]).await;
        tokio::time::sleep(Duration::from_millis(300)).await;
    }
    publisher.disconnect_gracefully().await;

    assert!(aggregator.total_received() > 0, "no message after takeover");
    wait_for_page(&html_path, Duration::from_secs(5), |h| h.contains("<option>t/after: ")).await;

    shutdown_tx.send(()).unwrap();
    timeout(Duration::from_secs(5), handle)
        .await
        .expect("monitor did not stop")
        .unwrap()
        .unwrap();
}

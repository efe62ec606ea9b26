//! Integration tests for the MQTT push feed.
//!
//! These tests connect to a public broker and exercise the full
//! connect → subscribe → receive → publish → disconnect lifecycle. A raw
//! `rumqttc` client plays the sensor node and the actuator controller.
//!
//! All tests are `#[ignore]` because they require network access.
//!
//! Run with:
//! ```bash
//! cargo test --features mqtt --test mqtt_integration -- --ignored
//! ```

#![cfg(feature = "mqtt")]

use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use tokio::sync::mpsc;
use tokio::time::timeout;

use silkworm_telemetry::prelude::*;

const TEST_TIMEOUT: Duration = Duration::from_secs(15);
const PEER_BROKER: (&str, u16) = ("broker.hivemq.com", 1883);

/// Unique topics so parallel runs on the public broker never interfere.
fn test_config() -> FeedConfig {
    let suffix = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or_default();
    let prefix = format!("silkworm-test/{suffix:08x}");
    FeedConfig {
        broker_url: std::env::var("SILKWORM_BROKER_URL")
            .unwrap_or_else(|_| DEFAULT_BROKER_URL.to_string()),
        temperature_topic: format!("{prefix}/temperature"),
        humidity_topic: format!("{prefix}/humidity"),
        command_topic: format!("{prefix}/device"),
        reconnect: false,
        ..FeedConfig::default()
    }
}

async fn next_event(rx: &mut mpsc::Receiver<TransportEvent>) -> TransportEvent {
    timeout(TEST_TIMEOUT, rx.recv())
        .await
        .expect("timed out waiting for event")
        .expect("event channel closed")
}

async fn connected_feed(config: FeedConfig) -> (MqttFeed, mpsc::Receiver<TransportEvent>) {
    let mut feed = MqttFeed::new(config);
    let (tx, mut rx) = mpsc::channel(64);
    feed.start(tx).expect("start should succeed");
    assert_eq!(next_event(&mut rx).await, TransportEvent::Connected);
    (feed, rx)
}

/// Raw peer client over TCP; returns once the broker acknowledged it.
async fn peer(id: &str) -> (AsyncClient, EventLoop) {
    let mut options = MqttOptions::new(id, PEER_BROKER.0, PEER_BROKER.1);
    options.set_keep_alive(Duration::from_secs(10));
    let (client, mut eventloop) = AsyncClient::new(options, 16);
    timeout(TEST_TIMEOUT, async {
        loop {
            if let Event::Incoming(Packet::ConnAck(_)) =
                eventloop.poll().await.expect("peer connection failed")
            {
                break;
            }
        }
    })
    .await
    .expect("timed out connecting peer");
    (client, eventloop)
}

#[tokio::test]
#[ignore]
async fn test_connect_and_disconnect() {
    let _ = dotenvy::dotenv();
    let (mut feed, _rx) = connected_feed(test_config()).await;
    assert!(feed.is_connected());

    feed.stop().await;
    assert_eq!(feed.ready_state(), ReadyState::Disconnected);
}

#[tokio::test]
#[ignore]
async fn test_receives_samples_and_drops_malformed() {
    let _ = dotenvy::dotenv();
    let config = test_config();
    let (mut feed, mut rx) = connected_feed(config.clone()).await;
    // let the subscription reach the broker
    tokio::time::sleep(Duration::from_secs(1)).await;

    let (sensor, mut sensor_loop) = peer("silkworm-test-sensor").await;
    sensor
        .publish(&config.temperature_topic, QoS::AtLeastOnce, false, "oops")
        .await
        .unwrap();
    sensor
        .publish(&config.temperature_topic, QoS::AtLeastOnce, false, "25.4")
        .await
        .unwrap();
    let pump = tokio::spawn(async move { while sensor_loop.poll().await.is_ok() {} });

    match next_event(&mut rx).await {
        TransportEvent::Sample(sample) => {
            assert_eq!(sample.kind(), MetricKind::Temperature);
            assert_eq!(sample.value(), 25.4);
        }
        other => panic!("expected a sample, got {other:?}"),
    }

    pump.abort();
    feed.stop().await;
}

#[tokio::test]
#[ignore]
async fn test_dispatch_publishes_token() {
    let _ = dotenvy::dotenv();
    let config = test_config();

    let (controller, mut controller_loop) = peer("silkworm-test-controller").await;
    controller
        .subscribe(&config.command_topic, QoS::AtMostOnce)
        .await
        .unwrap();

    let (mut feed, _rx) = connected_feed(config).await;
    tokio::time::sleep(Duration::from_secs(1)).await;

    let dispatcher = CommandDispatcher::new(&feed);
    dispatcher.dispatch("FAN", Action::On).expect("dispatch should succeed");

    let payload = timeout(TEST_TIMEOUT, async {
        loop {
            if let Event::Incoming(Packet::Publish(p)) =
                controller_loop.poll().await.expect("controller connection failed")
            {
                return p.payload;
            }
        }
    })
    .await
    .expect("timed out waiting for command");
    assert_eq!(&payload[..], b"FAN_ON");

    feed.stop().await;
}

#![cfg(feature = "integration-tests")]

use caretel_nats::{JetStreamQueue, NatsClient};
use std::collections::HashMap;
use std::time::Duration;
use testcontainers::core::{ContainerPort, WaitFor};
use testcontainers::runners::AsyncRunner;
use testcontainers::{ContainerAsync, Image};

/// NATS image with JetStream enabled.
#[derive(Debug, Clone)]
struct NatsWithJetStream {
    ports: Vec<ContainerPort>,
}

impl Default for NatsWithJetStream {
    fn default() -> Self {
        Self {
            ports: vec![ContainerPort::Tcp(4222)],
        }
    }
}

impl Image for NatsWithJetStream {
    fn name(&self) -> &str {
        "nats"
    }

    fn tag(&self) -> &str {
        "latest"
    }

    fn ready_conditions(&self) -> Vec<WaitFor> {
        vec![WaitFor::seconds(3)]
    }

    fn cmd(&self) -> impl IntoIterator<Item = impl Into<std::borrow::Cow<'_, str>>> {
        // Enable JetStream
        vec!["--js"]
    }

    fn expose_ports(&self) -> &[ContainerPort] {
        &self.ports
    }
}

async fn start_queue() -> (ContainerAsync<NatsWithJetStream>, JetStreamQueue) {
    let nats = NatsWithJetStream::default().start().await.unwrap();
    let host = nats.get_host().await.unwrap();
    let port = nats.get_host_port_ipv4(4222).await.unwrap();
    let url = format!("nats://{}:{}", host, port);

    let client = NatsClient::connect(&url, Duration::from_secs(10))
        .await
        .unwrap();
    (nats, JetStreamQueue::new(&client))
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_create_consumer_group_is_idempotent() {
    let (_nats, queue) = start_queue().await;

    queue
        .create_consumer_group("raw_radar", "standardizers")
        .await
        .unwrap();

    // A second creation for the same (stream, group) must not error.
    queue
        .create_consumer_group("raw_radar", "standardizers")
        .await
        .unwrap();
}

#[tokio::test]
#[cfg_attr(not(feature = "integration-tests"), ignore)]
async fn test_create_consumer_group_creates_missing_stream() {
    let (_nats, queue) = start_queue().await;

    // No publish has touched this stream yet; group creation must
    // bring the stream into existence on its own.
    queue
        .create_consumer_group("raw_sleep_mat", "standardizers")
        .await
        .unwrap();

    let mut fields = HashMap::new();
    fields.insert("data".to_string(), serde_json::json!(r#"{"x":1}"#));
    let id = queue.publish("raw_sleep_mat", &fields).await.unwrap();
    assert!(id > 0);

    let consumer = queue
        .consumer_group("raw_sleep_mat", "standardizers")
        .await
        .unwrap();
    let records = consumer.read(10, Duration::from_secs(5)).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].field("data"), Some(r#"{"x":1}"#));
    records[0].ack().await.unwrap();
}

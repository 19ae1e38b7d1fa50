use crate::client::NatsClient;
use anyhow::{Context, Result};
use async_nats::jetstream::{
    self,
    consumer::PullConsumer,
    AckKind, Message,
};
use futures::StreamExt;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Durable queue adapter over JetStream.
///
/// Records are string-valued field sets: every value is coerced to its
/// canonical scalar encoding before being written, since the underlying
/// log is string-valued.
#[derive(Clone)]
pub struct JetStreamQueue {
    jetstream: jetstream::Context,
}

impl JetStreamQueue {
    pub fn new(client: &NatsClient) -> Self {
        Self {
            jetstream: client.jetstream().clone(),
        }
    }

    fn record_subject(stream: &str) -> String {
        format!("{}.records", stream)
    }

    /// Appends a field set to a stream and returns the assigned record
    /// id (the stream sequence).
    pub async fn publish(
        &self,
        stream: &str,
        fields: &HashMap<String, serde_json::Value>,
    ) -> Result<u64> {
        let encoded: HashMap<&str, String> = fields
            .iter()
            .map(|(k, v)| (k.as_str(), coerce_scalar(v)))
            .collect();
        let payload = serde_json::to_vec(&encoded).context("Failed to encode record fields")?;

        let ack = self
            .jetstream
            .publish(Self::record_subject(stream), payload.into())
            .await
            .context("Failed to publish record")?
            .await
            .context("Publish was not acknowledged")?;

        debug!(stream, sequence = ack.sequence, "published queue record");
        Ok(ack.sequence)
    }

    /// Serializes `obj` to JSON and writes it under a `data` field plus
    /// a `timestamp` field (epoch seconds) — the encoding the
    /// standardization consumer expects.
    pub async fn publish_json<T: serde::Serialize>(&self, stream: &str, obj: &T) -> Result<u64> {
        let mut fields = HashMap::new();
        fields.insert(
            "data".to_string(),
            serde_json::Value::String(serde_json::to_string(obj).context("Failed to serialize record data")?),
        );
        fields.insert(
            "timestamp".to_string(),
            serde_json::Value::from(chrono::Utc::now().timestamp()),
        );
        self.publish(stream, &fields).await
    }

    /// Idempotently creates the consumer group for a stream, creating
    /// the stream itself if it does not exist yet. Tolerates an
    /// existing group; any other error is fatal to startup.
    pub async fn create_consumer_group(&self, stream: &str, group: &str) -> Result<()> {
        self.ensure_stream(stream).await?;

        // create_consumer_on_stream is create-or-get for a durable
        // consumer with matching configuration.
        self.jetstream
            .create_consumer_on_stream(
                jetstream::consumer::pull::Config {
                    name: Some(group.to_string()),
                    durable_name: Some(group.to_string()),
                    filter_subject: format!("{}.>", stream),
                    ack_policy: jetstream::consumer::AckPolicy::Explicit,
                    ..Default::default()
                },
                stream,
            )
            .await
            .with_context(|| format!("Failed to create consumer group {} on {}", group, stream))?;

        info!(stream, group, "consumer group ready");
        Ok(())
    }

    async fn ensure_stream(&self, stream: &str) -> Result<()> {
        if self.jetstream.get_stream(stream).await.is_ok() {
            return Ok(());
        }
        self.jetstream
            .create_stream(jetstream::stream::Config {
                name: stream.to_string(),
                subjects: vec![format!("{}.>", stream)],
                ..Default::default()
            })
            .await
            .with_context(|| format!("Failed to create stream {}", stream))?;
        info!(stream, "created stream");
        Ok(())
    }

    /// Returns a read handle for one member of a consumer group,
    /// creating the group if needed.
    pub async fn consumer_group(&self, stream: &str, group: &str) -> Result<QueueConsumer> {
        self.create_consumer_group(stream, group).await?;
        let stream_handle = self
            .jetstream
            .get_stream(stream)
            .await
            .with_context(|| format!("Failed to look up stream {}", stream))?;
        let consumer: PullConsumer = stream_handle
            .get_consumer(group)
            .await
            .map_err(|e| anyhow::anyhow!("Failed to look up consumer group {}: {}", group, e))?;
        Ok(QueueConsumer {
            consumer,
            stream: stream.to_string(),
        })
    }
}

/// One member's read handle on a (stream, group) pair.
pub struct QueueConsumer {
    consumer: PullConsumer,
    stream: String,
}

impl QueueConsumer {
    pub fn stream(&self) -> &str {
        &self.stream
    }

    /// Blocks up to `block` waiting for records; an empty result is not
    /// an error. Each returned record carries its own acknowledgment
    /// boundary.
    pub async fn read(&self, max_count: usize, block: Duration) -> Result<Vec<QueueRecord>> {
        let mut batch = self
            .consumer
            .fetch()
            .max_messages(max_count)
            .expires(block)
            .messages()
            .await
            .context("Failed to fetch records")?;

        let mut records = Vec::new();
        while let Some(result) = batch.next().await {
            match result {
                Ok(message) => records.push(QueueRecord::from_message(message)),
                Err(e) => {
                    warn!(stream = %self.stream, error = %e, "error receiving record from batch");
                }
            }
        }

        if !records.is_empty() {
            debug!(stream = %self.stream, count = records.len(), "read record batch");
        }
        Ok(records)
    }
}

/// A single queue record with its acknowledgment handle.
pub struct QueueRecord {
    id: String,
    fields: HashMap<String, String>,
    message: Message,
}

impl QueueRecord {
    fn from_message(message: Message) -> Self {
        let id = message
            .info()
            .map(|info| info.stream_sequence.to_string())
            .unwrap_or_default();
        let fields = parse_record_fields(&message.payload);
        Self {
            id,
            fields,
            message,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields.get(name).map(String::as_str)
    }

    /// Acknowledges successful (or deliberately skipped) processing.
    pub async fn ack(&self) -> Result<()> {
        self.message
            .ack()
            .await
            .map_err(|e| anyhow::anyhow!("Failed to acknowledge record: {}", e))
    }

    /// Rejects the record for redelivery (transient failure).
    pub async fn nak(&self) -> Result<()> {
        self.message
            .ack_with(AckKind::Nak(None))
            .await
            .map_err(|e| anyhow::anyhow!("Failed to reject record: {}", e))
    }
}

/// Decodes a record payload into its field set. A malformed payload
/// yields an empty field set so the consumer can skip (and still
/// acknowledge) the record instead of redelivering it forever.
fn parse_record_fields(payload: &[u8]) -> HashMap<String, String> {
    match serde_json::from_slice(payload) {
        Ok(fields) => fields,
        Err(e) => {
            warn!(error = %e, "malformed record payload, treating as empty field set");
            HashMap::new()
        }
    }
}

/// Canonical scalar encoding for the string-valued log: strings pass
/// through, numbers are decimal-formatted, booleans become
/// "true"/"false", structured values are JSON-encoded.
fn coerce_scalar(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s.clone(),
        serde_json::Value::Number(n) => n.to_string(),
        serde_json::Value::Bool(b) => b.to_string(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_coerce_scalar_encodings() {
        assert_eq!(coerce_scalar(&serde_json::json!("abc")), "abc");
        assert_eq!(coerce_scalar(&serde_json::json!(42)), "42");
        assert_eq!(coerce_scalar(&serde_json::json!(1.5)), "1.5");
        assert_eq!(coerce_scalar(&serde_json::json!(true)), "true");
        assert_eq!(coerce_scalar(&serde_json::json!(false)), "false");
        assert_eq!(coerce_scalar(&serde_json::json!({"a": 1})), r#"{"a":1}"#);
    }

    #[test]
    fn test_parse_record_fields_round_trip() {
        let payload = br#"{"data": "{\"x\":1}", "timestamp": "1700000000"}"#;
        let fields = parse_record_fields(payload);
        assert_eq!(fields.get("data").map(String::as_str), Some(r#"{"x":1}"#));
        assert_eq!(
            fields.get("timestamp").map(String::as_str),
            Some("1700000000")
        );
    }

    #[test]
    fn test_parse_record_fields_malformed_is_empty() {
        assert!(parse_record_fields(b"not json").is_empty());
        assert!(parse_record_fields(br#"{"n": {"nested": 1}}"#).is_empty());
    }

    #[test]
    fn test_record_subject_is_namespaced_under_stream() {
        assert_eq!(JetStreamQueue::record_subject("raw_radar"), "raw_radar.records");
    }
}

use crate::mqtt::{MessageHandler, MqttClient};
use crate::topic::device_identifier;
use caretel_domain::{
    DeviceResolver, DeviceType, DomainError, DomainResult, RawEnvelopeProducer, RawPayload,
    RawTelemetryEnvelope,
};
use rumqttc::QoS;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Ingest adapter for radar fall-detection sensors.
///
/// Radar units publish one JSON object per reading on
/// `<prefix>/<serial>/<suffix>` topics; the serial in the topic is the
/// only device identity the vendor provides.
pub struct RadarIngestAdapter {
    device_resolver: Arc<dyn DeviceResolver>,
    raw_envelope_producer: Arc<dyn RawEnvelopeProducer>,
    topic_filter: String,
}

impl RadarIngestAdapter {
    pub fn new(
        device_resolver: Arc<dyn DeviceResolver>,
        raw_envelope_producer: Arc<dyn RawEnvelopeProducer>,
        topic_filter: impl Into<String>,
    ) -> Self {
        Self {
            device_resolver,
            raw_envelope_producer,
            topic_filter: topic_filter.into(),
        }
    }

    /// Register this adapter's handler on the shared MQTT client.
    pub async fn subscribe(self: &Arc<Self>, mqtt: &MqttClient) -> DomainResult<()> {
        let adapter = Arc::clone(self);
        let handler: MessageHandler = Arc::new(move |topic, payload| {
            let adapter = Arc::clone(&adapter);
            Box::pin(async move { adapter.handle_message(&topic, &payload).await })
        });

        mqtt.subscribe(&self.topic_filter, QoS::AtLeastOnce, handler)
            .await
    }

    /// Resolve the device behind a radar publish and enqueue a raw envelope.
    ///
    /// Messages for unregistered serials are dropped with a warning; a
    /// resolver failure also drops the message rather than wedging the
    /// dispatch loop.
    #[instrument(skip(self, payload), fields(topic = %topic))]
    pub(crate) async fn handle_message(&self, topic: &str, payload: &[u8]) -> DomainResult<()> {
        let serial = device_identifier(topic)?;

        let json: serde_json::Value = serde_json::from_slice(payload)?;
        let object = json.as_object().ok_or_else(|| {
            DomainError::MalformedPayload("radar payload is not a JSON object".to_string())
        })?;

        let device = match self.device_resolver.resolve_by_serial(serial).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                warn!(serial = %serial, "no device registered for radar serial, dropping message");
                return Ok(());
            }
            Err(e) => {
                warn!(serial = %serial, error = %e, "device lookup failed, dropping message");
                return Ok(());
            }
        };

        let envelope = RawTelemetryEnvelope {
            device_id: device.device_id,
            tenant_id: device.tenant_id,
            serial_number: Some(serial.to_string()),
            uid: device.uid,
            device_type: DeviceType::Radar,
            raw_payload: RawPayload::from_json_object(object),
            timestamp: chrono::Utc::now().timestamp(),
        };

        self.raw_envelope_producer
            .publish_raw_envelope(&envelope)
            .await?;

        debug!(device_id = %envelope.device_id, "enqueued radar envelope");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caretel_domain::{Device, MockDeviceResolver, MockRawEnvelopeProducer};

    fn radar_device() -> Device {
        Device {
            device_id: "dev-radar-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            device_type: DeviceType::Radar,
            serial_number: Some("AA-BB-01".to_string()),
            uid: None,
            unit_id: Some("unit-3".to_string()),
            room_id: Some("room-12".to_string()),
        }
    }

    fn adapter(
        resolver: MockDeviceResolver,
        producer: MockRawEnvelopeProducer,
    ) -> RadarIngestAdapter {
        RadarIngestAdapter::new(Arc::new(resolver), Arc::new(producer), "radar/+/data")
    }

    #[tokio::test]
    async fn test_handle_message_resolves_and_enqueues() {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve_by_serial()
            .withf(|serial| serial == "AA-BB-01")
            .times(1)
            .returning(|_| Ok(Some(radar_device())));

        let mut producer = MockRawEnvelopeProducer::new();
        producer
            .expect_publish_raw_envelope()
            .withf(|envelope: &RawTelemetryEnvelope| {
                envelope.device_id == "dev-radar-1"
                    && envelope.tenant_id == "tenant-1"
                    && envelope.device_type == DeviceType::Radar
                    && envelope.serial_number.as_deref() == Some("AA-BB-01")
                    && envelope.raw_payload.get_i64("heart_rate") == Some(72)
            })
            .times(1)
            .returning(|_| Ok(()));

        let adapter = adapter(resolver, producer);
        adapter
            .handle_message("radar/AA-BB-01/data", br#"{"heart_rate": 72}"#)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_handle_message_drops_unknown_serial() {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve_by_serial()
            .times(1)
            .returning(|_| Ok(None));

        let mut producer = MockRawEnvelopeProducer::new();
        producer.expect_publish_raw_envelope().times(0);

        let adapter = adapter(resolver, producer);
        let result = adapter
            .handle_message("radar/ZZ-99/data", br#"{"heart_rate": 72}"#)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_handle_message_drops_on_resolver_failure() {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve_by_serial()
            .times(1)
            .returning(|_| Err(DomainError::RepositoryError(anyhow::anyhow!("db down"))));

        let mut producer = MockRawEnvelopeProducer::new();
        producer.expect_publish_raw_envelope().times(0);

        let adapter = adapter(resolver, producer);
        let result = adapter
            .handle_message("radar/AA-BB-01/data", br#"{"heart_rate": 72}"#)
            .await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_handle_message_rejects_short_topic() {
        let resolver = MockDeviceResolver::new();
        let mut producer = MockRawEnvelopeProducer::new();
        producer.expect_publish_raw_envelope().times(0);

        let adapter = adapter(resolver, producer);
        let result = adapter.handle_message("radar/data", br#"{}"#).await;
        assert!(matches!(result, Err(DomainError::TopicShapeViolation(_))));
    }

    #[tokio::test]
    async fn test_handle_message_rejects_non_object_payload() {
        let resolver = MockDeviceResolver::new();
        let mut producer = MockRawEnvelopeProducer::new();
        producer.expect_publish_raw_envelope().times(0);

        let adapter = adapter(resolver, producer);

        let result = adapter
            .handle_message("radar/AA-BB-01/data", b"[1, 2, 3]")
            .await;
        assert!(matches!(result, Err(DomainError::MalformedPayload(_))));

        let result = adapter.handle_message("radar/AA-BB-01/data", b"not json").await;
        assert!(matches!(result, Err(DomainError::SerializationError(_))));
    }
}

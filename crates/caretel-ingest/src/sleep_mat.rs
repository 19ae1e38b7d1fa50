use crate::mqtt::{MessageHandler, MqttClient};
use caretel_domain::{
    DeviceResolver, DeviceType, DomainError, DomainResult, RawEnvelopeProducer, RawPayload,
    RawTelemetryEnvelope, RawValue,
};
use rumqttc::QoS;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// Data keys the sleep-mat vendor is known to emit. Anything else is a
/// firmware surprise and gets skipped rather than standardized blind.
const KNOWN_DATA_KEYS: [&str; 4] = ["realtime", "sleepStage", "connectionStatus", "alarmNotify"];

/// One element of the vendor's batched publish. The vendor timestamp is
/// ignored; mats in the field routinely report unsynced clocks.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SleepMatSubMessage {
    device_id: String,
    data_key: String,
    data: serde_json::Value,
}

/// Ingest adapter for pressure-sensing sleep mats.
///
/// The vendor gateway batches readings from many mats into a single
/// publish: a JSON array of sub-messages, each carrying its own device
/// code and data key. Each sub-message is handled independently so one
/// bad entry never discards its siblings.
pub struct SleepMatIngestAdapter {
    device_resolver: Arc<dyn DeviceResolver>,
    raw_envelope_producer: Arc<dyn RawEnvelopeProducer>,
    topic_filter: String,
}

impl SleepMatIngestAdapter {
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

    #[instrument(skip(self, payload), fields(topic = %topic, payload_size = payload.len()))]
    pub(crate) async fn handle_message(&self, topic: &str, payload: &[u8]) -> DomainResult<()> {
        let json: serde_json::Value = serde_json::from_slice(payload)?;
        let entries = json.as_array().ok_or_else(|| {
            DomainError::MalformedPayload("sleep mat payload is not a JSON array".to_string())
        })?;

        for (index, entry) in entries.iter().enumerate() {
            if let Err(e) = self.handle_sub_message(entry).await {
                warn!(index, error = %e, "skipping sleep mat sub-message");
            }
        }

        Ok(())
    }

    async fn handle_sub_message(&self, entry: &serde_json::Value) -> DomainResult<()> {
        let sub: SleepMatSubMessage = serde_json::from_value(entry.clone())?;

        if !KNOWN_DATA_KEYS.contains(&sub.data_key.as_str()) {
            warn!(data_key = %sub.data_key, "unrecognized sleep mat data key, skipping");
            return Ok(());
        }

        let data = sub.data.as_object().ok_or_else(|| {
            DomainError::MalformedPayload("sleep mat data is not a JSON object".to_string())
        })?;

        let device = match self.device_resolver.resolve_by_code(&sub.device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                warn!(code = %sub.device_id, "no device registered for sleep mat code, dropping sub-message");
                return Ok(());
            }
            Err(e) => {
                warn!(code = %sub.device_id, error = %e, "device lookup failed, dropping sub-message");
                return Ok(());
            }
        };

        let mut raw_payload = RawPayload::from_json_object(data);
        // Downstream standardization needs to know which report shape
        // this reading came from.
        raw_payload.insert("dataKey", RawValue::String(sub.data_key.clone()));

        let envelope = RawTelemetryEnvelope {
            device_id: device.device_id,
            tenant_id: device.tenant_id,
            serial_number: device.serial_number,
            uid: Some(sub.device_id),
            device_type: DeviceType::SleepMat,
            raw_payload,
            timestamp: chrono::Utc::now().timestamp(),
        };

        self.raw_envelope_producer
            .publish_raw_envelope(&envelope)
            .await?;

        debug!(device_id = %envelope.device_id, data_key = %sub.data_key, "enqueued sleep mat envelope");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use caretel_domain::{Device, MockDeviceResolver, MockRawEnvelopeProducer};

    fn mat_device(device_id: &str) -> Device {
        Device {
            device_id: device_id.to_string(),
            tenant_id: "tenant-1".to_string(),
            device_type: DeviceType::SleepMat,
            serial_number: None,
            uid: Some("MAT-001".to_string()),
            unit_id: Some("unit-1".to_string()),
            room_id: None,
        }
    }

    fn adapter(
        resolver: MockDeviceResolver,
        producer: MockRawEnvelopeProducer,
    ) -> SleepMatIngestAdapter {
        SleepMatIngestAdapter::new(Arc::new(resolver), Arc::new(producer), "sleep/gateway/up")
    }

    #[tokio::test]
    async fn test_handle_message_enqueues_each_entry() {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve_by_code()
            .withf(|code| code == "MAT-001")
            .times(1)
            .returning(|_| Ok(Some(mat_device("dev-mat-1"))));
        resolver
            .expect_resolve_by_code()
            .withf(|code| code == "MAT-002")
            .times(1)
            .returning(|_| Ok(Some(mat_device("dev-mat-2"))));

        let mut producer = MockRawEnvelopeProducer::new();
        producer
            .expect_publish_raw_envelope()
            .withf(|envelope: &RawTelemetryEnvelope| {
                envelope.device_type == DeviceType::SleepMat
                    && envelope.raw_payload.get_string("dataKey").as_deref() == Some("realtime")
                    && envelope.raw_payload.get_i64("heart").is_some()
            })
            .times(2)
            .returning(|_| Ok(()));

        let payload = br#"[
            {"deviceId": "MAT-001", "dataKey": "realtime", "timestamp": 1700000000, "data": {"heart": 62, "breath": 14}},
            {"deviceId": "MAT-002", "dataKey": "realtime", "timestamp": 1700000000, "data": {"heart": 55, "breath": 16}}
        ]"#;

        let adapter = adapter(resolver, producer);
        adapter.handle_message("sleep/gateway/up", payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_message_isolates_bad_sibling() {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve_by_code()
            .withf(|code| code == "MAT-002")
            .times(1)
            .returning(|_| Ok(Some(mat_device("dev-mat-2"))));

        let mut producer = MockRawEnvelopeProducer::new();
        producer
            .expect_publish_raw_envelope()
            .withf(|envelope: &RawTelemetryEnvelope| envelope.device_id == "dev-mat-2")
            .times(1)
            .returning(|_| Ok(()));

        // First entry is missing dataKey entirely; second is fine.
        let payload = br#"[
            {"deviceId": "MAT-001", "data": {"heart": 62}},
            {"deviceId": "MAT-002", "dataKey": "sleepStage", "data": {"sleepStage": 2}}
        ]"#;

        let adapter = adapter(resolver, producer);
        adapter.handle_message("sleep/gateway/up", payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_message_skips_unknown_data_key() {
        let resolver = MockDeviceResolver::new();
        let mut producer = MockRawEnvelopeProducer::new();
        producer.expect_publish_raw_envelope().times(0);

        let payload = br#"[
            {"deviceId": "MAT-001", "dataKey": "firmwareDebug", "data": {"x": 1}}
        ]"#;

        let adapter = adapter(resolver, producer);
        adapter.handle_message("sleep/gateway/up", payload).await.unwrap();
    }

    #[tokio::test]
    async fn test_handle_message_rejects_non_array_payload() {
        let resolver = MockDeviceResolver::new();
        let mut producer = MockRawEnvelopeProducer::new();
        producer.expect_publish_raw_envelope().times(0);

        let adapter = adapter(resolver, producer);
        let result = adapter
            .handle_message("sleep/gateway/up", br#"{"deviceId": "MAT-001"}"#)
            .await;
        assert!(matches!(result, Err(DomainError::MalformedPayload(_))));
    }

    #[tokio::test]
    async fn test_handle_message_drops_unknown_device_code() {
        let mut resolver = MockDeviceResolver::new();
        resolver
            .expect_resolve_by_code()
            .times(1)
            .returning(|_| Ok(None));

        let mut producer = MockRawEnvelopeProducer::new();
        producer.expect_publish_raw_envelope().times(0);

        let payload = br#"[
            {"deviceId": "GHOST", "dataKey": "realtime", "data": {"heart": 70}}
        ]"#;

        let adapter = adapter(resolver, producer);
        adapter.handle_message("sleep/gateway/up", payload).await.unwrap();
    }
}

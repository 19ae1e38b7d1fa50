use caretel_domain::{
    DeviceResolver, DeviceType, ObservationLocation, ObservationRepository, ObservationSummary,
    ObservationTransformer, RadarTransformer, RawTelemetryEnvelope, SleepMatTransformer,
    SummaryProducer, TerminologyRepository,
};
use std::sync::Arc;
use tracing::{debug, instrument, warn};

/// What the consume loop should do with the record after processing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Persisted; acknowledge the record.
    Processed { observation_id: i64 },
    /// Unprocessable (malformed, untransformable); acknowledge so the
    /// record never poisons the stream.
    Skip,
    /// Transient failure (store unavailable); leave for redelivery.
    Retry,
}

/// Standardizes one raw envelope: transform, persist, then best-effort
/// location enrichment and summary publish.
///
/// Only the insert is load-bearing. Everything after it is advisory and
/// must never turn a persisted observation into a redelivery.
pub struct RecordProcessor {
    radar: RadarTransformer,
    sleep_mat: SleepMatTransformer,
    observation_repository: Arc<dyn ObservationRepository>,
    device_resolver: Arc<dyn DeviceResolver>,
    summary_producer: Arc<dyn SummaryProducer>,
}

impl RecordProcessor {
    pub fn new(
        terminology_repository: Arc<dyn TerminologyRepository>,
        observation_repository: Arc<dyn ObservationRepository>,
        device_resolver: Arc<dyn DeviceResolver>,
        summary_producer: Arc<dyn SummaryProducer>,
    ) -> Self {
        Self {
            radar: RadarTransformer::new(terminology_repository),
            sleep_mat: SleepMatTransformer::new(),
            observation_repository,
            device_resolver,
            summary_producer,
        }
    }

    /// Process the JSON envelope carried in a queue record's data field.
    #[instrument(skip_all, fields(device_id = tracing::field::Empty))]
    pub async fn process_record_data(&self, data: &str) -> Outcome {
        let envelope: RawTelemetryEnvelope = match serde_json::from_str(data) {
            Ok(envelope) => envelope,
            Err(e) => {
                warn!(error = %e, "malformed envelope on raw stream, skipping record");
                return Outcome::Skip;
            }
        };

        tracing::Span::current().record("device_id", envelope.device_id.as_str());

        let transformer: &dyn ObservationTransformer = match envelope.device_type {
            DeviceType::Radar => &self.radar,
            DeviceType::SleepMat => &self.sleep_mat,
        };

        let observation = match transformer.transform(&envelope).await {
            Ok(observation) => observation,
            Err(e) => {
                warn!(error = %e, "failed to standardize envelope, skipping record");
                return Outcome::Skip;
            }
        };

        let observation_id = match self
            .observation_repository
            .insert_observation(&observation)
            .await
        {
            Ok(id) => id,
            Err(e) => {
                warn!(error = %e, "failed to persist observation, leaving record for retry");
                return Outcome::Retry;
            }
        };

        debug!(observation_id, "persisted standardized observation");

        self.enrich_location(observation_id, &envelope).await;

        let summary = ObservationSummary {
            observation_id,
            device_id: envelope.device_id.clone(),
            tenant_id: envelope.tenant_id.clone(),
            device_type: envelope.device_type,
            timestamp: observation.timestamp.timestamp(),
            data_type: observation.data_type,
            category: observation.category,
        };
        if let Err(e) = self.summary_producer.publish_summary(&summary).await {
            warn!(observation_id, error = %e, "failed to publish observation summary");
        }

        Outcome::Processed { observation_id }
    }

    /// Bind the persisted observation to the device's current unit/room.
    /// Purely best-effort; a registry hiccup costs location, not data.
    async fn enrich_location(&self, observation_id: i64, envelope: &RawTelemetryEnvelope) {
        let device = match self.device_resolver.get_device(&envelope.device_id).await {
            Ok(Some(device)) => device,
            Ok(None) => {
                debug!(observation_id, "device no longer registered, skipping location enrichment");
                return;
            }
            Err(e) => {
                warn!(observation_id, error = %e, "device lookup failed, skipping location enrichment");
                return;
            }
        };

        if device.unit_id.is_none() && device.room_id.is_none() {
            return;
        }

        let location = ObservationLocation {
            unit_id: device.unit_id,
            room_id: device.room_id,
        };
        if let Err(e) = self
            .observation_repository
            .update_location(observation_id, &location)
            .await
        {
            warn!(observation_id, error = %e, "failed to attach location to observation");
        }
    }
}

use crate::queue::JetStreamQueue;
use async_trait::async_trait;
use caretel_domain::{
    DomainError, DomainResult, ObservationSummary, RawEnvelopeProducer, RawTelemetryEnvelope,
    SummaryProducer,
};
use tracing::debug;

/// Publishes raw telemetry envelopes onto one vendor's raw stream.
pub struct JetStreamRawEnvelopeProducer {
    queue: JetStreamQueue,
    stream: String,
}

impl JetStreamRawEnvelopeProducer {
    pub fn new(queue: JetStreamQueue, stream: String) -> Self {
        Self { queue, stream }
    }
}

#[async_trait]
impl RawEnvelopeProducer for JetStreamRawEnvelopeProducer {
    async fn publish_raw_envelope(&self, envelope: &RawTelemetryEnvelope) -> DomainResult<()> {
        let record_id = self
            .queue
            .publish_json(&self.stream, envelope)
            .await
            .map_err(DomainError::RepositoryError)?;

        debug!(
            stream = %self.stream,
            record_id,
            device_id = %envelope.device_id,
            device_type = %envelope.device_type,
            "published raw telemetry envelope"
        );
        Ok(())
    }
}

/// Publishes observation summaries onto the output stream.
pub struct JetStreamSummaryProducer {
    queue: JetStreamQueue,
    stream: String,
}

impl JetStreamSummaryProducer {
    pub fn new(queue: JetStreamQueue, stream: String) -> Self {
        Self { queue, stream }
    }
}

#[async_trait]
impl SummaryProducer for JetStreamSummaryProducer {
    async fn publish_summary(&self, summary: &ObservationSummary) -> DomainResult<()> {
        let record_id = self
            .queue
            .publish_json(&self.stream, summary)
            .await
            .map_err(DomainError::RepositoryError)?;

        debug!(
            stream = %self.stream,
            record_id,
            observation_id = summary.observation_id,
            device_id = %summary.device_id,
            "published observation summary"
        );
        Ok(())
    }
}

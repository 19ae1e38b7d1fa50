mod category;
mod radar;
mod sleep_mat;

pub use category::categorize;
pub use radar::{to_centimeters, RadarTransformer};
pub use sleep_mat::SleepMatTransformer;

use crate::envelope::RawTelemetryEnvelope;
use crate::error::DomainResult;
use crate::observation::StandardizedObservation;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

/// Pure mapping from a vendor raw-payload envelope to the canonical
/// observation record.
///
/// Shared contract: each logical field group (position, posture,
/// vitals, sleep state, bed status, event) is extracted independently.
/// Extraction failure in one group is logged as a warning and leaves
/// that group unset; it never fails the whole observation.
#[async_trait]
pub trait ObservationTransformer: Send + Sync {
    async fn transform(
        &self,
        envelope: &RawTelemetryEnvelope,
    ) -> DomainResult<StandardizedObservation>;
}

pub(crate) fn envelope_timestamp(envelope: &RawTelemetryEnvelope) -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(envelope.timestamp, 0).unwrap_or_else(Utc::now)
}

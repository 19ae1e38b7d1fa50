use crate::envelope::RawTelemetryEnvelope;
use crate::error::DomainResult;
use crate::observation::StandardizedObservation;
use crate::raw_value::RawPayload;
use crate::terminology::{HEART_RATE_CODE, RESPIRATORY_RATE_CODE};
use crate::transform::{categorize, envelope_timestamp, ObservationTransformer};
use async_trait::async_trait;
use tracing::{debug, warn};

/// The sensor reports 0 and 255 as "no reading"; both are excluded
/// from the valid range.
const SENSOR_NO_READING_LOW: i64 = 0;
const SENSOR_NO_READING_HIGH: i64 = 255;

/// SNOMED codes for the two bed statuses the mat reports.
const BED_STATUS_CODES: [(i64, &str); 2] = [
    (0, "248218005"), // in bed
    (1, "248224008"), // left bed
];

/// SNOMED codes for the four sleep stages the mat reports.
const SLEEP_STAGE_CODES: [(i64, &str); 4] = [
    (0, "248220008"), // awake
    (1, "248221007"), // light sleep
    (2, "60984000"),  // deep sleep
    (3, "89129007"),  // REM sleep
];

/// Transformer for sleep-mat sensors.
///
/// Bed status and sleep stage are mapped via small fixed tables
/// embedded here rather than the terminology service; vitals carry the
/// same fixed codes as radar but are filtered to the valid sensor
/// range.
pub struct SleepMatTransformer;

impl SleepMatTransformer {
    pub fn new() -> Self {
        Self
    }

    fn extract_vitals(payload: &RawPayload, observation: &mut StandardizedObservation) {
        if let Some(hr) = payload.get_i64("heart").filter(|v| in_sensor_range(*v)) {
            observation.heart_rate = Some(hr as i32);
            observation.heart_rate_code = Some(HEART_RATE_CODE.to_string());
        }
        if let Some(rr) = payload.get_i64("breath").filter(|v| in_sensor_range(*v)) {
            observation.respiratory_rate = Some(rr as i32);
            observation.respiratory_rate_code = Some(RESPIRATORY_RATE_CODE.to_string());
        }
    }

    fn extract_bed_status(payload: &RawPayload, observation: &mut StandardizedObservation) {
        let Some(raw) = payload.get_i64("bedStatus") else {
            return;
        };
        match table_lookup(&BED_STATUS_CODES, raw) {
            Some(code) => observation.bed_status_code = Some(code.to_string()),
            None => warn!(raw_value = raw, "unknown bed status value, leaving group unset"),
        }
    }

    fn extract_sleep_stage(payload: &RawPayload, observation: &mut StandardizedObservation) {
        let Some(raw) = payload.get_i64("sleepStage") else {
            return;
        };
        match table_lookup(&SLEEP_STAGE_CODES, raw) {
            Some(code) => observation.sleep_state_code = Some(code.to_string()),
            None => warn!(raw_value = raw, "unknown sleep stage value, leaving group unset"),
        }
    }

    fn extract_events(payload: &RawPayload, observation: &mut StandardizedObservation) {
        if payload.get_i64("sitUp").is_some_and(|v| v > 0) {
            observation.event_type = Some("sit_up".to_string());
        }
        // Turn-over and body-move are recognized but not yet surfaced
        // as standalone events.
        for signal in ["turnOver", "bodyMove"] {
            if let Some(value) = payload.get_i64(signal) {
                debug!(signal, value, "recognized sleep-mat signal is not surfaced as an event");
            }
        }
    }
}

impl Default for SleepMatTransformer {
    fn default() -> Self {
        Self::new()
    }
}

fn in_sensor_range(value: i64) -> bool {
    value > SENSOR_NO_READING_LOW && value < SENSOR_NO_READING_HIGH
}

fn table_lookup(table: &[(i64, &'static str)], raw: i64) -> Option<&'static str> {
    table
        .iter()
        .find(|(key, _)| *key == raw)
        .map(|(_, code)| *code)
}

#[async_trait]
impl ObservationTransformer for SleepMatTransformer {
    async fn transform(
        &self,
        envelope: &RawTelemetryEnvelope,
    ) -> DomainResult<StandardizedObservation> {
        let raw_original = serde_json::to_string(&envelope.raw_payload)?;
        let mut observation = StandardizedObservation::new(
            envelope.tenant_id.clone(),
            envelope.device_id.clone(),
            envelope_timestamp(envelope),
            raw_original,
        );

        Self::extract_vitals(&envelope.raw_payload, &mut observation);
        Self::extract_bed_status(&envelope.raw_payload, &mut observation);
        Self::extract_sleep_stage(&envelope.raw_payload, &mut observation);
        Self::extract_events(&envelope.raw_payload, &mut observation);

        observation.category = categorize(&observation);
        Ok(observation)
    }
}

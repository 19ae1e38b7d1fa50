use crate::envelope::RawTelemetryEnvelope;
use crate::error::{DomainError, DomainResult};
use crate::observation::StandardizedObservation;
use crate::raw_value::RawPayload;
use crate::terminology::{
    TerminologyRepository, HEART_RATE_CODE, MAPPING_RADAR_EVENT, MAPPING_RADAR_POSTURE,
    RESPIRATORY_RATE_CODE,
};
use crate::transform::{categorize, envelope_timestamp, ObservationTransformer};
use async_trait::async_trait;
use std::sync::Arc;
use tracing::{debug, warn};

/// Radar position fields arrive in decimeters.
pub fn to_centimeters(value: i64) -> i64 {
    value * 10
}

/// Transformer for radar presence/vital-sign sensors.
///
/// Posture and event codes are resolved through the terminology table;
/// heart rate and respiratory rate carry fixed hardcoded codes. The
/// asymmetry is deliberate and documented behavior, not a bug.
pub struct RadarTransformer {
    terminology: Arc<dyn TerminologyRepository>,
}

impl RadarTransformer {
    pub fn new(terminology: Arc<dyn TerminologyRepository>) -> Self {
        Self { terminology }
    }

    fn extract_position(payload: &RawPayload, observation: &mut StandardizedObservation) {
        observation.radar_pos_x = payload.get_i64("position_x").map(position_cm);
        observation.radar_pos_y = payload.get_i64("position_y").map(position_cm);
        observation.radar_pos_z = payload.get_i64("position_z").map(position_cm);
        observation.tracking_id = payload.get_i64("tracking_id");
    }

    async fn extract_posture(
        &self,
        payload: &RawPayload,
        observation: &mut StandardizedObservation,
    ) -> DomainResult<()> {
        let Some(raw_code) = payload.get_string("posture") else {
            return Ok(());
        };
        match self
            .terminology
            .lookup(MAPPING_RADAR_POSTURE, &raw_code)
            .await?
        {
            Some(mapping) => {
                observation.posture_code = Some(mapping.code);
                observation.posture_display = Some(mapping.display);
                Ok(())
            }
            None => Err(DomainError::TerminologyNotFound {
                mapping_type: MAPPING_RADAR_POSTURE.to_string(),
                source_value: raw_code,
            }),
        }
    }

    fn extract_vitals(payload: &RawPayload, observation: &mut StandardizedObservation) {
        // A value outside i32 drops the whole group; no truncation.
        if let Some(hr) = payload
            .get_i64("heart_rate")
            .and_then(|v| i32::try_from(v).ok())
        {
            observation.heart_rate = Some(hr);
            observation.heart_rate_code = Some(HEART_RATE_CODE.to_string());
        }
        if let Some(rr) = payload
            .get_i64("respiratory_rate")
            .and_then(|v| i32::try_from(v).ok())
        {
            observation.respiratory_rate = Some(rr);
            observation.respiratory_rate_code = Some(RESPIRATORY_RATE_CODE.to_string());
        }
    }

    async fn extract_event(
        &self,
        payload: &RawPayload,
        observation: &mut StandardizedObservation,
    ) -> DomainResult<()> {
        let Some(event_type) = payload.get_string("event") else {
            return Ok(());
        };
        // Event types are free-form; a terminology match enriches the
        // event with a code, otherwise it passes through unmapped.
        match self
            .terminology
            .lookup(MAPPING_RADAR_EVENT, &event_type)
            .await
        {
            Ok(Some(mapping)) => observation.event_code = Some(mapping.code),
            Ok(None) => {
                debug!(event_type = %event_type, "no terminology mapping for radar event, passing through");
            }
            Err(e) => {
                warn!(error = %e, event_type = %event_type, "radar event terminology lookup failed");
            }
        }
        observation.event_type = Some(event_type);
        observation.event_area_id = payload.get_string("area_id");
        Ok(())
    }
}

fn position_cm(value: i64) -> i32 {
    to_centimeters(value).clamp(i32::MIN as i64, i32::MAX as i64) as i32
}

#[async_trait]
impl ObservationTransformer for RadarTransformer {
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

        Self::extract_position(&envelope.raw_payload, &mut observation);
        Self::extract_vitals(&envelope.raw_payload, &mut observation);

        if let Err(e) = self
            .extract_posture(&envelope.raw_payload, &mut observation)
            .await
        {
            warn!(
                device_id = %envelope.device_id,
                error = %e,
                "posture extraction failed, leaving posture group unset"
            );
        }
        if let Err(e) = self
            .extract_event(&envelope.raw_payload, &mut observation)
            .await
        {
            warn!(
                device_id = %envelope.device_id,
                error = %e,
                "event extraction failed, leaving event group unset"
            );
        }

        observation.category = categorize(&observation);
        Ok(observation)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::device::DeviceType;
    use crate::observation::Category;
    use crate::terminology::{MockTerminologyRepository, TerminologyCode};

    fn envelope(payload_json: &str) -> RawTelemetryEnvelope {
        RawTelemetryEnvelope {
            device_id: "dev-1".to_string(),
            tenant_id: "tenant-1".to_string(),
            serial_number: Some("SN001".to_string()),
            uid: None,
            device_type: DeviceType::Radar,
            raw_payload: serde_json::from_str(payload_json).unwrap(),
            timestamp: 1_700_000_000,
        }
    }

    #[test]
    fn test_to_centimeters_is_times_ten() {
        for v in [-12, 0, 1, 30, 250] {
            assert_eq!(to_centimeters(v), v * 10);
        }
    }

    #[tokio::test]
    async fn test_transform_full_payload() {
        let mut terminology = MockTerminologyRepository::new();
        terminology
            .expect_lookup()
            .withf(|mapping, value| mapping == MAPPING_RADAR_POSTURE && value == "2")
            .times(1)
            .returning(|_, _| {
                Ok(Some(TerminologyCode {
                    code: "33586001".to_string(),
                    display: "Sitting".to_string(),
                }))
            });

        let transformer = RadarTransformer::new(Arc::new(terminology));
        let envelope = envelope(
            r#"{"posture":"2","heart_rate":72,"tracking_id":5,"position_x":30}"#,
        );

        let obs = transformer.transform(&envelope).await.unwrap();
        assert_eq!(obs.radar_pos_x, Some(300));
        assert_eq!(obs.tracking_id, Some(5));
        assert_eq!(obs.heart_rate, Some(72));
        assert_eq!(obs.heart_rate_code.as_deref(), Some(HEART_RATE_CODE));
        assert_eq!(obs.posture_code.as_deref(), Some("33586001"));
        assert_eq!(obs.posture_display.as_deref(), Some("Sitting"));
        // Vitals outrank posture.
        assert_eq!(obs.category, Category::VitalSigns);
        assert!(obs.raw_original.contains("heart_rate"));
    }

    #[tokio::test]
    async fn test_posture_terminology_miss_leaves_group_unset() {
        let mut terminology = MockTerminologyRepository::new();
        terminology
            .expect_lookup()
            .times(1)
            .returning(|_, _| Ok(None));

        let transformer = RadarTransformer::new(Arc::new(terminology));
        let obs = transformer
            .transform(&envelope(r#"{"posture":"99"}"#))
            .await
            .unwrap();

        assert_eq!(obs.posture_code, None);
        assert_eq!(obs.posture_display, None);
        assert_eq!(obs.category, Category::Activity);
    }

    #[tokio::test]
    async fn test_event_passes_through_unmapped() {
        let mut terminology = MockTerminologyRepository::new();
        terminology
            .expect_lookup()
            .withf(|mapping, value| mapping == MAPPING_RADAR_EVENT && value == "fall")
            .times(1)
            .returning(|_, _| Ok(None));

        let transformer = RadarTransformer::new(Arc::new(terminology));
        let obs = transformer
            .transform(&envelope(r#"{"event":"fall","area_id":"room-3"}"#))
            .await
            .unwrap();

        assert_eq!(obs.event_type.as_deref(), Some("fall"));
        assert_eq!(obs.event_code, None);
        assert_eq!(obs.event_area_id.as_deref(), Some("room-3"));
        assert_eq!(obs.category, Category::Activity);
    }

    #[tokio::test]
    async fn test_event_enriched_when_mapping_exists() {
        let mut terminology = MockTerminologyRepository::new();
        terminology
            .expect_lookup()
            .withf(|mapping, value| mapping == MAPPING_RADAR_EVENT && value == "fall")
            .times(1)
            .returning(|_, _| {
                Ok(Some(TerminologyCode {
                    code: "217082002".to_string(),
                    display: "Accidental fall".to_string(),
                }))
            });

        let transformer = RadarTransformer::new(Arc::new(terminology));
        let obs = transformer
            .transform(&envelope(r#"{"event":"fall"}"#))
            .await
            .unwrap();

        assert_eq!(obs.event_code.as_deref(), Some("217082002"));
    }

    #[tokio::test]
    async fn test_terminology_error_does_not_fail_observation() {
        let mut terminology = MockTerminologyRepository::new();
        terminology
            .expect_lookup()
            .times(1)
            .returning(|_, _| Err(DomainError::RepositoryError(anyhow::anyhow!("db down"))));

        let transformer = RadarTransformer::new(Arc::new(terminology));
        let obs = transformer
            .transform(&envelope(r#"{"posture":"2","heart_rate":70}"#))
            .await
            .unwrap();

        assert_eq!(obs.posture_code, None);
        assert_eq!(obs.heart_rate, Some(70));
        assert_eq!(obs.category, Category::VitalSigns);
    }

    #[tokio::test]
    async fn test_vitals_outside_i32_range_are_dropped() {
        let terminology = MockTerminologyRepository::new();
        let transformer = RadarTransformer::new(Arc::new(terminology));
        let obs = transformer
            .transform(&envelope(
                r#"{"heart_rate":4294967369,"respiratory_rate":18}"#,
            ))
            .await
            .unwrap();

        assert_eq!(obs.heart_rate, None);
        assert_eq!(obs.heart_rate_code, None);
        assert_eq!(obs.respiratory_rate, Some(18));
        assert_eq!(
            obs.respiratory_rate_code.as_deref(),
            Some(RESPIRATORY_RATE_CODE)
        );
    }

    #[tokio::test]
    async fn test_empty_payload_defaults_to_activity() {
        let terminology = MockTerminologyRepository::new();
        let transformer = RadarTransformer::new(Arc::new(terminology));
        let obs = transformer.transform(&envelope("{}")).await.unwrap();
        assert_eq!(obs.category, Category::Activity);
        assert_eq!(obs.data_type.as_str(), "observation");
    }
}

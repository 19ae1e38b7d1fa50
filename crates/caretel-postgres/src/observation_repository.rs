use crate::client::PostgresClient;
use async_trait::async_trait;
use caretel_domain::{
    DomainError, DomainResult, ObservationLocation, ObservationRepository,
    StandardizedObservation,
};
use chrono::Utc;
use tracing::{debug, instrument};

/// PostgreSQL write path for standardized observations. Insert-only;
/// at-least-once redelivery can produce duplicate rows, which is
/// tolerated (no uniqueness constraint at this layer).
#[derive(Clone)]
pub struct PostgresObservationRepository {
    client: PostgresClient,
}

impl PostgresObservationRepository {
    pub fn new(client: PostgresClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObservationRepository for PostgresObservationRepository {
    #[instrument(
        skip(self, observation),
        fields(
            tenant_id = %observation.tenant_id,
            device_id = %observation.device_id,
            category = %observation.category,
        )
    )]
    async fn insert_observation(
        &self,
        observation: &StandardizedObservation,
    ) -> DomainResult<i64> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        let now = Utc::now();
        let row = conn
            .query_one(
                "INSERT INTO observations (
                    tenant_id, device_id, occurred_at, data_type, category,
                    radar_pos_x, radar_pos_y, radar_pos_z, tracking_id,
                    posture_code, posture_display,
                    heart_rate, heart_rate_code,
                    respiratory_rate, respiratory_rate_code,
                    sleep_state_code, bed_status_code,
                    event_type, event_code, event_area_id,
                    raw_original, created_at
                 ) VALUES (
                    $1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11,
                    $12, $13, $14, $15, $16, $17, $18, $19, $20, $21, $22
                 ) RETURNING id",
                &[
                    &observation.tenant_id,
                    &observation.device_id,
                    &observation.timestamp,
                    &observation.data_type.as_str(),
                    &observation.category.as_str(),
                    &observation.radar_pos_x,
                    &observation.radar_pos_y,
                    &observation.radar_pos_z,
                    &observation.tracking_id,
                    &observation.posture_code,
                    &observation.posture_display,
                    &observation.heart_rate,
                    &observation.heart_rate_code,
                    &observation.respiratory_rate,
                    &observation.respiratory_rate_code,
                    &observation.sleep_state_code,
                    &observation.bed_status_code,
                    &observation.event_type,
                    &observation.event_code,
                    &observation.event_area_id,
                    &observation.raw_original,
                    &now,
                ],
            )
            .await
            .map_err(|e| DomainError::RepositoryError(e.into()))?;

        let id: i64 = row.get(0);
        debug!(observation_id = id, "inserted observation");
        Ok(id)
    }

    #[instrument(skip(self, location))]
    async fn update_location(
        &self,
        observation_id: i64,
        location: &ObservationLocation,
    ) -> DomainResult<()> {
        let conn = self
            .client
            .get_connection()
            .await
            .map_err(DomainError::RepositoryError)?;

        conn.execute(
            "UPDATE observations SET unit_id = $2, room_id = $3 WHERE id = $1",
            &[&observation_id, &location.unit_id, &location.room_id],
        )
        .await
        .map_err(|e| DomainError::RepositoryError(e.into()))?;

        debug!(observation_id, "attached observation location");
        Ok(())
    }
}

use crate::error::DomainResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DataType {
    /// The only value this pipeline emits; alarm derivation is an
    /// external collaborator.
    Observation,
    Alarm,
}

impl DataType {
    pub fn as_str(&self) -> &'static str {
        match self {
            DataType::Observation => "observation",
            DataType::Alarm => "alarm",
        }
    }
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Category {
    #[serde(rename = "vital-signs")]
    VitalSigns,
    #[serde(rename = "activity")]
    Activity,
}

impl Category {
    pub fn as_str(&self) -> &'static str {
        match self {
            Category::VitalSigns => "vital-signs",
            Category::Activity => "activity",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// The canonical clinical observation record produced by a transformer.
///
/// Created once per envelope and never mutated afterwards, except for a
/// single best-effort location enrichment keyed by the row id returned
/// from the insert.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardizedObservation {
    pub tenant_id: String,
    pub device_id: String,
    pub timestamp: DateTime<Utc>,
    pub data_type: DataType,
    pub category: Category,

    // Positional group (centimeters).
    pub radar_pos_x: Option<i32>,
    pub radar_pos_y: Option<i32>,
    pub radar_pos_z: Option<i32>,
    pub tracking_id: Option<i64>,

    // Posture group.
    pub posture_code: Option<String>,
    pub posture_display: Option<String>,

    // Vital signs group (fixed terminology codes).
    pub heart_rate: Option<i32>,
    pub heart_rate_code: Option<String>,
    pub respiratory_rate: Option<i32>,
    pub respiratory_rate_code: Option<String>,

    // Sleep state / bed status groups.
    pub sleep_state_code: Option<String>,
    pub bed_status_code: Option<String>,

    // Behavioral event group.
    pub event_type: Option<String>,
    pub event_code: Option<String>,
    pub event_area_id: Option<String>,

    /// Serialized vendor payload, retained verbatim for audit/debug.
    pub raw_original: String,
}

impl StandardizedObservation {
    pub fn new(
        tenant_id: String,
        device_id: String,
        timestamp: DateTime<Utc>,
        raw_original: String,
    ) -> Self {
        Self {
            tenant_id,
            device_id,
            timestamp,
            data_type: DataType::Observation,
            category: Category::Activity,
            radar_pos_x: None,
            radar_pos_y: None,
            radar_pos_z: None,
            tracking_id: None,
            posture_code: None,
            posture_display: None,
            heart_rate: None,
            heart_rate_code: None,
            respiratory_rate: None,
            respiratory_rate_code: None,
            sleep_state_code: None,
            bed_status_code: None,
            event_type: None,
            event_code: None,
            event_area_id: None,
            raw_original,
        }
    }
}

/// Physical location attached to an observation during enrichment.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationLocation {
    pub unit_id: Option<String>,
    pub room_id: Option<String>,
}

/// Write path into the relational store. Insert-only; duplicates from
/// at-least-once redelivery are tolerated downstream.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait ObservationRepository: Send + Sync {
    /// Inserts the observation and returns the generated row id.
    async fn insert_observation(&self, observation: &StandardizedObservation)
        -> DomainResult<i64>;

    /// Best-effort secondary write binding the observation to a
    /// physical unit/room.
    async fn update_location(
        &self,
        observation_id: i64,
        location: &ObservationLocation,
    ) -> DomainResult<()>;
}

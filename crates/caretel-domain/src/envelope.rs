use crate::device::DeviceType;
use crate::error::DomainResult;
use crate::observation::{Category, DataType};
use crate::raw_value::RawPayload;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// The unit placed on a raw telemetry stream by an ingest adapter.
///
/// Invariant: `device_id` / `tenant_id` are always resolved identity —
/// an adapter never enqueues an envelope for an unresolved device. The
/// vendor identifiers are retained for traceability only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTelemetryEnvelope {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    #[serde(default)]
    pub serial_number: Option<String>,
    #[serde(default)]
    pub uid: Option<String>,
    pub device_type: DeviceType,
    pub raw_payload: RawPayload,
    /// Ingestion-time epoch seconds, producer-assigned. Device clocks
    /// are not trusted (vendor payloads may omit clock sync).
    pub timestamp: i64,
}

/// Lightweight summary chained to the output stream after an
/// observation has been durably persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObservationSummary {
    #[serde(rename = "observationID")]
    pub observation_id: i64,
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(rename = "tenantID")]
    pub tenant_id: String,
    pub device_type: DeviceType,
    pub timestamp: i64,
    pub data_type: DataType,
    pub category: Category,
}

/// Publishes raw telemetry envelopes onto a vendor's raw stream.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait RawEnvelopeProducer: Send + Sync {
    async fn publish_raw_envelope(&self, envelope: &RawTelemetryEnvelope) -> DomainResult<()>;
}

/// Publishes observation summaries onto the output stream for
/// downstream triggers (alarm derivation, dashboards).
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait SummaryProducer: Send + Sync {
    async fn publish_summary(&self, summary: &ObservationSummary) -> DomainResult<()>;
}

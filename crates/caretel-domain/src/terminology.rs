use crate::error::DomainResult;
use async_trait::async_trait;

/// Fixed code for heart rate (LOINC). Vitals deliberately bypass the
/// terminology table; see the transformer documentation.
pub const HEART_RATE_CODE: &str = "8867-4";
/// Fixed code for respiratory rate (LOINC).
pub const RESPIRATORY_RATE_CODE: &str = "9279-1";

/// Mapping types understood by the terminology backing store.
pub const MAPPING_RADAR_POSTURE: &str = "radar_posture";
pub const MAPPING_RADAR_EVENT: &str = "radar_event";

/// A coded value resolved from the terminology table.
#[derive(Debug, Clone, PartialEq)]
pub struct TerminologyCode {
    pub code: String,
    pub display: String,
}

/// Read-only lookups against the terminology backing store, keyed by
/// `(mapping_type, source_value)` with an optional firmware-version
/// refinement.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait TerminologyRepository: Send + Sync {
    /// Firmware-agnostic lookup; matches rows with no firmware binding
    /// first.
    async fn lookup(
        &self,
        mapping_type: &str,
        source_value: &str,
    ) -> DomainResult<Option<TerminologyCode>>;

    /// Lookup refined by firmware version, falling back to the
    /// unversioned row when no versioned mapping exists.
    async fn lookup_versioned(
        &self,
        mapping_type: &str,
        source_value: &str,
        firmware_version: &str,
    ) -> DomainResult<Option<TerminologyCode>>;
}

use crate::error::{DomainError, DomainResult};
use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Sensor vendor family a device belongs to.
///
/// The wire value is matched case-insensitively against known aliases so
/// that envelopes produced by older adapters ("SleepPad", "Sleepace")
/// still route to the sleep-mat transformer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DeviceType {
    Radar,
    SleepMat,
}

impl DeviceType {
    pub fn parse_alias(value: &str) -> Option<Self> {
        match value.to_ascii_lowercase().as_str() {
            "radar" => Some(DeviceType::Radar),
            "sleep_mat" | "sleepmat" | "sleeppad" | "sleepace" => Some(DeviceType::SleepMat),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceType::Radar => "radar",
            DeviceType::SleepMat => "sleep_mat",
        }
    }

    pub fn parse_alias_or_err(value: &str) -> DomainResult<Self> {
        Self::parse_alias(value).ok_or_else(|| DomainError::UnknownDeviceType(value.to_string()))
    }
}

impl fmt::Display for DeviceType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DeviceType {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for DeviceType {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = String::deserialize(deserializer)?;
        DeviceType::parse_alias(&value)
            .ok_or_else(|| serde::de::Error::custom(format!("unknown device type: {}", value)))
    }
}

/// Resolved internal device identity.
///
/// `unit_id` / `room_id` are the pre-bound physical location used for
/// post-insert enrichment of observations.
#[derive(Debug, Clone, PartialEq)]
pub struct Device {
    pub device_id: String,
    pub tenant_id: String,
    pub device_type: DeviceType,
    pub serial_number: Option<String>,
    pub uid: Option<String>,
    pub unit_id: Option<String>,
    pub room_id: Option<String>,
}

/// Maps vendor-supplied identifiers to internal device identity.
///
/// A miss is an expected, recoverable condition (device not yet
/// provisioned), so lookups return `Ok(None)` rather than an error.
#[cfg_attr(any(test, feature = "testing"), mockall::automock)]
#[async_trait]
pub trait DeviceResolver: Send + Sync {
    async fn resolve_by_serial(&self, serial: &str) -> DomainResult<Option<Device>>;

    async fn resolve_by_uid(&self, uid: &str) -> DomainResult<Option<Device>>;

    /// Combined lookup for vendors that only expose one opaque code:
    /// tries a serial-number match first, then a UID match.
    async fn resolve_by_code(&self, code: &str) -> DomainResult<Option<Device>>;

    /// Lookup by canonical device id, used for location enrichment.
    async fn get_device(&self, device_id: &str) -> DomainResult<Option<Device>>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_alias_radar() {
        assert_eq!(DeviceType::parse_alias("radar"), Some(DeviceType::Radar));
        assert_eq!(DeviceType::parse_alias("Radar"), Some(DeviceType::Radar));
    }

    #[test]
    fn test_parse_alias_sleep_mat_variants() {
        for alias in ["sleep_mat", "SleepPad", "Sleepace", "sleepmat", "SLEEPPAD"] {
            assert_eq!(
                DeviceType::parse_alias(alias),
                Some(DeviceType::SleepMat),
                "alias {} should route to sleep mat",
                alias
            );
        }
    }

    #[test]
    fn test_parse_alias_unknown() {
        assert_eq!(DeviceType::parse_alias("thermostat"), None);
    }

    #[test]
    fn test_device_type_serde_round_trip() {
        let json = serde_json::to_string(&DeviceType::SleepMat).unwrap();
        assert_eq!(json, "\"sleep_mat\"");
        let parsed: DeviceType = serde_json::from_str("\"SleepPad\"").unwrap();
        assert_eq!(parsed, DeviceType::SleepMat);
    }

    #[test]
    fn test_device_type_deserialize_unknown_fails() {
        let result: Result<DeviceType, _> = serde_json::from_str("\"toaster\"");
        assert!(result.is_err());
    }
}

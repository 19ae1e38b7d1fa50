//! Vendor-facing ingest adapters.
//!
//! Each adapter subscribes to its vendor's MQTT topics, resolves the
//! publishing device against the registry, and enqueues normalized
//! [`caretel_domain::RawTelemetryEnvelope`]s on the vendor's raw stream.

mod mqtt;
mod radar;
mod sleep_mat;
mod topic;

pub use mqtt::{MessageHandler, MqttClient, MqttConfig};
pub use rumqttc::QoS;
pub use radar::RadarIngestAdapter;
pub use sleep_mat::SleepMatIngestAdapter;
pub use topic::{device_identifier, topic_matches};

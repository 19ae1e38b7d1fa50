//! Standardization consumer: drains raw telemetry streams, maps each
//! envelope to a canonical observation, persists it, and chains a
//! summary onto the output stream.

mod backoff;
mod processor;
mod worker;

pub use backoff::Backoff;
pub use processor::{Outcome, RecordProcessor};
pub use worker::{StandardizationWorker, StandardizationWorkerConfig};

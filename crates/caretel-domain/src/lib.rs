pub mod device;
pub mod envelope;
pub mod error;
pub mod observation;
pub mod raw_value;
pub mod terminology;
pub mod transform;

pub use device::{Device, DeviceResolver, DeviceType};
pub use envelope::{ObservationSummary, RawEnvelopeProducer, RawTelemetryEnvelope, SummaryProducer};
pub use error::{DomainError, DomainResult};
pub use observation::{
    Category, DataType, ObservationLocation, ObservationRepository, StandardizedObservation,
};
pub use raw_value::{RawPayload, RawValue};
pub use terminology::{
    TerminologyCode, TerminologyRepository, HEART_RATE_CODE, MAPPING_RADAR_EVENT,
    MAPPING_RADAR_POSTURE, RESPIRATORY_RATE_CODE,
};
pub use transform::{
    categorize, to_centimeters, ObservationTransformer, RadarTransformer, SleepMatTransformer,
};

#[cfg(any(test, feature = "testing"))]
pub use device::MockDeviceResolver;
#[cfg(any(test, feature = "testing"))]
pub use envelope::{MockRawEnvelopeProducer, MockSummaryProducer};
#[cfg(any(test, feature = "testing"))]
pub use observation::MockObservationRepository;
#[cfg(any(test, feature = "testing"))]
pub use terminology::MockTerminologyRepository;

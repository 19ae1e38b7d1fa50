use thiserror::Error;

pub type DomainResult<T> = Result<T, DomainError>;

#[derive(Error, Debug)]
pub enum DomainError {
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    #[error("Unknown device type: {0}")]
    UnknownDeviceType(String),

    #[error("Malformed payload: {0}")]
    MalformedPayload(String),

    #[error("Topic shape violation: {0}")]
    TopicShapeViolation(String),

    #[error("Terminology mapping not found: type {mapping_type}, value {source_value}")]
    TerminologyNotFound {
        mapping_type: String,
        source_value: String,
    },

    #[error("Broker error: {0}")]
    BrokerError(String),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),

    #[error("Repository error: {0}")]
    RepositoryError(#[from] anyhow::Error),
}

mod client;
mod device_repository;
mod observation_repository;
mod terminology_repository;

pub use client::PostgresClient;
pub use device_repository::PostgresDeviceRepository;
pub use observation_repository::PostgresObservationRepository;
pub use terminology_repository::PostgresTerminologyRepository;

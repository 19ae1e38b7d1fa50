mod client;
mod producers;
mod queue;

pub use client::NatsClient;
pub use producers::{JetStreamRawEnvelopeProducer, JetStreamSummaryProducer};
pub use queue::{JetStreamQueue, QueueConsumer, QueueRecord};

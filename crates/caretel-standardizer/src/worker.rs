use crate::backoff::Backoff;
use crate::processor::{Outcome, RecordProcessor};
use caretel_nats::{JetStreamQueue, QueueConsumer, QueueRecord};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

type RunnerProcess = Box<
    dyn FnOnce(
            CancellationToken,
        )
            -> std::pin::Pin<Box<dyn std::future::Future<Output = anyhow::Result<()>> + Send>>
        + Send,
>;

pub struct StandardizationWorkerConfig {
    /// Raw streams to consume, one loop per stream.
    pub raw_streams: Vec<String>,
    pub consumer_group: String,
    pub batch_size: usize,
    pub block_secs: u64,
}

/// Owns one consume loop per raw stream, all feeding the shared
/// [`RecordProcessor`].
pub struct StandardizationWorker {
    consumers: Vec<QueueConsumer>,
    processor: Arc<RecordProcessor>,
    batch_size: usize,
    block: Duration,
}

impl StandardizationWorker {
    /// Ensures the consumer group exists on every raw stream, then binds
    /// a consumer per stream. Group creation is idempotent but a failure
    /// here is fatal: a worker without its groups would silently read
    /// nothing.
    pub async fn new(
        queue: &JetStreamQueue,
        processor: RecordProcessor,
        config: StandardizationWorkerConfig,
    ) -> anyhow::Result<Self> {
        info!("initializing standardization worker");

        let mut consumers = Vec::with_capacity(config.raw_streams.len());
        for stream in &config.raw_streams {
            queue
                .create_consumer_group(stream, &config.consumer_group)
                .await?;
            consumers.push(queue.consumer_group(stream, &config.consumer_group).await?);
        }

        info!(
            streams = config.raw_streams.len(),
            group = %config.consumer_group,
            "standardization worker initialized"
        );

        Ok(Self {
            consumers,
            processor: Arc::new(processor),
            batch_size: config.batch_size,
            block: Duration::from_secs(config.block_secs),
        })
    }

    pub fn into_runner_processes(self) -> Vec<RunnerProcess> {
        let batch_size = self.batch_size;
        let block = self.block;

        self.consumers
            .into_iter()
            .map(|consumer| {
                let processor = Arc::clone(&self.processor);
                let process: RunnerProcess = Box::new(move |ctx: CancellationToken| {
                    Box::pin(consume_loop(consumer, processor, batch_size, block, ctx))
                });
                process
            })
            .collect()
    }
}

/// Read-process-acknowledge loop for a single raw stream.
///
/// Read failures back off exponentially per loop; a batch already read
/// when cancellation arrives is processed to completion so its records
/// are acked or naked rather than left to time out.
async fn consume_loop(
    consumer: QueueConsumer,
    processor: Arc<RecordProcessor>,
    batch_size: usize,
    block: Duration,
    token: CancellationToken,
) -> anyhow::Result<()> {
    let stream = consumer.stream().to_string();
    info!(stream = %stream, "starting standardization consume loop");

    let mut backoff = Backoff::new();

    loop {
        let records = tokio::select! {
            _ = token.cancelled() => break,
            result = consumer.read(batch_size, block) => match result {
                Ok(records) => {
                    backoff.reset();
                    records
                }
                Err(e) => {
                    let delay = backoff.next_delay();
                    warn!(stream = %stream, error = %e, delay_secs = delay.as_secs(), "failed to read from raw stream, backing off");
                    tokio::select! {
                        _ = token.cancelled() => break,
                        _ = tokio::time::sleep(delay) => {}
                    }
                    continue;
                }
            }
        };

        if records.is_empty() {
            continue;
        }

        debug!(stream = %stream, count = records.len(), "processing batch");
        for record in &records {
            process_record(&processor, record).await;
        }
    }

    info!(stream = %stream, "standardization consume loop stopped");
    Ok(())
}

async fn process_record(processor: &RecordProcessor, record: &QueueRecord) {
    let outcome = match record.field("data") {
        Some(data) => processor.process_record_data(data).await,
        None => {
            warn!(record_id = %record.id(), "record has no data field, skipping");
            Outcome::Skip
        }
    };

    match ack_decision(outcome) {
        AckDecision::Ack => {
            if let Err(e) = record.ack().await {
                warn!(record_id = %record.id(), error = %e, "failed to acknowledge record");
            }
        }
        AckDecision::Nak => {
            if let Err(e) = record.nak().await {
                warn!(record_id = %record.id(), error = %e, "failed to nak record");
            }
        }
    }
}

#[derive(Debug, PartialEq, Eq)]
enum AckDecision {
    Ack,
    Nak,
}

/// Skips are acknowledged: a record that cannot be processed today will
/// not process better on redelivery, and must not poison the stream.
fn ack_decision(outcome: Outcome) -> AckDecision {
    match outcome {
        Outcome::Processed { .. } | Outcome::Skip => AckDecision::Ack,
        Outcome::Retry => AckDecision::Nak,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ack_decision_only_retries_transient_failures() {
        assert_eq!(
            ack_decision(Outcome::Processed { observation_id: 1 }),
            AckDecision::Ack
        );
        assert_eq!(ack_decision(Outcome::Skip), AckDecision::Ack);
        assert_eq!(ack_decision(Outcome::Retry), AckDecision::Nak);
    }
}

mod config;
mod telemetry;

use caretel_domain::{DeviceResolver, ObservationRepository, SummaryProducer, TerminologyRepository};
use caretel_ingest::{MqttClient, MqttConfig, RadarIngestAdapter, SleepMatIngestAdapter};
use caretel_nats::{
    JetStreamQueue, JetStreamRawEnvelopeProducer, JetStreamSummaryProducer, NatsClient,
};
use caretel_postgres::{
    PostgresClient, PostgresDeviceRepository, PostgresObservationRepository,
    PostgresTerminologyRepository,
};
use caretel_runner::Runner;
use caretel_standardizer::{RecordProcessor, StandardizationWorker, StandardizationWorkerConfig};
use config::ServiceConfig;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};

const MQTT_DISCONNECT_GRACE: Duration = Duration::from_millis(250);

#[tokio::main]
async fn main() {
    let config = match ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    telemetry::init_telemetry(&config.log_level);

    info!("starting caretel telemetry service");

    if let Err(e) = run(config).await {
        error!(error = %e, "service failed");
        std::process::exit(1);
    }
}

async fn run(config: ServiceConfig) -> anyhow::Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);

    // Relational store. The ping is a startup precondition: without the
    // device registry neither ingest nor standardization can do anything.
    let postgres_client = PostgresClient::new(
        &config.postgres_host,
        config.postgres_port,
        &config.postgres_database,
        &config.postgres_username,
        &config.postgres_password,
        config.postgres_pool_size,
    )?;
    tokio::time::timeout(startup_timeout, postgres_client.ping()).await??;
    info!(host = %config.postgres_host, "connected to PostgreSQL");

    let device_resolver: Arc<dyn DeviceResolver> =
        Arc::new(PostgresDeviceRepository::new(postgres_client.clone()));
    let terminology_repository: Arc<dyn TerminologyRepository> =
        Arc::new(PostgresTerminologyRepository::new(postgres_client.clone()));
    let observation_repository: Arc<dyn ObservationRepository> =
        Arc::new(PostgresObservationRepository::new(postgres_client));

    // Durable queue.
    let nats_client = NatsClient::connect(&config.nats_url, startup_timeout).await?;
    nats_client.ensure_stream(&config.summary_stream).await?;
    info!(url = %config.nats_url, "connected to NATS");

    let queue = JetStreamQueue::new(&nats_client);

    let radar_producer = Arc::new(JetStreamRawEnvelopeProducer::new(
        queue.clone(),
        config.raw_radar_stream.clone(),
    ));
    let sleep_mat_producer = Arc::new(JetStreamRawEnvelopeProducer::new(
        queue.clone(),
        config.raw_sleep_mat_stream.clone(),
    ));
    let summary_producer: Arc<dyn SummaryProducer> = Arc::new(JetStreamSummaryProducer::new(
        queue.clone(),
        config.summary_stream.clone(),
    ));

    // Standardization worker. Created before the MQTT subscriptions so
    // the raw streams and consumer groups exist before the first publish.
    let processor = RecordProcessor::new(
        terminology_repository,
        observation_repository,
        Arc::clone(&device_resolver),
        summary_producer,
    );
    let worker = StandardizationWorker::new(
        &queue,
        processor,
        StandardizationWorkerConfig {
            raw_streams: vec![
                config.raw_radar_stream.clone(),
                config.raw_sleep_mat_stream.clone(),
            ],
            consumer_group: config.consumer_group.clone(),
            batch_size: config.batch_size,
            block_secs: config.block_secs,
        },
    )
    .await?;

    // Vendor ingest. A broker we cannot reach at startup is fatal.
    let mqtt_client = Arc::new(
        MqttClient::connect(&MqttConfig {
            broker_url: config.mqtt_broker_url.clone(),
            client_id: config.mqtt_client_id.clone(),
            keep_alive_secs: config.mqtt_keep_alive_secs,
            connect_timeout_secs: config.mqtt_connect_timeout_secs,
        })
        .await?,
    );

    let radar_adapter = Arc::new(RadarIngestAdapter::new(
        Arc::clone(&device_resolver),
        radar_producer,
        config.radar_topic_filter.clone(),
    ));
    radar_adapter.subscribe(&mqtt_client).await?;

    let sleep_mat_adapter = Arc::new(SleepMatIngestAdapter::new(
        Arc::clone(&device_resolver),
        sleep_mat_producer,
        config.sleep_mat_topic_filter.clone(),
    ));
    sleep_mat_adapter.subscribe(&mqtt_client).await?;

    info!("ingest adapters subscribed, starting consume loops");

    let mut runner = Runner::new()
        .with_closer({
            let mqtt_client = Arc::clone(&mqtt_client);
            let topic_filters = vec![
                config.radar_topic_filter.clone(),
                config.sleep_mat_topic_filter.clone(),
            ];
            move || async move {
                // Unsubscribe before dropping the connection; no publish
                // may reach a handler once shutdown has begun.
                for filter in &topic_filters {
                    if let Err(e) = mqtt_client.unsubscribe(filter).await {
                        warn!(filter = %filter, error = %e, "failed to unsubscribe during shutdown");
                    }
                }
                mqtt_client.disconnect(MQTT_DISCONNECT_GRACE).await;
                Ok(())
            }
        })
        .with_closer(move || async move {
            // Push any buffered publishes out before the connection drops.
            if let Err(e) = nats_client.flush().await {
                warn!(error = %e, "failed to flush NATS connection during shutdown");
            }
            nats_client.close().await;
            Ok(())
        });

    for process in worker.into_runner_processes() {
        runner = runner.with_boxed_process(process);
    }

    runner.run().await
}

use config::{Config, ConfigError, Environment};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct ServiceConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    // MQTT configuration
    #[serde(default = "default_mqtt_broker_url")]
    pub mqtt_broker_url: String,

    #[serde(default = "default_mqtt_client_id")]
    pub mqtt_client_id: String,

    #[serde(default = "default_mqtt_keep_alive_secs")]
    pub mqtt_keep_alive_secs: u64,

    #[serde(default = "default_mqtt_connect_timeout_secs")]
    pub mqtt_connect_timeout_secs: u64,

    /// Topic filter for radar publishes; the device serial is the
    /// second-to-last topic segment
    #[serde(default = "default_radar_topic_filter")]
    pub radar_topic_filter: String,

    /// Topic filter for the sleep mat vendor gateway's batched uplink
    #[serde(default = "default_sleep_mat_topic_filter")]
    pub sleep_mat_topic_filter: String,

    // Queue configuration
    #[serde(default = "default_nats_url")]
    pub nats_url: String,

    #[serde(default = "default_raw_radar_stream")]
    pub raw_radar_stream: String,

    #[serde(default = "default_raw_sleep_mat_stream")]
    pub raw_sleep_mat_stream: String,

    /// Output stream for observation summaries
    #[serde(default = "default_summary_stream")]
    pub summary_stream: String,

    #[serde(default = "default_consumer_group")]
    pub consumer_group: String,

    /// Records fetched per consume iteration
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Max seconds a read blocks waiting for records
    #[serde(default = "default_block_secs")]
    pub block_secs: u64,

    // Postgres configuration
    #[serde(default = "default_postgres_host")]
    pub postgres_host: String,

    #[serde(default = "default_postgres_port")]
    pub postgres_port: u16,

    #[serde(default = "default_postgres_database")]
    pub postgres_database: String,

    #[serde(default = "default_postgres_username")]
    pub postgres_username: String,

    #[serde(default = "default_postgres_password")]
    pub postgres_password: String,

    #[serde(default = "default_postgres_pool_size")]
    pub postgres_pool_size: usize,

    /// Startup timeout for initialization operations in seconds
    #[serde(default = "default_startup_timeout_secs")]
    pub startup_timeout_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_mqtt_broker_url() -> String {
    "mqtt://localhost:1883".to_string()
}

fn default_mqtt_client_id() -> String {
    "caretel-ingest".to_string()
}

fn default_mqtt_keep_alive_secs() -> u64 {
    30
}

fn default_mqtt_connect_timeout_secs() -> u64 {
    10
}

fn default_radar_topic_filter() -> String {
    "radar/+/data".to_string()
}

fn default_sleep_mat_topic_filter() -> String {
    "sleepmat/gateway/up".to_string()
}

fn default_nats_url() -> String {
    "nats://localhost:4222".to_string()
}

fn default_raw_radar_stream() -> String {
    "raw_radar".to_string()
}

fn default_raw_sleep_mat_stream() -> String {
    "raw_sleep_mat".to_string()
}

fn default_summary_stream() -> String {
    "observation_summaries".to_string()
}

fn default_consumer_group() -> String {
    "caretel-standardizer".to_string()
}

fn default_batch_size() -> usize {
    30
}

fn default_block_secs() -> u64 {
    5
}

fn default_postgres_host() -> String {
    "localhost".to_string()
}

fn default_postgres_port() -> u16 {
    5432
}

fn default_postgres_database() -> String {
    "caretel".to_string()
}

fn default_postgres_username() -> String {
    "caretel".to_string()
}

fn default_postgres_password() -> String {
    "caretel".to_string()
}

fn default_postgres_pool_size() -> usize {
    16
}

fn default_startup_timeout_secs() -> u64 {
    30
}

impl ServiceConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Config::builder()
            .add_source(Environment::with_prefix("CARETEL"))
            .build()?
            .try_deserialize()
    }
}

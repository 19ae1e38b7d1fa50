use crate::topic::topic_matches;
use caretel_domain::{DomainError, DomainResult};
use futures::future::BoxFuture;
use rumqttc::{AsyncClient, Event, EventLoop, MqttOptions, Packet, QoS};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, info_span, instrument, warn, Instrument, Span};

const EVENT_LOOP_CAPACITY: usize = 100;
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Callback invoked for each publish whose topic matches a registered filter.
pub type MessageHandler =
    Arc<dyn Fn(String, Vec<u8>) -> BoxFuture<'static, DomainResult<()>> + Send + Sync>;

#[derive(Debug, Clone)]
pub struct MqttConfig {
    pub broker_url: String,
    pub client_id: String,
    pub keep_alive_secs: u64,
    pub connect_timeout_secs: u64,
}

/// MQTT client with a shared event loop and per-filter message handlers.
///
/// Construction only succeeds once the broker acknowledges the connection,
/// so a service fails fast on a misconfigured broker instead of spinning.
/// After the initial handshake the background loop keeps polling; rumqttc
/// reconnects automatically and transient errors only pause the loop briefly.
pub struct MqttClient {
    client: AsyncClient,
    handlers: Arc<RwLock<Vec<(String, MessageHandler)>>>,
    loop_token: CancellationToken,
    loop_handle: Mutex<Option<JoinHandle<()>>>,
}

impl MqttClient {
    /// Connect to the broker and spawn the dispatch loop.
    ///
    /// Returns an error if the broker does not send a ConnAck within
    /// the configured connect timeout.
    #[instrument(name = "mqtt_connect", skip_all, fields(broker_url = %config.broker_url, client_id = %config.client_id))]
    pub async fn connect(config: &MqttConfig) -> DomainResult<Self> {
        let (host, port) = parse_broker_url(&config.broker_url)?;

        let mut mqtt_options = MqttOptions::new(&config.client_id, host, port);
        mqtt_options.set_keep_alive(Duration::from_secs(config.keep_alive_secs));
        mqtt_options.set_clean_session(true);

        let (client, mut eventloop) = AsyncClient::new(mqtt_options, EVENT_LOOP_CAPACITY);

        // Wait for the broker handshake before handing the loop to a task.
        let connect_timeout = Duration::from_secs(config.connect_timeout_secs);
        tokio::time::timeout(connect_timeout, wait_for_connack(&mut eventloop))
            .await
            .map_err(|_| {
                DomainError::BrokerError(format!(
                    "timed out connecting to MQTT broker {}",
                    config.broker_url
                ))
            })??;

        info!(broker_url = %config.broker_url, "connected to MQTT broker");

        let handlers: Arc<RwLock<Vec<(String, MessageHandler)>>> =
            Arc::new(RwLock::new(Vec::new()));
        let loop_token = CancellationToken::new();

        let loop_handle = tokio::spawn(dispatch_loop(
            eventloop,
            Arc::clone(&handlers),
            loop_token.clone(),
        ));

        Ok(Self {
            client,
            handlers,
            loop_token,
            loop_handle: Mutex::new(Some(loop_handle)),
        })
    }

    /// Subscribe to a topic filter and register a handler for matching messages.
    #[instrument(skip(self, qos, handler), fields(filter = %filter))]
    pub async fn subscribe(
        &self,
        filter: &str,
        qos: QoS,
        handler: MessageHandler,
    ) -> DomainResult<()> {
        // Register before subscribing so no matching publish can slip
        // between the SubAck and the handler becoming visible.
        self.handlers
            .write()
            .await
            .push((filter.to_string(), handler));

        if let Err(e) = self.client.subscribe(filter, qos).await {
            self.handlers.write().await.retain(|(f, _)| f != filter);
            return Err(DomainError::BrokerError(format!(
                "failed to subscribe to {}: {}",
                filter, e
            )));
        }

        info!(filter = %filter, "subscribed to MQTT topic filter");
        Ok(())
    }

    /// Drop the handler for a filter and unsubscribe from the broker.
    #[instrument(skip(self), fields(filter = %filter))]
    pub async fn unsubscribe(&self, filter: &str) -> DomainResult<()> {
        self.handlers.write().await.retain(|(f, _)| f != filter);
        self.client.unsubscribe(filter).await.map_err(|e| {
            DomainError::BrokerError(format!("failed to unsubscribe from {}: {}", filter, e))
        })
    }

    #[instrument(skip(self, qos, retain, payload), fields(topic = %topic, payload_size = payload.len()))]
    pub async fn publish(
        &self,
        topic: &str,
        qos: QoS,
        retain: bool,
        payload: Vec<u8>,
    ) -> DomainResult<()> {
        self.client
            .publish(topic, qos, retain, payload)
            .await
            .map_err(|e| {
                DomainError::BrokerError(format!("failed to publish to {}: {}", topic, e))
            })
    }

    /// Disconnect from the broker and stop the dispatch loop, waiting up to
    /// `grace` for any in-flight handler to finish.
    pub async fn disconnect(&self, grace: Duration) {
        if let Err(e) = self.client.disconnect().await {
            debug!(error = %e, "MQTT disconnect request failed");
        }

        self.loop_token.cancel();

        let handle = self.loop_handle.lock().await.take();
        if let Some(handle) = handle {
            if tokio::time::timeout(grace, handle).await.is_err() {
                warn!("MQTT dispatch loop did not stop within grace period");
            }
        }

        info!("disconnected from MQTT broker");
    }
}

async fn wait_for_connack(eventloop: &mut EventLoop) -> DomainResult<()> {
    loop {
        match eventloop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(_))) => return Ok(()),
            Ok(_) => continue,
            Err(e) => {
                return Err(DomainError::BrokerError(format!(
                    "MQTT connection failed: {}",
                    e
                )))
            }
        }
    }
}

/// Poll the event loop, dispatching each publish to the handlers whose
/// filter matches its topic. Handlers run serially; a failing handler is
/// logged and never tears down the loop.
async fn dispatch_loop(
    mut eventloop: EventLoop,
    handlers: Arc<RwLock<Vec<(String, MessageHandler)>>>,
    token: CancellationToken,
) {
    loop {
        tokio::select! {
            _ = token.cancelled() => {
                debug!("MQTT dispatch loop cancelled");
                return;
            }
            event = eventloop.poll() => {
                match event {
                    Ok(Event::Incoming(Packet::Publish(publish))) => {
                        let topic = publish.topic.clone();
                        let payload = publish.payload.to_vec();
                        dispatch_message(&handlers, topic, payload).await;
                    }
                    Ok(Event::Incoming(Packet::ConnAck(_))) => {
                        info!("reconnected to MQTT broker");
                    }
                    Ok(Event::Incoming(Packet::SubAck(_))) => {
                        debug!("subscription acknowledged");
                    }
                    Ok(_) => {}
                    Err(e) => {
                        warn!(error = %e, "MQTT event loop error, waiting before reconnect");
                        tokio::select! {
                            _ = token.cancelled() => return,
                            _ = tokio::time::sleep(RECONNECT_DELAY) => {}
                        }
                    }
                }
            }
        }
    }
}

/// Handle a single incoming publish.
///
/// Creates a new root span per message so each telemetry message gets an
/// independent trace rather than nesting under the long-lived loop span.
async fn dispatch_message(
    handlers: &Arc<RwLock<Vec<(String, MessageHandler)>>>,
    topic: String,
    payload: Vec<u8>,
) {
    let span = info_span!(
        parent: Span::none(),
        "mqtt_message",
        topic = %topic,
        payload_size = payload.len(),
    );

    async {
        let matched: Vec<MessageHandler> = {
            let handlers = handlers.read().await;
            handlers
                .iter()
                .filter(|(filter, _)| topic_matches(filter, &topic))
                .map(|(_, handler)| Arc::clone(handler))
                .collect()
        };

        if matched.is_empty() {
            debug!("no handler registered for topic, skipping message");
            return;
        }

        for handler in matched {
            if let Err(e) = handler(topic.clone(), payload.clone()).await {
                warn!(error = %e, "message handler failed, skipping message");
            }
        }
    }
    .instrument(span)
    .await
}

/// Parse broker URL in format mqtt://host:port or tcp://host:port or host:port
fn parse_broker_url(url: &str) -> DomainResult<(&str, u16)> {
    let url = url.trim_start_matches("mqtt://");
    let url = url.trim_start_matches("tcp://");

    let parts: Vec<&str> = url.split(':').collect();
    match parts.len() {
        1 => Ok((parts[0], 1883)), // Default MQTT port
        2 => {
            let port = parts[1].parse::<u16>().map_err(|_| {
                DomainError::BrokerError(format!("invalid port in broker URL: {}", parts[1]))
            })?;
            Ok((parts[0], port))
        }
        _ => Err(DomainError::BrokerError(format!(
            "invalid broker URL format: {}",
            url
        ))),
    }
}

//! Publishes every transaction to Kafka.

use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use bytes::Bytes;
use tokio::sync::{Mutex, RwLock};
use tokio::time::Instant;

use super::{Handler, HandlerFactory, HandlerId, TransactionBundle};
use crate::client::{KafkaProducer, ProducerSettings};
use crate::config::SendToKafkaConfig;
use crate::constants::RECONNECT_INTERVAL_SECS;
use crate::error::{Error, Result};
use crate::messages::DhcpKafkaMessage;

/// Something that accepts encoded Kafka messages.
#[async_trait]
pub trait Publisher: Send + Sync {
    /// Hand over a payload. Must not wait for the broker.
    fn publish(&self, payload: Bytes) -> Result<()>;

    async fn stop(&self);
}

#[async_trait]
impl Publisher for KafkaProducer {
    fn publish(&self, payload: Bytes) -> Result<()> {
        self.produce(payload)
    }

    async fn stop(&self) {
        KafkaProducer::stop(self).await
    }
}

/// Creates publishers for a handler.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, settings: &ProducerSettings) -> Result<Arc<dyn Publisher>>;
}

/// Connects a [`KafkaProducer`].
#[derive(Debug, Clone, Copy, Default)]
pub struct ProducerConnector;

#[async_trait]
impl Connector for ProducerConnector {
    async fn connect(&self, settings: &ProducerSettings) -> Result<Arc<dyn Publisher>> {
        let producer = KafkaProducer::connect(settings.clone()).await?;
        Ok(Arc::new(producer))
    }
}

fn unix_time() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0.0, |d| d.as_secs_f64())
}

/// Handler that sends a [`DhcpKafkaMessage`] for every transaction.
///
/// Publishing is best effort: when Kafka can't be reached the transaction is
/// not published, and the DHCPv6 server carries on regardless.
pub struct KafkaHandler {
    id: HandlerId,
    server_name: String,
    settings: ProducerSettings,
    connector: Arc<dyn Connector>,
    publisher: RwLock<Option<Arc<dyn Publisher>>>,
    last_connect_attempt: Mutex<Option<Instant>>,
    reconnect_interval: Duration,
}

impl std::fmt::Debug for KafkaHandler {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaHandler")
            .field("id", &self.id)
            .field("server_name", &self.server_name)
            .field("settings", &self.settings)
            .finish_non_exhaustive()
    }
}

impl KafkaHandler {
    pub fn new(config: &SendToKafkaConfig) -> Self {
        Self::with_connector(config, Arc::new(ProducerConnector))
    }

    pub fn with_connector(config: &SendToKafkaConfig, connector: Arc<dyn Connector>) -> Self {
        let server_name = if config.server_name.is_empty() {
            crate::config::fqdn()
        } else {
            config.server_name.clone()
        };

        Self {
            id: HandlerId::next(),
            server_name,
            settings: ProducerSettings::from_config(config),
            connector,
            publisher: RwLock::new(None),
            last_connect_attempt: Mutex::new(None),
            reconnect_interval: Duration::from_secs(RECONNECT_INTERVAL_SECS),
        }
    }

    pub fn id(&self) -> HandlerId {
        self.id
    }

    pub fn server_name(&self) -> &str {
        &self.server_name
    }

    pub fn settings(&self) -> &ProducerSettings {
        &self.settings
    }

    pub async fn is_connected(&self) -> bool {
        self.publisher.read().await.is_some()
    }

    /// Connect to Kafka, at most once per reconnect interval.
    ///
    /// Returns whether a publisher is available afterwards.
    pub async fn connect(&self) -> bool {
        {
            let mut last = self.last_connect_attempt.lock().await;
            let now = Instant::now();
            if let Some(at) = *last {
                if now.duration_since(at) < self.reconnect_interval {
                    return self.is_connected().await;
                }
            }
            *last = Some(now);
        }

        let hosts: Vec<String> = self
            .settings
            .brokers
            .iter()
            .map(|b| b.connect_string())
            .collect();

        match self.connector.connect(&self.settings).await {
            Ok(publisher) => {
                tracing::info!(
                    brokers = %hosts.join(","),
                    topic = %self.settings.topic,
                    "Kafka logging enabled"
                );
                let previous = self.publisher.write().await.replace(publisher);
                if let Some(previous) = previous {
                    previous.stop().await;
                }
                true
            }
            Err(e) => {
                tracing::error!(brokers = %hosts.join(","), "Kafka logging disabled: {}", e);
                self.is_connected().await
            }
        }
    }

    async fn publish(&self, bundle: &mut TransactionBundle) -> Result<()> {
        let mut message = bundle
            .handler_data
            .remove::<DhcpKafkaMessage>(self.id)
            .ok_or_else(|| Error::MissingData("no incoming message was recorded".to_string()))?;

        message.timestamp_out = unix_time();
        message.message_out = bundle.outgoing_message.clone();
        let payload = message.save()?;

        let publisher = self
            .publisher
            .read()
            .await
            .clone()
            .ok_or(Error::Closed)?;
        publisher.publish(payload)
    }
}

#[async_trait]
impl Handler for KafkaHandler {
    async fn worker_init(&self) {
        self.connect().await;
    }

    async fn analyse_pre(&self, bundle: &mut TransactionBundle) {
        let message = DhcpKafkaMessage::new(
            self.server_name.clone(),
            unix_time(),
            bundle.incoming_message.clone(),
        );
        bundle.handler_data.insert(self.id, message);
    }

    async fn analyse_post(&self, bundle: &mut TransactionBundle) {
        if !self.is_connected().await && !self.connect().await {
            // Nowhere to send it
            return;
        }

        if let Err(e) = self.publish(bundle).await {
            tracing::warn!("Not publishing transaction to Kafka: {}", e);
        }
    }

    async fn shutdown(&self) {
        if let Some(publisher) = self.publisher.write().await.take() {
            publisher.stop().await;
        }
    }
}

/// Creates [`KafkaHandler`]s from a `send-to-kafka` configuration.
#[derive(Clone)]
pub struct KafkaHandlerFactory {
    config: SendToKafkaConfig,
    connector: Arc<dyn Connector>,
}

impl std::fmt::Debug for KafkaHandlerFactory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaHandlerFactory")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl KafkaHandlerFactory {
    pub fn new(config: SendToKafkaConfig) -> Self {
        Self::with_connector(config, Arc::new(ProducerConnector))
    }

    pub fn with_connector(config: SendToKafkaConfig, connector: Arc<dyn Connector>) -> Self {
        Self { config, connector }
    }

    pub fn config(&self) -> &SendToKafkaConfig {
        &self.config
    }
}

impl HandlerFactory for KafkaHandlerFactory {
    type Handler = KafkaHandler;

    fn create(&self) -> Result<KafkaHandler> {
        self.config
            .validate()
            .map_err(|errors| Error::Config(errors.join("; ")))?;
        Ok(KafkaHandler::with_connector(
            &self.config,
            Arc::clone(&self.connector),
        ))
    }
}

//! Queueing producer with a background sender task.

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;

use super::{BrokerConnection, MetadataRequest, ProduceRequest, RecordBatch};
use crate::config::{BrokerAddress, HostOrIp, SendToKafkaConfig, format_host_port};
use crate::constants::{
    DEFAULT_ACKS, DEFAULT_CONNECT_TIMEOUT_SECS, DEFAULT_PRODUCE_TIMEOUT_MS,
    DEFAULT_QUEUE_CAPACITY, DEFAULT_REQUEST_TIMEOUT_SECS, SHUTDOWN_TIMEOUT_SECS,
};
use crate::error::{Error, Result};

/// Send attempts per payload. The second attempt runs on fresh metadata.
const DELIVERY_ATTEMPTS: usize = 2;

/// How a [`KafkaProducer`] connects and publishes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProducerSettings {
    /// Bootstrap brokers, tried in order.
    pub brokers: Vec<BrokerAddress>,
    pub topic: String,
    pub source_address: Option<HostOrIp>,
    pub acks: i16,
    pub queue_capacity: usize,
    pub connect_timeout: Duration,
    pub request_timeout: Duration,
    /// Time the broker may take to replicate, sent along with each request.
    pub produce_timeout_ms: i32,
    /// How long [`KafkaProducer::stop`] waits for the queue to drain.
    pub shutdown_timeout: Duration,
}

impl ProducerSettings {
    pub fn new(brokers: Vec<BrokerAddress>, topic: impl Into<String>) -> Self {
        Self {
            brokers,
            topic: topic.into(),
            source_address: None,
            acks: DEFAULT_ACKS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            connect_timeout: Duration::from_secs(DEFAULT_CONNECT_TIMEOUT_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            produce_timeout_ms: DEFAULT_PRODUCE_TIMEOUT_MS,
            shutdown_timeout: Duration::from_secs(SHUTDOWN_TIMEOUT_SECS),
        }
    }

    pub fn from_config(config: &SendToKafkaConfig) -> Self {
        Self {
            source_address: config.source_address.clone(),
            ..Self::new(config.brokers.clone(), config.topic.as_str())
        }
    }
}

/// Where to send records for the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
struct TopicRoute {
    /// (partition, leader node id) for every partition with a leader.
    partitions: Vec<(i32, i32)>,
    /// `host:port` per node id.
    brokers: HashMap<i32, String>,
}

async fn open(settings: &ProducerSettings, addr: &str) -> Result<BrokerConnection> {
    Ok(BrokerConnection::connect(
        addr,
        settings.source_address.as_ref(),
        settings.connect_timeout,
    )
    .await?
    .with_request_timeout(settings.request_timeout))
}

async fn fetch_route(settings: &ProducerSettings, addr: &str) -> Result<TopicRoute> {
    let mut connection = open(settings, addr).await?;
    let metadata = connection
        .send(&MetadataRequest::for_topic(settings.topic.clone()))
        .await?;

    let topic = metadata.topic(&settings.topic).ok_or_else(|| {
        Error::MissingData(format!("no metadata for topic {}", settings.topic))
    })?;
    if !topic.error_code.is_ok() {
        return Err(Error::Kafka(topic.error_code));
    }

    let partitions: Vec<(i32, i32)> = topic
        .writable_partitions()
        .iter()
        .map(|p| (p.partition_index, p.leader_id))
        .collect();
    if partitions.is_empty() {
        return Err(Error::BrokerUnavailable(format!(
            "no partition of topic {} has a leader",
            settings.topic
        )));
    }

    let brokers = metadata
        .brokers
        .iter()
        .filter_map(|b| {
            let port = u16::try_from(b.port).ok()?;
            Some((b.node_id, format_host_port(&b.host, Some(port))))
        })
        .collect();

    Ok(TopicRoute {
        partitions,
        brokers,
    })
}

/// Ask the bootstrap brokers, in order, until one answers for the topic.
async fn discover(settings: &ProducerSettings) -> Result<TopicRoute> {
    let mut last_error = Error::BrokerUnavailable("no brokers configured".to_string());

    for broker in &settings.brokers {
        let addr = broker.connect_string();
        match fetch_route(settings, &addr).await {
            Ok(route) => {
                tracing::debug!(
                    broker = %addr,
                    topic = %settings.topic,
                    partitions = route.partitions.len(),
                    "Fetched topic metadata"
                );
                return Ok(route);
            }
            Err(e) => {
                tracing::debug!(broker = %addr, error = %e, "Bootstrap broker failed");
                last_error = e;
            }
        }
    }

    Err(last_error)
}

fn now_millis() -> i64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map_or(0, |d| d.as_millis() as i64)
}

/// State owned by the background task.
struct Worker {
    settings: ProducerSettings,
    route: Option<TopicRoute>,
    connections: HashMap<i32, BrokerConnection>,
    next_partition: usize,
    /// Payloads queued or in flight, shared with the producer.
    pending: Arc<AtomicUsize>,
}

impl Worker {
    async fn run(mut self, mut receiver: mpsc::Receiver<Bytes>) {
        while let Some(payload) = receiver.recv().await {
            if let Err(e) = self.deliver(payload).await {
                tracing::warn!(topic = %self.settings.topic, error = %e, "Dropped Kafka message");
            }
            self.pending.fetch_sub(1, Ordering::AcqRel);
        }
        tracing::debug!(topic = %self.settings.topic, "Producer queue closed");
    }

    async fn deliver(&mut self, payload: Bytes) -> Result<()> {
        let mut attempt = 1;
        loop {
            match self.send(payload.clone()).await {
                Ok(()) => return Ok(()),
                Err(e) => {
                    // Forget the cluster layout; the next send rediscovers it
                    self.route = None;
                    self.connections.clear();

                    let retriable = match &e {
                        Error::Kafka(code) => code.is_retriable(),
                        Error::IoError(_) | Error::Timeout(_) | Error::MissingData(_) => true,
                        _ => false,
                    };
                    if !retriable || attempt >= DELIVERY_ATTEMPTS {
                        return Err(e);
                    }
                    tracing::debug!(attempt, error = %e, "Retrying Kafka delivery");
                    attempt += 1;
                }
            }
        }
    }

    async fn send(&mut self, payload: Bytes) -> Result<()> {
        if self.route.is_none() {
            self.route = Some(discover(&self.settings).await?);
        }
        let route = self.route.as_ref().ok_or(Error::Closed)?;

        let (partition, leader) = route.partitions[self.next_partition % route.partitions.len()];
        self.next_partition = self.next_partition.wrapping_add(1);

        if !self.connections.contains_key(&leader) {
            let addr = route.brokers.get(&leader).ok_or_else(|| {
                Error::BrokerUnavailable(format!("leader {} is not in the broker list", leader))
            })?;
            let connection = open(&self.settings, addr).await?;
            self.connections.insert(leader, connection);
        }
        let connection = self
            .connections
            .get_mut(&leader)
            .ok_or_else(|| Error::BrokerUnavailable(format!("no connection to {}", leader)))?;

        let request = ProduceRequest {
            acks: self.settings.acks,
            timeout_ms: self.settings.produce_timeout_ms,
            topic: self.settings.topic.clone(),
            partition,
            records: RecordBatch::single(payload, now_millis()).encode()?,
        };
        let response = connection.send(&request).await?;

        match response.partition(&self.settings.topic, partition) {
            Some(result) if result.error_code.is_ok() => {
                tracing::trace!(partition, offset = result.base_offset, "Produced record");
                Ok(())
            }
            Some(result) => Err(Error::Kafka(result.error_code)),
            None => Err(Error::MissingData(format!(
                "no produce result for partition {}",
                partition
            ))),
        }
    }
}

/// Publishes payloads to one topic without making the caller wait.
///
/// Payloads go onto a bounded queue that a background task drains. Dropping
/// the producer closes the queue; the task sends what is left and exits.
/// [`stop`](Self::stop) waits for that, up to the shutdown timeout.
pub struct KafkaProducer {
    topic: String,
    sender: RwLock<Option<mpsc::Sender<Bytes>>>,
    task: Mutex<Option<JoinHandle<()>>>,
    pending: Arc<AtomicUsize>,
    shutdown_timeout: Duration,
}

impl std::fmt::Debug for KafkaProducer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KafkaProducer")
            .field("topic", &self.topic)
            .finish_non_exhaustive()
    }
}

impl KafkaProducer {
    /// Fetch metadata for the topic and start the sender task.
    ///
    /// Fails when none of the brokers can be reached or the topic can't be
    /// written to.
    pub async fn connect(settings: ProducerSettings) -> Result<Self> {
        let route = discover(&settings).await?;
        let (sender, receiver) = mpsc::channel(settings.queue_capacity.max(1));
        let topic = settings.topic.clone();
        let shutdown_timeout = settings.shutdown_timeout;
        let pending = Arc::new(AtomicUsize::new(0));

        let worker = Worker {
            settings,
            route: Some(route),
            connections: HashMap::new(),
            next_partition: 0,
            pending: pending.clone(),
        };
        let task = tokio::spawn(worker.run(receiver));

        tracing::info!(topic = %topic, "Kafka producer started");
        Ok(Self {
            topic,
            sender: RwLock::new(Some(sender)),
            task: Mutex::new(Some(task)),
            pending,
            shutdown_timeout,
        })
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Payloads queued or being sent.
    pub fn pending(&self) -> usize {
        self.pending.load(Ordering::Acquire)
    }

    /// Queue a payload for sending. Never waits.
    pub fn produce(&self, payload: Bytes) -> Result<()> {
        let guard = self.sender.read().map_err(|_| Error::Closed)?;
        let sender = guard.as_ref().ok_or(Error::Closed)?;

        // Counted before sending so the task never sees a payload it can't subtract
        self.pending.fetch_add(1, Ordering::AcqRel);
        sender.try_send(payload).map_err(|e| {
            self.pending.fetch_sub(1, Ordering::AcqRel);
            match e {
                mpsc::error::TrySendError::Full(_) => Error::QueueFull,
                mpsc::error::TrySendError::Closed(_) => Error::Closed,
            }
        })
    }

    /// Close the queue and wait until everything queued has been handled.
    ///
    /// Gives up after the shutdown timeout: the sender task is aborted and
    /// whatever it hadn't sent yet is lost.
    pub async fn stop(&self) {
        let sender = self.sender.write().ok().and_then(|mut s| s.take());
        drop(sender);

        let Some(mut task) = self.task.lock().await.take() else {
            return;
        };

        match tokio::time::timeout(self.shutdown_timeout, &mut task).await {
            Ok(Ok(())) => tracing::info!(topic = %self.topic, "Kafka producer stopped"),
            Ok(Err(e)) => {
                tracing::warn!(topic = %self.topic, error = %e, "Producer task failed")
            }
            Err(_) => {
                task.abort();
                tracing::warn!(
                    topic = %self.topic,
                    dropped = self.pending(),
                    timeout_ms = self.shutdown_timeout.as_millis() as u64,
                    "Kafka producer didn't drain its queue in time, dropped remaining messages"
                );
            }
        }
    }
}

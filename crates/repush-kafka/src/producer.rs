//! [`KafkaPublisher`]: produces each line to the configured topic.
//!
//! librdkafka connects in the background, so an unreachable cluster shows
//! up as per-line publish failures once `message.timeout.ms` expires rather
//! than as a startup error. `repush check` uses [`KafkaPublisher::probe`]
//! to surface it early.

use std::time::Duration;

use async_trait::async_trait;
use rdkafka::config::ClientConfig;
use rdkafka::metadata::Metadata;
use rdkafka::producer::{FutureProducer, FutureRecord, Producer};
use rdkafka::types::RDKafkaErrorCode;
use rdkafka::util::Timeout;
use repush_engine::config::types::BrokerConfig;
use repush_engine::{PublishError, Publisher};
use repush_types::line::PublishOutcome;

use crate::error::{KafkaError, Result};

/// Settings for one producer, derived from the `broker` config section.
#[derive(Debug, Clone)]
pub struct ProducerConfig {
    /// Bootstrap brokers, `host:port`.
    pub brokers: Vec<String>,
    pub topic: String,
    pub client_id: String,
    /// `-1` all in-sync replicas, `1` leader only, `0` no acknowledgement.
    pub required_acks: i16,
    /// Bound on one delivery including retries (`message.timeout.ms`), and
    /// on metadata requests.
    pub timeout: Duration,
    /// Extra attempts after a retriable failure.
    pub retries: u32,
    /// Delay before a retry.
    pub retry_backoff: Duration,
}

impl ProducerConfig {
    #[must_use]
    pub fn from_broker_config(config: &BrokerConfig) -> Self {
        Self {
            brokers: config.brokers.clone(),
            topic: config.topic.clone(),
            client_id: config.client_id.clone(),
            required_acks: config.acks.required_acks(),
            timeout: Duration::from_millis(config.timeout_ms),
            retries: config.retries,
            retry_backoff: Duration::from_millis(config.retry_backoff_ms),
        }
    }

    /// librdkafka settings for this producer.
    #[must_use]
    pub fn client_config(&self) -> ClientConfig {
        let mut config = ClientConfig::new();
        config
            .set("bootstrap.servers", self.brokers.join(","))
            .set("client.id", &self.client_id)
            .set("acks", self.required_acks.to_string())
            .set("message.timeout.ms", self.timeout.as_millis().to_string())
            .set("request.timeout.ms", self.timeout.as_millis().to_string())
            .set("message.send.max.retries", self.retries.to_string())
            .set("retry.backoff.ms", self.retry_backoff.as_millis().to_string())
            // Lines are awaited one at a time; batching only adds latency.
            .set("linger.ms", "0");
        config
    }
}

/// What `probe` learned about the topic.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicProbe {
    pub bootstrap: String,
    pub brokers: usize,
    pub partitions: usize,
    pub partitions_with_leader: usize,
}

pub struct KafkaPublisher {
    config: ProducerConfig,
    producer: FutureProducer,
}

impl KafkaPublisher {
    /// # Errors
    ///
    /// Returns [`KafkaError::NoBrokers`] if no bootstrap broker is given, or
    /// [`KafkaError::Client`] if librdkafka rejects the settings.
    pub fn new(config: ProducerConfig) -> Result<Self> {
        if config.brokers.is_empty() {
            return Err(KafkaError::NoBrokers);
        }
        let producer: FutureProducer = config.client_config().create()?;
        tracing::debug!(
            brokers = %config.brokers.join(","),
            topic = config.topic,
            acks = config.required_acks,
            "Created Kafka producer"
        );
        Ok(Self { config, producer })
    }

    #[must_use]
    pub fn config(&self) -> &ProducerConfig {
        &self.config
    }

    /// Fetch topic metadata from the cluster.
    ///
    /// # Errors
    ///
    /// Fails if no broker answers within the timeout, or the topic is
    /// unknown or has no partition with a leader.
    pub async fn probe(&self) -> Result<TopicProbe> {
        let producer = self.producer.clone();
        let topic = self.config.topic.clone();
        let bootstrap = self.config.brokers.join(",");
        let timeout = self.config.timeout;
        tokio::task::spawn_blocking(move || {
            let metadata = producer.client().fetch_metadata(Some(&topic), timeout)?;
            summarize(&metadata, &topic, bootstrap)
        })
        .await
        .map_err(|e| KafkaError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Publisher for KafkaPublisher {
    async fn publish(&mut self, payload: &[u8]) -> PublishOutcome {
        let record = FutureRecord::<(), [u8]>::to(&self.config.topic).payload(payload);
        match self
            .producer
            .send(record, Timeout::After(self.config.timeout))
            .await
        {
            Ok(_) => PublishOutcome::Delivered,
            Err((err, _)) => {
                tracing::debug!(topic = self.config.topic, error = %err, "Produce failed");
                PublishOutcome::failed(err.to_string())
            }
        }
    }

    async fn close(&mut self) -> std::result::Result<(), PublishError> {
        let producer = self.producer.clone();
        let timeout = self.config.timeout;
        tokio::task::spawn_blocking(move || producer.flush(Timeout::After(timeout)))
            .await
            .map_err(|e| PublishError(e.to_string()))?
            .map_err(|e| PublishError(format!("flush failed: {e}")))
    }

    fn describe(&self) -> String {
        format!(
            "kafka topic '{}' via {}",
            self.config.topic,
            self.config.brokers.join(",")
        )
    }
}

fn summarize(metadata: &Metadata, topic: &str, bootstrap: String) -> Result<TopicProbe> {
    let found = metadata
        .topics()
        .iter()
        .find(|t| t.name() == topic)
        .ok_or_else(|| KafkaError::Topic {
            topic: topic.to_string(),
            reason: "not in metadata response".into(),
        })?;
    if let Some(err) = found.error() {
        return Err(KafkaError::Topic {
            topic: topic.to_string(),
            reason: RDKafkaErrorCode::from(err).to_string(),
        });
    }
    let partitions_with_leader = found
        .partitions()
        .iter()
        .filter(|p| p.leader() >= 0)
        .count();
    if partitions_with_leader == 0 {
        return Err(KafkaError::NoLeader {
            topic: topic.to_string(),
        });
    }
    Ok(TopicProbe {
        bootstrap,
        brokers: metadata.brokers().len(),
        partitions: found.partitions().len(),
        partitions_with_leader,
    })
}

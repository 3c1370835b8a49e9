//! Kafka publisher for repush.
//!
//! Wraps an `rdkafka` [`FutureProducer`](rdkafka::producer::FutureProducer).
//! Each line is produced as one keyless message and awaited before the
//! next, so the engine sees every delivery outcome in line order.

#![warn(clippy::pedantic)]

pub mod error;
pub mod producer;

pub use error::KafkaError;
pub use producer::{KafkaPublisher, ProducerConfig, TopicProbe};

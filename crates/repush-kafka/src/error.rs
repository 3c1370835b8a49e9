#[derive(Debug, thiserror::Error)]
pub enum KafkaError {
    #[error("no bootstrap brokers configured")]
    NoBrokers,

    #[error("kafka client error: {0}")]
    Client(#[from] rdkafka::error::KafkaError),

    #[error("topic '{topic}' unavailable: {reason}")]
    Topic { topic: String, reason: String },

    #[error("topic '{topic}' has no partition with a leader")]
    NoLeader { topic: String },

    #[error("metadata lookup did not complete: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, KafkaError>;

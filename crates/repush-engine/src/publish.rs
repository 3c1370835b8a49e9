//! Publish capability seam.
//!
//! The engine only needs "publish one line, tell me whether it landed".
//! Broker addressing, partitioning, and client-side retries belong to the
//! implementation.

use async_trait::async_trait;
use repush_types::line::PublishOutcome;

/// Error releasing a publisher's resources.
#[derive(Debug, thiserror::Error)]
#[error("publisher close failed: {0}")]
pub struct PublishError(pub String);

/// Accepts one line at a time for delivery to a broker.
#[async_trait]
pub trait Publisher: Send {
    /// Offer one payload. Never fails the pass; a rejected payload is
    /// reported as [`PublishOutcome::Failed`].
    async fn publish(&mut self, payload: &[u8]) -> PublishOutcome;

    /// Release connections. Called once when the run driver stops.
    async fn close(&mut self) -> Result<(), PublishError> {
        Ok(())
    }

    /// Short description for logs, e.g. the topic and bootstrap brokers.
    fn describe(&self) -> String;
}

#[async_trait]
impl<P: Publisher + ?Sized> Publisher for Box<P> {
    async fn publish(&mut self, payload: &[u8]) -> PublishOutcome {
        (**self).publish(payload).await
    }

    async fn close(&mut self) -> Result<(), PublishError> {
        (**self).close().await
    }

    fn describe(&self) -> String {
        (**self).describe()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counting(usize);

    #[async_trait]
    impl Publisher for Counting {
        async fn publish(&mut self, _payload: &[u8]) -> PublishOutcome {
            self.0 += 1;
            PublishOutcome::Delivered
        }

        fn describe(&self) -> String {
            "counting".into()
        }
    }

    #[test]
    fn trait_is_object_safe() {
        fn _assert_object_safe(_: &dyn Publisher) {}
    }

    #[tokio::test]
    async fn boxed_publisher_delegates() {
        let mut boxed: Box<dyn Publisher> = Box::new(Counting(0));
        assert_eq!(boxed.publish(b"x").await, PublishOutcome::Delivered);
        assert!(boxed.close().await.is_ok());
        assert_eq!(boxed.describe(), "counting");
    }
}

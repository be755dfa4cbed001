use super::message::RingMessage;
use crate::error::NotifyError;
use crate::events::{DoorbellEvent, EventBus};
use crate::timekeeper::RingStamp;
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::timeout;
use tracing::{info, warn};

/// Publish side of the pub/sub broker
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Hand one message to the client. Delivery is at least once; a
    /// disconnected client queues it until the connection returns.
    async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), NotifyError>;

    async fn disconnect(&self) -> Result<(), NotifyError>;
}

/// Stand-in used when the broker client could not be set up at startup.
/// Every publish fails, so rings still proceed to the call.
pub struct UnavailablePublisher {
    reason: String,
}

impl UnavailablePublisher {
    pub fn new(reason: impl Into<String>) -> Self {
        Self {
            reason: reason.into(),
        }
    }
}

#[async_trait]
impl MessagePublisher for UnavailablePublisher {
    async fn publish(&self, topic: &str, _payload: Vec<u8>) -> Result<(), NotifyError> {
        Err(NotifyError::Publish(format!(
            "broker unavailable for '{}': {}",
            topic, self.reason
        )))
    }

    async fn disconnect(&self) -> Result<(), NotifyError> {
        Ok(())
    }
}

/// Turns rings into broker messages on one topic
pub struct Notifier {
    publisher: Arc<dyn MessagePublisher>,
    topic: String,
    operation_timeout: Duration,
    event_bus: Arc<EventBus>,
}

impl Notifier {
    pub fn new(
        publisher: Arc<dyn MessagePublisher>,
        topic: impl Into<String>,
        operation_timeout: Duration,
        event_bus: Arc<EventBus>,
    ) -> Self {
        Self {
            publisher,
            topic: topic.into(),
            operation_timeout,
            event_bus,
        }
    }

    pub async fn publish(&self, stamp: &RingStamp, url: &str) -> Result<(), NotifyError> {
        let message = RingMessage::new(stamp, url);
        let payload = message.to_payload()?;

        timeout(
            self.operation_timeout,
            self.publisher.publish(&self.topic, payload),
        )
        .await
        .map_err(|_| NotifyError::Timeout {
            seconds: self.operation_timeout.as_secs(),
        })??;

        info!("Published ring {} to '{}'", stamp, self.topic);
        let _ = self.event_bus.publish(DoorbellEvent::NotificationPublished {
            date: message.date,
            time: message.time,
        });

        Ok(())
    }

    /// Close the broker connection, logging rather than failing
    pub async fn disconnect(&self) {
        match self.publisher.disconnect().await {
            Ok(()) => info!("Disconnected from broker"),
            Err(e) => warn!("Broker disconnect failed: {}", e),
        }
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }
}

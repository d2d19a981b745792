pub mod buffered;
pub mod rabbitmq_publisher;

pub use buffered::BufferedPublisher;
pub use rabbitmq_publisher::RabbitMQTransport;

use async_trait::async_trait;

use crate::core::types::NotificationMessage;
use crate::error::Result;

pub const NOTIFICATION_EXCHANGE: &str = "notifications";
pub const NOTIFICATION_ROUTING_KEY: &str = "user.notification";

/// Accepts notifications for delivery to the broker
#[async_trait]
pub trait NotificationPublisher: Send + Sync {
    /// `Ok` means the message was either queued or sent directly
    async fn publish(&self, message: NotificationMessage) -> Result<()>;
}

/// Outbound channel for serialized notifications
#[async_trait]
pub trait MessageTransport: Send + Sync + 'static {
    async fn send(&self, payload: &[u8]) -> Result<()>;

    async fn close(&self) -> Result<()> {
        Ok(())
    }
}

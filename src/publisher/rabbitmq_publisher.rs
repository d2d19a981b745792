use async_trait::async_trait;
use lapin::{
    options::*, types::FieldTable, BasicProperties, Channel, Connection, ConnectionProperties,
    ExchangeKind,
};
use tracing::{debug, info, warn};

use super::MessageTransport;
use crate::error::{Result, SchedulerError};

/// Persistent delivery mode for AMQP 0-9-1
const DELIVERY_MODE_PERSISTENT: u8 = 2;

/// RabbitMQ transport for notification messages
///
/// The exchange must already exist; it is only checked with a passive declare.
pub struct RabbitMQTransport {
    connection: Connection,
    channel: Channel,
    exchange: String,
    routing_key: String,
}

impl RabbitMQTransport {
    pub async fn connect(rabbitmq_url: &str, exchange: &str, routing_key: &str) -> Result<Self> {
        let connection = Connection::connect(rabbitmq_url, ConnectionProperties::default())
            .await
            .map_err(|e| SchedulerError::Connection(format!("Failed to connect to RabbitMQ: {e}")))?;

        let channel = match connection.create_channel().await {
            Ok(channel) => channel,
            Err(e) => {
                let _ = connection.close(200, "channel creation failed").await;
                return Err(SchedulerError::Connection(format!(
                    "Failed to create channel: {e}"
                )));
            }
        };

        if let Err(e) = channel
            .exchange_declare(
                exchange,
                ExchangeKind::Direct,
                ExchangeDeclareOptions {
                    passive: true,
                    durable: true,
                    auto_delete: false,
                    internal: false,
                    nowait: false,
                },
                FieldTable::default(),
            )
            .await
        {
            let _ = connection.close(200, "exchange check failed").await;
            return Err(SchedulerError::Connection(format!(
                "Exchange '{exchange}' is not available: {e}"
            )));
        }

        info!(
            "Connected to RabbitMQ for publishing notifications to exchange '{}' with routing key '{}'",
            exchange, routing_key
        );

        Ok(Self {
            connection,
            channel,
            exchange: exchange.to_string(),
            routing_key: routing_key.to_string(),
        })
    }
}

#[async_trait]
impl MessageTransport for RabbitMQTransport {
    async fn send(&self, payload: &[u8]) -> Result<()> {
        let properties = BasicProperties::default()
            .with_content_type("application/json".into())
            .with_delivery_mode(DELIVERY_MODE_PERSISTENT);

        self.channel
            .basic_publish(
                &self.exchange,
                &self.routing_key,
                BasicPublishOptions::default(),
                payload,
                properties,
            )
            .await
            .map_err(|e| SchedulerError::Publish(format!("Failed to publish message: {e}")))?;

        debug!(
            "Published {} bytes to exchange '{}' with routing key '{}'",
            payload.len(),
            self.exchange,
            self.routing_key
        );
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        if let Err(e) = self.channel.close(200, "shutting down").await {
            warn!("Failed to close RabbitMQ channel: {}", e);
        }
        self.connection
            .close(200, "shutting down")
            .await
            .map_err(|e| SchedulerError::Connection(format!("Failed to close connection: {e}")))?;
        info!("RabbitMQ connection closed");
        Ok(())
    }
}

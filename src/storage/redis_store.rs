use async_trait::async_trait;
use redis::{aio::MultiplexedConnection, AsyncCommands, Client};
use std::future::Future;
use std::time::Duration;
use tracing::{debug, info};

use super::StateStore;
use crate::error::{Result, SchedulerError};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Redis-backed state store
///
/// The multiplexed connection is cloned per operation, so concurrent job
/// cycles share one socket and rely on Redis' per-command atomicity.
pub struct RedisStore {
    connection: MultiplexedConnection,
    operation_timeout: Duration,
}

impl RedisStore {
    pub async fn connect(redis_url: &str, operation_timeout: Duration) -> Result<Self> {
        let client = Client::open(redis_url).map_err(SchedulerError::Redis)?;

        let mut connection = tokio::time::timeout(
            CONNECT_TIMEOUT,
            client.get_multiplexed_async_connection(),
        )
        .await
        .map_err(|_| SchedulerError::Timeout(CONNECT_TIMEOUT.as_millis() as u64))?
        .map_err(|e| SchedulerError::Connection(format!("Failed to connect to Redis: {e}")))?;

        let pong: String = tokio::time::timeout(
            CONNECT_TIMEOUT,
            redis::cmd("PING").query_async(&mut connection),
        )
        .await
        .map_err(|_| SchedulerError::Timeout(CONNECT_TIMEOUT.as_millis() as u64))?
        .map_err(|e| SchedulerError::Connection(format!("Redis did not answer PING: {e}")))?;

        info!("Connected to Redis ({})", pong);

        Ok(Self {
            connection,
            operation_timeout,
        })
    }

    async fn with_timeout<T, F>(&self, operation: F) -> Result<T>
    where
        F: Future<Output = redis::RedisResult<T>>,
    {
        tokio::time::timeout(self.operation_timeout, operation)
            .await
            .map_err(|_| SchedulerError::Timeout(self.operation_timeout.as_millis() as u64))?
            .map_err(SchedulerError::Redis)
    }
}

#[async_trait]
impl StateStore for RedisStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let mut connection = self.connection.clone();
        let value: Option<String> = self.with_timeout(connection.get(key)).await?;
        debug!("Redis GET {} -> {}", key, if value.is_some() { "hit" } else { "miss" });
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        let mut connection = self.connection.clone();
        // SET EX rejects a zero expiry
        let seconds = ttl.as_secs().max(1);
        let _: () = self
            .with_timeout(connection.set_ex(key, value, seconds))
            .await?;
        debug!("Redis SET {} (ttl {}s)", key, seconds);
        Ok(())
    }
}

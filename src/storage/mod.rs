pub mod memory;
pub mod redis_store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;

use async_trait::async_trait;
use std::time::Duration;

use crate::error::Result;

/// Key-value store with per-key expiration holding the last seen notification
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Returns `None` when the key is absent or expired
    async fn get(&self, key: &str) -> Result<Option<String>>;

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()>;
}

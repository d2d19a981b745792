pub mod config;
pub mod core;
pub mod error;
pub mod http_server;
pub mod jobs;
pub mod monitoring;
pub mod publisher;
pub mod storage;
pub mod upstream;

#[cfg(test)]
pub(crate) mod testing;

pub use config::Config;
pub use crate::core::{NotificationMessage, Scheduler};
pub use error::{Result, SchedulerError};
pub use http_server::HttpServer;
pub use jobs::{BoostedBossJob, Job};
pub use publisher::{BufferedPublisher, NotificationPublisher, RabbitMQTransport};
pub use storage::{MemoryStore, RedisStore, StateStore};
pub use upstream::{BossSource, TibiaApiClient};

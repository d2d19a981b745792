use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedulerError {
    #[error("Redis error: {0}")]
    Redis(#[from] redis::RedisError),

    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Serialization error: {0}")]
    Serde(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("HTTP server error: {0}")]
    Server(String),

    #[error("Connection error: {0}")]
    Connection(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Upstream error: {0}")]
    Upstream(String),

    #[error("Publish error: {0}")]
    Publish(String),

    #[error("Timeout error: operation exceeded {0}ms")]
    Timeout(u64),
}

pub type Result<T> = std::result::Result<T, SchedulerError>;

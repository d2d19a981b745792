use crate::error::{Result, SchedulerError};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;
use std::str::FromStr;
use url::Url;

pub const DEFAULT_IMAGES_PATH: &str = "./images/tibia_boss_images/";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    // Redis settings
    pub redis_host: String,
    pub redis_port: u16,
    pub redis_password: String,
    pub store_timeout_ms: u64,

    // RabbitMQ settings
    pub rabbitmq_user: String,
    pub rabbitmq_password: String,
    pub rabbitmq_host: String,
    pub rabbitmq_port: u16,
    pub queue_name: String,
    pub publish_buffer_capacity: usize,
    pub publish_timeout_ms: u64,

    // HTTP server settings
    pub http_port: u16,
    pub server_url: String,
    pub images_path: PathBuf,

    // Upstream API settings
    pub tibia_api_url: String,
    pub upstream_timeout_ms: u64,

    // Scheduling settings
    pub job_interval_secs: u64,

    // Shutdown settings
    pub shutdown_timeout_secs: u64,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let string_or = |key: &str, default: &str| -> String {
            lookup(key)
                .filter(|value| !value.is_empty())
                .unwrap_or_else(|| default.to_string())
        };

        let http_port: u16 = parse_or(&lookup, "HTTP_PORT", 8080);

        Ok(Config {
            // Redis configuration
            redis_host: string_or("REDIS_HOST", "localhost"),
            redis_port: parse_or(&lookup, "REDIS_PORT", 6379),
            redis_password: lookup("REDIS_PASSWORD").unwrap_or_default(),
            store_timeout_ms: parse_or(&lookup, "STORE_TIMEOUT_MS", 2000),

            // RabbitMQ configuration
            rabbitmq_user: string_or("RABBITMQ_USER", "guest"),
            rabbitmq_password: string_or("RABBITMQ_PASSWORD", "guest"),
            rabbitmq_host: string_or("RABBITMQ_HOST", "localhost"),
            rabbitmq_port: parse_or(&lookup, "RABBITMQ_PORT", 5672),
            queue_name: string_or("QUEUE_NAME", "notifications"),
            publish_buffer_capacity: parse_or(&lookup, "PUBLISH_BUFFER_CAPACITY", 100),
            publish_timeout_ms: parse_or(&lookup, "PUBLISH_TIMEOUT_MS", 5000),

            // HTTP server configuration
            http_port,
            server_url: string_or(
                "SERVER_URL",
                &format!("http://scheduler-service:{http_port}"),
            ),
            images_path: PathBuf::from(string_or("IMAGES_PATH", DEFAULT_IMAGES_PATH)),

            // Upstream configuration
            tibia_api_url: lookup("TIBIA_API_URL")
                .filter(|value| !value.trim().is_empty())
                .ok_or_else(|| SchedulerError::Config("TIBIA_API_URL is required".to_string()))?,
            upstream_timeout_ms: parse_or(&lookup, "UPSTREAM_TIMEOUT_MS", 10_000),

            // Scheduling configuration
            job_interval_secs: parse_or(&lookup, "JOB_INTERVAL_SECS", 120),

            // Shutdown configuration
            shutdown_timeout_secs: parse_or(&lookup, "SHUTDOWN_TIMEOUT_SECS", 30),
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.tibia_api_url.trim().is_empty() {
            return Err(SchedulerError::Config(
                "TIBIA_API_URL must not be empty".to_string(),
            ));
        }

        if self.job_interval_secs == 0 {
            return Err(SchedulerError::Config(
                "Job interval must be greater than 0".to_string(),
            ));
        }

        if self.publish_buffer_capacity == 0 {
            return Err(SchedulerError::Config(
                "Publish buffer capacity must be greater than 0".to_string(),
            ));
        }

        // Timeout validation
        if self.publish_timeout_ms == 0 {
            return Err(SchedulerError::Config(
                "Publish timeout must be greater than 0".to_string(),
            ));
        }

        if self.upstream_timeout_ms == 0 {
            return Err(SchedulerError::Config(
                "Upstream timeout must be greater than 0".to_string(),
            ));
        }

        if self.store_timeout_ms == 0 {
            return Err(SchedulerError::Config(
                "Store timeout must be greater than 0".to_string(),
            ));
        }

        if self.shutdown_timeout_secs == 0 {
            return Err(SchedulerError::Config(
                "Shutdown timeout must be greater than 0".to_string(),
            ));
        }

        // Port validation (valid port range: 1-65535)
        if self.http_port == 0 || self.redis_port == 0 || self.rabbitmq_port == 0 {
            return Err(SchedulerError::Config(
                "Ports must be between 1 and 65535".to_string(),
            ));
        }

        if !self.images_path.is_dir() {
            return Err(SchedulerError::Config(format!(
                "Images path {} does not exist",
                self.images_path.display()
            )));
        }

        Ok(())
    }

    /// Redis connection URL with the password percent-encoded
    pub fn redis_url(&self) -> Result<String> {
        let mut url = base_url("redis", &self.redis_host, self.redis_port, "/0")?;
        if !self.redis_password.is_empty() {
            url.set_password(Some(&self.redis_password))
                .map_err(|_| SchedulerError::Config("Invalid Redis password".to_string()))?;
        }
        Ok(url.to_string())
    }

    /// AMQP connection URL for the default vhost with encoded credentials
    pub fn rabbitmq_url(&self) -> Result<String> {
        let mut url = base_url("amqp", &self.rabbitmq_host, self.rabbitmq_port, "/%2f")?;
        url.set_username(&self.rabbitmq_user)
            .map_err(|_| SchedulerError::Config("Invalid RabbitMQ user".to_string()))?;
        url.set_password(Some(&self.rabbitmq_password))
            .map_err(|_| SchedulerError::Config("Invalid RabbitMQ password".to_string()))?;
        Ok(url.to_string())
    }
}

fn base_url(scheme: &str, host: &str, port: u16, path: &str) -> Result<Url> {
    Url::parse(&format!("{scheme}://{host}:{port}{path}"))
        .map_err(|e| SchedulerError::Config(format!("Invalid {scheme} host '{host}': {e}")))
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> T
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key)
        .and_then(|value| value.trim().parse().ok())
        .unwrap_or(default)
}

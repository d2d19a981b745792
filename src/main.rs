use boss_scheduler::publisher::{NOTIFICATION_EXCHANGE, NOTIFICATION_ROUTING_KEY};
use boss_scheduler::{
    monitoring::Metrics, BoostedBossJob, BufferedPublisher, Config, HttpServer, RabbitMQTransport,
    RedisStore, Scheduler, TibiaApiClient,
};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "boss_scheduler=info,warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting boosted boss scheduler");

    // Load configuration from environment
    let config = Config::from_env().map_err(|e| {
        error!("Failed to load configuration: {e}");
        e
    })?;

    config.validate().map_err(|e| {
        error!("Configuration validation failed: {e}");
        e
    })?;

    info!("Configuration loaded successfully");
    info!("Redis: {}:{}", config.redis_host, config.redis_port);
    info!(
        "RabbitMQ: {}:{} (queue: {})",
        config.rabbitmq_host, config.rabbitmq_port, config.queue_name
    );
    info!("Tibia API URL: {}", config.tibia_api_url);
    info!("Public server URL: {}", config.server_url);
    info!("Images path: {}", config.images_path.display());
    info!("Job interval: {}s", config.job_interval_secs);

    let metrics = Arc::new(Metrics::new());

    // Start HTTP server for health checks, images and metrics
    let http_shutdown = CancellationToken::new();
    let (_, http_server) =
        HttpServer::new(config.images_path.clone(), metrics.clone(), config.http_port)
            .bind(http_shutdown.clone())
            .map_err(|e| {
                error!("Failed to start HTTP server: {e}");
                e
            })?;
    let http_handle = tokio::spawn(http_server);

    let redis_url = config.redis_url().map_err(|e| {
        error!("Invalid Redis settings: {e}");
        e
    })?;
    let rabbitmq_url = config.rabbitmq_url().map_err(|e| {
        error!("Invalid RabbitMQ settings: {e}");
        e
    })?;

    let store = Arc::new(
        RedisStore::connect(
            &redis_url,
            Duration::from_millis(config.store_timeout_ms),
        )
        .await
        .map_err(|e| {
            error!("Failed to connect to Redis: {e}");
            e
        })?,
    );

    let transport = RabbitMQTransport::connect(
        &rabbitmq_url,
        NOTIFICATION_EXCHANGE,
        NOTIFICATION_ROUTING_KEY,
    )
    .await
    .map_err(|e| {
        error!("Failed to initialize RabbitMQ publisher: {e}");
        e
    })?;

    let publisher = Arc::new(BufferedPublisher::new(
        transport,
        config.publish_buffer_capacity,
        Duration::from_millis(config.publish_timeout_ms),
        metrics.clone(),
    ));

    let source = Arc::new(TibiaApiClient::new(
        &config.tibia_api_url,
        Duration::from_millis(config.upstream_timeout_ms),
        metrics.clone(),
    )?);

    let job = Arc::new(BoostedBossJob::new(
        source,
        store,
        publisher.clone(),
        &config.server_url,
        metrics.clone(),
    ));

    let scheduler = Arc::new(Scheduler::new(
        job,
        Duration::from_secs(config.job_interval_secs),
        metrics,
    ));

    // Set up graceful shutdown
    let shutdown_scheduler = scheduler.clone();
    tokio::spawn(async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!("Failed to listen for ctrl-c: {e}");
            return;
        }
        warn!("Received Ctrl-C, initiating shutdown...");
        shutdown_scheduler.stop();
    });

    info!("Scheduler service started successfully");
    scheduler.start().await;

    if let Err(e) = publisher.shutdown().await {
        warn!("Error closing RabbitMQ publisher: {e}");
    }

    http_shutdown.cancel();
    let shutdown_duration = Duration::from_secs(config.shutdown_timeout_secs);
    match tokio::time::timeout(shutdown_duration, http_handle).await {
        Ok(_) => info!("HTTP server stopped"),
        Err(_) => warn!("HTTP server did not stop within timeout"),
    }

    info!("Shutdown complete");
    Ok(())
}

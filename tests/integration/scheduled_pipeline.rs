use boss_scheduler::monitoring::Metrics;
use boss_scheduler::publisher::{NOTIFICATION_EXCHANGE, NOTIFICATION_ROUTING_KEY};
use boss_scheduler::{
    BoostedBossJob, BufferedPublisher, MemoryStore, NotificationMessage, RabbitMQTransport,
    RedisStore, Scheduler, TibiaApiClient,
};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::helpers::{boostable_bosses_body, wait_until, RecordingTransport, TestHarness};

async fn boss_api(name: &str) -> MockServer {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/boostablebosses/"))
        .respond_with(ResponseTemplate::new(200).set_body_json(boostable_bosses_body(
            name,
            &format!("https://static.tibia.com/images/{}.gif", name.to_lowercase()),
        )))
        .mount(&server)
        .await;
    server
}

async fn request_count(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .map(|requests| requests.len())
        .unwrap_or(0)
}

#[tokio::test]
async fn test_scheduler_publishes_only_on_change() {
    let server = boss_api("Ferumbras").await;
    let metrics = Arc::new(Metrics::new());
    let transport = RecordingTransport::new();
    let publisher = Arc::new(BufferedPublisher::new(
        transport.clone(),
        100,
        Duration::from_secs(5),
        metrics.clone(),
    ));
    let source = Arc::new(
        TibiaApiClient::new(&server.uri(), Duration::from_secs(5), metrics.clone()).unwrap(),
    );
    let job = Arc::new(BoostedBossJob::new(
        source,
        Arc::new(MemoryStore::new()),
        publisher.clone(),
        "http://localhost:8080",
        metrics.clone(),
    ));
    let scheduler = Arc::new(Scheduler::new(job, Duration::from_millis(100), metrics.clone()));

    let handle = tokio::spawn({
        let scheduler = scheduler.clone();
        async move { scheduler.start().await }
    });

    // Startup run plus at least two ticks
    let mut polls = 0;
    for _ in 0..100 {
        polls = request_count(&server).await;
        if polls >= 3 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    assert!(polls >= 3, "expected at least 3 polls, got {polls}");

    scheduler.stop();
    handle.await.unwrap();

    // Let runs spawned before the stop finish
    tokio::time::sleep(Duration::from_millis(200)).await;

    wait_until(Duration::from_secs(2), || transport.count() == 1)
        .await
        .unwrap();
    assert_eq!(transport.delivered()[0].message, "Boosted boss: Ferumbras");

    let snapshot = metrics.get_snapshot().await;
    assert_eq!(snapshot.cycles_published, 1);
    assert!(snapshot.cycles_unchanged >= 1);

    publisher.shutdown().await.unwrap();
}

#[tokio::test]
#[ignore] // Run with --ignored flag since it requires containers
async fn test_full_pipeline_with_redis_and_rabbitmq() {
    let mut harness = TestHarness::new().await.unwrap();
    harness.setup_notification_topology().await.unwrap();

    let server = boss_api("Ghazbaran").await;
    let metrics = Arc::new(Metrics::new());

    let store = Arc::new(
        RedisStore::connect(&harness.redis_url, Duration::from_secs(2))
            .await
            .unwrap(),
    );
    let transport = RabbitMQTransport::connect(
        &harness.rabbitmq_url,
        NOTIFICATION_EXCHANGE,
        NOTIFICATION_ROUTING_KEY,
    )
    .await
    .unwrap();
    let publisher = Arc::new(BufferedPublisher::new(
        transport,
        100,
        Duration::from_secs(5),
        metrics.clone(),
    ));
    let source = Arc::new(
        TibiaApiClient::new(&server.uri(), Duration::from_secs(5), metrics.clone()).unwrap(),
    );
    let job = BoostedBossJob::new(
        source,
        store,
        publisher.clone(),
        "http://scheduler-service:8080",
        metrics.clone(),
    );

    job.run_cycle().await.unwrap();
    job.run_cycle().await.unwrap();

    // Allow the worker to drain
    tokio::time::sleep(Duration::from_millis(500)).await;

    let received = harness.drain_queue().await.unwrap();
    assert_eq!(received.len(), 1);
    assert_eq!(received[0].delivery_mode, Some(2));
    assert_eq!(received[0].content_type.as_deref(), Some("application/json"));

    let notification: NotificationMessage = serde_json::from_slice(&received[0].data).unwrap();
    assert_eq!(notification.message, "Boosted boss: Ghazbaran");
    assert_eq!(
        notification.image_url,
        "http://scheduler-service:8080/images/ghazbaran.gif"
    );

    publisher.shutdown().await.unwrap();
}

use chrono::{DateTime, Utc};
use lazy_static::lazy_static;
use prometheus::{
    Counter, CounterVec, Encoder, Gauge, Histogram, HistogramOpts, IntGauge, Opts, Registry,
    TextEncoder,
};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::warn;

lazy_static! {
    static ref REGISTRY: Registry = Registry::new();
    static ref CYCLES_COUNTER: CounterVec = CounterVec::new(
        Opts::new(
            "boss_scheduler_cycles_total",
            "Total number of job cycles by outcome"
        ),
        &["outcome"]
    ).unwrap();
    static ref CYCLE_DURATION_HISTOGRAM: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "boss_scheduler_cycle_duration_seconds",
            "Time spent running one fetch-detect-publish cycle"
        ).buckets(vec![0.01, 0.05, 0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 20.0])
    ).unwrap();
    static ref CYCLES_IN_FLIGHT_GAUGE: IntGauge = IntGauge::new(
        "boss_scheduler_cycles_in_flight",
        "Number of job cycles currently running"
    ).unwrap();
    static ref UPSTREAM_FETCH_DURATION_HISTOGRAM: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "boss_scheduler_upstream_fetch_duration_seconds",
            "Time spent fetching the boosted boss from the upstream API"
        ).buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])
    ).unwrap();
    static ref UPSTREAM_FAILURES_COUNTER: Counter = Counter::new(
        "boss_scheduler_upstream_failures_total",
        "Total number of failed upstream fetches"
    ).unwrap();
    static ref STORE_ERRORS_COUNTER: CounterVec = CounterVec::new(
        Opts::new(
            "boss_scheduler_store_errors_total",
            "Total number of state store errors by operation"
        ),
        &["operation"]
    ).unwrap();
    static ref NOTIFICATIONS_PUBLISHED_COUNTER: CounterVec = CounterVec::new(
        Opts::new(
            "boss_scheduler_notifications_published_total",
            "Total number of notifications sent to the broker by send path"
        ),
        &["path"]
    ).unwrap();
    static ref NOTIFICATIONS_FAILED_COUNTER: CounterVec = CounterVec::new(
        Opts::new(
            "boss_scheduler_notifications_failed_total",
            "Total number of notifications the broker did not accept by send path"
        ),
        &["path"]
    ).unwrap();
    static ref PUBLISH_FALLBACKS_COUNTER: Counter = Counter::new(
        "boss_scheduler_publish_fallbacks_total",
        "Total number of publishes that bypassed the full buffer"
    ).unwrap();
    static ref PUBLISH_BUFFER_DEPTH_GAUGE: IntGauge = IntGauge::new(
        "boss_scheduler_publish_buffer_depth",
        "Number of notifications waiting in the publish buffer"
    ).unwrap();
    static ref PUBLISH_DURATION_HISTOGRAM: Histogram = Histogram::with_opts(
        HistogramOpts::new(
            "boss_scheduler_publish_duration_seconds",
            "Time spent sending one notification to the broker"
        ).buckets(vec![0.0005, 0.001, 0.005, 0.01, 0.05, 0.1, 0.5, 1.0, 5.0])
    ).unwrap();
    static ref UPTIME_GAUGE: Gauge = Gauge::new(
        "boss_scheduler_uptime_seconds",
        "Application uptime in seconds"
    ).unwrap();
}

/// Which side of the publisher performed a broker send
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SendPath {
    Worker,
    Fallback,
}

impl SendPath {
    pub fn as_str(&self) -> &'static str {
        match self {
            SendPath::Worker => "worker",
            SendPath::Fallback => "fallback",
        }
    }
}

#[derive(Debug, Clone)]
pub struct Metrics {
    // Cycle counters
    cycles_unchanged: Arc<AtomicU64>,
    cycles_published: Arc<AtomicU64>,
    cycles_failed: Arc<AtomicU64>,
    cycles_panicked: Arc<AtomicU64>,
    cycles_in_flight: Arc<AtomicUsize>,

    // Collaborator counters
    upstream_failures: Arc<AtomicU64>,
    store_errors: Arc<AtomicU64>,
    notifications_sent: Arc<AtomicU64>,
    notifications_failed: Arc<AtomicU64>,
    publish_fallbacks: Arc<AtomicU64>,

    start_time: DateTime<Utc>,
    last_cycle_time: Arc<RwLock<Option<DateTime<Utc>>>>,
}

fn register<C>(collector: &C, name: &str)
where
    C: prometheus::core::Collector + Clone + 'static,
{
    // Registration failures are logged but not fatal
    REGISTRY
        .register(Box::new(collector.clone()))
        .unwrap_or_else(|e| warn!("Failed to register {}: {}", name, e));
}

impl Metrics {
    pub fn new() -> Self {
        register(&*CYCLES_COUNTER, "CYCLES_COUNTER");
        register(&*CYCLE_DURATION_HISTOGRAM, "CYCLE_DURATION_HISTOGRAM");
        register(&*CYCLES_IN_FLIGHT_GAUGE, "CYCLES_IN_FLIGHT_GAUGE");
        register(
            &*UPSTREAM_FETCH_DURATION_HISTOGRAM,
            "UPSTREAM_FETCH_DURATION_HISTOGRAM",
        );
        register(&*UPSTREAM_FAILURES_COUNTER, "UPSTREAM_FAILURES_COUNTER");
        register(&*STORE_ERRORS_COUNTER, "STORE_ERRORS_COUNTER");
        register(
            &*NOTIFICATIONS_PUBLISHED_COUNTER,
            "NOTIFICATIONS_PUBLISHED_COUNTER",
        );
        register(&*NOTIFICATIONS_FAILED_COUNTER, "NOTIFICATIONS_FAILED_COUNTER");
        register(&*PUBLISH_FALLBACKS_COUNTER, "PUBLISH_FALLBACKS_COUNTER");
        register(&*PUBLISH_BUFFER_DEPTH_GAUGE, "PUBLISH_BUFFER_DEPTH_GAUGE");
        register(&*PUBLISH_DURATION_HISTOGRAM, "PUBLISH_DURATION_HISTOGRAM");
        register(&*UPTIME_GAUGE, "UPTIME_GAUGE");

        Self {
            cycles_unchanged: Arc::new(AtomicU64::new(0)),
            cycles_published: Arc::new(AtomicU64::new(0)),
            cycles_failed: Arc::new(AtomicU64::new(0)),
            cycles_panicked: Arc::new(AtomicU64::new(0)),
            cycles_in_flight: Arc::new(AtomicUsize::new(0)),
            upstream_failures: Arc::new(AtomicU64::new(0)),
            store_errors: Arc::new(AtomicU64::new(0)),
            notifications_sent: Arc::new(AtomicU64::new(0)),
            notifications_failed: Arc::new(AtomicU64::new(0)),
            publish_fallbacks: Arc::new(AtomicU64::new(0)),
            start_time: Utc::now(),
            last_cycle_time: Arc::new(RwLock::new(None)),
        }
    }

    /// Marks a cycle as started and returns how many were already running
    pub fn record_cycle_started(&self) -> usize {
        CYCLES_IN_FLIGHT_GAUGE.inc();
        self.cycles_in_flight.fetch_add(1, Ordering::SeqCst)
    }

    pub fn record_cycle_finished(&self, duration: Duration) {
        CYCLES_IN_FLIGHT_GAUGE.dec();
        self.cycles_in_flight.fetch_sub(1, Ordering::SeqCst);
        CYCLE_DURATION_HISTOGRAM.observe(duration.as_secs_f64());
    }

    pub fn record_cycle_unchanged(&self) {
        self.cycles_unchanged.fetch_add(1, Ordering::Relaxed);
        CYCLES_COUNTER.with_label_values(&["unchanged"]).inc();
    }

    pub fn record_cycle_published(&self) {
        self.cycles_published.fetch_add(1, Ordering::Relaxed);
        CYCLES_COUNTER.with_label_values(&["published"]).inc();
    }

    pub fn record_cycle_failure(&self) {
        self.cycles_failed.fetch_add(1, Ordering::Relaxed);
        CYCLES_COUNTER.with_label_values(&["failed"]).inc();
    }

    pub fn record_cycle_panic(&self) {
        self.cycles_panicked.fetch_add(1, Ordering::Relaxed);
        CYCLES_COUNTER.with_label_values(&["panicked"]).inc();
    }

    pub async fn update_last_cycle_time(&self) {
        *self.last_cycle_time.write().await = Some(Utc::now());
    }

    pub fn record_upstream_fetch_duration(&self, duration: Duration) {
        UPSTREAM_FETCH_DURATION_HISTOGRAM.observe(duration.as_secs_f64());
    }

    pub fn record_upstream_failure(&self) {
        self.upstream_failures.fetch_add(1, Ordering::Relaxed);
        UPSTREAM_FAILURES_COUNTER.inc();
    }

    pub fn record_store_error(&self, operation: &str) {
        self.store_errors.fetch_add(1, Ordering::Relaxed);
        STORE_ERRORS_COUNTER.with_label_values(&[operation]).inc();
    }

    pub fn record_notification_sent(&self, path: SendPath, duration: Duration) {
        self.notifications_sent.fetch_add(1, Ordering::Relaxed);
        NOTIFICATIONS_PUBLISHED_COUNTER
            .with_label_values(&[path.as_str()])
            .inc();
        PUBLISH_DURATION_HISTOGRAM.observe(duration.as_secs_f64());
    }

    pub fn record_notification_failed(&self, path: SendPath) {
        self.notifications_failed.fetch_add(1, Ordering::Relaxed);
        NOTIFICATIONS_FAILED_COUNTER
            .with_label_values(&[path.as_str()])
            .inc();
    }

    pub fn record_publish_fallback(&self) {
        self.publish_fallbacks.fetch_add(1, Ordering::Relaxed);
        PUBLISH_FALLBACKS_COUNTER.inc();
    }

    pub fn record_buffer_depth(&self, depth: usize) {
        PUBLISH_BUFFER_DEPTH_GAUGE.set(depth as i64);
    }

    pub async fn get_snapshot(&self) -> MetricsSnapshot {
        let uptime_seconds = (Utc::now() - self.start_time).num_seconds().max(0) as u64;
        UPTIME_GAUGE.set(uptime_seconds as f64);

        MetricsSnapshot {
            cycles_unchanged: self.cycles_unchanged.load(Ordering::Relaxed),
            cycles_published: self.cycles_published.load(Ordering::Relaxed),
            cycles_failed: self.cycles_failed.load(Ordering::Relaxed),
            cycles_panicked: self.cycles_panicked.load(Ordering::Relaxed),
            cycles_in_flight: self.cycles_in_flight.load(Ordering::SeqCst),
            upstream_failures: self.upstream_failures.load(Ordering::Relaxed),
            store_errors: self.store_errors.load(Ordering::Relaxed),
            notifications_sent: self.notifications_sent.load(Ordering::Relaxed),
            notifications_failed: self.notifications_failed.load(Ordering::Relaxed),
            publish_fallbacks: self.publish_fallbacks.load(Ordering::Relaxed),
            uptime_seconds,
            start_time: self.start_time,
            last_cycle_time: *self.last_cycle_time.read().await,
        }
    }

    pub fn get_prometheus_metrics() -> Result<String, Box<dyn std::error::Error>> {
        let encoder = TextEncoder::new();
        let metric_families = REGISTRY.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer)?;
        Ok(String::from_utf8(buffer)?)
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsSnapshot {
    pub cycles_unchanged: u64,
    pub cycles_published: u64,
    pub cycles_failed: u64,
    pub cycles_panicked: u64,
    pub cycles_in_flight: usize,
    pub upstream_failures: u64,
    pub store_errors: u64,
    pub notifications_sent: u64,
    pub notifications_failed: u64,
    pub publish_fallbacks: u64,
    pub uptime_seconds: u64,
    pub start_time: DateTime<Utc>,
    pub last_cycle_time: Option<DateTime<Utc>>,
}

use std::any::Any;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Duration, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use crate::jobs::Job;
use crate::monitoring::Metrics;

/// Runs a job once at start and then on a fixed interval
///
/// Every firing is spawned as its own task, so a slow run never delays the
/// timer and runs may overlap. Each run is supervised: errors and panics are
/// logged and counted, and never reach the timer loop.
pub struct Scheduler {
    job: Arc<dyn Job>,
    period: Duration,
    metrics: Arc<Metrics>,
    cancellation_token: CancellationToken,
}

impl Scheduler {
    pub fn new(job: Arc<dyn Job>, period: Duration, metrics: Arc<Metrics>) -> Self {
        Self {
            job,
            period,
            metrics,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn get_cancellation_token(&self) -> CancellationToken {
        self.cancellation_token.clone()
    }

    /// Spawns one supervised run of the job
    pub fn trigger(&self) -> JoinHandle<()> {
        spawn_supervised(self.job.clone(), self.metrics.clone())
    }

    /// Runs until `stop` is called. Runs already in progress are not awaited.
    pub async fn start(&self) {
        info!(
            "Scheduler started for job '{}' (every {}s)",
            self.job.name(),
            self.period.as_secs()
        );

        info!("Running job '{}' at startup", self.job.name());
        self.trigger();

        let mut ticker = interval_at(tokio::time::Instant::now() + self.period, self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    self.trigger();
                }
                _ = self.cancellation_token.cancelled() => {
                    info!("Scheduler received shutdown signal");
                    break;
                }
            }
        }

        info!("Scheduler stopped");
    }

    pub fn stop(&self) {
        info!("Stopping scheduler");
        self.cancellation_token.cancel();
    }
}

fn spawn_supervised(job: Arc<dyn Job>, metrics: Arc<Metrics>) -> JoinHandle<()> {
    tokio::spawn(async move {
        let name = job.name().to_string();

        let already_running = metrics.record_cycle_started();
        if already_running > 0 {
            warn!(
                "Job '{}' starting while {} previous run(s) still in progress",
                name, already_running
            );
        }

        let start_time = Instant::now();
        let run = tokio::spawn(async move { job.run().await });

        match run.await {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!("Job '{}' failed: {}", name, e);
                metrics.record_cycle_failure();
            }
            Err(e) if e.is_panic() => {
                error!(
                    "Recovered from panic in job '{}': {}",
                    name,
                    panic_message(e.into_panic())
                );
                metrics.record_cycle_panic();
            }
            Err(e) => {
                warn!("Job '{}' was cancelled: {}", name, e);
                metrics.record_cycle_failure();
            }
        }

        metrics.record_cycle_finished(start_time.elapsed());
        metrics.update_last_cycle_time().await;
    })
}

fn panic_message(payload: Box<dyn Any + Send>) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        message.to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic payload".to_string()
    }
}

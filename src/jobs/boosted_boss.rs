use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

use super::Job;
use crate::core::types::{BoostedBossSnapshot, CycleOutcome, NotificationMessage, NOTIFICATION_TYPE};
use crate::error::Result;
use crate::monitoring::Metrics;
use crate::publisher::NotificationPublisher;
use crate::storage::StateStore;
use crate::upstream::BossSource;

pub const LAST_BOSS_KEY: &str = "last_boss_response";
pub const LAST_BOSS_TTL: Duration = Duration::from_secs(36 * 60 * 60);

/// Detects changes of the boosted boss and publishes a notification for each
pub struct BoostedBossJob {
    source: Arc<dyn BossSource>,
    store: Arc<dyn StateStore>,
    publisher: Arc<dyn NotificationPublisher>,
    server_url: String,
    metrics: Arc<Metrics>,
}

impl BoostedBossJob {
    pub fn new(
        source: Arc<dyn BossSource>,
        store: Arc<dyn StateStore>,
        publisher: Arc<dyn NotificationPublisher>,
        server_url: &str,
        metrics: Arc<Metrics>,
    ) -> Self {
        Self {
            source,
            store,
            publisher,
            server_url: server_url.trim_end_matches('/').to_string(),
            metrics,
        }
    }

    /// Fetch, compare against the last seen message and publish on change
    ///
    /// The stored record only moves forward after the publisher accepted the
    /// message, so a failed publish is retried on the next cycle.
    pub async fn run_cycle(&self) -> Result<CycleOutcome> {
        let snapshot = self.source.fetch_boosted().await?;
        let rendered = snapshot.render_message();

        let last_seen = match self.store.get(LAST_BOSS_KEY).await {
            Ok(value) => value,
            Err(e) => {
                error!("Error retrieving last response from store: {}", e);
                self.metrics.record_store_error("get");
                None
            }
        };

        if last_seen.as_deref() == Some(rendered.as_str()) {
            debug!("Boss information unchanged, no notification sent");
            return Ok(CycleOutcome::Unchanged);
        }

        info!("Boss has changed to '{}', sending notification", snapshot.name);

        let notification = self.build_notification(&snapshot, &rendered);
        self.publisher.publish(notification).await?;

        if let Err(e) = self.store.set(LAST_BOSS_KEY, &rendered, LAST_BOSS_TTL).await {
            warn!("Error updating last response in store: {}", e);
            self.metrics.record_store_error("set");
        }

        Ok(CycleOutcome::Published { message: rendered })
    }

    fn build_notification(&self, snapshot: &BoostedBossSnapshot, rendered: &str) -> NotificationMessage {
        NotificationMessage::new(
            NOTIFICATION_TYPE,
            rendered,
            public_image_url(&self.server_url, &snapshot.image_filename),
        )
        .with_extra("boss_name", snapshot.name.as_str())
        .with_extra("media", "image_text")
    }
}

#[async_trait]
impl Job for BoostedBossJob {
    fn name(&self) -> &str {
        "boosted_boss"
    }

    async fn run(&self) -> Result<()> {
        debug!("Running boosted boss check");

        match self.run_cycle().await {
            Ok(CycleOutcome::Unchanged) => {
                self.metrics.record_cycle_unchanged();
                Ok(())
            }
            Ok(CycleOutcome::Published { message }) => {
                self.metrics.record_cycle_published();
                info!("Notification accepted: {}", message);
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

/// Public link to a cached boss image, empty when there is no image
pub fn public_image_url(server_url: &str, image_filename: &str) -> String {
    if image_filename.is_empty() {
        return String::new();
    }
    format!("{}/images/{}", server_url.trim_end_matches('/'), image_filename)
}

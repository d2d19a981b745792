use async_trait::async_trait;
use reqwest::StatusCode;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;
use url::Url;

use super::BossSource;
use crate::core::types::{BoostableBossesResponse, BoostedBossSnapshot};
use crate::error::{Result, SchedulerError};
use crate::monitoring::Metrics;

const BOOSTABLE_BOSSES_PATH: &str = "/boostablebosses/";

/// Client for the TibiaData `boostablebosses` endpoint
pub struct TibiaApiClient {
    client: reqwest::Client,
    url: String,
    metrics: Arc<Metrics>,
}

impl TibiaApiClient {
    pub fn new(base_url: &str, timeout: Duration, metrics: Arc<Metrics>) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: format!("{}{}", base_url.trim_end_matches('/'), BOOSTABLE_BOSSES_PATH),
            metrics,
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    async fn request(&self) -> Result<BoostedBossSnapshot> {
        let response = self.client.get(&self.url).send().await?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(SchedulerError::Upstream(format!(
                "API returned non-200 status: {}",
                status.as_u16()
            )));
        }

        let body = response.bytes().await?;
        parse_boosted_response(&body)
    }
}

#[async_trait]
impl BossSource for TibiaApiClient {
    async fn fetch_boosted(&self) -> Result<BoostedBossSnapshot> {
        let start_time = Instant::now();
        let result = self.request().await;
        self.metrics
            .record_upstream_fetch_duration(start_time.elapsed());

        match &result {
            Ok(snapshot) => debug!(
                "Fetched boosted boss '{}' (image: '{}')",
                snapshot.name, snapshot.image_filename
            ),
            Err(_) => self.metrics.record_upstream_failure(),
        }

        result
    }
}

/// Parses a `boostablebosses` response body into a snapshot
pub fn parse_boosted_response(body: &[u8]) -> Result<BoostedBossSnapshot> {
    let response: BoostableBossesResponse = serde_json::from_slice(body)?;
    let boosted = response.boostable_bosses.boosted;

    if boosted.name.is_empty() {
        return Err(SchedulerError::Upstream(
            "no boosted boss found in API response".to_string(),
        ));
    }

    Ok(BoostedBossSnapshot {
        image_filename: image_filename(&boosted.image_url),
        name: boosted.name,
    })
}

/// Final non-empty path segment of an image URL, empty for an empty URL
pub fn image_filename(image_url: &str) -> String {
    let trimmed = image_url.trim();
    if trimmed.is_empty() {
        return String::new();
    }

    match Url::parse(trimmed) {
        Ok(url) => url
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .unwrap_or_default()
            .to_string(),
        // Relative references have no scheme to parse against
        Err(_) => trimmed
            .split(['?', '#'])
            .next()
            .unwrap_or_default()
            .split('/')
            .filter(|s| !s.is_empty())
            .last()
            .unwrap_or_default()
            .to_string(),
    }
}

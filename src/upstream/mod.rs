pub mod tibia_client;

pub use tibia_client::{image_filename, parse_boosted_response, TibiaApiClient};

use async_trait::async_trait;

use crate::core::types::BoostedBossSnapshot;
use crate::error::Result;

/// Source of the currently boosted boss
#[async_trait]
pub trait BossSource: Send + Sync {
    async fn fetch_boosted(&self) -> Result<BoostedBossSnapshot>;
}

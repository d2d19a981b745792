pub mod boosted_boss;

pub use boosted_boss::BoostedBossJob;

use async_trait::async_trait;

use crate::error::Result;

/// A unit of work the scheduler runs on every tick
#[async_trait]
pub trait Job: Send + Sync + 'static {
    fn name(&self) -> &str;

    async fn run(&self) -> Result<()>;
}

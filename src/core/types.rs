use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Message type understood by the notification consumers
pub const NOTIFICATION_TYPE: &str = "tibia_notification";

/// Response envelope of the `boostablebosses` endpoint
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BoostableBossesResponse {
    pub boostable_bosses: BoostableBosses,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BoostableBosses {
    pub boosted: BoostedBoss,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct BoostedBoss {
    pub name: String,
    pub image_url: String,
}

/// Boosted boss as observed on a single poll
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BoostedBossSnapshot {
    pub name: String,
    pub image_filename: String,
}

impl BoostedBossSnapshot {
    /// Canonical text compared against the last seen record
    pub fn render_message(&self) -> String {
        format!("Boosted boss: {}", self.name)
    }
}

/// Message published to the notifications exchange
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NotificationMessage {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub image_url: String,
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub extra_info: HashMap<String, serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl NotificationMessage {
    pub fn new(kind: &str, message: impl Into<String>, image_url: impl Into<String>) -> Self {
        let created_at = Utc::now();
        Self {
            id: created_at.format("%Y%m%d%H%M%S").to_string(),
            kind: kind.to_string(),
            message: message.into(),
            image_url: image_url.into(),
            extra_info: HashMap::new(),
            created_at,
        }
    }

    pub fn with_extra(mut self, key: &str, value: impl Into<serde_json::Value>) -> Self {
        self.extra_info.insert(key.to_string(), value.into());
        self
    }
}

/// Result of one fetch-detect-publish cycle
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CycleOutcome {
    Unchanged,
    Published { message: String },
}

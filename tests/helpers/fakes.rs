use async_trait::async_trait;
use boss_scheduler::publisher::MessageTransport;
use boss_scheduler::{NotificationMessage, Result};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// Transport that keeps every delivered notification in memory
#[derive(Default, Clone)]
pub struct RecordingTransport {
    delivered: Arc<Mutex<Vec<NotificationMessage>>>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn delivered(&self) -> Vec<NotificationMessage> {
        self.delivered.lock().unwrap().clone()
    }

    pub fn count(&self) -> usize {
        self.delivered.lock().unwrap().len()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, payload: &[u8]) -> Result<()> {
        let message: NotificationMessage = serde_json::from_slice(payload)?;
        self.delivered.lock().unwrap().push(message);
        Ok(())
    }
}

/// Body of a `boostablebosses` response for the given boss
pub fn boostable_bosses_body(name: &str, image_url: &str) -> Value {
    json!({
        "boostable_bosses": {
            "boostable_boss_list": [
                { "name": name, "image_url": image_url, "featured": true }
            ],
            "boosted": {
                "name": name,
                "image_url": image_url,
                "featured": true
            }
        },
        "information": {
            "api": { "version": 4, "release": "4.2.0" },
            "status": { "http_code": 200 }
        }
    })
}

/// Polls `condition` until it holds, failing after `timeout`
pub async fn wait_until<F>(timeout: Duration, condition: F) -> anyhow::Result<()>
where
    F: Fn() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    if condition() {
        Ok(())
    } else {
        Err(anyhow::anyhow!("condition not met within {:?}", timeout))
    }
}

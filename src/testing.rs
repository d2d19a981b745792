//! Test doubles shared by the unit tests.

use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

use crate::core::types::{BoostedBossSnapshot, NotificationMessage};
use crate::error::{Result, SchedulerError};
use crate::publisher::{MessageTransport, NotificationPublisher};
use crate::storage::StateStore;
use crate::upstream::BossSource;

/// Polls `condition` until it holds, panicking after two seconds
pub async fn wait_until<F>(condition: F)
where
    F: Fn() -> bool,
{
    for _ in 0..200 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not met within 2s");
}

pub fn snapshot(name: &str, image_filename: &str) -> BoostedBossSnapshot {
    BoostedBossSnapshot {
        name: name.to_string(),
        image_filename: image_filename.to_string(),
    }
}

/// Transport that records payloads, optionally failing or waiting on a gate
#[derive(Default)]
pub struct RecordingTransport {
    delivered: Arc<Mutex<Vec<NotificationMessage>>>,
    attempts: Arc<AtomicUsize>,
    failures_left: AtomicUsize,
    always_fail: bool,
    gate: Option<Arc<Semaphore>>,
    delay: Option<Duration>,
    closed: Arc<AtomicBool>,
}

impl RecordingTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn failing_first(count: usize) -> Self {
        Self {
            failures_left: AtomicUsize::new(count),
            ..Self::default()
        }
    }

    pub fn always_failing(gate: Arc<Semaphore>) -> Self {
        Self {
            always_fail: true,
            gate: Some(gate),
            ..Self::default()
        }
    }

    pub fn slow(delay: Duration) -> Self {
        Self {
            delay: Some(delay),
            ..Self::default()
        }
    }

    pub fn delivered(&self) -> Arc<Mutex<Vec<NotificationMessage>>> {
        self.delivered.clone()
    }

    pub fn attempts(&self) -> Arc<AtomicUsize> {
        self.attempts.clone()
    }

    pub fn closed(&self) -> Arc<AtomicBool> {
        self.closed.clone()
    }
}

#[async_trait]
impl MessageTransport for RecordingTransport {
    async fn send(&self, payload: &[u8]) -> Result<()> {
        self.attempts.fetch_add(1, Ordering::SeqCst);

        if let Some(gate) = &self.gate {
            gate.acquire()
                .await
                .map_err(|_| SchedulerError::Publish("gate closed".to_string()))?
                .forget();
        }
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        if self.always_fail {
            return Err(SchedulerError::Publish("broker unavailable".to_string()));
        }
        let should_fail = self
            .failures_left
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |left| left.checked_sub(1))
            .is_ok();
        if should_fail {
            return Err(SchedulerError::Publish("broker unavailable".to_string()));
        }

        let message: NotificationMessage = serde_json::from_slice(payload)?;
        self.delivered.lock().unwrap().push(message);
        Ok(())
    }

    async fn close(&self) -> Result<()> {
        self.closed.store(true, Ordering::SeqCst);
        Ok(())
    }
}

/// Boss source returning scripted results in order, repeating the last one
pub struct ScriptedSource {
    responses: Mutex<VecDeque<Result<BoostedBossSnapshot>>>,
    last: Mutex<Option<BoostedBossSnapshot>>,
    calls: AtomicUsize,
}

impl ScriptedSource {
    pub fn new(responses: Vec<Result<BoostedBossSnapshot>>) -> Self {
        Self {
            responses: Mutex::new(responses.into()),
            last: Mutex::new(None),
            calls: AtomicUsize::new(0),
        }
    }

    pub fn always(snapshot: BoostedBossSnapshot) -> Self {
        Self::new(vec![Ok(snapshot)])
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BossSource for ScriptedSource {
    async fn fetch_boosted(&self) -> Result<BoostedBossSnapshot> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let next = self.responses.lock().unwrap().pop_front();
        match next {
            Some(Ok(snapshot)) => {
                *self.last.lock().unwrap() = Some(snapshot.clone());
                Ok(snapshot)
            }
            Some(Err(e)) => Err(e),
            None => self
                .last
                .lock()
                .unwrap()
                .clone()
                .ok_or_else(|| SchedulerError::Upstream("no scripted response".to_string())),
        }
    }
}

/// Store whose reads and writes can be made to fail
#[derive(Default)]
pub struct FlakyStore {
    pub inner: crate::storage::MemoryStore,
    pub fail_reads: AtomicBool,
    pub fail_writes: AtomicBool,
    pub writes: AtomicUsize,
}

#[async_trait]
impl StateStore for FlakyStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(SchedulerError::Timeout(2000));
        }
        self.inner.get(key).await
    }

    async fn set(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(SchedulerError::Timeout(2000));
        }
        self.inner.set(key, value, ttl).await
    }
}

/// Publisher that records accepted messages or rejects them all
#[derive(Default)]
pub struct RecordingPublisher {
    pub published: Mutex<Vec<NotificationMessage>>,
    pub reject: AtomicBool,
}

impl RecordingPublisher {
    pub fn count(&self) -> usize {
        self.published.lock().unwrap().len()
    }
}

#[async_trait]
impl NotificationPublisher for RecordingPublisher {
    async fn publish(&self, message: NotificationMessage) -> Result<()> {
        if self.reject.load(Ordering::SeqCst) {
            return Err(SchedulerError::Publish("broker unavailable".to_string()));
        }
        self.published.lock().unwrap().push(message);
        Ok(())
    }
}

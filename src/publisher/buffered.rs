use async_trait::async_trait;
use std::sync::{Arc, Mutex as StdMutex};
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::{MessageTransport, NotificationPublisher};
use crate::core::types::NotificationMessage;
use crate::error::{Result, SchedulerError};
use crate::monitoring::{Metrics, SendPath};

/// Publisher with a bounded in-memory buffer in front of a transport
///
/// `publish` enqueues without waiting. When the buffer is full the message is
/// sent synchronously instead, so a caller is never told `Ok` for a message
/// that was neither queued nor sent. A single worker drains the buffer in FIFO
/// order. Worker and fallback sends share one mutex around the transport, so
/// sends never interleave, but a fallback send may overtake buffered messages.
pub struct BufferedPublisher<T: MessageTransport> {
    sender: mpsc::Sender<NotificationMessage>,
    direct: Arc<DirectSender<T>>,
    worker: StdMutex<Option<JoinHandle<()>>>,
    metrics: Arc<Metrics>,
}

struct DirectSender<T> {
    transport: Mutex<T>,
    timeout: Duration,
    metrics: Arc<Metrics>,
}

impl<T: MessageTransport> DirectSender<T> {
    async fn send(&self, message: &NotificationMessage, path: SendPath) -> Result<()> {
        let transport = self.transport.lock().await;

        let payload = serde_json::to_vec(message)?;
        let start_time = Instant::now();

        let result = match tokio::time::timeout(self.timeout, transport.send(&payload)).await {
            Ok(result) => result,
            Err(_) => Err(SchedulerError::Timeout(self.timeout.as_millis() as u64)),
        };

        match &result {
            Ok(()) => {
                self.metrics
                    .record_notification_sent(path, start_time.elapsed());
                debug!(
                    "Notification {} sent via {} path",
                    message.id,
                    path.as_str()
                );
            }
            Err(_) => self.metrics.record_notification_failed(path),
        }

        result
    }
}

impl<T: MessageTransport> BufferedPublisher<T> {
    /// Starts the drain worker; must be called inside a tokio runtime
    pub fn new(transport: T, capacity: usize, send_timeout: Duration, metrics: Arc<Metrics>) -> Self {
        let (sender, receiver) = mpsc::channel(capacity.max(1));

        let direct = Arc::new(DirectSender {
            transport: Mutex::new(transport),
            timeout: send_timeout,
            metrics: metrics.clone(),
        });

        let worker = tokio::spawn(drain_buffer(receiver, direct.clone(), metrics.clone()));

        info!(
            "Notification publisher started (buffer capacity: {}, send timeout: {}ms)",
            capacity.max(1),
            send_timeout.as_millis()
        );

        Self {
            sender,
            direct,
            worker: StdMutex::new(Some(worker)),
            metrics,
        }
    }

    /// Number of messages waiting in the buffer
    pub fn buffered(&self) -> usize {
        self.sender.max_capacity() - self.sender.capacity()
    }

    /// Stops the worker and closes the transport. Buffered messages are lost.
    pub async fn shutdown(&self) -> Result<()> {
        let worker = self
            .worker
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .take();

        if let Some(worker) = worker {
            worker.abort();
        }

        let pending = self.buffered();
        if pending > 0 {
            warn!("Dropping {} buffered notifications on shutdown", pending);
        }

        let transport = self.direct.transport.lock().await;
        transport.close().await
    }
}

#[async_trait]
impl<T: MessageTransport> NotificationPublisher for BufferedPublisher<T> {
    async fn publish(&self, message: NotificationMessage) -> Result<()> {
        match self.sender.try_send(message) {
            Ok(()) => {
                let depth = self.buffered();
                self.metrics.record_buffer_depth(depth);
                debug!("Notification queued (buffer depth: {})", depth);
                Ok(())
            }
            Err(TrySendError::Full(message)) => {
                warn!("Publish buffer is full, publishing directly");
                self.metrics.record_publish_fallback();
                self.direct.send(&message, SendPath::Fallback).await
            }
            Err(TrySendError::Closed(message)) => {
                warn!("Publish worker is not running, publishing directly");
                self.metrics.record_publish_fallback();
                self.direct.send(&message, SendPath::Fallback).await
            }
        }
    }
}

async fn drain_buffer<T: MessageTransport>(
    mut receiver: mpsc::Receiver<NotificationMessage>,
    direct: Arc<DirectSender<T>>,
    metrics: Arc<Metrics>,
) {
    debug!("Publish worker started");

    while let Some(message) = receiver.recv().await {
        metrics.record_buffer_depth(receiver.len());

        // No retry: a failed message is dropped and the next cycle re-detects it
        if let Err(e) = direct.send(&message, SendPath::Worker).await {
            error!("Error in async publisher for notification {}: {}", message.id, e);
        }
    }

    debug!("Publish buffer closed, worker exiting");
}

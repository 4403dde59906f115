//! Outbound notification seam. Delivery to a chat transport happens outside
//! this crate; the monitor only hands over (recipient, text).

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::task::JoinHandle;

#[async_trait]
pub trait Notifier: Send + Sync {
    async fn notify(&self, recipient: i64, text: &str) -> Result<(), String>;
}

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct Notification {
    pub recipient: i64,
    pub text: String,
    pub sent_at: i64,
}

/// Publishes notifications on a broadcast channel for whatever delivers them.
#[derive(Clone)]
pub struct BroadcastNotifier {
    tx: broadcast::Sender<Notification>,
}

impl BroadcastNotifier {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Notification> {
        self.tx.subscribe()
    }
}

#[async_trait]
impl Notifier for BroadcastNotifier {
    async fn notify(&self, recipient: i64, text: &str) -> Result<(), String> {
        let n = Notification {
            recipient,
            text: text.to_string(),
            sent_at: chrono::Utc::now().timestamp(),
        };

        self.tx
            .send(n)
            .map(|_| ())
            .map_err(|_| "no notification subscribers".to_string())
    }
}

/// Writes notifications to the log instead of delivering them.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn notify(&self, recipient: i64, text: &str) -> Result<(), String> {
        tracing::info!("[notify] to {}: {}", recipient, text.replace('\n', " | "));
        Ok(())
    }
}

/// Forwards everything published on `notifier` to `sink` until the channel
/// closes. Failed deliveries are logged and skipped.
pub fn spawn_delivery(notifier: &BroadcastNotifier, sink: Arc<dyn Notifier>) -> JoinHandle<()> {
    let mut rx = notifier.subscribe();

    tokio::spawn(async move {
        loop {
            match rx.recv().await {
                Ok(n) => {
                    if let Err(e) = sink.notify(n.recipient, &n.text).await {
                        tracing::error!("[notify] delivery to {} failed: {}", n.recipient, e);
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::warn!("[notify] delivery lagged, dropped {} notification(s)", skipped);
                }
                Err(broadcast::error::RecvError::Closed) => break,
            }
        }
    })
}

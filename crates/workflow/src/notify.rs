//! Notification fan-out to order observers.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use common::{Order, OrderId};
use thiserror::Error;
use tokio::sync::Mutex;

/// An observer failed to deliver a notification.
#[derive(Debug, Error)]
#[error("Notification failed: {0}")]
pub struct NotificationError(pub String);

/// Receives a message about a committed order.
#[async_trait]
pub trait OrderObserver: Send + Sync {
    /// Name used in logs and metrics labels.
    fn name(&self) -> &str;

    async fn notify(&self, order: &Order, message: &str) -> Result<(), NotificationError>;
}

/// Ordered list of observers.
///
/// Observers run one after another in registration order. A failing
/// observer is logged and counted, and the remaining observers still run;
/// the order it was notified about stays committed.
#[derive(Clone, Default)]
pub struct Notifier {
    observers: Vec<Arc<dyn OrderObserver>>,
}

impl Notifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends an observer.
    pub fn with_observer<O: OrderObserver + 'static>(mut self, observer: O) -> Self {
        self.register(Arc::new(observer));
        self
    }

    pub fn register(&mut self, observer: Arc<dyn OrderObserver>) {
        self.observers.push(observer);
    }

    pub fn len(&self) -> usize {
        self.observers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.observers.is_empty()
    }

    /// Notifies every observer and returns how many succeeded.
    #[tracing::instrument(skip(self, order), fields(order_id = %order.id))]
    pub async fn notify_all(&self, order: &Order, message: &str) -> usize {
        let mut delivered = 0;
        for observer in &self.observers {
            match observer.notify(order, message).await {
                Ok(()) => delivered += 1,
                Err(e) => {
                    metrics::counter!(
                        "notifications_failed_total",
                        "observer" => observer.name().to_string()
                    )
                    .increment(1);
                    tracing::warn!(observer = observer.name(), error = %e, "observer failed");
                }
            }
        }
        delivered
    }
}

/// Stands in for an email sender: logs the message it would send.
#[derive(Debug, Clone, Copy, Default)]
pub struct LoggingEmailObserver;

#[async_trait]
impl OrderObserver for LoggingEmailObserver {
    fn name(&self) -> &str {
        "email"
    }

    async fn notify(&self, order: &Order, message: &str) -> Result<(), NotificationError> {
        tracing::info!(
            order_id = %order.id,
            user_id = %order.user_id,
            body = message,
            "email notification sent"
        );
        Ok(())
    }
}

/// Observer for tests. Records every message and can be told to fail.
#[derive(Debug, Clone, Default)]
pub struct RecordingObserver {
    messages: Arc<Mutex<Vec<(OrderId, String)>>>,
    fail: Arc<AtomicBool>,
}

impl RecordingObserver {
    pub fn new() -> Self {
        Self::default()
    }

    /// A recorder that fails every notification.
    pub fn failing() -> Self {
        let observer = Self::default();
        observer.fail.store(true, Ordering::SeqCst);
        observer
    }

    /// Returns the recorded (order, message) pairs in arrival order.
    pub async fn messages(&self) -> Vec<(OrderId, String)> {
        self.messages.lock().await.clone()
    }
}

#[async_trait]
impl OrderObserver for RecordingObserver {
    fn name(&self) -> &str {
        "recording"
    }

    async fn notify(&self, order: &Order, message: &str) -> Result<(), NotificationError> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(NotificationError("recorder set to fail".to_string()));
        }
        self.messages
            .lock()
            .await
            .push((order.id, message.to_string()));
        Ok(())
    }
}

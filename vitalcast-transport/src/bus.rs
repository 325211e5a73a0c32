//! In-process subject bus

use parking_lot::RwLock;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tokio::task::JoinHandle;

use crate::error::{Result, TransportError};

/// Per-subscriber queue depth before messages start being dropped
pub const DEFAULT_QUEUE_CAPACITY: usize = 4096;

/// A delivered message
#[derive(Debug, Clone)]
pub struct Message {
    pub subject: Arc<str>,
    pub data: Arc<[u8]>,
}

/// Thread-safe publish/subscribe bus, cheap to clone
#[derive(Clone)]
pub struct MessageBus {
    inner: Arc<BusInner>,
}

struct BusInner {
    name: String,
    queue_capacity: usize,
    subjects: RwLock<HashMap<String, Vec<mpsc::Sender<Message>>>>,
}

impl MessageBus {
    /// Create a bus with the default per-subscriber queue capacity
    pub fn new(name: impl Into<String>) -> Self {
        Self::with_capacity(name, DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(name: impl Into<String>, queue_capacity: usize) -> Self {
        Self {
            inner: Arc::new(BusInner {
                name: name.into(),
                queue_capacity: queue_capacity.max(1),
                subjects: RwLock::new(HashMap::new()),
            }),
        }
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Publish `payload` to every current subscriber of `subject`.
    ///
    /// Returns how many subscribers accepted the message. Subscribers with a
    /// full queue miss it; subscribers that went away are pruned.
    pub fn publish(&self, subject: &str, payload: impl Into<Arc<[u8]>>) -> Result<usize> {
        validate_subject(subject)?;

        let msg = Message {
            subject: Arc::from(subject),
            data: payload.into(),
        };

        let mut delivered = 0;
        let mut stale = false;
        {
            let subjects = self.inner.subjects.read();
            let Some(senders) = subjects.get(subject) else {
                return Ok(0);
            };

            for tx in senders {
                match tx.try_send(msg.clone()) {
                    Ok(()) => delivered += 1,
                    Err(TrySendError::Full(_)) => {
                        tracing::debug!("[{}] slow subscriber on {}, message dropped", self.inner.name, subject);
                    }
                    Err(TrySendError::Closed(_)) => stale = true,
                }
            }
        }

        if stale {
            let mut subjects = self.inner.subjects.write();
            if let Some(senders) = subjects.get_mut(subject) {
                senders.retain(|tx| !tx.is_closed());
                if senders.is_empty() {
                    subjects.remove(subject);
                }
            }
        }

        Ok(delivered)
    }

    /// Subscribe and pull messages with [`Subscription::next_msg`]
    pub fn subscribe_sync(&self, subject: &str) -> Result<Subscription> {
        validate_subject(subject)?;

        let (tx, rx) = mpsc::channel(self.inner.queue_capacity);
        self.inner
            .subjects
            .write()
            .entry(subject.to_string())
            .or_default()
            .push(tx);

        tracing::debug!("[{}] new subscription on {}", self.inner.name, subject);

        Ok(Subscription {
            subject: subject.to_string(),
            rx,
        })
    }

    /// Subscribe with a handler invoked on a spawned task for every message.
    ///
    /// The task ends when the bus is closed; abort the handle to unsubscribe
    /// earlier. Must be called from within a Tokio runtime.
    pub fn subscribe<F>(&self, subject: &str, mut handler: F) -> Result<JoinHandle<()>>
    where
        F: FnMut(Message) + Send + 'static,
    {
        let mut sub = self.subscribe_sync(subject)?;
        Ok(tokio::spawn(async move {
            while let Some(msg) = sub.recv().await {
                handler(msg);
            }
        }))
    }

    /// Number of live subscribers on `subject`
    pub fn subscriber_count(&self, subject: &str) -> usize {
        self.inner
            .subjects
            .read()
            .get(subject)
            .map(|senders| senders.iter().filter(|tx| !tx.is_closed()).count())
            .unwrap_or(0)
    }

    /// Drop every subscription; pending messages can still be drained
    pub fn close(&self) {
        self.inner.subjects.write().clear();
        tracing::info!("[{}] message bus closed", self.inner.name);
    }
}

/// Pull-style subscription
pub struct Subscription {
    subject: String,
    rx: mpsc::Receiver<Message>,
}

impl Subscription {
    pub fn subject(&self) -> &str {
        &self.subject
    }

    /// Wait at most `timeout` for the next message
    pub async fn next_msg(&mut self, timeout: Duration) -> Result<Message> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(msg)) => Ok(msg),
            Ok(None) => Err(TransportError::Closed),
            Err(_) => Err(TransportError::Timeout),
        }
    }

    /// Wait for the next message; `None` once the bus is closed and drained
    pub async fn recv(&mut self) -> Option<Message> {
        self.rx.recv().await
    }

    /// Take a queued message without waiting
    pub fn try_next(&mut self) -> Option<Message> {
        self.rx.try_recv().ok()
    }

    /// Messages queued and not yet received
    pub fn pending(&self) -> usize {
        self.rx.len()
    }
}

fn validate_subject(subject: &str) -> Result<()> {
    if subject.is_empty() || subject.chars().any(char::is_whitespace) {
        return Err(TransportError::InvalidSubject(subject.to_string()));
    }
    Ok(())
}

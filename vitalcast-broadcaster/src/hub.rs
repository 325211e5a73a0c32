use futures_util::future::join_all;
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use vitalcast_metrics::StreamMetrics;

use crate::frame::MessageKind;
use crate::sink::{Sink, SinkId};

/// Default bound on a single sink write
pub const DEFAULT_WRITE_TIMEOUT: Duration = Duration::from_millis(200);

/// Outcome of one broadcast
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Sinks in the snapshot
    pub attempted: usize,
    /// Writes that completed in time
    pub delivered: usize,
    /// Sinks closed and removed because their write failed or timed out
    pub evicted: usize,
}

/// Thread-safe registry of live sinks.
///
/// The lock only guards membership changes and snapshot capture. Writes
/// always run against a snapshot with the lock released, concurrently and
/// each under its own deadline, so a stuck viewer delays nobody else.
pub struct Hub {
    conns: Mutex<HashMap<SinkId, Arc<dyn Sink>>>,
    metrics: Arc<StreamMetrics>,
    write_timeout: Duration,
}

impl Hub {
    pub fn new(metrics: Arc<StreamMetrics>, write_timeout: Duration) -> Self {
        Self {
            conns: Mutex::new(HashMap::new()),
            metrics,
            write_timeout,
        }
    }

    /// Register a sink. Returns `false` if its id was already present.
    pub fn add(&self, sink: Arc<dyn Sink>) -> bool {
        let id = sink.id();
        let total = {
            let mut conns = self.conns.lock();
            if conns.contains_key(&id) {
                return false;
            }
            conns.insert(id, sink);
            conns.len()
        };
        self.metrics.client_connected();
        tracing::info!("New client connected. Total clients: {}", total);
        true
    }

    /// Unregister a sink. Idempotent: only the call that actually removed it
    /// gets the sink back and updates the client gauge.
    pub fn remove(&self, id: SinkId) -> Option<Arc<dyn Sink>> {
        let (removed, total) = {
            let mut conns = self.conns.lock();
            let removed = conns.remove(&id);
            (removed, conns.len())
        };
        if removed.is_some() {
            self.metrics.client_disconnected();
            tracing::info!("Removed client #{}. Remaining: {}", id, total);
        }
        removed
    }

    pub fn contains(&self, id: SinkId) -> bool {
        self.conns.lock().contains_key(&id)
    }

    /// Get current client count
    pub fn len(&self) -> usize {
        self.conns.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.conns.lock().is_empty()
    }

    pub fn write_timeout(&self) -> Duration {
        self.write_timeout
    }

    fn snapshot(&self) -> Vec<Arc<dyn Sink>> {
        self.conns.lock().values().cloned().collect()
    }

    /// Send `payload` to every sink registered at the time of the call.
    ///
    /// Sinks added while the writes are in flight do not receive this
    /// message. Sinks whose write errors or exceeds the deadline are closed
    /// and removed.
    pub async fn broadcast(&self, payload: &[u8], kind: MessageKind) -> BroadcastReport {
        let sinks = self.snapshot();
        let mut report = BroadcastReport {
            attempted: sinks.len(),
            ..Default::default()
        };
        if sinks.is_empty() {
            return report;
        }

        let deadline = self.write_timeout;
        let outcomes = join_all(sinks.iter().map(|sink| async move {
            tokio::time::timeout(deadline, sink.write(payload, kind)).await
        }))
        .await;

        for (sink, outcome) in sinks.iter().zip(outcomes) {
            match outcome {
                Ok(Ok(())) => report.delivered += 1,
                Ok(Err(e)) => {
                    tracing::warn!("Failed to send {} to {}: {}", kind, sink.describe(), e);
                    self.evict(sink).await;
                    report.evicted += 1;
                }
                Err(_) => {
                    tracing::warn!(
                        "Send {} to {} timed out after {:?}",
                        kind,
                        sink.describe(),
                        deadline
                    );
                    self.evict(sink).await;
                    report.evicted += 1;
                }
            }
        }

        report
    }

    pub async fn broadcast_binary(&self, payload: &[u8]) -> BroadcastReport {
        self.broadcast(payload, MessageKind::Binary).await
    }

    pub async fn broadcast_text(&self, payload: &[u8]) -> BroadcastReport {
        self.broadcast(payload, MessageKind::Text).await
    }

    async fn evict(&self, sink: &Arc<dyn Sink>) {
        self.remove(sink.id());
        let _ = tokio::time::timeout(self.write_timeout, sink.close()).await;
    }

    /// Close and remove every sink (shutdown)
    pub async fn close_all(&self) {
        let sinks: Vec<Arc<dyn Sink>> = {
            let mut conns = self.conns.lock();
            conns.drain().map(|(_, sink)| sink).collect()
        };
        for sink in &sinks {
            self.metrics.client_disconnected();
            let _ = tokio::time::timeout(self.write_timeout, sink.close()).await;
        }
        if !sinks.is_empty() {
            tracing::info!("Closed {} client connection(s)", sinks.len());
        }
    }
}

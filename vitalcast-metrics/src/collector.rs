//! Atomic counter collector

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};

use crate::models::MetricsSnapshot;

/// Counters shared by the batcher, the hub and the reporting endpoint.
///
/// Counters only ever grow. `clients` is a gauge and may go up and down, but
/// the hub only decrements it for connections it actually removed.
#[derive(Debug)]
pub struct StreamMetrics {
    batches_sent: AtomicU64,
    samples_sent: AtomicU64,
    samples_dropped: AtomicU64,
    clients: AtomicI64,
    started_at: DateTime<Utc>,
}

impl StreamMetrics {
    pub fn new() -> Self {
        Self {
            batches_sent: AtomicU64::new(0),
            samples_sent: AtomicU64::new(0),
            samples_dropped: AtomicU64::new(0),
            clients: AtomicI64::new(0),
            started_at: Utc::now(),
        }
    }

    /// Record one broadcast wave batch of `samples` packed values
    pub fn record_batch(&self, samples: u64) {
        self.batches_sent.fetch_add(1, Ordering::Relaxed);
        self.samples_sent.fetch_add(samples, Ordering::Relaxed);
    }

    /// Record samples discarded by overflow or decode failure
    pub fn record_dropped(&self, samples: u64) {
        self.samples_dropped.fetch_add(samples, Ordering::Relaxed);
    }

    pub fn client_connected(&self) {
        self.clients.fetch_add(1, Ordering::Relaxed);
    }

    pub fn client_disconnected(&self) {
        self.clients.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn batches_sent(&self) -> u64 {
        self.batches_sent.load(Ordering::Relaxed)
    }

    pub fn samples_sent(&self) -> u64 {
        self.samples_sent.load(Ordering::Relaxed)
    }

    pub fn samples_dropped(&self) -> u64 {
        self.samples_dropped.load(Ordering::Relaxed)
    }

    pub fn clients(&self) -> i64 {
        self.clients.load(Ordering::Relaxed)
    }

    /// Point-in-time copy of every counter.
    ///
    /// Each field is read independently, so a snapshot taken while writers
    /// are active may mix values from adjacent updates.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            clients: self.clients(),
            batches_sent: self.batches_sent(),
            samples_sent: self.samples_sent(),
            samples_dropped: self.samples_dropped(),
            uptime_s: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
        }
    }
}

impl Default for StreamMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_counters_accumulate() {
        let metrics = StreamMetrics::new();

        metrics.record_batch(10);
        metrics.record_batch(7);
        metrics.record_dropped(200);
        metrics.record_dropped(1);

        assert_eq!(metrics.batches_sent(), 2);
        assert_eq!(metrics.samples_sent(), 17);
        assert_eq!(metrics.samples_dropped(), 201);
    }

    #[test]
    fn test_client_gauge() {
        let metrics = StreamMetrics::new();
        metrics.client_connected();
        metrics.client_connected();
        metrics.client_disconnected();
        assert_eq!(metrics.clients(), 1);
        assert_eq!(metrics.snapshot().clients, 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_writers() {
        let metrics = Arc::new(StreamMetrics::new());

        let mut handles = Vec::new();
        for _ in 0..8 {
            let metrics = Arc::clone(&metrics);
            handles.push(tokio::spawn(async move {
                for _ in 0..1000 {
                    metrics.record_batch(3);
                    metrics.record_dropped(1);
                }
            }));
        }
        for handle in handles {
            handle.await.unwrap();
        }

        let snapshot = metrics.snapshot();
        assert_eq!(snapshot.batches_sent, 8000);
        assert_eq!(snapshot.samples_sent, 24000);
        assert_eq!(snapshot.samples_dropped, 8000);
    }
}

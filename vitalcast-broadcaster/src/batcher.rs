//! Wave sample batching
//!
//! Raw samples arrive one transport message each. The batcher collects them
//! between fixed ticks and sends one packed binary frame per tick, so viewer
//! traffic is paced by the tick rate rather than by the sample rate.

use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use vitalcast_metrics::StreamMetrics;
use vitalcast_transport::{decode_sample, pack_f32_le, Subscription, TransportError};

use crate::error::{BroadcasterError, Result};
use crate::hub::Hub;

/// Batcher configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BatcherConfig {
    /// Flush interval (default 40ms, ~25 frames/s)
    pub interval: Duration,

    /// Pending samples that trigger an overflow drop
    pub max_batch: usize,

    /// Per-message wait while draining the subscription
    pub poll_wait: Duration,
}

impl Default for BatcherConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_millis(40),
            max_batch: 200,
            poll_wait: Duration::from_micros(500),
        }
    }
}

impl BatcherConfig {
    pub fn validate(&self) -> Result<()> {
        if self.interval.is_zero() {
            return Err(BroadcasterError::InvalidConfig("batch interval must be positive".into()));
        }
        if self.max_batch == 0 {
            return Err(BroadcasterError::InvalidConfig("max_batch must be positive".into()));
        }
        if self.poll_wait >= self.interval {
            return Err(BroadcasterError::InvalidConfig(
                "poll wait must be shorter than the batch interval".into(),
            ));
        }
        Ok(())
    }
}

/// Result of one drain phase
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainOutcome {
    /// Subscription ran dry; `received` messages were added to the batch
    Drained { received: usize },
    /// The batch hit `max_batch` and `dropped` samples were discarded
    Overflow { dropped: usize },
    /// The transport closed the subscription
    Closed,
}

/// Result of one flush
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FlushReport {
    /// Samples packed into the frame
    pub samples: usize,
    /// Messages skipped because their payload did not decode
    pub malformed: usize,
    /// Sinks that received the frame
    pub delivered: usize,
}

/// Collects wave messages and broadcasts them as packed `f32` frames
pub struct SampleBatcher {
    sub: Subscription,
    hub: Arc<Hub>,
    metrics: Arc<StreamMetrics>,
    config: BatcherConfig,
    pending: Vec<Arc<[u8]>>,
}

impl SampleBatcher {
    pub fn new(
        sub: Subscription,
        hub: Arc<Hub>,
        metrics: Arc<StreamMetrics>,
        config: BatcherConfig,
    ) -> Result<Self> {
        config.validate()?;
        let capacity = config.max_batch.min(1024);

        Ok(Self {
            sub,
            hub,
            metrics,
            config,
            pending: Vec::with_capacity(capacity),
        })
    }

    /// Messages waiting for the next flush
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Pull every message available right now into the pending batch.
    ///
    /// Reaching `max_batch` discards the whole pending batch, counts it as
    /// dropped and ends the drain; nothing is forwarded for that accumulation.
    pub async fn drain(&mut self) -> DrainOutcome {
        let mut received = 0;

        loop {
            match self.sub.next_msg(self.config.poll_wait).await {
                Ok(msg) => {
                    self.pending.push(msg.data);
                    received += 1;

                    if self.pending.len() >= self.config.max_batch {
                        let dropped = self.pending.len();
                        self.pending.clear();
                        self.metrics.record_dropped(dropped as u64);
                        tracing::debug!("Batch overflow, dropped {} samples", dropped);
                        return DrainOutcome::Overflow { dropped };
                    }
                }
                Err(TransportError::Timeout) => break,
                Err(TransportError::Closed) => return DrainOutcome::Closed,
                Err(e) => {
                    tracing::debug!("Wave subscription error: {}", e);
                    break;
                }
            }
        }

        DrainOutcome::Drained { received }
    }

    /// Decode, pack and broadcast the pending batch.
    ///
    /// Messages that fail to decode are skipped (the frame shrinks) and
    /// counted as dropped. Returns `None` when nothing was broadcast.
    pub async fn flush(&mut self) -> Option<FlushReport> {
        if self.pending.is_empty() {
            return None;
        }

        let mut values = Vec::with_capacity(self.pending.len());
        let mut malformed = 0;
        for raw in &self.pending {
            match decode_sample(raw) {
                Ok(v) => values.push(v),
                Err(e) => {
                    malformed += 1;
                    tracing::debug!("Skipping malformed wave message: {}", e);
                }
            }
        }
        self.pending.clear();

        if malformed > 0 {
            self.metrics.record_dropped(malformed as u64);
        }
        if values.is_empty() {
            return None;
        }

        let payload = pack_f32_le(&values);
        let report = self.hub.broadcast_binary(&payload).await;
        self.metrics.record_batch(values.len() as u64);

        Some(FlushReport {
            samples: values.len(),
            malformed,
            delivered: report.delivered,
        })
    }

    /// Drain/tick/flush until shutdown is signalled or the subscription closes.
    ///
    /// Returns within one interval of `shutdown` becoming `true`.
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let mut ticker = tokio::time::interval(self.config.interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately
        ticker.tick().await;

        tracing::info!(
            "Wave batcher started on {} (every {:?}, max {} samples)",
            self.sub.subject(),
            self.config.interval,
            self.config.max_batch
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let closed = self.drain().await == DrainOutcome::Closed;

            tokio::select! {
                _ = ticker.tick() => {}
                _ = shutdown.changed() => break,
            }

            self.flush().await;

            if closed {
                tracing::warn!("Wave subscription closed");
                break;
            }
        }

        tracing::info!("Wave batcher stopped");
    }
}

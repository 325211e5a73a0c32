//! Synthetic ECG source
//!
//! Publishes one wave message per simulated sample at the configured
//! sampling rate, numbered from zero.

use anyhow::{Context, Result};
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;
use tracing::{info, warn};
use vitalcast_signal::{EcgConfig, EcgSimulator};
use vitalcast_transport::{MessageBus, WaveMessage};

pub struct WaveProducer {
    bus: MessageBus,
    subject: String,
    simulator: EcgSimulator,
    seq: u64,
}

impl WaveProducer {
    pub fn new(bus: MessageBus, subject: &str, config: EcgConfig) -> Result<Self> {
        let simulator = EcgSimulator::new(config).context("Invalid producer configuration")?;

        Ok(Self {
            bus,
            subject: subject.to_string(),
            simulator,
            seq: 0,
        })
    }

    /// Next sequence number to be published
    pub fn seq(&self) -> u64 {
        self.seq
    }

    /// Generate the next sample message without publishing it
    pub fn next_message(&mut self) -> WaveMessage {
        let fs = self.simulator.config().sample_rate_hz;
        let v = self.simulator.next_sample();
        let msg = WaveMessage::new(&self.subject, self.seq, fs, v);
        self.seq += 1;
        msg
    }

    /// Generate and publish one sample
    pub fn publish_next(&mut self) -> Result<()> {
        let payload = self.next_message().to_bytes()?;
        self.bus.publish(&self.subject, payload)?;
        Ok(())
    }

    /// Publish at the sampling rate until shutdown
    pub async fn run(mut self, mut shutdown: watch::Receiver<bool>) {
        let config = self.simulator.config();
        let period = Duration::from_secs_f64(1.0 / config.sample_rate_hz);
        info!(
            "Wave producer started on {} ({} Hz, {} BPM)",
            self.subject, config.sample_rate_hz, config.heart_rate_bpm
        );

        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    if let Err(e) = self.publish_next() {
                        warn!("Failed to publish wave sample: {}", e);
                    }
                }
                _ = shutdown.changed() => break,
            }
        }

        info!("Wave producer stopped after {} samples", self.seq);
    }
}

//! Heart-rate processor
//!
//! Consumes the wave subject, runs every sample through a
//! [`HeartRateDetector`] and publishes one [`RateMessage`] per detection on
//! the params subject.
//!
//! Each processor times its samples on exactly one clock, chosen by the first
//! decodable message: the source clock (`seq / fs`) if that message carries
//! a usable stamp, otherwise time elapsed since the processor was created.

use anyhow::{Context, Result};
use std::time::Instant;
use tokio::sync::watch;
use tracing::{debug, info, warn};
use vitalcast_signal::{DetectorConfig, HeartRateDetector};
use vitalcast_transport::{MessageBus, RateMessage, Subscription, WaveMessage};

/// Time base for detector timestamps
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SampleClock {
    /// `seq / fs` from the message
    Stream,
    /// Elapsed time since the processor was created
    Wall,
}

pub struct RateProcessor {
    bus: MessageBus,
    params_subject: String,
    detector: HeartRateDetector,
    started: Instant,
    clock: Option<SampleClock>,
    detections: u64,
}

impl RateProcessor {
    pub fn new(bus: MessageBus, params_subject: &str, config: DetectorConfig) -> Result<Self> {
        let detector = HeartRateDetector::new(config).context("Invalid detector configuration")?;

        Ok(Self {
            bus,
            params_subject: params_subject.to_string(),
            detector,
            started: Instant::now(),
            clock: None,
            detections: 0,
        })
    }

    pub fn detections(&self) -> u64 {
        self.detections
    }

    /// Clock in use, `None` until the first sample is decoded
    pub fn clock(&self) -> Option<SampleClock> {
        self.clock
    }

    /// Feed one wave payload to the detector.
    ///
    /// Undecodable payloads are skipped. Once the stream clock is selected,
    /// samples without a usable `seq`/`fs` stamp are skipped too; on the wall
    /// clock any stamp is ignored.
    pub fn handle(&mut self, payload: &[u8]) -> Option<RateMessage> {
        let wave = match WaveMessage::from_bytes(payload) {
            Ok(wave) => wave,
            Err(e) => {
                debug!("Skipping undecodable wave message: {}", e);
                return None;
            }
        };

        let stamp = wave.stream_time();
        let clock = *self.clock.get_or_insert_with(|| {
            let clock = if stamp.is_some() { SampleClock::Stream } else { SampleClock::Wall };
            info!("Rate processor timing samples on the {:?} clock", clock);
            clock
        });

        let timestamp = match clock {
            SampleClock::Stream => match stamp {
                Some(t) => t,
                None => {
                    debug!("Skipping wave message without a usable seq/fs stamp");
                    return None;
                }
            },
            SampleClock::Wall => self.started.elapsed(),
        };

        let event = self.detector.process(wave.v, timestamp)?;
        self.detections += 1;

        let rate = RateMessage::new(&self.params_subject, event.bpm);
        match rate.to_bytes() {
            Ok(bytes) => {
                if let Err(e) = self.bus.publish(&self.params_subject, bytes) {
                    warn!("Failed to publish rate event: {}", e);
                }
            }
            Err(e) => warn!("Failed to encode rate event: {}", e),
        }

        debug!("Heart rate {} BPM at {:?}", event.bpm, event.timestamp);
        Some(rate)
    }

    /// Process the wave subscription until shutdown or until the bus closes
    pub async fn run(mut self, mut sub: Subscription, mut shutdown: watch::Receiver<bool>) {
        info!(
            "Rate processor started on {} -> {} (threshold {}, refractory {:?})",
            sub.subject(),
            self.params_subject,
            self.detector.threshold(),
            self.detector.refractory()
        );

        loop {
            tokio::select! {
                msg = sub.recv() => match msg {
                    Some(msg) => {
                        self.handle(&msg.data);
                    }
                    None => break,
                },
                _ = shutdown.changed() => break,
            }
        }

        info!("Rate processor stopped after {} detections", self.detections);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    const WAVE: &str = "ecg.wave";
    const PARAMS: &str = "ecg.params";

    fn wave(seq: u64, v: f32) -> Vec<u8> {
        WaveMessage::new(WAVE, seq, 250.0, v).to_bytes().unwrap()
    }

    #[tokio::test]
    async fn test_publishes_rate_per_detection() {
        let bus = MessageBus::new("test");
        let mut params = bus.subscribe_sync(PARAMS).unwrap();
        let mut processor = RateProcessor::new(bus.clone(), PARAMS, DetectorConfig::default()).unwrap();

        // Peaks at sample 0 and sample 250 (1s apart at 250 Hz)
        assert!(processor.handle(&wave(0, 0.0)).is_none());
        assert!(processor.handle(&wave(1, 1.0)).is_none());
        assert!(processor.handle(&wave(249, 0.0)).is_none());
        let rate = processor.handle(&wave(250, 1.0)).expect("second peak yields a rate");

        assert_eq!(rate.bpm, 60);
        assert_eq!(rate.subject, PARAMS);
        assert_eq!(processor.detections(), 1);

        let msg = params.try_next().expect("rate event published");
        let published = RateMessage::from_bytes(&msg.data).unwrap();
        assert_eq!(published, rate);
        assert!(params.try_next().is_none());
    }

    #[test]
    fn test_undecodable_payload_is_skipped() {
        let bus = MessageBus::new("test");
        let mut processor = RateProcessor::new(bus, PARAMS, DetectorConfig::default()).unwrap();

        assert!(processor.handle(b"not json").is_none());
        assert!(processor.handle(br#"{"seq":1}"#).is_none());
        assert_eq!(processor.detections(), 0);
    }

    #[test]
    fn test_out_of_range_stamp_does_not_panic() {
        let bus = MessageBus::new("test");
        let mut processor = RateProcessor::new(bus, PARAMS, DetectorConfig::default()).unwrap();

        assert!(processor.handle(br#"{"v":0.1,"seq":1,"fs":1e-300}"#).is_none());
        assert!(processor.handle(br#"{"v":0.1,"seq":18446744073709551615,"fs":1e-3}"#).is_none());
        assert_eq!(processor.clock(), Some(SampleClock::Wall));
    }

    #[test]
    fn test_stream_clock_skips_unstamped_samples() {
        let bus = MessageBus::new("test");
        let mut processor = RateProcessor::new(bus, PARAMS, DetectorConfig::default()).unwrap();

        assert!(processor.handle(&wave(0, 0.0)).is_none());
        assert_eq!(processor.clock(), Some(SampleClock::Stream));
        assert!(processor.handle(&wave(1, 1.0)).is_none());

        // Bare and badly stamped samples must not feed the detector
        assert!(processor.handle(br#"{"v":0.0}"#).is_none());
        assert!(processor.handle(br#"{"v":1.0}"#).is_none());
        assert!(processor.handle(br#"{"v":0.0,"seq":2,"fs":1e-300}"#).is_none());
        assert!(processor.handle(br#"{"v":1.0,"seq":3,"fs":1e-300}"#).is_none());
        assert_eq!(processor.detections(), 0);

        assert!(processor.handle(&wave(249, 0.0)).is_none());
        let rate = processor.handle(&wave(250, 1.0)).expect("stamped peak yields a rate");
        assert_eq!(rate.bpm, 60);
        assert_eq!(processor.clock(), Some(SampleClock::Stream));
    }

    #[test]
    fn test_wall_clock_ignores_later_stamps() {
        let bus = MessageBus::new("test");
        let mut processor = RateProcessor::new(bus, PARAMS, DetectorConfig::default()).unwrap();

        assert!(processor.handle(br#"{"v":0.0}"#).is_none());
        assert_eq!(processor.clock(), Some(SampleClock::Wall));

        // A stamp 1000s into the stream would otherwise make this a 0 BPM interval
        assert!(processor.handle(&wave(1, 1.0)).is_none());
        assert!(processor.handle(&wave(250_000, 0.0)).is_none());
        assert!(processor.handle(&wave(250_001, 1.0)).is_none());
        assert_eq!(processor.clock(), Some(SampleClock::Wall));
        assert_eq!(processor.detections(), 0);
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let bus = MessageBus::new("test");
        let config = DetectorConfig::default().refractory(Duration::ZERO);
        assert!(RateProcessor::new(bus, PARAMS, config).is_err());
    }
}

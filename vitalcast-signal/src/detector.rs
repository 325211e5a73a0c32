//! Online heart-rate detection from a normalized waveform stream
//!
//! The detector watches for upward threshold crossings, gates them with a
//! refractory period and turns the interval between consecutive peaks into
//! an instantaneous rate. It keeps three fields of state and never buffers
//! samples, so each call is O(1).

use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{Result, SignalError};

/// Detector configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectorConfig {
    /// Amplitude a sample must reach (from below) to count as a peak.
    /// Assumes a normalized input stream (R wave around 1.0).
    pub threshold: f32,

    /// Minimum time between two registered peaks, in milliseconds
    pub refractory_ms: u64,
}

impl Default for DetectorConfig {
    fn default() -> Self {
        Self {
            threshold: 0.6,
            refractory_ms: 200,
        }
    }
}

impl DetectorConfig {
    /// Set detection threshold
    pub fn threshold(mut self, threshold: f32) -> Self {
        self.threshold = threshold;
        self
    }

    /// Set refractory period.
    ///
    /// Stored in whole milliseconds; a sub-millisecond remainder rounds up,
    /// so any non-zero period stays non-zero.
    pub fn refractory(mut self, refractory: Duration) -> Self {
        self.refractory_ms = u64::try_from(refractory.as_micros().div_ceil(1000)).unwrap_or(u64::MAX);
        self
    }

    pub fn refractory_period(&self) -> Duration {
        Duration::from_millis(self.refractory_ms)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !self.threshold.is_finite() {
            return Err(SignalError::config("threshold must be a finite number"));
        }

        if self.refractory_ms == 0 {
            return Err(SignalError::config("refractory_ms must be positive"));
        }

        Ok(())
    }
}

/// Rate derived from two consecutive qualifying peaks
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateEvent {
    /// Stream time of the peak that closed the interval
    pub timestamp: Duration,
    /// floor(60 / rr seconds)
    pub bpm: u32,
}

/// Detector lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DetectorState {
    /// No sample seen yet
    Uninitialized,
    /// Has a previous sample; may or may not have a previous peak
    Armed,
}

/// Threshold-crossing heart-rate detector for one logical stream.
///
/// Timestamps are offsets on the stream's own monotonic clock. Callers must
/// not share one instance between streams.
#[derive(Debug, Clone)]
pub struct HeartRateDetector {
    threshold: f32,
    refractory: Duration,
    last_value: f32,
    last_peak: Option<Duration>,
    initialized: bool,
}

impl HeartRateDetector {
    /// Create a detector with validated configuration
    pub fn new(config: DetectorConfig) -> Result<Self> {
        config.validate()?;
        tracing::debug!(
            "Heart-rate detector: threshold {}, refractory {}ms",
            config.threshold,
            config.refractory_ms
        );

        Ok(Self {
            threshold: config.threshold,
            refractory: config.refractory_period(),
            last_value: 0.0,
            last_peak: None,
            initialized: false,
        })
    }

    /// Feed one sample.
    ///
    /// Returns a [`RateEvent`] when this sample is a rising edge through the
    /// threshold, lies outside the refractory window of the previous peak, and
    /// a previous peak exists to measure the interval from.
    ///
    /// ```
    /// use std::time::Duration;
    /// use vitalcast_signal::{DetectorConfig, HeartRateDetector};
    ///
    /// let mut hr = HeartRateDetector::new(DetectorConfig::default())?;
    /// let ms = Duration::from_millis;
    ///
    /// assert!(hr.process(0.0, ms(0)).is_none());
    /// assert!(hr.process(1.0, ms(10)).is_none()); // first peak
    /// assert!(hr.process(0.0, ms(20)).is_none());
    /// let event = hr.process(1.0, ms(510)).unwrap();
    /// assert_eq!(event.bpm, 120);
    /// # Ok::<(), vitalcast_signal::SignalError>(())
    /// ```
    pub fn process(&mut self, value: f32, timestamp: Duration) -> Option<RateEvent> {
        if !self.initialized {
            self.initialized = true;
            self.last_value = value;
            return None;
        }

        let mut event = None;

        if self.last_value < self.threshold && value >= self.threshold {
            match self.last_peak {
                None => self.last_peak = Some(timestamp),
                Some(last) => {
                    // A clock that runs backwards saturates to zero and never qualifies
                    let rr = timestamp.saturating_sub(last);
                    if rr > self.refractory {
                        let bpm = (60.0 / rr.as_secs_f64()).floor() as u32;
                        self.last_peak = Some(timestamp);
                        event = Some(RateEvent { timestamp, bpm });
                    }
                }
            }
        }

        self.last_value = value;
        event
    }

    /// Current lifecycle state
    pub fn state(&self) -> DetectorState {
        if self.initialized {
            DetectorState::Armed
        } else {
            DetectorState::Uninitialized
        }
    }

    /// Time of the last registered peak
    pub fn last_peak(&self) -> Option<Duration> {
        self.last_peak
    }

    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    pub fn refractory(&self) -> Duration {
        self.refractory
    }

    /// Forget all stream history, keeping configuration
    pub fn reset(&mut self) {
        self.last_value = 0.0;
        self.last_peak = None;
        self.initialized = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ms(v: u64) -> Duration {
        Duration::from_millis(v)
    }

    fn detector() -> HeartRateDetector {
        HeartRateDetector::new(DetectorConfig::default()).unwrap()
    }

    /// Drive a full crossing (below then at threshold) ending at `t`
    fn cross(hr: &mut HeartRateDetector, t: u64) -> Option<RateEvent> {
        hr.process(0.0, ms(t.saturating_sub(1)));
        hr.process(1.0, ms(t))
    }

    #[test]
    fn test_first_call_never_emits() {
        for value in [-1.0, 0.0, 0.6, 1.0, 5.0] {
            let mut hr = detector();
            assert!(hr.process(value, ms(0)).is_none());
            assert_eq!(hr.state(), DetectorState::Armed);
        }
    }

    #[test]
    fn test_first_sample_above_threshold_is_not_a_peak() {
        let mut hr = detector();
        hr.process(1.0, ms(0));
        hr.process(1.0, ms(10));
        assert_eq!(hr.last_peak(), None);
    }

    #[test]
    fn test_first_peak_records_time_without_event() {
        let mut hr = detector();
        hr.process(0.0, ms(0));
        assert!(hr.process(0.7, ms(4)).is_none());
        assert_eq!(hr.last_peak(), Some(ms(4)));
    }

    #[test]
    fn test_two_peaks_500ms_apart_is_120_bpm() {
        let mut hr = detector();
        hr.process(0.0, ms(0));
        assert!(hr.process(0.6, ms(0)).is_none());
        hr.process(0.1, ms(250));
        let event = hr.process(0.9, ms(500)).expect("second crossing should emit");
        assert_eq!(event.bpm, 120);
        assert_eq!(event.timestamp, ms(500));
        assert_eq!(hr.last_peak(), Some(ms(500)));
    }

    #[test]
    fn test_bpm_is_floored() {
        let mut hr = detector();
        hr.process(0.0, ms(0));
        cross(&mut hr, 1000);
        // 60 / 0.7s = 85.71
        let event = cross(&mut hr, 1700).unwrap();
        assert_eq!(event.bpm, 85);
        // 60 / 0.75s = 80 exactly
        let event = cross(&mut hr, 2450).unwrap();
        assert_eq!(event.bpm, 80);
    }

    #[test]
    fn test_crossing_inside_refractory_is_ignored() {
        let mut hr = detector();
        hr.process(0.0, ms(0));
        cross(&mut hr, 100);
        assert!(cross(&mut hr, 250).is_none());
        assert_eq!(hr.last_peak(), Some(ms(100)));

        // Exactly at the refractory boundary is still ignored
        assert!(cross(&mut hr, 300).is_none());
        assert_eq!(hr.last_peak(), Some(ms(100)));

        let event = cross(&mut hr, 1100).unwrap();
        assert_eq!(event.bpm, 60);
    }

    #[test]
    fn test_no_edge_while_staying_above_threshold() {
        let mut hr = detector();
        hr.process(0.0, ms(0));
        cross(&mut hr, 10);
        for t in (20..2000).step_by(10) {
            assert!(hr.process(0.9, ms(t)).is_none());
        }
        assert_eq!(hr.last_peak(), Some(ms(10)));
    }

    #[test]
    fn test_backwards_timestamp_never_qualifies() {
        let mut hr = detector();
        hr.process(0.0, ms(0));
        cross(&mut hr, 1000);
        assert!(cross(&mut hr, 500).is_none());
        assert_eq!(hr.last_peak(), Some(ms(1000)));
    }

    #[test]
    fn test_reset_returns_to_uninitialized() {
        let mut hr = detector();
        hr.process(0.0, ms(0));
        cross(&mut hr, 10);
        hr.reset();
        assert_eq!(hr.state(), DetectorState::Uninitialized);
        assert_eq!(hr.last_peak(), None);
        assert!(hr.process(1.0, ms(20)).is_none());
    }

    #[test]
    fn test_config_validation() {
        assert!(DetectorConfig::default().validate().is_ok());

        let config = DetectorConfig::default().threshold(f32::NAN);
        assert!(config.validate().is_err());

        let config = DetectorConfig::default().refractory(Duration::ZERO);
        assert!(config.validate().is_err());
        assert!(HeartRateDetector::new(config).is_err());
    }

    #[test]
    fn test_config_builder() {
        let config = DetectorConfig::default()
            .threshold(0.4)
            .refractory(ms(300));

        assert_eq!(config.threshold, 0.4);
        assert_eq!(config.refractory_period(), ms(300));

        let hr = HeartRateDetector::new(config).unwrap();
        assert_eq!(hr.threshold(), 0.4);
        assert_eq!(hr.refractory(), ms(300));
    }

    #[test]
    fn test_refractory_rounds_up_to_whole_milliseconds() {
        let config = DetectorConfig::default().refractory(Duration::from_micros(500));
        assert_eq!(config.refractory_ms, 1);
        assert!(config.validate().is_ok());

        let config = DetectorConfig::default().refractory(Duration::from_micros(200_400));
        assert_eq!(config.refractory_period(), Duration::from_millis(201));

        let config = DetectorConfig::default().refractory(Duration::from_millis(250));
        assert_eq!(config.refractory_ms, 250);
    }
}

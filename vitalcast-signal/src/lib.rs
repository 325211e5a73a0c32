//! Vitalcast signal processing
//!
//! Online heart-rate detection for normalized waveform streams, plus a
//! synthetic ECG source for demos and load tests.
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vitalcast_signal::{DetectorConfig, EcgConfig, EcgSimulator, HeartRateDetector};
//!
//! let ecg = EcgConfig::default();
//! let period = Duration::from_secs_f64(1.0 / ecg.sample_rate_hz);
//! let mut sim = EcgSimulator::new(ecg)?;
//! let mut hr = HeartRateDetector::new(DetectorConfig::default())?;
//!
//! let mut rates = Vec::new();
//! for n in 0..2500u32 {
//!     if let Some(event) = hr.process(sim.next_sample(), period * n) {
//!         rates.push(event.bpm);
//!     }
//! }
//! assert!(rates.iter().all(|bpm| (70..=73).contains(bpm)));
//! # Ok::<(), vitalcast_signal::SignalError>(())
//! ```

pub mod detector;
pub mod ecg;
pub mod error;

pub use detector::{DetectorConfig, DetectorState, HeartRateDetector, RateEvent};
pub use ecg::{EcgConfig, EcgSimulator};
pub use error::{Result, SignalError};

//! Synthetic ECG-like waveform source
//!
//! Not clinical. A slow baseline plus Gaussian P, QRS and T components placed
//! on a normalized cycle phase, with cheap deterministic noise on top.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

use crate::error::{Result, SignalError};

/// Simulator configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EcgConfig {
    /// Sampling rate in Hz
    pub sample_rate_hz: f64,

    /// Simulated heart rate in beats per minute (typical 60-120)
    pub heart_rate_bpm: f64,

    /// Noise amplitude (0.0-0.05 keeps the R wave well above threshold)
    pub noise: f64,
}

impl Default for EcgConfig {
    fn default() -> Self {
        Self {
            sample_rate_hz: 250.0,
            heart_rate_bpm: 72.0,
            noise: 0.02,
        }
    }
}

impl EcgConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        if !(self.sample_rate_hz.is_finite() && self.sample_rate_hz > 0.0) {
            return Err(SignalError::config("sample_rate_hz must be positive"));
        }

        if !(self.heart_rate_bpm.is_finite() && self.heart_rate_bpm > 0.0) {
            return Err(SignalError::config("heart_rate_bpm must be positive"));
        }

        // The phase step must stay below one cycle per sample
        if self.heart_rate_bpm / 60.0 >= self.sample_rate_hz {
            return Err(SignalError::config(
                "heart_rate_bpm is too high for the sampling rate",
            ));
        }

        if !(self.noise.is_finite() && self.noise >= 0.0) {
            return Err(SignalError::config("noise must be non-negative"));
        }

        Ok(())
    }
}

/// Stateful ECG generator; one call to [`EcgSimulator::next_sample`] per sample period
#[derive(Debug, Clone)]
pub struct EcgSimulator {
    config: EcgConfig,
    phase: f64,
}

impl EcgSimulator {
    pub fn new(config: EcgConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config, phase: 0.0 })
    }

    /// Advance one sample period and return the waveform value
    pub fn next_sample(&mut self) -> f32 {
        let cycle_hz = self.config.heart_rate_bpm / 60.0;
        self.phase += cycle_hz / self.config.sample_rate_hz;
        if self.phase >= 1.0 {
            self.phase -= 1.0;
        }

        let t = self.phase;

        let baseline = 0.05 * (2.0 * PI * 0.33 * t).sin();

        let p = 0.08 * gauss(t, 0.18, 0.03);
        let q = -0.12 * gauss(t, 0.30, 0.01);
        let r = 1.00 * gauss(t, 0.32, 0.008);
        let s = -0.25 * gauss(t, 0.35, 0.012);
        let tw = 0.25 * gauss(t, 0.60, 0.06);

        let noise = self.config.noise * (2.0 * fract((12345.678 * t).sin() * 9876.543) - 1.0);

        (baseline + p + q + r + s + tw + noise) as f32
    }

    /// Current cycle phase in [0, 1)
    pub fn phase(&self) -> f64 {
        self.phase
    }

    pub fn config(&self) -> &EcgConfig {
        &self.config
    }
}

fn gauss(x: f64, mu: f64, sigma: f64) -> f64 {
    let z = (x - mu) / sigma;
    (-0.5 * z * z).exp()
}

fn fract(x: f64) -> f64 {
    x - x.floor()
}

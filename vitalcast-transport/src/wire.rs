//! Payload formats
//!
//! Wave samples travel as one small JSON object per sample; rate events as
//! one JSON object per detection. Viewers receive wave batches as packed
//! little-endian `f32` with no header.

use serde::{Deserialize, Serialize};

use crate::error::{Result, TransportError};

/// One raw waveform sample as published on the wave subject
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct WaveMessage {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subject: Option<String>,

    /// Wall-clock publish time, unix milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ts: Option<i64>,

    /// Sample index since the source started
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seq: Option<u64>,

    /// Source sampling rate in Hz
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fs: Option<f64>,

    /// Sample value
    pub v: f32,
}

impl WaveMessage {
    /// Fully stamped message for `subject`
    pub fn new(subject: &str, seq: u64, fs: f64, v: f32) -> Self {
        Self {
            subject: Some(subject.to_string()),
            ts: Some(unix_millis()),
            seq: Some(seq),
            fs: Some(fs),
            v,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Position of this sample on the source clock, when both `seq` and `fs`
    /// are known and `seq / fs` fits in a `Duration`
    pub fn stream_time(&self) -> Option<std::time::Duration> {
        match (self.seq, self.fs) {
            (Some(seq), Some(fs)) if fs.is_finite() && fs > 0.0 => {
                std::time::Duration::try_from_secs_f64(seq as f64 / fs).ok()
            }
            _ => None,
        }
    }
}

#[derive(Deserialize)]
struct SampleOnly {
    v: f32,
}

/// Decode only the sample value of a wave message, ignoring metadata
pub fn decode_sample(bytes: &[u8]) -> Result<f32> {
    let sample: SampleOnly = serde_json::from_slice(bytes)?;
    Ok(sample.v)
}

/// Heart-rate event as published on the params subject and forwarded to viewers
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub struct RateMessage {
    pub subject: String,

    /// Wall-clock detection time, unix milliseconds
    #[serde(rename = "ts")]
    pub timestamp_ms: i64,

    #[serde(rename = "hr")]
    pub bpm: u32,
}

impl RateMessage {
    pub fn new(subject: &str, bpm: u32) -> Self {
        Self {
            subject: subject.to_string(),
            timestamp_ms: unix_millis(),
            bpm,
        }
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        Ok(serde_json::from_slice(bytes)?)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(self)?)
    }
}

/// Pack values as contiguous little-endian IEEE-754 `f32`
pub fn pack_f32_le(values: &[f32]) -> Vec<u8> {
    let mut out = Vec::with_capacity(values.len() * 4);
    for v in values {
        out.extend_from_slice(&v.to_le_bytes());
    }
    out
}

/// Inverse of [`pack_f32_le`]
pub fn unpack_f32_le(bytes: &[u8]) -> Result<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return Err(TransportError::Malformed(format!(
            "packed length {} is not a multiple of 4",
            bytes.len()
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Current wall-clock time in unix milliseconds
pub fn unix_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

//! Configuration management

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;
use vitalcast_broadcaster::BatcherConfig;
use vitalcast_signal::{DetectorConfig, EcgConfig};

/// Wave batching and viewer write settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatcherSection {
    /// Wave batch interval in milliseconds (~25 frames/s at 40)
    pub batch_ms: u64,

    /// Pending samples that trigger a whole-batch drop
    pub max_batch: usize,

    /// Per-message poll while draining, in microseconds
    pub poll_wait_us: u64,

    /// Deadline for a single viewer write, in milliseconds
    pub write_timeout_ms: u64,
}

impl Default for BatcherSection {
    fn default() -> Self {
        Self {
            batch_ms: 40,
            max_batch: 200,
            poll_wait_us: 500,
            write_timeout_ms: 200,
        }
    }
}

impl BatcherSection {
    pub fn to_batcher_config(&self) -> BatcherConfig {
        BatcherConfig {
            interval: Duration::from_millis(self.batch_ms),
            max_batch: self.max_batch,
            poll_wait: Duration::from_micros(self.poll_wait_us),
        }
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_millis(self.write_timeout_ms)
    }
}

/// Built-in synthetic sample source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ProducerSection {
    /// Publish simulated ECG on the wave subject
    pub enabled: bool,

    /// Sampling rate in Hz
    pub sample_rate_hz: f64,

    /// Simulated heart rate in BPM
    pub heart_rate_bpm: f64,

    /// Noise amplitude
    pub noise: f64,
}

impl Default for ProducerSection {
    fn default() -> Self {
        let ecg = EcgConfig::default();
        Self {
            enabled: true,
            sample_rate_hz: ecg.sample_rate_hz,
            heart_rate_bpm: ecg.heart_rate_bpm,
            noise: ecg.noise,
        }
    }
}

impl ProducerSection {
    pub fn to_ecg_config(&self) -> EcgConfig {
        EcgConfig {
            sample_rate_hz: self.sample_rate_hz,
            heart_rate_bpm: self.heart_rate_bpm,
            noise: self.noise,
        }
    }
}

/// Daemon configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Path to configuration file
    #[serde(skip)]
    pub config_path: PathBuf,

    /// TCP address viewers connect to
    pub listen_addr: String,

    /// Unix socket for control commands (None = runtime dir default)
    pub control_socket_path: Option<String>,

    /// Subject carrying one raw sample per message
    pub wave_subject: String,

    /// Subject carrying heart-rate events
    pub params_subject: String,

    /// Per-subscriber transport queue depth
    pub queue_capacity: usize,

    pub batcher: BatcherSection,

    pub detector: DetectorConfig,

    pub producer: ProducerSection,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_path: Self::default_config_path(),
            listen_addr: "0.0.0.0:8080".to_string(),
            control_socket_path: None,
            wave_subject: "ecg.wave".to_string(),
            params_subject: "ecg.params".to_string(),
            queue_capacity: vitalcast_transport::DEFAULT_QUEUE_CAPACITY,
            batcher: BatcherSection::default(),
            detector: DetectorConfig::default(),
            producer: ProducerSection::default(),
        }
    }
}

impl DaemonConfig {
    /// Load configuration from the default location, or create it
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::default_config_path())
    }

    /// Load configuration from `path`, writing defaults there if it does not exist
    pub fn load_from(path: &Path) -> Result<Self> {
        if path.exists() {
            let contents = std::fs::read_to_string(path)
                .context("Failed to read config file")?;

            let mut config: DaemonConfig = toml::from_str(&contents)
                .context("Failed to parse config file")?;

            config.config_path = path.to_path_buf();
            Ok(config)
        } else {
            let config = Self {
                config_path: path.to_path_buf(),
                ..Self::default()
            };
            config.save()
                .context("Failed to save default config")?;
            Ok(config)
        }
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.config_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create config directory")?;
        }

        let contents = toml::to_string_pretty(self)
            .context("Failed to serialize config")?;

        std::fs::write(&self.config_path, contents)
            .context("Failed to write config file")?;

        Ok(())
    }

    /// Check every section before anything is started
    pub fn validate(&self) -> Result<()> {
        self.listen_addr
            .parse::<SocketAddr>()
            .with_context(|| format!("Invalid listen_addr {:?}", self.listen_addr))?;

        for subject in [&self.wave_subject, &self.params_subject] {
            if subject.is_empty() || subject.chars().any(char::is_whitespace) {
                bail!("Invalid subject {:?}", subject);
            }
        }
        if self.wave_subject == self.params_subject {
            bail!("wave_subject and params_subject must differ");
        }

        if self.queue_capacity == 0 {
            bail!("queue_capacity must be positive");
        }

        if self.batcher.write_timeout_ms == 0 {
            bail!("write_timeout_ms must be positive");
        }

        self.batcher
            .to_batcher_config()
            .validate()
            .context("Invalid [batcher] section")?;

        self.detector
            .validate()
            .context("Invalid [detector] section")?;

        if self.producer.enabled {
            self.producer
                .to_ecg_config()
                .validate()
                .context("Invalid [producer] section")?;
        }

        Ok(())
    }

    /// Get default config path
    fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("vitalcast")
            .join("config.toml")
    }
}

//! Vitalcast daemon library
//!
//! Wires the transport bus, heart-rate processor, synthetic producer and
//! viewer broadcaster into one process, plus the TOML configuration and the
//! Unix control socket. The binary in `main.rs` is a thin shell around
//! [`Daemon`].

pub mod config;
pub mod daemon;
pub mod ipc;
pub mod processor;
pub mod producer;
pub mod socket_utils;

pub use config::DaemonConfig;
pub use daemon::Daemon;
pub use ipc::{ControlCommand, ControlServer, ControlState};
pub use processor::{RateProcessor, SampleClock};
pub use producer::WaveProducer;

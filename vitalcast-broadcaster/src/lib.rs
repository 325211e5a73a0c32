//! Real-time fan-out gateway for Vitalcast viewers
//!
//! This crate redistributes the raw waveform and the derived heart-rate
//! events to any number of live viewer connections. It manages concurrent
//! clients, self-evicts slow or dead ones, and paces wave traffic through a
//! fixed-cadence batcher.
//!
//! # Features
//!
//! - TCP viewer server with `[kind][len][payload]` framing
//! - Thread-safe client registry with snapshot-before-write broadcasting
//! - Per-write deadline (200ms default); failures close and evict the viewer
//! - Wave batcher: packed little-endian `f32` frames every 40ms, whole-batch
//!   drop on overload
//! - Rate events relayed to viewers byte for byte as text frames
//!
//! # Example Usage
//!
//! ```no_run
//! use std::sync::Arc;
//! use vitalcast_broadcaster::{relay_text, BatcherConfig, Hub, SampleBatcher, ViewerServer};
//! use vitalcast_metrics::StreamMetrics;
//! use vitalcast_transport::MessageBus;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let bus = MessageBus::new("vitalcast");
//!     let metrics = Arc::new(StreamMetrics::new());
//!     let hub = Arc::new(Hub::new(metrics.clone(), vitalcast_broadcaster::DEFAULT_WRITE_TIMEOUT));
//!     let (shutdown_tx, shutdown_rx) = tokio::sync::watch::channel(false);
//!
//!     let batcher = SampleBatcher::new(
//!         bus.subscribe_sync("ecg.wave")?,
//!         hub.clone(),
//!         metrics.clone(),
//!         BatcherConfig::default(),
//!     )?;
//!     tokio::spawn(batcher.run(shutdown_rx.clone()));
//!     tokio::spawn(relay_text(bus.subscribe_sync("ecg.params")?, hub.clone(), shutdown_rx.clone()));
//!
//!     let server = ViewerServer::bind("0.0.0.0:8080", hub.clone()).await?;
//!     tokio::spawn(server.run(shutdown_rx));
//!
//!     tokio::signal::ctrl_c().await?;
//!     shutdown_tx.send(true)?;
//!     hub.close_all().await;
//!     Ok(())
//! }
//! ```

pub mod batcher;
pub mod error;
pub mod frame;
pub mod hub;
pub mod relay;
pub mod server;
pub mod sink;

// Re-exports
pub use batcher::{BatcherConfig, DrainOutcome, FlushReport, SampleBatcher};
pub use error::{BroadcasterError, Result};
pub use frame::{read_frame, MessageKind};
pub use hub::{BroadcastReport, Hub, DEFAULT_WRITE_TIMEOUT};
pub use relay::relay_text;
pub use server::ViewerServer;
pub use sink::{next_sink_id, Sink, SinkId, StreamSink, TcpSink};

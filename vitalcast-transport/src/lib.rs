//! Publish/subscribe transport for Vitalcast
//!
//! A subject-keyed, at-most-once message bus that connects the sample
//! source, the heart-rate processor and the fan-out gateway inside one
//! process, plus the JSON and packed-binary payload formats they exchange.
//!
//! # Delivery semantics
//!
//! - `publish` never blocks; every subscriber has a bounded queue
//! - A full queue drops the message for that subscriber only
//! - No ordering guarantee across subjects, no acknowledgment, no replay
//!
//! # Example
//!
//! ```
//! use std::time::Duration;
//! use vitalcast_transport::{MessageBus, WaveMessage};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> vitalcast_transport::Result<()> {
//! let bus = MessageBus::new("example");
//! let mut sub = bus.subscribe_sync("ecg.wave")?;
//!
//! let payload = WaveMessage::new("ecg.wave", 0, 250.0, 0.42).to_bytes()?;
//! bus.publish("ecg.wave", payload)?;
//!
//! let msg = sub.next_msg(Duration::from_millis(10)).await?;
//! assert_eq!(vitalcast_transport::decode_sample(&msg.data)?, 0.42);
//! # Ok(())
//! # }
//! ```

pub mod bus;
pub mod error;
pub mod wire;

// Re-exports
pub use bus::{Message, MessageBus, Subscription, DEFAULT_QUEUE_CAPACITY};
pub use error::{Result, TransportError};
pub use wire::{decode_sample, pack_f32_le, unix_millis, unpack_f32_le, RateMessage, WaveMessage};

//! Vitalcast Metrics
//!
//! Lock-free counters for the fan-out gateway. A single [`StreamMetrics`]
//! collector is created by the daemon and shared (`Arc`) with every stage
//! that reports into it; readers take a [`MetricsSnapshot`] without ever
//! blocking the writers.

pub mod collector;
pub mod models;

// Re-export main types
pub use collector::StreamMetrics;
pub use models::MetricsSnapshot;

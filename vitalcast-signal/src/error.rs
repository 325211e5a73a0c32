//! Error types for signal processing

use thiserror::Error;

/// Result type for signal operations
pub type Result<T> = std::result::Result<T, SignalError>;

/// Signal error types
#[derive(Error, Debug)]
pub enum SignalError {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),
}

impl SignalError {
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }
}

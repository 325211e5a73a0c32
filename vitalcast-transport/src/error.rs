use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransportError {
    #[error("Timed out waiting for message")]
    Timeout,

    #[error("Subscription closed")]
    Closed,

    #[error("Invalid subject: {0:?}")]
    InvalidSubject(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Malformed payload: {0}")]
    Malformed(String),
}

pub type Result<T> = std::result::Result<T, TransportError>;

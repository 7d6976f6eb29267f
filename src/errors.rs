//! Synchronization Engine Error Hierarchy
//!
//! Defines error types for the configuration synchronization client,
//! categorized by subsystem. Nothing in here is fatal to the process: the
//! engine recovers every error class locally (retry, disk fallback, or
//! caller-supplied default).

use std::time::Duration;

use config::ConfigError;

#[doc(hidden)]
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Remote configuration service communication failures
    #[error(transparent)]
    Network(#[from] NetworkError),

    /// Local fallback store failures
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Settings loading or validation failures
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// Engine lifecycle misuse
    #[error("Engine failed to start: {0}")]
    StartFailed(String),
}

#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    /// Connect/transport-level failure; the remote service is unreachable
    #[error(transparent)]
    Transport(#[from] Box<reqwest::Error>),

    /// Non-2xx, non-304 response
    #[error("Server returned status {status}")]
    Server { status: u16 },

    /// Malformed response body
    #[error("Malformed response body: {0}")]
    Decode(String),

    /// Single operation exceeded its deadline
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    /// Retry policy exhaustion
    #[error("Retry budget exhausted after {0} attempts")]
    RetryExhausted(usize),
}

impl NetworkError {
    /// Connectivity-class failures switch the engine over to the disk
    /// fallback store; server-side and decode failures only back off.
    pub fn is_connectivity(&self) -> bool {
        matches!(self, NetworkError::Transport(_) | NetworkError::Timeout(_))
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// Disk I/O failures during record reads/writes
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// Serialization failures for persisted records
    #[error(transparent)]
    Serialization(#[from] bincode::Error),
}

// ============== Conversion Implementations ============== //
impl From<reqwest::Error> for NetworkError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_decode() {
            NetworkError::Decode(e.to_string())
        } else {
            NetworkError::Transport(Box::new(e))
        }
    }
}

impl From<reqwest::Error> for Error {
    fn from(e: reqwest::Error) -> Self {
        NetworkError::from(e).into()
    }
}

impl From<bincode::Error> for Error {
    fn from(e: bincode::Error) -> Self {
        Error::Storage(StorageError::Serialization(e))
    }
}

impl From<std::io::Error> for Error {
    fn from(e: std::io::Error) -> Self {
        Error::Storage(StorageError::Io(e))
    }
}

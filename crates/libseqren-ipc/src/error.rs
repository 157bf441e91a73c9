//! IPC error types

use std::io::ErrorKind;

use thiserror::Error;

/// Errors that can occur during IPC operations
#[derive(Error, Debug)]
pub enum IpcError {
    /// Nothing is listening at the endpoint yet
    #[error("Endpoint not found: {0}")]
    NotFound(String),

    /// The server is servicing another connection
    #[error("Endpoint busy: {0}")]
    Busy(String),

    /// Connection failed for a non-transient reason
    #[error("Connection failed: {0}")]
    ConnectionFailed(String),

    /// Encoded message exceeds the maximum payload size
    #[error("Payload of {size} bytes exceeds limit of {limit} bytes")]
    PayloadTooLarge { size: usize, limit: usize },

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// Deserialization error
    #[error("Deserialization error: {0}")]
    Deserialization(String),

    /// Protocol version mismatch
    #[error("Protocol version mismatch: expected {expected}, got {actual}")]
    VersionMismatch { expected: u32, actual: u32 },

    /// Server closed the connection without accepting the batch
    #[error("Server did not acknowledge the message")]
    NotAcknowledged,

    /// Request timed out
    #[error("Timed out after {0}ms")]
    Timeout(u64),

    /// Leadership lock is held by another process
    #[error("Leadership lock held by another process")]
    LockHeld,

    /// Operation needs the leadership lock, but this handle does not hold it
    #[error("Leadership lock not held by this handle")]
    NotOwner,

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl IpcError {
    /// Classify a connect error into not-found, busy, or fatal
    pub fn from_connect(endpoint: &str, e: std::io::Error) -> Self {
        match e.kind() {
            // A stale socket file with no listener refuses connections
            ErrorKind::NotFound | ErrorKind::ConnectionRefused => {
                IpcError::NotFound(endpoint.to_string())
            }
            ErrorKind::WouldBlock => IpcError::Busy(endpoint.to_string()),
            _ if is_pipe_busy(&e) => IpcError::Busy(endpoint.to_string()),
            _ => IpcError::ConnectionFailed(format!("{}: {}", endpoint, e)),
        }
    }

    /// Whether the client should retry after this error
    pub fn is_transient(&self) -> bool {
        matches!(self, IpcError::NotFound(_) | IpcError::Busy(_))
    }
}

#[cfg(windows)]
fn is_pipe_busy(e: &std::io::Error) -> bool {
    const ERROR_PIPE_BUSY: i32 = 231;
    e.raw_os_error() == Some(ERROR_PIPE_BUSY)
}

#[cfg(not(windows))]
fn is_pipe_busy(e: &std::io::Error) -> bool {
    e.raw_os_error() == Some(libc::EAGAIN)
}

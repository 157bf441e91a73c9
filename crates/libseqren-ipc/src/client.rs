//! Channel client used by followers to forward their paths

use std::time::Duration;

use tokio::io::AsyncReadExt;
use tracing::{debug, warn};

use crate::endpoint::Endpoint;
use crate::error::IpcError;
use crate::messages::{write_frame, PathBatch};
use crate::transport;
use crate::{ACK_BYTE, ACK_TIMEOUT_MS, BUSY_WAIT_MS, DEFAULT_RETRIES, NOT_FOUND_DELAY_MS};

/// Client side of the message channel
#[derive(Debug, Clone)]
pub struct ChannelClient {
    endpoint: Endpoint,
    retries: u32,
}

impl ChannelClient {
    /// Client for the given endpoint with the default retry budget
    pub fn new(endpoint: Endpoint) -> Self {
        Self {
            endpoint,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Set the number of connect attempts
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries.max(1);
        self
    }

    /// Get the endpoint this client sends to
    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// Get the configured number of attempts
    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Send one batch of paths; `true` once the server has accepted it
    pub async fn send(&self, paths: &[String]) -> bool {
        match self.send_with_retry(paths).await {
            Ok(()) => true,
            Err(e) => {
                warn!(endpoint = %self.endpoint, count = paths.len(), "Failed to forward paths: {}", e);
                false
            }
        }
    }

    /// Send one batch, retrying while the endpoint is missing or busy.
    ///
    /// Every retry starts over with a fresh connection; once connected, any
    /// failure is final.
    pub async fn send_with_retry(&self, paths: &[String]) -> Result<(), IpcError> {
        let payload = PathBatch::new(paths.to_vec()).encode()?;
        let mut last_error = None;

        for attempt in 1..=self.retries {
            match self.send_once(&payload).await {
                Ok(()) => {
                    debug!(attempt, count = paths.len(), "Paths forwarded");
                    return Ok(());
                }
                Err(e) if e.is_transient() => {
                    debug!(attempt, "Endpoint unavailable: {}", e);
                    if attempt < self.retries {
                        let delay = match e {
                            IpcError::Busy(_) => BUSY_WAIT_MS,
                            _ => NOT_FOUND_DELAY_MS,
                        };
                        tokio::time::sleep(Duration::from_millis(delay)).await;
                    }
                    last_error = Some(e);
                }
                Err(e) => return Err(e),
            }
        }

        Err(last_error.unwrap_or_else(|| IpcError::NotFound(self.endpoint.to_string())))
    }

    async fn send_once(&self, payload: &[u8]) -> Result<(), IpcError> {
        let mut conn = transport::connect(&self.endpoint)
            .await
            .map_err(|e| IpcError::from_connect(self.endpoint.address(), e))?;

        write_frame(&mut conn, payload).await?;

        let ack = tokio::time::timeout(
            Duration::from_millis(ACK_TIMEOUT_MS),
            conn.read_u8(),
        )
        .await
        .map_err(|_| IpcError::Timeout(ACK_TIMEOUT_MS))?;

        match ack {
            Ok(ACK_BYTE) => Ok(()),
            Ok(_) => Err(IpcError::NotAcknowledged),
            Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => Err(IpcError::NotAcknowledged),
            Err(e) => Err(IpcError::Io(e)),
        }
    }
}

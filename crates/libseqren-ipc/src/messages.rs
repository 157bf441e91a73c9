//! Path batch wire format
//!
//! A message is one rkyv-serialized `PathBatch` preceded by its length as a
//! big-endian u32. The encoded batch never exceeds `MAX_PAYLOAD_BYTES`.

use rkyv::util::AlignedVec;
use rkyv::{Archive, Deserialize, Serialize};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::IpcError;
use crate::{IPC_SCHEMA_VERSION, MAX_PAYLOAD_BYTES};

/// Ordered batch of absolute file paths forwarded by one process
#[derive(Archive, Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
#[rkyv(derive(Debug))]
pub struct PathBatch {
    /// Schema version for compatibility checking
    pub ipc_schema_version: u32,
    /// Sender process ID, for logging only
    pub sender_pid: u32,
    /// Paths in the order the sender received them
    pub paths: Vec<String>,
}

impl PathBatch {
    /// Create a batch from the current process with the current schema version
    pub fn new(paths: Vec<String>) -> Self {
        Self {
            ipc_schema_version: IPC_SCHEMA_VERSION,
            sender_pid: std::process::id(),
            paths,
        }
    }

    /// Serialize to the payload bytes (without the length prefix)
    pub fn encode(&self) -> Result<Vec<u8>, IpcError> {
        let bytes = rkyv::to_bytes::<rkyv::rancor::Error>(self)
            .map_err(|e| IpcError::Serialization(e.to_string()))?;
        if bytes.len() > MAX_PAYLOAD_BYTES {
            return Err(IpcError::PayloadTooLarge {
                size: bytes.len(),
                limit: MAX_PAYLOAD_BYTES,
            });
        }
        Ok(bytes.to_vec())
    }

    /// Deserialize payload bytes, validating the archive and schema version
    pub fn decode(payload: &[u8]) -> Result<Self, IpcError> {
        // rkyv needs the archive aligned; frames read off a stream are not
        let mut aligned = AlignedVec::<16>::with_capacity(payload.len());
        aligned.extend_from_slice(payload);

        let archived = rkyv::access::<ArchivedPathBatch, rkyv::rancor::Error>(&aligned)
            .map_err(|e| IpcError::Deserialization(e.to_string()))?;

        let actual_version = archived.ipc_schema_version.to_native();
        if actual_version != IPC_SCHEMA_VERSION {
            return Err(IpcError::VersionMismatch {
                expected: IPC_SCHEMA_VERSION,
                actual: actual_version,
            });
        }

        rkyv::deserialize::<PathBatch, rkyv::rancor::Error>(archived)
            .map_err(|e| IpcError::Deserialization(e.to_string()))
    }
}

/// Write one length-prefixed payload
pub async fn write_frame<W>(writer: &mut W, payload: &[u8]) -> Result<(), IpcError>
where
    W: AsyncWrite + Unpin,
{
    if payload.len() > MAX_PAYLOAD_BYTES {
        return Err(IpcError::PayloadTooLarge {
            size: payload.len(),
            limit: MAX_PAYLOAD_BYTES,
        });
    }
    // Build the frame first so it goes out in a single write
    let mut frame = Vec::with_capacity(4 + payload.len());
    frame.extend_from_slice(&(payload.len() as u32).to_be_bytes());
    frame.extend_from_slice(payload);
    writer.write_all(&frame).await?;
    writer.flush().await?;
    Ok(())
}

/// Read one length-prefixed payload, refusing anything over the limit
pub async fn read_frame<R>(reader: &mut R) -> Result<Vec<u8>, IpcError>
where
    R: AsyncRead + Unpin,
{
    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes).await?;
    let len = u32::from_be_bytes(len_bytes) as usize;
    if len > MAX_PAYLOAD_BYTES {
        return Err(IpcError::PayloadTooLarge {
            size: len,
            limit: MAX_PAYLOAD_BYTES,
        });
    }

    let mut payload = vec![0u8; len];
    reader.read_exact(&mut payload).await?;
    Ok(payload)
}

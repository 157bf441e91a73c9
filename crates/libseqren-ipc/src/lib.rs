//! Leadership and messaging for seqren processes
//!
//! This crate provides:
//! - The well-known local endpoint shared by all cooperating processes (Endpoint)
//! - The system-wide leadership lock (LeaderLock)
//! - The path batch wire format (PathBatch)
//! - The channel client used by followers (ChannelClient)
//! - The channel server run by the leader (ChannelServer)

pub mod client;
pub mod endpoint;
pub mod error;
pub mod lock;
pub mod messages;
pub mod server;
mod transport;

pub use client::ChannelClient;
pub use endpoint::Endpoint;
pub use error::IpcError;
pub use lock::{LeaderInfo, LeaderLock};
pub use messages::PathBatch;
pub use server::{ChannelServer, ServerHandle};

/// Current IPC schema version
pub const IPC_SCHEMA_VERSION: u32 = 1;

/// Maximum encoded size of one message
pub const MAX_PAYLOAD_BYTES: usize = 64 * 1024;

/// Byte the server writes once a batch has been accepted
pub const ACK_BYTE: u8 = 0x06;

/// Default number of connect attempts
pub const DEFAULT_RETRIES: u32 = 10;

/// Delay before retrying when no server is listening yet
pub const NOT_FOUND_DELAY_MS: u64 = 10;

/// Bounded wait before retrying when the server is busy
pub const BUSY_WAIT_MS: u64 = 50;

/// Backoff before the server retries creating its endpoint
pub const BIND_BACKOFF_MS: u64 = 50;

/// Time a client waits for the server's acknowledgement
pub const ACK_TIMEOUT_MS: u64 = 5_000;

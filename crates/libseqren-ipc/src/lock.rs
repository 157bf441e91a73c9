//! Leadership lock
//!
//! Exactly one process at a time holds an exclusive OS file lock on the
//! well-known lock file. The OS drops the lock when the holder exits, so a
//! crashed leader never blocks the next launch.

use std::fs::{File, OpenOptions};
use std::io::{Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

use fs2::FileExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::IpcError;

/// Diagnostic record written into the lock file by the current leader
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeaderInfo {
    /// Process ID of the leader
    pub pid: u32,
    /// When leadership was taken (Unix timestamp in ms)
    pub started_ts: u64,
    /// Channel address the leader serves
    pub endpoint: String,
}

impl LeaderInfo {
    /// Describe the current process as leader of `endpoint`
    pub fn current(endpoint: &str) -> Self {
        Self {
            pid: std::process::id(),
            started_ts: current_time_ms(),
            endpoint: endpoint.to_string(),
        }
    }
}

/// Handle on the system-wide leadership lock
#[derive(Debug)]
pub struct LeaderLock {
    path: PathBuf,
    /// Lock file handle - lock released on drop
    file: Option<File>,
}

impl LeaderLock {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            file: None,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether this handle currently owns the lock
    pub fn is_held(&self) -> bool {
        self.file.is_some()
    }

    /// Try to become leader without waiting.
    ///
    /// Any platform error counts as "not leader": a launch that cannot
    /// determine leadership falls back to forwarding its files.
    pub fn acquire(&mut self) -> bool {
        match self.try_acquire() {
            Ok(()) => true,
            Err(IpcError::LockHeld) => {
                debug!(path = %self.path.display(), "Leadership held elsewhere");
                false
            }
            Err(e) => {
                warn!(path = %self.path.display(), "Leadership check failed, acting as follower: {}", e);
                false
            }
        }
    }

    /// Try to take the lock, reporting why it failed
    pub fn try_acquire(&mut self) -> Result<(), IpcError> {
        if self.file.is_some() {
            return Ok(());
        }

        // No truncate here: the current holder's info must survive our open
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(&self.path)?;

        file.try_lock_exclusive().map_err(|e| {
            if is_contended(&e) {
                IpcError::LockHeld
            } else {
                IpcError::Io(e)
            }
        })?;

        debug!(path = %self.path.display(), "Leadership acquired");
        self.file = Some(file);
        Ok(())
    }

    /// Record leader details in the lock file
    pub fn write_info(&mut self, info: &LeaderInfo) -> Result<(), IpcError> {
        let Some(file) = self.file.as_mut() else {
            return Err(IpcError::NotOwner);
        };
        let contents = serde_json::to_vec_pretty(info)?;
        file.set_len(0)?;
        file.seek(SeekFrom::Start(0))?;
        file.write_all(&contents)?;
        file.flush()?;
        Ok(())
    }

    /// Read the leader details from a lock file, if any were written
    pub fn read_info(path: &Path) -> Result<Option<LeaderInfo>, IpcError> {
        if !path.exists() {
            return Ok(None);
        }
        let mut contents = String::new();
        File::open(path)?.read_to_string(&mut contents)?;
        if contents.trim().is_empty() {
            return Ok(None);
        }
        let info: LeaderInfo = serde_json::from_str(&contents)?;
        Ok(Some(info))
    }

    /// Give up leadership. Idempotent, and a no-op if never acquired.
    ///
    /// The file itself stays: unlinking it would let a later launch lock a
    /// fresh inode while a waiter still holds the old one.
    pub fn release(&mut self) {
        if let Some(file) = self.file.take() {
            let _ = file.set_len(0);
            if let Err(e) = FileExt::unlock(&file) {
                debug!(path = %self.path.display(), "Unlock failed (released on close): {}", e);
            }
            debug!(path = %self.path.display(), "Leadership released");
        }
    }
}

impl Drop for LeaderLock {
    fn drop(&mut self) {
        self.release();
    }
}

fn is_contended(e: &std::io::Error) -> bool {
    e.kind() == std::io::ErrorKind::WouldBlock
        || e.raw_os_error() == fs2::lock_contended_error().raw_os_error()
}

/// Get current time in milliseconds since Unix epoch
fn current_time_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis() as u64)
        .unwrap_or_default()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_first_acquire_creates_lock() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seqren.lock");

        let mut lock = LeaderLock::new(&path);
        assert!(lock.acquire());
        assert!(lock.is_held());
        assert!(path.exists());
    }

    #[test]
    fn test_second_handle_is_follower() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seqren.lock");

        let mut leader = LeaderLock::new(&path);
        let mut follower = LeaderLock::new(&path);

        assert!(leader.acquire());
        assert!(!follower.acquire());
        assert!(matches!(follower.try_acquire(), Err(IpcError::LockHeld)));
    }

    #[test]
    fn test_release_hands_over() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seqren.lock");

        let mut first = LeaderLock::new(&path);
        let mut second = LeaderLock::new(&path);

        assert!(first.acquire());
        first.release();
        first.release();
        assert!(!first.is_held());
        assert!(second.acquire());
    }

    #[test]
    fn test_drop_releases() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seqren.lock");

        {
            let mut scoped = LeaderLock::new(&path);
            assert!(scoped.acquire());
        }

        let mut next = LeaderLock::new(&path);
        assert!(next.acquire());
    }

    #[test]
    fn test_release_without_acquire() {
        let temp = TempDir::new().unwrap();
        let mut lock = LeaderLock::new(temp.path().join("never.lock"));
        lock.release();
        assert!(!lock.is_held());
    }

    #[test]
    fn test_unusable_path_fails_safe() {
        let temp = TempDir::new().unwrap();
        let mut lock = LeaderLock::new(temp.path().join("missing-dir").join("seqren.lock"));
        assert!(!lock.acquire());
        assert!(matches!(lock.try_acquire(), Err(IpcError::Io(_))));
    }

    // flock is advisory on Unix, so the file stays readable while held
    #[cfg(unix)]
    #[test]
    fn test_info_roundtrip() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("seqren.lock");

        let mut lock = LeaderLock::new(&path);
        assert!(lock.acquire());
        let info = LeaderInfo::current("/tmp/seqren.sock");
        lock.write_info(&info).unwrap();

        let read = LeaderLock::read_info(&path).unwrap().unwrap();
        assert_eq!(read, info);
        assert_eq!(read.pid, std::process::id());

        lock.release();
        assert!(LeaderLock::read_info(&path).unwrap().is_none());
    }

    #[test]
    fn test_write_info_requires_ownership() {
        let temp = TempDir::new().unwrap();
        let mut lock = LeaderLock::new(temp.path().join("seqren.lock"));
        let info = LeaderInfo::current("ep");
        assert!(matches!(lock.write_info(&info), Err(IpcError::NotOwner)));

        assert!(lock.acquire());
        assert!(lock.write_info(&info).is_ok());
        lock.release();
        assert!(matches!(lock.write_info(&info), Err(IpcError::NotOwner)));
    }
}

//! Well-known rendezvous points shared by all seqren processes
//!
//! Every process derives the same lock file and channel address from the
//! runtime directory, so any launch can find the current leader without
//! prior coordination.

use std::path::{Path, PathBuf};

/// Overrides the runtime directory (isolated sessions, tests)
pub const RUNTIME_DIR_ENV: &str = "SEQREN_RUNTIME_DIR";

const LOCK_FILE_NAME: &str = "seqren.lock";

#[cfg(unix)]
const SOCKET_FILE_NAME: &str = "seqren.sock";

#[cfg(windows)]
const DEFAULT_PIPE_NAME: &str = r"\\.\pipe\seqren";

/// Lock file and channel address used by one group of cooperating processes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Endpoint {
    lock_path: PathBuf,
    address: String,
}

impl Endpoint {
    /// The endpoint every launch uses unless `$SEQREN_RUNTIME_DIR` says otherwise
    pub fn default_for_user() -> Self {
        if let Some(dir) = std::env::var_os(RUNTIME_DIR_ENV) {
            return Self::in_dir(PathBuf::from(dir));
        }

        #[cfg(windows)]
        {
            Self {
                lock_path: std::env::temp_dir().join(LOCK_FILE_NAME),
                address: DEFAULT_PIPE_NAME.to_string(),
            }
        }

        #[cfg(not(windows))]
        {
            Self::in_dir(default_runtime_dir())
        }
    }

    /// Endpoint rooted in an explicit directory
    pub fn in_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();

        #[cfg(unix)]
        let address = dir.join(SOCKET_FILE_NAME).to_string_lossy().to_string();

        #[cfg(windows)]
        let address = format!(r"{}-{:016x}", DEFAULT_PIPE_NAME, dir_hash(dir));

        Self {
            lock_path: dir.join(LOCK_FILE_NAME),
            address,
        }
    }

    /// Path of the leadership lock file
    pub fn lock_path(&self) -> &Path {
        &self.lock_path
    }

    /// Socket path (Unix) or pipe name (Windows)
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Create the directory holding the lock file (and socket)
    pub fn ensure_dir(&self) -> std::io::Result<()> {
        let Some(dir) = self.lock_path.parent() else {
            return Ok(());
        };
        if dir.exists() {
            return Ok(());
        }

        #[cfg(unix)]
        {
            use std::os::unix::fs::DirBuilderExt;
            std::fs::DirBuilder::new()
                .recursive(true)
                .mode(0o700)
                .create(dir)
        }

        #[cfg(not(unix))]
        {
            std::fs::create_dir_all(dir)
        }
    }
}

impl std::fmt::Display for Endpoint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.address)
    }
}

/// Per-user runtime directory.
/// Prefers XDG_RUNTIME_DIR, which is already private to the user.
#[cfg(not(windows))]
fn default_runtime_dir() -> PathBuf {
    if let Some(runtime_dir) = std::env::var_os("XDG_RUNTIME_DIR") {
        return PathBuf::from(runtime_dir);
    }

    #[cfg(unix)]
    {
        let uid = unsafe { libc::getuid() };
        PathBuf::from(format!("/tmp/seqren-{}", uid))
    }

    #[cfg(not(unix))]
    {
        std::env::temp_dir().join("seqren")
    }
}

#[cfg(windows)]
fn dir_hash(dir: &Path) -> u64 {
    use std::hash::{Hash, Hasher};
    let mut hasher = std::collections::hash_map::DefaultHasher::new();
    dir.hash(&mut hasher);
    hasher.finish()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_in_dir_derives_both_names() {
        let temp = TempDir::new().unwrap();
        let endpoint = Endpoint::in_dir(temp.path());

        assert_eq!(endpoint.lock_path(), temp.path().join("seqren.lock"));
        #[cfg(unix)]
        assert!(endpoint.address().ends_with("seqren.sock"));
        #[cfg(windows)]
        assert!(endpoint.address().starts_with(r"\\.\pipe\seqren-"));
    }

    #[test]
    fn test_same_dir_same_endpoint() {
        let temp = TempDir::new().unwrap();
        assert_eq!(Endpoint::in_dir(temp.path()), Endpoint::in_dir(temp.path()));
    }

    #[test]
    fn test_ensure_dir_creates_missing_parent() {
        let temp = TempDir::new().unwrap();
        let nested = temp.path().join("a").join("b");
        let endpoint = Endpoint::in_dir(&nested);

        endpoint.ensure_dir().unwrap();
        assert!(nested.is_dir());
    }
}

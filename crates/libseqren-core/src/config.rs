use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::SeqrenError;

/// Environment variable that points at an explicit config file
pub const CONFIG_ENV: &str = "SEQREN_CONFIG";

/// Default quiet interval before an aggregated batch is flushed
pub const DEFAULT_QUIET_INTERVAL_MS: u64 = 1500;

/// Default number of connect attempts a follower makes
pub const DEFAULT_CLIENT_RETRIES: u32 = 10;

/// User-level configuration stored in `<config dir>/seqren/config.toml`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SeqrenConfig {
    /// Silence required before the leader flushes its pending batch
    pub quiet_interval_ms: u64,
    /// Connect attempts a follower makes before giving up
    pub client_retries: u32,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Optional file that receives log output in addition to stderr
    #[serde(skip_serializing_if = "Option::is_none")]
    pub log_file: Option<PathBuf>,
}

impl Default for SeqrenConfig {
    fn default() -> Self {
        Self {
            quiet_interval_ms: DEFAULT_QUIET_INTERVAL_MS,
            client_retries: DEFAULT_CLIENT_RETRIES,
            log_level: "info".to_string(),
            log_file: None,
        }
    }
}

impl SeqrenConfig {
    pub fn quiet_interval(&self) -> Duration {
        Duration::from_millis(self.quiet_interval_ms)
    }

    /// Reject values that would break the aggregation protocol
    pub fn validate(&self) -> Result<(), SeqrenError> {
        if self.quiet_interval_ms == 0 {
            return Err(SeqrenError::InvalidConfig(
                "quiet_interval_ms must be greater than 0".to_string(),
            ));
        }
        if self.client_retries == 0 {
            return Err(SeqrenError::InvalidConfig(
                "client_retries must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Load config from a file, returning `None` if the file does not exist
pub fn load_config(path: &Path) -> Result<Option<SeqrenConfig>, SeqrenError> {
    if !path.exists() {
        return Ok(None);
    }
    let content = std::fs::read_to_string(path)?;
    let config: SeqrenConfig = toml::from_str(&content)?;
    config.validate()?;
    Ok(Some(config))
}

/// Save config to a file, creating parent directories as needed
pub fn save_config(path: &Path, config: &SeqrenConfig) -> Result<(), SeqrenError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    Ok(())
}

/// Resolve the config file location.
///
/// `$SEQREN_CONFIG` wins; otherwise the platform config directory is used.
pub fn config_path() -> Option<PathBuf> {
    if let Some(explicit) = std::env::var_os(CONFIG_ENV) {
        return Some(PathBuf::from(explicit));
    }
    config_dir().map(|dir| dir.join("seqren").join("config.toml"))
}

fn config_dir() -> Option<PathBuf> {
    if let Some(xdg) = std::env::var_os("XDG_CONFIG_HOME") {
        return Some(PathBuf::from(xdg));
    }

    #[cfg(windows)]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return Some(PathBuf::from(appdata));
        }
    }

    std::env::var_os("HOME").map(|home| PathBuf::from(home).join(".config"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn test_config_roundtrip() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("seqren").join("config.toml");

        let config = SeqrenConfig {
            quiet_interval_ms: 300,
            client_retries: 40,
            log_level: "debug".to_string(),
            log_file: Some(dir.path().join("seqren.log")),
        };

        save_config(&path, &config).unwrap();
        let loaded = load_config(&path).unwrap().unwrap();

        assert_eq!(loaded, config);
    }

    #[test]
    fn test_missing_config_is_none() {
        let dir = tempdir().unwrap();
        assert!(load_config(&dir.path().join("nope.toml")).unwrap().is_none());
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "quiet_interval_ms = 250\n").unwrap();

        let loaded = load_config(&path).unwrap().unwrap();
        assert_eq!(loaded.quiet_interval_ms, 250);
        assert_eq!(loaded.client_retries, DEFAULT_CLIENT_RETRIES);
        assert_eq!(loaded.log_level, "info");
        assert!(loaded.log_file.is_none());
    }

    #[test]
    fn test_zero_quiet_interval_rejected() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "quiet_interval_ms = 0\n").unwrap();

        let err = load_config(&path).unwrap_err();
        assert_eq!(err.error_code(), "invalid_config");
    }

    #[test]
    fn test_defaults() {
        let config = SeqrenConfig::default();
        assert_eq!(config.quiet_interval(), Duration::from_millis(1500));
        assert_eq!(config.client_retries, 10);
        assert!(config.validate().is_ok());
    }
}

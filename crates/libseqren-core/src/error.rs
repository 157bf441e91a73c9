use std::path::PathBuf;

use thiserror::Error;

/// Main error type for seqren core operations
#[derive(Debug, Error)]
pub enum SeqrenError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("TOML parse error: {0}")]
    TomlParse(#[from] toml::de::Error),

    #[error("TOML serialize error: {0}")]
    TomlSerialize(#[from] toml::ser::Error),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("failed to rename {from} -> {to}: {source}")]
    Rename {
        from: PathBuf,
        to: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("target {0} is occupied by a file outside the batch")]
    TargetOccupied(PathBuf),

    #[error("{failed} of {requested} renames failed")]
    PartialRename { failed: usize, requested: usize },
}

impl SeqrenError {
    /// Get the error code used in log fields
    pub fn error_code(&self) -> &'static str {
        match self {
            SeqrenError::Io(_) => "io_error",
            SeqrenError::TomlParse(_) => "invalid_config",
            SeqrenError::TomlSerialize(_) => "internal_error",
            SeqrenError::InvalidConfig(_) => "invalid_config",
            SeqrenError::Rename { .. } => "rename_failed",
            SeqrenError::TargetOccupied(_) => "target_occupied",
            SeqrenError::PartialRename { .. } => "partial_rename",
        }
    }

    /// Create a rename error for a single move
    pub fn rename(from: impl Into<PathBuf>, to: impl Into<PathBuf>, source: std::io::Error) -> Self {
        SeqrenError::Rename {
            from: from.into(),
            to: to.into(),
            source,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_codes() {
        let err = SeqrenError::InvalidConfig("quiet_interval_ms must be > 0".to_string());
        assert_eq!(err.error_code(), "invalid_config");

        let err = SeqrenError::rename(
            "/a/b.txt",
            "/a/01.txt",
            std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        );
        assert_eq!(err.error_code(), "rename_failed");
        assert!(err.to_string().contains("/a/b.txt"));
    }
}

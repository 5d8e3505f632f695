//! Error types for hashsync-core.

use std::path::PathBuf;

use thiserror::Error;

/// All errors that can arise from loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Underlying I/O failure (permission denied, etc.).
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parse error on load: includes file path and line context from serde_yaml.
    #[error("failed to parse config at {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    /// An explicitly requested config file did not exist.
    #[error("config not found at {path}")]
    NotFound { path: PathBuf },

    /// `dirs::home_dir()` returned `None`: cannot locate `~/.hashsync/`.
    #[error("cannot determine home directory; set $HOME or equivalent")]
    HomeNotFound,

    /// Neither the config file nor the command line supplied a required field.
    #[error("missing required setting `{field}` (set it in the config file or pass it as a flag)")]
    Missing { field: &'static str },

    /// A working path lies inside the synced tree, or contains it.
    #[error("`{field}` ({}) overlaps local_root ({}); choose a location outside the synced directory", .path.display(), .local_root.display())]
    PathOverlap {
        field: &'static str,
        path: PathBuf,
        local_root: PathBuf,
    },
}

/// A content digest string could not be decoded.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DigestParseError {
    #[error("digest must be {expected} hex characters, got {actual}")]
    Length { expected: usize, actual: usize },

    #[error("digest is not valid hex: {0}")]
    Hex(String),
}

//! Error types for hashsync-sync.

use std::path::PathBuf;

use thiserror::Error;

use hashsync_core::ConfigError;

use crate::store::StoreError;

/// All errors that can arise from indexing, bootstrap, apply, and publish.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A local I/O error, with annotated path for context.
    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// An object-store call failed after retries were exhausted.
    #[error("store {op} failed for `{key}`: {source}")]
    Store {
        op: &'static str,
        key: String,
        #[source]
        source: StoreError,
    },

    /// A remote mutation failed mid-run; the remote store may be partially synced.
    #[error("{op} of `{path}` failed: {source}")]
    Apply {
        op: &'static str,
        path: String,
        #[source]
        source: Box<SyncError>,
    },

    /// The journal file holds an interrupted run of a different scope.
    #[error("pending journal {} belongs to {bucket}/{folder}; finish or recover that scope first", .path.display())]
    ForeignJournal {
        path: PathBuf,
        bucket: String,
        folder: String,
    },

    /// A file name that cannot be used as an index key.
    #[error("path is not valid UTF-8: {path}")]
    NonUtf8Path { path: PathBuf },

    /// JSON serialization/deserialization error (artifact, journal).
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(#[from] ConfigError),
}

/// Convenience constructor for [`SyncError::Io`].
pub(crate) fn io_err(path: impl Into<PathBuf>, source: std::io::Error) -> SyncError {
    SyncError::Io {
        path: path.into(),
        source,
    }
}

/// Convenience constructor for [`SyncError::Store`].
pub(crate) fn store_err(op: &'static str, key: impl Into<String>, source: StoreError) -> SyncError {
    SyncError::Store {
        op,
        key: key.into(),
        source,
    }
}

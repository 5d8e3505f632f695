//! Pending work-list journal.
//!
//! Written (atomically, `.tmp` + rename) before any remote mutation and
//! removed after the new index is published. Finding one at the start of a
//! run means the remote index may lag the remote content, so the next
//! bootstrap must rebuild instead of trusting the artifact.

use std::collections::BTreeSet;
use std::io::ErrorKind;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hashsync_core::Reconciliation;

use crate::error::{io_err, SyncError};

/// On-disk journal payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PendingJournal {
    pub started_at: DateTime<Utc>,
    pub bucket: String,
    pub folder: String,
    pub to_upload: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
}

impl PendingJournal {
    pub fn new(bucket: &str, folder: &str, plan: &Reconciliation) -> Self {
        Self {
            started_at: Utc::now(),
            bucket: bucket.to_string(),
            folder: folder.to_string(),
            to_upload: plan.to_upload.clone(),
            to_delete: plan.to_delete.clone(),
        }
    }

    /// Whether this journal was left by a run against the same scope.
    /// A journal of unknown scope (empty bucket) matches every scope.
    pub fn is_for(&self, bucket: &str, folder: &str) -> bool {
        self.bucket.is_empty() || (self.bucket == bucket && self.folder == folder)
    }
}

/// Load the journal at `path`; `None` if there is none.
///
/// An unreadable journal is still evidence of an interrupted run, so it is
/// reported as a journal of unknown scope rather than as an error.
pub fn load(path: &Path) -> Result<Option<PendingJournal>, SyncError> {
    let contents = match std::fs::read_to_string(path) {
        Ok(contents) => contents,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(io_err(path, e)),
    };
    match serde_json::from_str(&contents) {
        Ok(journal) => Ok(Some(journal)),
        Err(e) => {
            tracing::warn!("unreadable pending journal {}: {e}", path.display());
            Ok(Some(PendingJournal {
                started_at: Utc::now(),
                bucket: String::new(),
                folder: String::new(),
                to_upload: BTreeSet::new(),
                to_delete: BTreeSet::new(),
            }))
        }
    }
}

/// Save the journal atomically.
///
/// Writes to `<path>.tmp` then renames to `<path>`.
pub fn save(path: &Path, journal: &PendingJournal) -> Result<(), SyncError> {
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let json = serde_json::to_string_pretty(journal)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, &json).map_err(|e| io_err(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_err(path, e))?;
    Ok(())
}

/// Remove the journal; absent is fine.
pub fn clear(path: &Path) -> Result<(), SyncError> {
    match std::fs::remove_file(path) {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(io_err(path, e)),
    }
}

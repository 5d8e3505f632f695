//! Reconciler: pure diff of a local index against a remote index.

use hashsync_core::{Index, Reconciliation};

/// Paths to upload (new or changed locally) and to delete (gone locally).
///
/// Digests are compared over their full 16 bytes. Paths equal on both
/// sides appear in neither set. No I/O.
pub fn diff(local: &Index, remote: &Index) -> Reconciliation {
    let to_upload = local
        .iter()
        .filter(|(path, digest)| remote.get(*path) != Some(*digest))
        .map(|(path, _)| path.clone())
        .collect();
    let to_delete = remote
        .keys()
        .filter(|path| !local.contains_key(*path))
        .cloned()
        .collect();
    Reconciliation {
        to_upload,
        to_delete,
    }
}

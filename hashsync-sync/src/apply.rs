//! Apply a reconciliation plan to the object store.
//!
//! Deletes run first, then uploads, each in path order. The first failure
//! stops the run; the remote store is then partially synced and a re-run
//! recomputes everything from current state.

use std::path::Path;

use hashsync_core::Reconciliation;

use crate::error::{io_err, store_err, SyncError};
use crate::store::{object_key, ObjectStore};

/// Counts of mutations performed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplyOutcome {
    pub deleted: usize,
    pub uploaded: usize,
}

pub fn apply(
    store: &dyn ObjectStore,
    folder: &str,
    local_root: &Path,
    plan: &Reconciliation,
) -> Result<ApplyOutcome, SyncError> {
    let mut outcome = ApplyOutcome::default();

    for path in &plan.to_delete {
        let key = object_key(folder, path);
        tracing::debug!("deleting {key}");
        store
            .delete(&key)
            .map_err(|e| apply_failed("delete", path, store_err("delete", &key, e)))?;
        outcome.deleted += 1;
    }

    for path in &plan.to_upload {
        let key = object_key(folder, path);
        let local = local_root.join(path);
        tracing::debug!("uploading {key}");
        let bytes = std::fs::read(&local)
            .map_err(|e| apply_failed("upload", path, io_err(&local, e)))?;
        store
            .put(&key, &bytes)
            .map_err(|e| apply_failed("upload", path, store_err("put", &key, e)))?;
        outcome.uploaded += 1;
    }

    tracing::info!(
        "applied plan: {} deleted, {} uploaded",
        outcome.deleted,
        outcome.uploaded
    );
    Ok(outcome)
}

fn apply_failed(op: &'static str, path: &str, source: SyncError) -> SyncError {
    tracing::error!(
        "{op} of `{path}` failed: {source}; remote store is partially synced, re-run to converge"
    );
    SyncError::Apply {
        op,
        path: path.to_string(),
        source: Box::new(source),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::{MemoryObjectStore, StoreOp};
    use std::fs;
    use tempfile::TempDir;

    fn plan(upload: &[&str], delete: &[&str]) -> Reconciliation {
        Reconciliation {
            to_upload: upload.iter().map(|p| p.to_string()).collect(),
            to_delete: delete.iter().map(|p| p.to_string()).collect(),
        }
    }

    #[test]
    fn deletes_then_uploads_under_folder() {
        let local = TempDir::new().unwrap();
        fs::write(local.path().join("b.txt"), "beta").unwrap();
        let store = MemoryObjectStore::with_objects([("game/c.txt", b"gamma".to_vec())]);

        let work = plan(&["b.txt"], &["c.txt"]);
        let outcome = apply(&store, "game", local.path(), &work).unwrap();

        assert_eq!(outcome, ApplyOutcome { deleted: 1, uploaded: 1 });
        assert_eq!(
            store.calls(),
            vec![
                (StoreOp::Delete, "game/c.txt".to_string()),
                (StoreOp::Put, "game/b.txt".to_string()),
            ]
        );
        assert_eq!(store.objects()["game/b.txt"], b"beta".to_vec());
        assert!(!store.objects().contains_key("game/c.txt"));
    }

    #[test]
    fn empty_plan_touches_nothing() {
        let local = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let outcome = apply(&store, "game", local.path(), &Reconciliation::default()).unwrap();
        assert_eq!(outcome, ApplyOutcome::default());
        assert!(store.calls().is_empty());
    }

    #[test]
    fn missing_local_file_reports_path_and_op() {
        let local = TempDir::new().unwrap();
        let store = MemoryObjectStore::new();
        let err = apply(&store, "game", local.path(), &plan(&["gone.txt"], &[])).unwrap_err();
        match err {
            SyncError::Apply { op, path, .. } => {
                assert_eq!(op, "upload");
                assert_eq!(path, "gone.txt");
            }
            other => panic!("expected apply error, got {other:?}"),
        }
    }

    #[test]
    fn store_failure_stops_at_first_error() {
        let local = TempDir::new().unwrap();
        fs::write(local.path().join("a.txt"), "alpha").unwrap();
        fs::write(local.path().join("b.txt"), "beta").unwrap();
        let store = MemoryObjectStore::new();
        store.fail_on(StoreOp::Put, "game/a.txt", false, 1);

        let work = plan(&["a.txt", "b.txt"], &[]);
        let err = apply(&store, "game", local.path(), &work).unwrap_err();
        assert!(err.to_string().contains("a.txt"), "got: {err}");
        assert!(store.objects().is_empty(), "b.txt must not be uploaded after failure");
    }
}

//! Sync pipeline entrypoint used by the CLI.
//!
//! Stages, strictly in order:
//! 1. index the local root
//! 2. bootstrap the remote index (forced rebuild if a pending journal exists)
//! 3. diff
//! 4. write the pending journal
//! 5. apply deletes + uploads
//! 6. publish the local index as the new artifact
//! 7. clear the journal
//!
//! Stages 1-3 never mutate the store except for the bootstrap self-heal.
//! A journal left by a different scope stops the run before stage 2, so
//! that scope's recovery evidence is never overwritten.
//! Concurrent runs against the same (bucket, folder) are not safe.

use hashsync_core::{Reconciliation, SyncConfig};

use crate::apply::{apply, ApplyOutcome};
use crate::artifact::IndexPublisher;
use crate::bootstrap::{BootstrapSource, RebuildReason, RemoteIndexBootstrapper};
use crate::indexer::ContentIndexer;
use crate::journal::{self, PendingJournal};
use crate::reconcile;
use crate::store::ObjectStore;
use crate::SyncError;

/// Per-run switches.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncOptions {
    /// Compute the plan only: no uploads, deletes, publish, or journal.
    pub dry_run: bool,
}

/// What a pipeline run saw and did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub bucket: String,
    pub folder: String,
    pub local_entries: usize,
    pub bootstrap: BootstrapSource,
    pub plan: Reconciliation,
    pub applied: ApplyOutcome,
    /// Generation of the artifact published at the end; `None` in dry-run.
    pub published_generation: Option<u64>,
    pub dry_run: bool,
}

/// Run the sync pipeline for one (bucket, folder) scope.
///
/// `store` must already point at `config.bucket`.
pub fn run(
    store: &dyn ObjectStore,
    config: &SyncConfig,
    options: SyncOptions,
) -> Result<SyncReport, SyncError> {
    let folder = config.folder.as_str();
    tracing::info!(
        "syncing '{}' -> {}/{}",
        config.local_root.display(),
        config.bucket,
        folder
    );

    config.check_paths()?;

    let mut indexer = ContentIndexer::new(&config.local_root)?;
    let local = indexer.index()?.clone();
    tracing::info!("local index: {} entries", local.len());

    let journal_path = config.journal_path();
    let interrupted = match journal::load(&journal_path)? {
        Some(pending) if pending.is_for(&config.bucket, folder) => {
            tracing::warn!(
                "found pending journal {} from {}; remote index is not trusted",
                journal_path.display(),
                pending.started_at
            );
            true
        }
        Some(pending) => {
            return Err(SyncError::ForeignJournal {
                path: journal_path,
                bucket: pending.bucket,
                folder: pending.folder,
            })
        }
        None => false,
    };

    let bootstrapper = RemoteIndexBootstrapper::new(store, folder, &config.scratch_dir)
        .self_heal(!options.dry_run);
    let remote = if interrupted {
        bootstrapper.rebuild(RebuildReason::Interrupted)?
    } else {
        bootstrapper.bootstrap()?
    };

    tracing::info!("comparing local index and remote index");
    let plan = reconcile::diff(&local, &remote.files);
    for path in &plan.to_delete {
        tracing::debug!("plan: delete {path}");
    }
    for path in &plan.to_upload {
        tracing::debug!("plan: upload {path}");
    }

    let mut report = SyncReport {
        bucket: config.bucket.clone(),
        folder: folder.to_string(),
        local_entries: local.len(),
        bootstrap: remote.source.clone(),
        plan,
        applied: ApplyOutcome::default(),
        published_generation: None,
        dry_run: options.dry_run,
    };

    if options.dry_run {
        tracing::info!(
            "[dry-run] would upload {}, delete {}",
            report.plan.to_upload.len(),
            report.plan.to_delete.len()
        );
        return Ok(report);
    }

    journal::save(
        &journal_path,
        &PendingJournal::new(&config.bucket, folder, &report.plan),
    )?;
    report.applied = apply(store, folder, &config.local_root, &report.plan)?;

    let generation = remote.generation + 1;
    IndexPublisher::new(store, folder).publish(&local, generation)?;
    journal::clear(&journal_path)?;
    report.published_generation = Some(generation);

    tracing::info!("done");
    Ok(report)
}

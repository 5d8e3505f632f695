//! Remote index bootstrap.
//!
//! Fast path: load `{folder}/index.mhash`. Slow path (artifact missing,
//! corrupt, or untrusted): download every direct child of `{folder}/` into a
//! fresh scratch directory, hash it with the content indexer, and publish the
//! result so the next run can take the fast path again.

use std::fmt;
use std::path::{Path, PathBuf};

use hashsync_core::Index;

use crate::artifact::{artifact_key, ArtifactLoad, IndexPublisher};
use crate::error::{io_err, store_err, SyncError};
use crate::indexer::index_dir;
use crate::store::{folder_prefix, ObjectStore};

/// Why the slow path ran.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebuildReason {
    /// No artifact in the store (first run or index loss).
    Missing,
    /// Artifact present but unreadable.
    Corrupt(String),
    /// A previous run was interrupted between apply and publish.
    Interrupted,
}

impl fmt::Display for RebuildReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RebuildReason::Missing => write!(f, "no index artifact"),
            RebuildReason::Corrupt(reason) => write!(f, "corrupt index artifact: {reason}"),
            RebuildReason::Interrupted => write!(f, "previous run was interrupted"),
        }
    }
}

/// Where the remote index came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapSource {
    Loaded { generation: u64 },
    Rebuilt { reason: RebuildReason },
}

/// The remote state the reconciler diffs against.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteIndex {
    pub files: Index,
    pub source: BootstrapSource,
    /// Generation of the artifact now in the store (or that would be, in dry-run).
    pub generation: u64,
}

/// Obtains the remote index for one (bucket, folder) scope.
pub struct RemoteIndexBootstrapper<'a> {
    store: &'a dyn ObjectStore,
    folder: &'a str,
    scratch_dir: &'a Path,
    self_heal: bool,
}

impl<'a> RemoteIndexBootstrapper<'a> {
    pub fn new(store: &'a dyn ObjectStore, folder: &'a str, scratch_dir: &'a Path) -> Self {
        Self {
            store,
            folder,
            scratch_dir,
            self_heal: true,
        }
    }

    /// Whether a rebuilt index is published immediately (default `true`).
    pub fn self_heal(mut self, enabled: bool) -> Self {
        self.self_heal = enabled;
        self
    }

    /// Load the artifact, falling back to a full rebuild when it is missing
    /// or corrupt.
    pub fn bootstrap(&self) -> Result<RemoteIndex, SyncError> {
        match self.publisher().load()? {
            ArtifactLoad::Found(artifact) => {
                tracing::info!(
                    "remote index loaded ({} entries, generation {})",
                    artifact.files.len(),
                    artifact.generation
                );
                Ok(RemoteIndex {
                    files: artifact.files,
                    source: BootstrapSource::Loaded {
                        generation: artifact.generation,
                    },
                    generation: artifact.generation,
                })
            }
            ArtifactLoad::NotFound => self.rebuild_from(RebuildReason::Missing, 0),
            ArtifactLoad::Corrupt { reason } => {
                tracing::warn!("ignoring corrupt remote index: {reason}");
                self.rebuild_from(RebuildReason::Corrupt(reason), 0)
            }
        }
    }

    /// Rebuild without trusting the artifact. A readable artifact still
    /// contributes its generation so the version token keeps increasing.
    pub fn rebuild(&self, reason: RebuildReason) -> Result<RemoteIndex, SyncError> {
        let generation = match self.publisher().load()? {
            ArtifactLoad::Found(artifact) => artifact.generation + 1,
            ArtifactLoad::NotFound | ArtifactLoad::Corrupt { .. } => 0,
        };
        self.rebuild_from(reason, generation)
    }

    fn publisher(&self) -> IndexPublisher<'a> {
        IndexPublisher::new(self.store, self.folder)
    }

    fn rebuild_from(
        &self,
        reason: RebuildReason,
        generation: u64,
    ) -> Result<RemoteIndex, SyncError> {
        tracing::info!("rebuilding remote index ({reason}); downloading all files");
        reset_dir(self.scratch_dir)?;

        let prefix = folder_prefix(self.folder);
        let skip = artifact_key(self.folder);
        let keys = self
            .store
            .list(&prefix)
            .map_err(|e| store_err("list", &prefix, e))?;

        let mut downloaded = 0usize;
        for key in keys {
            let Some(name) = key.strip_prefix(prefix.as_str()) else {
                continue;
            };
            if key == skip || name.is_empty() || name.contains('/') {
                continue;
            }
            if name == "." || name == ".." {
                tracing::warn!("skipping object `{key}`: not a usable file name");
                continue;
            }
            let Some(bytes) = self.store.get(&key).map_err(|e| store_err("get", &key, e))? else {
                tracing::warn!("{key} vanished between list and download; skipping");
                continue;
            };
            let target = scratch_path(self.scratch_dir, &key);
            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(|e| io_err(parent, e))?;
            }
            tracing::debug!("downloading {key}");
            std::fs::write(&target, &bytes).map_err(|e| io_err(&target, e))?;
            downloaded += 1;
        }

        tracing::debug!("{downloaded} file(s) downloaded, hashing");
        let files = index_dir(&scratch_path(self.scratch_dir, self.folder))?;

        if self.self_heal {
            self.publisher().publish(&files, generation)?;
        } else {
            tracing::info!("self-heal disabled; rebuilt index not published");
        }

        if let Err(e) = std::fs::remove_dir_all(self.scratch_dir) {
            tracing::warn!(
                "could not remove scratch dir {}: {e}",
                self.scratch_dir.display()
            );
        }

        Ok(RemoteIndex {
            files,
            source: BootstrapSource::Rebuilt { reason },
            generation,
        })
    }
}

/// `scratch` joined with each `/`-separated component of `key`.
fn scratch_path(scratch: &Path, key: &str) -> PathBuf {
    key.split('/')
        .filter(|part| !part.is_empty())
        .fold(scratch.to_path_buf(), |path, part| path.join(part))
}

/// Remove any stale scratch contents and recreate the directory empty.
fn reset_dir(dir: &Path) -> Result<(), SyncError> {
    if dir.exists() {
        tracing::debug!("removing stale scratch dir {}", dir.display());
        std::fs::remove_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    std::fs::create_dir_all(dir).map_err(|e| io_err(dir, e))
}

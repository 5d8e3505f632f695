//! Content indexer: streaming MD5 over the immediate files of a directory.
//!
//! Keys are paths relative to the indexed root, joined with `/`. The walk is
//! single-level: subdirectories are skipped, not descended into. A local
//! file named like the index artifact is never indexed: it would be
//! uploaded over the artifact key.

use std::fs::File;
use std::io::{ErrorKind, Read};
use std::path::{Path, PathBuf};

use md5::{Digest, Md5};

use hashsync_core::{ContentDigest, Index};

use crate::artifact::ARTIFACT_NAME;
use crate::error::{io_err, SyncError};

const READ_BUF_LEN: usize = 64 * 1024;

/// Indexes one root directory and remembers the last successful result.
#[derive(Debug)]
pub struct ContentIndexer {
    root: PathBuf,
    last: Option<Index>,
}

impl ContentIndexer {
    /// Create an indexer for `root`, creating the directory if it is missing.
    pub fn new(root: impl Into<PathBuf>) -> Result<Self, SyncError> {
        let root = root.into();
        ensure_dir(&root)?;
        Ok(Self { root, last: None })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Re-index the root. The new map replaces the cached one wholesale;
    /// on error the previous cache is dropped so no stale index survives.
    pub fn index(&mut self) -> Result<&Index, SyncError> {
        self.last = None;
        let index = index_dir(&self.root)?;
        Ok(self.last.insert(index))
    }

    /// The index from the last successful [`ContentIndexer::index`] call.
    pub fn last_index(&self) -> Option<&Index> {
        self.last.as_ref()
    }

    /// Cached index, computing it first if this indexer has not run yet.
    pub fn current(&mut self) -> Result<&Index, SyncError> {
        match self.last.take() {
            Some(index) => Ok(self.last.insert(index)),
            None => self.index(),
        }
    }
}

/// Hash every immediate file under `root`. Creates `root` if missing.
///
/// Any file that cannot be read is fatal: a partial index would make the
/// reconciler delete remote files that still exist locally.
pub fn index_dir(root: &Path) -> Result<Index, SyncError> {
    ensure_dir(root)?;
    tracing::debug!("indexing files in '{}'", root.display());

    let entries = std::fs::read_dir(root).map_err(|e| io_err(root, e))?;
    let mut index = Index::new();
    for entry in entries {
        let entry = entry.map_err(|e| io_err(root, e))?;
        let path = entry.path();
        // Follows symlinks, so a link to a file is indexed by its target's content.
        let meta = std::fs::metadata(&path).map_err(|e| io_err(&path, e))?;
        if !meta.is_file() {
            continue;
        }
        let key = relative_key(root, &path)?;
        if key == ARTIFACT_NAME {
            tracing::warn!(
                "skipping '{}': name is reserved for the remote index",
                path.display()
            );
            continue;
        }
        let digest = hash_file(&path)?;
        tracing::debug!("{digest}  {key}");
        index.insert(key, digest);
    }

    tracing::debug!("indexing complete with {} entries", index.len());
    Ok(index)
}

/// Stream a file through MD5 in fixed-size chunks.
pub fn hash_file(path: &Path) -> Result<ContentDigest, SyncError> {
    let mut file = File::open(path).map_err(|e| io_err(path, e))?;
    let mut hasher = Md5::new();
    let mut buffer = vec![0u8; READ_BUF_LEN];
    loop {
        let n = match file.read(&mut buffer) {
            Ok(0) => break,
            Ok(n) => n,
            Err(e) if e.kind() == ErrorKind::Interrupted => continue,
            Err(e) => return Err(io_err(path, e)),
        };
        hasher.update(&buffer[..n]);
    }
    Ok(ContentDigest::from_bytes(hasher.finalize().into()))
}

/// MD5 of an in-memory buffer.
pub fn hash_bytes(bytes: &[u8]) -> ContentDigest {
    ContentDigest::from_bytes(Md5::digest(bytes).into())
}

/// `path` relative to `root`, root prefix and separator stripped, `/`-joined.
pub(crate) fn relative_key(root: &Path, path: &Path) -> Result<String, SyncError> {
    let relative = path.strip_prefix(root).unwrap_or(path);
    let mut parts = Vec::new();
    for component in relative.components() {
        let part = component
            .as_os_str()
            .to_str()
            .ok_or_else(|| SyncError::NonUtf8Path {
                path: path.to_path_buf(),
            })?;
        parts.push(part);
    }
    Ok(parts.join("/"))
}

fn ensure_dir(root: &Path) -> Result<(), SyncError> {
    if !root.exists() {
        tracing::debug!("creating missing index root '{}'", root.display());
        std::fs::create_dir_all(root).map_err(|e| io_err(root, e))?;
    }
    Ok(())
}

//! Index artifact: the serialized index persisted at `{folder}/index.mhash`.
//!
//! Wire format is JSON:
//!
//! ```json
//! { "version": 1, "generation": 3, "published_at": "…", "files": { "a.txt": "<hex>" } }
//! ```
//!
//! A legacy bare `{ "path": "<hex>" }` map is still accepted on load.
//! Publishing always overwrites the whole artifact; there is no merge.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use hashsync_core::Index;

use crate::error::{store_err, SyncError};
use crate::store::{object_key, ObjectStore};

/// Object name of the artifact inside the sync folder.
pub const ARTIFACT_NAME: &str = "index.mhash";

/// Only wire version this build reads and writes.
pub const ARTIFACT_VERSION: u32 = 1;

/// On-store artifact payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct IndexArtifact {
    pub version: u32,
    /// Monotonic version token, bumped on every publish.
    pub generation: u64,
    pub published_at: DateTime<Utc>,
    pub files: Index,
}

/// Outcome of reading the artifact. Absence and corruption are not errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ArtifactLoad {
    Found(IndexArtifact),
    NotFound,
    Corrupt { reason: String },
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ArtifactCompat {
    Structured(ArtifactStructuredCompat),
    Legacy(Index),
}

#[derive(Debug, Deserialize)]
struct ArtifactStructuredCompat {
    version: u32,
    generation: Option<u64>,
    published_at: Option<DateTime<Utc>>,
    files: Index,
}

/// Store key of the artifact for `folder`.
pub fn artifact_key(folder: &str) -> String {
    object_key(folder, ARTIFACT_NAME)
}

/// Serialize an artifact to its wire bytes.
pub fn encode(artifact: &IndexArtifact) -> Result<Vec<u8>, SyncError> {
    Ok(serde_json::to_vec_pretty(artifact)?)
}

/// Parse wire bytes. The error string explains why the bytes were rejected.
pub fn decode(bytes: &[u8]) -> Result<IndexArtifact, String> {
    let compat: ArtifactCompat =
        serde_json::from_slice(bytes).map_err(|e| format!("unreadable index artifact: {e}"))?;
    match compat {
        ArtifactCompat::Structured(artifact) => {
            if artifact.version != ARTIFACT_VERSION {
                return Err(format!(
                    "unsupported index artifact version {} (expected {ARTIFACT_VERSION})",
                    artifact.version
                ));
            }
            Ok(IndexArtifact {
                version: artifact.version,
                generation: artifact.generation.unwrap_or(0),
                published_at: artifact.published_at.unwrap_or_else(Utc::now),
                files: artifact.files,
            })
        }
        ArtifactCompat::Legacy(files) => Ok(IndexArtifact {
            version: ARTIFACT_VERSION,
            generation: 0,
            published_at: Utc::now(),
            files,
        }),
    }
}

// ---------------------------------------------------------------------------
// IndexPublisher
// ---------------------------------------------------------------------------

/// Reads and replaces the single artifact of one (bucket, folder) scope.
///
/// The store handle already names the bucket.
pub struct IndexPublisher<'a> {
    store: &'a dyn ObjectStore,
    folder: &'a str,
}

impl<'a> IndexPublisher<'a> {
    pub fn new(store: &'a dyn ObjectStore, folder: &'a str) -> Self {
        Self { store, folder }
    }

    pub fn key(&self) -> String {
        artifact_key(self.folder)
    }

    /// Fetch and classify the artifact. Store failures other than
    /// not-found propagate.
    pub fn load(&self) -> Result<ArtifactLoad, SyncError> {
        let key = self.key();
        tracing::debug!("checking for {key}");
        let Some(bytes) = self.store.get(&key).map_err(|e| store_err("get", &key, e))? else {
            return Ok(ArtifactLoad::NotFound);
        };
        match decode(&bytes) {
            Ok(artifact) => {
                tracing::debug!(
                    "index deserialized, generation {}, files: {}",
                    artifact.generation,
                    artifact.files.len()
                );
                Ok(ArtifactLoad::Found(artifact))
            }
            Err(reason) => Ok(ArtifactLoad::Corrupt { reason }),
        }
    }

    /// Overwrite the artifact with `index`.
    pub fn publish(&self, index: &Index, generation: u64) -> Result<IndexArtifact, SyncError> {
        let artifact = IndexArtifact {
            version: ARTIFACT_VERSION,
            generation,
            published_at: Utc::now(),
            files: index.clone(),
        };
        let key = self.key();
        let bytes = encode(&artifact)?;
        self.store
            .put(&key, &bytes)
            .map_err(|e| store_err("put", &key, e))?;
        tracing::info!(
            "published {key} (generation {generation}, {} entries)",
            index.len()
        );
        Ok(artifact)
    }
}

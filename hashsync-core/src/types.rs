//! Domain types shared by the indexer, reconciler, and artifact codec.
//!
//! Index keys are forward-slash relative paths; values are 128-bit content
//! digests. Maps are `BTreeMap`/`BTreeSet` so iteration is always sorted.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::error::DigestParseError;

/// Length in bytes of a [`ContentDigest`].
pub const DIGEST_LEN: usize = 16;

// ---------------------------------------------------------------------------
// ContentDigest
// ---------------------------------------------------------------------------

/// 128-bit digest of a file's full content. Used for change detection only.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ContentDigest([u8; DIGEST_LEN]);

impl ContentDigest {
    pub const fn from_bytes(bytes: [u8; DIGEST_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; DIGEST_LEN] {
        &self.0
    }

    /// Lowercase hex, 32 characters.
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn from_hex(s: &str) -> Result<Self, DigestParseError> {
        if s.len() != DIGEST_LEN * 2 {
            return Err(DigestParseError::Length {
                expected: DIGEST_LEN * 2,
                actual: s.len(),
            });
        }
        let mut bytes = [0u8; DIGEST_LEN];
        hex::decode_to_slice(s, &mut bytes).map_err(|e| DigestParseError::Hex(e.to_string()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Debug for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ContentDigest({})", self.to_hex())
    }
}

impl fmt::Display for ContentDigest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_hex())
    }
}

impl FromStr for ContentDigest {
    type Err = DigestParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for ContentDigest {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for ContentDigest {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        Self::from_hex(&s).map_err(serde::de::Error::custom)
    }
}

// ---------------------------------------------------------------------------
// Index
// ---------------------------------------------------------------------------

/// Snapshot of a file set: relative path → content digest.
pub type Index = BTreeMap<String, ContentDigest>;

// ---------------------------------------------------------------------------
// Reconciliation
// ---------------------------------------------------------------------------

/// The upload/delete sets that make the remote store match local content.
///
/// `to_upload` and `to_delete` are always disjoint.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Reconciliation {
    pub to_upload: BTreeSet<String>,
    pub to_delete: BTreeSet<String>,
}

impl Reconciliation {
    /// `true` when the remote already matches local content.
    pub fn is_empty(&self) -> bool {
        self.to_upload.is_empty() && self.to_delete.is_empty()
    }
}

//! Sync configuration.
//!
//! # Storage layout
//!
//! ```text
//! ~/.hashsync/
//!   config.yaml
//! ```
//!
//! # API pattern
//!
//! Every loader has two forms:
//! - `fn_at(home: &Path, …)`: explicit home; used in tests with `TempDir`
//! - `fn(…)`: derives home from `dirs::home_dir()`, delegates to `_at`
//!
//! Values from the file are overlaid with [`ConfigOverrides`] (CLI flags)
//! before required fields are checked.

use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Scratch directory used when neither file nor flags name one.
pub const DEFAULT_SCRATCH_DIR: &str = ".hashsync-scratch";

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Fully resolved settings for one sync scope.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    pub bucket: String,
    /// Key prefix inside the bucket; empty means the bucket root.
    #[serde(default)]
    pub folder: String,
    pub local_root: PathBuf,
    pub scratch_dir: PathBuf,
    /// Pending work-list location; defaults to
    /// `<scratch_dir>.<bucket>.<folder>.pending.json`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub journal_path: Option<PathBuf>,
    pub store: StoreConfig,
    #[serde(default)]
    pub retry: RetryConfig,
}

impl SyncConfig {
    /// Where the pending work-list journal lives.
    ///
    /// The default name carries the (bucket, folder) scope so runs for
    /// different scopes sharing one scratch dir never touch each other's
    /// journal.
    pub fn journal_path(&self) -> PathBuf {
        match &self.journal_path {
            Some(path) => path.clone(),
            None => {
                let mut name = self.scratch_dir.as_os_str().to_owned();
                name.push(format!(".{}.pending.json", scope_tag(&self.bucket, &self.folder)));
                PathBuf::from(name)
            }
        }
    }

    /// Reject working paths that would put hashsync's own files inside the
    /// synced tree. The scratch dir is wiped on every rebuild, so it must
    /// neither equal, contain, nor sit inside `local_root`.
    pub fn check_paths(&self) -> Result<(), ConfigError> {
        let local = absolute(&self.local_root);
        let scratch = absolute(&self.scratch_dir);
        if scratch.starts_with(&local) || local.starts_with(&scratch) {
            return Err(ConfigError::PathOverlap {
                field: "scratch_dir",
                path: self.scratch_dir.clone(),
                local_root: self.local_root.clone(),
            });
        }
        let journal = self.journal_path();
        if absolute(&journal).starts_with(&local) {
            return Err(ConfigError::PathOverlap {
                field: "journal_path",
                path: journal,
                local_root: self.local_root.clone(),
            });
        }
        Ok(())
    }
}

/// Which object-store backend holds the bucket.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum StoreConfig {
    /// Bucket emulated as `<root>/<bucket>/` on a local filesystem.
    Filesystem { root: PathBuf },
}

/// Retry policy for transient store failures.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_attempts: u32,
    pub initial_interval_ms: u64,
    pub max_interval_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_interval_ms: 100,
            max_interval_ms: 2000,
        }
    }
}

/// Values supplied on the command line; `Some` wins over the file.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ConfigOverrides {
    pub bucket: Option<String>,
    pub folder: Option<String>,
    pub local_root: Option<PathBuf>,
    pub scratch_dir: Option<PathBuf>,
    pub store_root: Option<PathBuf>,
}

/// On-disk shape: every field optional so flags can fill the gaps.
#[derive(Debug, Default, Deserialize)]
struct PartialConfig {
    bucket: Option<String>,
    folder: Option<String>,
    local_root: Option<PathBuf>,
    scratch_dir: Option<PathBuf>,
    journal_path: Option<PathBuf>,
    store: Option<StoreConfig>,
    retry: Option<RetryConfig>,
}

// ---------------------------------------------------------------------------
// Paths
// ---------------------------------------------------------------------------

/// `<home>/.hashsync/config.yaml`: pure, no I/O.
pub fn config_path_at(home: &Path) -> PathBuf {
    home.join(".hashsync").join("config.yaml")
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load `<home>/.hashsync/config.yaml` (if present) and apply `overrides`.
///
/// A missing default config file is not an error; the overrides must then
/// supply every required field.
pub fn load_at(home: &Path, overrides: &ConfigOverrides) -> Result<SyncConfig, ConfigError> {
    let path = config_path_at(home);
    let partial = if path.exists() {
        read_partial(&path)?
    } else {
        PartialConfig::default()
    };
    resolve(partial, overrides)
}

/// `load_at` convenience wrapper.
pub fn load(overrides: &ConfigOverrides) -> Result<SyncConfig, ConfigError> {
    load_at(&home()?, overrides)
}

/// Load an explicitly named config file and apply `overrides`.
///
/// Returns `ConfigError::NotFound` if `path` is absent.
pub fn load_from(path: &Path, overrides: &ConfigOverrides) -> Result<SyncConfig, ConfigError> {
    if !path.exists() {
        return Err(ConfigError::NotFound {
            path: path.to_path_buf(),
        });
    }
    resolve(read_partial(path)?, overrides)
}

fn read_partial(path: &Path) -> Result<PartialConfig, ConfigError> {
    let contents = std::fs::read_to_string(path)?;
    if contents.trim().is_empty() {
        return Ok(PartialConfig::default());
    }
    serde_yaml::from_str(&contents).map_err(|e| ConfigError::Parse {
        path: path.to_path_buf(),
        source: e,
    })
}

fn resolve(file: PartialConfig, overrides: &ConfigOverrides) -> Result<SyncConfig, ConfigError> {
    let bucket = overrides
        .bucket
        .clone()
        .or(file.bucket)
        .filter(|b| !b.trim().is_empty())
        .ok_or(ConfigError::Missing { field: "bucket" })?;
    let local_root = overrides
        .local_root
        .clone()
        .or(file.local_root)
        .ok_or(ConfigError::Missing { field: "local_root" })?;
    let store = match (&overrides.store_root, file.store) {
        (Some(root), _) => StoreConfig::Filesystem { root: root.clone() },
        (None, Some(store)) => store,
        (None, None) => return Err(ConfigError::Missing { field: "store.root" }),
    };
    let folder = overrides
        .folder
        .clone()
        .or(file.folder)
        .unwrap_or_default();

    let config = SyncConfig {
        bucket,
        folder: folder.trim_matches('/').to_string(),
        local_root,
        scratch_dir: overrides
            .scratch_dir
            .clone()
            .or(file.scratch_dir)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SCRATCH_DIR)),
        journal_path: file.journal_path,
        store,
        retry: file.retry.unwrap_or_default(),
    };
    config.check_paths()?;
    Ok(config)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

fn home() -> Result<PathBuf, ConfigError> {
    dirs::home_dir().ok_or(ConfigError::HomeNotFound)
}

/// File-name-safe `<bucket>.<folder>` (just `<bucket>` for the bucket root).
fn scope_tag(bucket: &str, folder: &str) -> String {
    let raw = if folder.is_empty() {
        bucket.to_string()
    } else {
        format!("{bucket}.{folder}")
    };
    raw.chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
                c
            } else {
                '_'
            }
        })
        .collect()
}

/// `path` made absolute against the working directory, `.`/`..` folded,
/// and its deepest existing ancestor canonicalized so symlinked spellings
/// of the same directory compare equal.
fn absolute(path: &Path) -> PathBuf {
    let joined = if path.is_absolute() {
        path.to_path_buf()
    } else {
        match std::env::current_dir() {
            Ok(cwd) => cwd.join(path),
            Err(_) => path.to_path_buf(),
        }
    };

    let mut lexical = PathBuf::new();
    for component in joined.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                lexical.pop();
            }
            other => lexical.push(other.as_os_str()),
        }
    }

    let mut existing = lexical.as_path();
    let mut missing = Vec::new();
    loop {
        if let Ok(mut resolved) = existing.canonicalize() {
            resolved.extend(missing.iter().rev());
            return resolved;
        }
        match (existing.parent(), existing.file_name()) {
            (Some(parent), Some(name)) => {
                missing.push(name.to_os_string());
                existing = parent;
            }
            _ => return lexical,
        }
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

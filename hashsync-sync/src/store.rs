//! Object-store collaborator.
//!
//! The engine only needs four blob operations, captured by [`ObjectStore`].
//! Implementations:
//! - [`FsObjectStore`]: a bucket emulated as `<root>/<bucket>/<key>`
//! - [`MemoryObjectStore`]: in-process map with failure injection
//! - [`RetryingStore`]: exponential-backoff wrapper for transient failures

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::Duration;

use backoff::ExponentialBackoffBuilder;
use thiserror::Error;

use hashsync_core::{RetryConfig, StoreConfig, SyncConfig};

/// Suffix for in-flight writes in [`FsObjectStore`]; never listed.
const TMP_SUFFIX: &str = ".hashsync.tmp";

// ---------------------------------------------------------------------------
// Trait + errors
// ---------------------------------------------------------------------------

/// Failure reported by an [`ObjectStore`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// Worth retrying (network blip, throttling).
    #[error("transient store failure: {0}")]
    Transient(String),

    #[error("store failure: {0}")]
    Permanent(String),

    #[error("I/O error at {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl StoreError {
    pub fn is_transient(&self) -> bool {
        match self {
            StoreError::Transient(_) => true,
            StoreError::Permanent(_) => false,
            StoreError::Io { source, .. } => matches!(
                source.kind(),
                ErrorKind::Interrupted | ErrorKind::TimedOut | ErrorKind::WouldBlock
            ),
        }
    }
}

/// A flat key/value blob store.
///
/// `get` distinguishes absence (`Ok(None)`) from failure (`Err`).
pub trait ObjectStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;
    /// Deleting an absent key succeeds.
    fn delete(&self, key: &str) -> Result<(), StoreError>;
    /// All keys starting with `prefix`, sorted.
    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError>;
}

/// `{folder}/{name}`, or just `name` when the folder is the bucket root.
pub fn object_key(folder: &str, name: &str) -> String {
    let folder = folder.trim_matches('/');
    if folder.is_empty() {
        name.to_string()
    } else {
        format!("{folder}/{name}")
    }
}

/// Listing prefix for the direct children of `folder`.
pub fn folder_prefix(folder: &str) -> String {
    object_key(folder, "")
}

/// Open the configured backend, wrapped in the configured retry policy.
pub fn open(config: &SyncConfig) -> Box<dyn ObjectStore> {
    match &config.store {
        StoreConfig::Filesystem { root } => Box::new(RetryingStore::new(
            FsObjectStore::new(root, &config.bucket),
            config.retry,
        )),
    }
}

// ---------------------------------------------------------------------------
// FsObjectStore
// ---------------------------------------------------------------------------

/// Bucket stored as a directory tree; keys map to `/`-separated paths.
#[derive(Debug, Clone)]
pub struct FsObjectStore {
    bucket_dir: PathBuf,
}

impl FsObjectStore {
    pub fn new(root: &Path, bucket: &str) -> Self {
        Self {
            bucket_dir: root.join(bucket),
        }
    }

    pub fn bucket_dir(&self) -> &Path {
        &self.bucket_dir
    }

    fn path_for(&self, key: &str) -> Result<PathBuf, StoreError> {
        let mut path = self.bucket_dir.clone();
        for part in key.split('/') {
            if part.is_empty() || part == "." || part == ".." || part.ends_with(TMP_SUFFIX) {
                return Err(StoreError::Permanent(format!("invalid object key `{key}`")));
            }
            path.push(part);
        }
        Ok(path)
    }

    fn collect_keys(&self, dir: &Path, keys: &mut Vec<String>) -> Result<(), StoreError> {
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(fs_err(dir, e)),
        };
        for entry in entries {
            let entry = entry.map_err(|e| fs_err(dir, e))?;
            let path = entry.path();
            let file_type = entry.file_type().map_err(|e| fs_err(&path, e))?;
            if file_type.is_dir() {
                self.collect_keys(&path, keys)?;
                continue;
            }
            let Ok(relative) = path.strip_prefix(&self.bucket_dir) else {
                continue;
            };
            let parts: Option<Vec<&str>> = relative
                .components()
                .map(|c| c.as_os_str().to_str())
                .collect();
            let Some(parts) = parts else {
                tracing::warn!("skipping non-UTF-8 object path {}", path.display());
                continue;
            };
            let key = parts.join("/");
            if !key.ends_with(TMP_SUFFIX) {
                keys.push(key);
            }
        }
        Ok(())
    }
}

impl ObjectStore for FsObjectStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let path = self.path_for(key)?;
        match std::fs::read(&path) {
            Ok(bytes) => Ok(Some(bytes)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(fs_err(&path, e)),
        }
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| fs_err(parent, e))?;
        }
        let tmp = PathBuf::from(format!("{}{TMP_SUFFIX}", path.display()));
        std::fs::write(&tmp, bytes).map_err(|e| fs_err(&tmp, e))?;
        if let Err(e) = std::fs::rename(&tmp, &path) {
            let _ = std::fs::remove_file(&tmp);
            return Err(fs_err(&path, e));
        }
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key)?;
        match std::fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(fs_err(&path, e)),
        }
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        let mut keys = Vec::new();
        self.collect_keys(&self.bucket_dir, &mut keys)?;
        keys.retain(|k| k.starts_with(prefix));
        keys.sort();
        Ok(keys)
    }
}

fn fs_err(path: &Path, source: std::io::Error) -> StoreError {
    StoreError::Io {
        path: path.to_path_buf(),
        source,
    }
}

// ---------------------------------------------------------------------------
// MemoryObjectStore
// ---------------------------------------------------------------------------

/// Operation kinds, used for call logs and failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoreOp {
    Get,
    Put,
    Delete,
    List,
}

#[derive(Debug)]
struct InjectedFailure {
    op: StoreOp,
    key: String,
    transient: bool,
    remaining: u32,
}

/// In-process store. Records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct MemoryObjectStore {
    objects: Mutex<BTreeMap<String, Vec<u8>>>,
    calls: Mutex<Vec<(StoreOp, String)>>,
    failures: Mutex<Vec<InjectedFailure>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-populated with `objects`.
    pub fn with_objects<K: Into<String>, V: Into<Vec<u8>>>(
        objects: impl IntoIterator<Item = (K, V)>,
    ) -> Self {
        let store = Self::new();
        {
            let mut map = lock(&store.objects);
            for (k, v) in objects {
                map.insert(k.into(), v.into());
            }
        }
        store
    }

    /// Make the next `times` calls of `op` on `key` fail.
    pub fn fail_on(&self, op: StoreOp, key: &str, transient: bool, times: u32) {
        lock(&self.failures).push(InjectedFailure {
            op,
            key: key.to_string(),
            transient,
            remaining: times,
        });
    }

    /// Snapshot of stored objects.
    pub fn objects(&self) -> BTreeMap<String, Vec<u8>> {
        lock(&self.objects).clone()
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<(StoreOp, String)> {
        lock(&self.calls).clone()
    }

    pub fn clear_calls(&self) {
        lock(&self.calls).clear();
    }

    fn record(&self, op: StoreOp, key: &str) -> Result<(), StoreError> {
        lock(&self.calls).push((op, key.to_string()));
        let mut failures = lock(&self.failures);
        if let Some(failure) = failures
            .iter_mut()
            .find(|f| f.op == op && f.key == key && f.remaining > 0)
        {
            failure.remaining -= 1;
            let message = format!("injected {op:?} failure for `{key}`");
            return Err(if failure.transient {
                StoreError::Transient(message)
            } else {
                StoreError::Permanent(message)
            });
        }
        Ok(())
    }
}

impl ObjectStore for MemoryObjectStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.record(StoreOp::Get, key)?;
        Ok(lock(&self.objects).get(key).cloned())
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.record(StoreOp::Put, key)?;
        lock(&self.objects).insert(key.to_string(), bytes.to_vec());
        Ok(())
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.record(StoreOp::Delete, key)?;
        lock(&self.objects).remove(key);
        Ok(())
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.record(StoreOp::List, prefix)?;
        Ok(lock(&self.objects)
            .keys()
            .filter(|k| k.starts_with(prefix))
            .cloned()
            .collect())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

// ---------------------------------------------------------------------------
// RetryingStore
// ---------------------------------------------------------------------------

/// Retries transient failures of the wrapped store with exponential backoff.
#[derive(Debug)]
pub struct RetryingStore<S> {
    inner: S,
    policy: RetryConfig,
}

impl<S: ObjectStore> RetryingStore<S> {
    pub fn new(inner: S, policy: RetryConfig) -> Self {
        Self { inner, policy }
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }

    fn retry<T>(
        &self,
        op: &str,
        key: &str,
        mut call: impl FnMut(&S) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let schedule = ExponentialBackoffBuilder::new()
            .with_initial_interval(Duration::from_millis(self.policy.initial_interval_ms))
            .with_max_interval(Duration::from_millis(self.policy.max_interval_ms))
            .with_max_elapsed_time(None)
            .build();
        let max_attempts = self.policy.max_attempts.max(1);
        let mut attempt = 0u32;

        backoff::retry(schedule, || {
            attempt += 1;
            call(&self.inner).map_err(|err| {
                if err.is_transient() && attempt < max_attempts {
                    tracing::warn!(
                        "{op} `{key}` attempt {attempt}/{max_attempts} failed: {err}; retrying"
                    );
                    backoff::Error::transient(err)
                } else {
                    backoff::Error::permanent(err)
                }
            })
        })
        .map_err(|err| match err {
            backoff::Error::Permanent(err) => err,
            backoff::Error::Transient { err, .. } => err,
        })
    }
}

impl<S: ObjectStore> ObjectStore for RetryingStore<S> {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        self.retry("get", key, |s| s.get(key))
    }

    fn put(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError> {
        self.retry("put", key, |s| s.put(key, bytes))
    }

    fn delete(&self, key: &str) -> Result<(), StoreError> {
        self.retry("delete", key, |s| s.delete(key))
    }

    fn list(&self, prefix: &str) -> Result<Vec<String>, StoreError> {
        self.retry("list", prefix, |s| s.list(prefix))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn fast_policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_interval_ms: 1,
            max_interval_ms: 2,
        }
    }

    #[test]
    fn object_key_handles_root_folder() {
        assert_eq!(object_key("", "a.txt"), "a.txt");
        assert_eq!(object_key("game", "a.txt"), "game/a.txt");
        assert_eq!(object_key("/game/", "a.txt"), "game/a.txt");
        assert_eq!(folder_prefix("game"), "game/");
        assert_eq!(folder_prefix(""), "");
    }

    #[test]
    fn fs_store_get_missing_is_none() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path(), "bucket");
        assert!(store.get("game/index.mhash").unwrap().is_none());
    }

    #[test]
    fn fs_store_put_get_list_delete() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path(), "bucket");
        store.put("game/b.txt", b"beta").unwrap();
        store.put("game/a.txt", b"alpha").unwrap();
        store.put("other/c.txt", b"gamma").unwrap();

        assert_eq!(store.get("game/a.txt").unwrap().as_deref(), Some(&b"alpha"[..]));
        assert_eq!(store.list("game/").unwrap(), vec!["game/a.txt", "game/b.txt"]);
        assert_eq!(store.list("").unwrap().len(), 3);

        store.delete("game/a.txt").unwrap();
        store.delete("game/a.txt").unwrap();
        assert_eq!(store.list("game/").unwrap(), vec!["game/b.txt"]);
    }

    #[test]
    fn fs_store_rejects_escaping_keys() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path(), "bucket");
        let err = store.put("../outside.txt", b"x").unwrap_err();
        assert!(matches!(err, StoreError::Permanent(_)));
        assert!(!tmp.path().join("outside.txt").exists());
    }

    #[test]
    fn fs_store_leaves_no_tmp_files() {
        let tmp = TempDir::new().unwrap();
        let store = FsObjectStore::new(tmp.path(), "bucket");
        store.put("a.txt", b"x").unwrap();
        let names: Vec<_> = std::fs::read_dir(store.bucket_dir())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(names, vec![std::ffi::OsString::from("a.txt")]);
    }

    #[test]
    fn memory_store_injected_failure_fires_once() {
        let store = MemoryObjectStore::with_objects([("k", b"v".to_vec())]);
        store.fail_on(StoreOp::Get, "k", false, 1);
        assert!(store.get("k").is_err());
        assert!(store.get("k").unwrap().is_some());
        assert_eq!(store.calls().len(), 2);
    }

    #[test]
    fn retrying_store_recovers_from_transient_failures() {
        let store = RetryingStore::new(MemoryObjectStore::new(), fast_policy(5));
        store.inner().fail_on(StoreOp::Put, "k", true, 2);
        store.put("k", b"v").unwrap();
        assert_eq!(store.inner().calls().len(), 3);
        assert!(store.inner().objects().contains_key("k"));
    }

    #[test]
    fn retrying_store_gives_up_after_max_attempts() {
        let store = RetryingStore::new(MemoryObjectStore::new(), fast_policy(3));
        store.inner().fail_on(StoreOp::List, "p/", true, 10);
        let err = store.list("p/").unwrap_err();
        assert!(err.is_transient());
        assert_eq!(store.inner().calls().len(), 3);
    }

    #[test]
    fn retrying_store_does_not_retry_permanent_errors() {
        let store = RetryingStore::new(MemoryObjectStore::new(), fast_policy(5));
        store.inner().fail_on(StoreOp::Delete, "k", false, 10);
        assert!(store.delete("k").is_err());
        assert_eq!(store.inner().calls().len(), 1);
    }
}

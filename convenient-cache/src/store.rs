//! Durable key-value store backed by a single JSON file.
//!
//! Every operation opens the file, acts and closes it again; no handle is
//! held between calls. Writers inside one process are serialized per path.
//! Writers in different processes are not: the last rename wins.

use crate::{CacheError, CacheResult};
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs::{self, File};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, OnceLock, PoisonError};
use tempfile::NamedTempFile;
use tracing::debug;

/// File name used below the per-application cache directory.
pub const DEFAULT_FILE_NAME: &str = "query-cache.json";

type Entries = BTreeMap<String, Value>;

/// Write data to file atomically with fsync
///
/// Writes to a uniquely named temporary sibling first, syncs it, renames it
/// over `path` and syncs the parent directory.
fn atomic_write(path: &Path, data: &[u8]) -> CacheResult<()> {
    let parent = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    fs::create_dir_all(parent)?;

    let mut temp = NamedTempFile::new_in(parent)?;
    temp.write_all(data)?;
    temp.as_file().sync_all()?;
    let _ = temp.persist(path).map_err(|e| e.error)?;

    // Not every filesystem supports syncing a directory
    if let Ok(dir) = File::open(parent) {
        let _ = dir.sync_all();
    }

    Ok(())
}

/// Write lock shared by every handle opened on `path` in this process.
fn path_lock(path: &Path) -> Arc<Mutex<()>> {
    static LOCKS: OnceLock<Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>> = OnceLock::new();
    let mut locks = LOCKS
        .get_or_init(Mutex::default)
        .lock()
        .unwrap_or_else(PoisonError::into_inner);
    Arc::clone(locks.entry(path.to_path_buf()).or_default())
}

/// Handle to a durable cache file.
///
/// Clones share the write lock, so read-modify-write cycles from several
/// threads never drop each other's entries.
#[derive(Clone)]
pub struct QueryCache {
    path: PathBuf,
    lock: Arc<Mutex<()>>,
}

impl fmt::Debug for QueryCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("QueryCache")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

impl PartialEq for QueryCache {
    fn eq(&self, other: &Self) -> bool {
        self.path == other.path
    }
}

impl Eq for QueryCache {}

impl QueryCache {
    /// Uses the cache file at `path`. The file is created on first write.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock = path_lock(&path);
        Self { path, lock }
    }

    /// Uses `<user cache dir>/<app_name>/query-cache.json`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::NoCacheDir` when the platform has no cache
    /// directory for the current user.
    pub fn open_default(app_name: &str) -> CacheResult<Self> {
        let base = dirs::cache_dir().ok_or(CacheError::NoCacheDir)?;
        Ok(Self::open(base.join(app_name).join(DEFAULT_FILE_NAME)))
    }

    /// Location of the cache file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load(&self) -> CacheResult<Entries> {
        let data = match fs::read(&self.path) {
            Ok(data) => data,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Entries::new()),
            Err(e) => return Err(e.into()),
        };
        serde_json::from_slice(&data)
            .map_err(|e| CacheError::Corrupt(format!("{}: {e}", self.path.display())))
    }

    fn exclusive(&self) -> MutexGuard<'_, ()> {
        self.lock.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn save(&self, entries: &Entries) -> CacheResult<()> {
        let data = serde_json::to_vec(entries)?;
        atomic_write(&self.path, &data)
    }

    /// Raw value stored under `key`.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file cannot be read and
    /// `CacheError::Corrupt` if it does not hold a cache document.
    pub fn get_value(&self, key: &str) -> CacheResult<Option<Value>> {
        Ok(self.load()?.remove(key))
    }

    /// Value stored under `key`, decoded as `T`.
    ///
    /// # Errors
    ///
    /// As [`QueryCache::get_value`], plus `CacheError::Serialization` when the
    /// stored value is not a `T`.
    pub fn get<T: DeserializeOwned>(&self, key: &str) -> CacheResult<Option<T>> {
        self.get_value(key)?
            .map(serde_json::from_value)
            .transpose()
            .map_err(CacheError::from)
    }

    /// Stores `value` under `key`, replacing any previous entry.
    ///
    /// A corrupt file is replaced rather than reported.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` or `CacheError::Serialization` if the entry
    /// cannot be written.
    pub fn put<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> CacheResult<()> {
        let value = serde_json::to_value(value)?;
        let _guard = self.exclusive();
        let mut entries = match self.load() {
            Ok(entries) => entries,
            Err(CacheError::Corrupt(reason)) => {
                debug!("Replacing corrupt cache file: {}", reason);
                Entries::new()
            }
            Err(e) => return Err(e),
        };
        let _ = entries.insert(key.to_string(), value);
        self.save(&entries)
    }

    /// Removes the entry under `key`, returning whether it existed.
    ///
    /// # Errors
    ///
    /// As [`QueryCache::put`].
    pub fn remove(&self, key: &str) -> CacheResult<bool> {
        let _guard = self.exclusive();
        let mut entries = self.load()?;
        let existed = entries.remove(key).is_some();
        if existed {
            self.save(&entries)?;
        }
        Ok(existed)
    }

    /// Stored keys in order.
    ///
    /// # Errors
    ///
    /// As [`QueryCache::get_value`].
    pub fn keys(&self) -> CacheResult<Vec<String>> {
        Ok(self.load()?.into_keys().collect())
    }

    /// Number of stored entries.
    ///
    /// # Errors
    ///
    /// As [`QueryCache::get_value`].
    pub fn len(&self) -> CacheResult<usize> {
        Ok(self.load()?.len())
    }

    /// Returns `true` when nothing is stored.
    ///
    /// # Errors
    ///
    /// As [`QueryCache::get_value`].
    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }

    /// Deletes the cache file.
    ///
    /// # Errors
    ///
    /// Returns `CacheError::Io` if the file exists but cannot be removed.
    pub fn clear(&self) -> CacheResult<()> {
        let _guard = self.exclusive();
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn cache() -> (TempDir, QueryCache) {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path().join("nested").join("cache.json"));
        (dir, cache)
    }

    #[test]
    fn test_missing_file_is_empty() {
        let (_dir, cache) = cache();
        assert!(cache.is_empty().unwrap());
        assert_eq!(cache.get::<String>("k").unwrap(), None);
    }

    #[test]
    fn test_put_get_persists_across_handles() {
        let (_dir, cache) = cache();
        cache.put("k", &vec![1, 2, 3]).unwrap();

        let reopened = QueryCache::open(cache.path());
        assert_eq!(reopened.get::<Vec<i32>>("k").unwrap(), Some(vec![1, 2, 3]));
        assert_eq!(reopened.len().unwrap(), 1);
        let files = fs::read_dir(cache.path().parent().unwrap()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_put_replaces_entry() {
        let (_dir, cache) = cache();
        cache.put("k", "old").unwrap();
        cache.put("k", "new").unwrap();
        cache.put("other", "x").unwrap();

        assert_eq!(cache.get::<String>("k").unwrap().as_deref(), Some("new"));
        assert_eq!(cache.keys().unwrap(), vec!["k", "other"]);
    }

    #[test]
    fn test_corrupt_file() {
        let (_dir, cache) = cache();
        fs::create_dir_all(cache.path().parent().unwrap()).unwrap();
        fs::write(cache.path(), b"{ not json").unwrap();

        assert!(matches!(cache.get_value("k"), Err(CacheError::Corrupt(_))));

        cache.put("k", "fresh").unwrap();
        assert_eq!(cache.get::<String>("k").unwrap().as_deref(), Some("fresh"));
    }

    #[test]
    fn test_wrong_type_is_serialization_error() {
        let (_dir, cache) = cache();
        cache.put("k", "text").unwrap();
        assert!(matches!(
            cache.get::<Vec<u8>>("k"),
            Err(CacheError::Serialization(_))
        ));
    }

    #[test]
    fn test_concurrent_puts_keep_every_key() {
        let (_dir, cache) = cache();
        let handles: Vec<_> = (0..8)
            .map(|t| {
                let cache = if t % 2 == 0 {
                    cache.clone()
                } else {
                    QueryCache::open(cache.path())
                };
                std::thread::spawn(move || {
                    for i in 0..20 {
                        cache.put(&format!("{t}-{i}"), &i).unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(cache.len().unwrap(), 160);
        assert_eq!(cache.get::<i32>("7-19").unwrap(), Some(19));
        let files = fs::read_dir(cache.path().parent().unwrap()).unwrap().count();
        assert_eq!(files, 1);
    }

    #[test]
    fn test_remove_and_clear() {
        let (_dir, cache) = cache();
        cache.put("a", &1).unwrap();
        cache.put("b", &2).unwrap();

        assert!(cache.remove("a").unwrap());
        assert!(!cache.remove("a").unwrap());
        assert_eq!(cache.len().unwrap(), 1);

        cache.clear().unwrap();
        assert!(!cache.path().exists());
        cache.clear().unwrap();
    }
}

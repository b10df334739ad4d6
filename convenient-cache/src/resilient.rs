//! Cache-backed fallback around fallible calls.
//!
//! Protocol, identical for the async and blocking forms:
//!
//! - success: store the result under the key (best effort) and return it
//! - [`crate::Disposition::Transient`] failure: return the stored result for the
//!   key if there is one, otherwise the original error
//! - [`crate::Disposition::Fatal`] failure: return the error, cache untouched
//!
//! The wrapped call is attempted exactly once.

use crate::store::QueryCache;
use crate::{CacheError, CacheResult, Classify};
use serde::Serialize;
use serde::de::DeserializeOwned;
use std::fmt::Display;
use std::future::Future;
use tracing::{debug, warn};

/// Separator between arguments in a cache key.
pub const KEY_SEPARATOR: &str = "|";

/// Joins the `Display` form of every argument with [`KEY_SEPARATOR`].
///
/// Callers keep argument rendering stable across calls that should share
/// an entry.
#[must_use]
pub fn cache_key(args: &[&dyn Display]) -> String {
    args.iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(KEY_SEPARATOR)
}

impl QueryCache {
    /// Runs `call`, falling back to the cached result on a transient failure.
    ///
    /// File access runs on Tokio's blocking pool, so this must be awaited
    /// inside a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns the call's own error when it is fatal, or when it is transient
    /// and no usable entry exists for `key`. Cache failures are logged and
    /// never replace the call's outcome.
    pub async fn call<T, E, F, Fut>(&self, key: &str, call: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: Classify + Display,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        match call().await {
            Ok(value) => {
                let stored = match serde_json::to_value(&value) {
                    Ok(json) => {
                        self.off_thread(key, move |cache, key| cache.put(key, &json))
                            .await
                    }
                    Err(e) => Err(e.into()),
                };
                report_put(key, stored);
                Ok(value)
            }
            Err(error) if error.is_transient() => {
                let lookup = self
                    .off_thread(key, |cache, key| cache.get_value(key))
                    .await
                    .and_then(|stored| {
                        stored
                            .map(serde_json::from_value)
                            .transpose()
                            .map_err(CacheError::from)
                    });
                recover(key, error, lookup)
            }
            Err(error) => Err(error),
        }
    }

    /// Blocking form of [`QueryCache::call`].
    ///
    /// # Errors
    ///
    /// As [`QueryCache::call`].
    pub fn call_sync<T, E, F>(&self, key: &str, call: F) -> Result<T, E>
    where
        T: Serialize + DeserializeOwned,
        E: Classify + Display,
        F: FnOnce() -> Result<T, E>,
    {
        match call() {
            Ok(value) => {
                report_put(key, self.put(key, &value));
                Ok(value)
            }
            Err(error) if error.is_transient() => recover(key, error, self.get(key)),
            Err(error) => Err(error),
        }
    }

    async fn off_thread<R, F>(&self, key: &str, op: F) -> CacheResult<R>
    where
        R: Send + 'static,
        F: FnOnce(&QueryCache, &str) -> CacheResult<R> + Send + 'static,
    {
        let cache = self.clone();
        let key = key.to_string();
        tokio::task::spawn_blocking(move || op(&cache, &key)).await?
    }
}

fn report_put(key: &str, stored: CacheResult<()>) {
    if let Err(e) = stored {
        warn!("Failed to cache result for {}: {}", key, e);
    }
}

fn recover<T, E: Display>(key: &str, error: E, lookup: CacheResult<Option<T>>) -> Result<T, E> {
    match lookup {
        Ok(Some(value)) => {
            warn!("{}; serving cached result for {}", error, key);
            Ok(value)
        }
        Ok(None) => {
            debug!("No cached result for {}", key);
            Err(error)
        }
        Err(e) => {
            warn!("Cache lookup failed for {}: {}", key, e);
            Err(error)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Disposition;
    use std::cell::Cell;
    use std::fmt;
    use tempfile::TempDir;

    #[derive(Debug, PartialEq)]
    enum Failure {
        Flaky,
        Broken,
    }

    impl fmt::Display for Failure {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Classify for Failure {
        fn disposition(&self) -> Disposition {
            match self {
                Failure::Flaky => Disposition::Transient,
                Failure::Broken => Disposition::Fatal,
            }
        }
    }

    #[test]
    fn test_cache_key_joins_display_forms() {
        assert_eq!(cache_key(&[&"q", &42, &'x']), "q|42|x");
        assert_eq!(cache_key(&[]), "");
    }

    #[test]
    fn test_sync_protocol() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path().join("cache.json"));

        let first: Result<String, Failure> = cache.call_sync("k", || Ok("live".into()));
        assert_eq!(first, Ok("live".to_string()));

        let fallback: Result<String, Failure> = cache.call_sync("k", || Err(Failure::Flaky));
        assert_eq!(fallback, Ok("live".to_string()));

        let fatal: Result<String, Failure> = cache.call_sync("k", || Err(Failure::Broken));
        assert_eq!(fatal, Err(Failure::Broken));

        let miss: Result<String, Failure> = cache.call_sync("other", || Err(Failure::Flaky));
        assert_eq!(miss, Err(Failure::Flaky));
    }

    #[test]
    fn test_call_runs_once() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path().join("cache.json"));
        let attempts = Cell::new(0);

        let result: Result<u32, Failure> = cache.call_sync("k", || {
            attempts.set(attempts.get() + 1);
            Err(Failure::Flaky)
        });

        assert_eq!(result, Err(Failure::Flaky));
        assert_eq!(attempts.get(), 1);
    }

    #[test]
    fn test_unwritable_cache_still_returns_live_result() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"").unwrap();
        let cache = QueryCache::open(blocker.join("cache.json"));

        let result: Result<u32, Failure> = cache.call_sync("k", || Ok(7));

        assert_eq!(result, Ok(7));
    }

    #[tokio::test]
    async fn test_async_protocol() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path().join("cache.json"));

        let live: Result<Vec<u32>, Failure> = cache.call("k", || async { Ok(vec![1, 2]) }).await;
        assert_eq!(live, Ok(vec![1, 2]));

        let cached: Result<Vec<u32>, Failure> =
            cache.call("k", || async { Err(Failure::Flaky) }).await;
        assert_eq!(cached, Ok(vec![1, 2]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_async_calls_keep_every_result() {
        let dir = TempDir::new().unwrap();
        let cache = QueryCache::open(dir.path().join("cache.json"));

        let tasks: Vec<_> = (0..16u32)
            .map(|n| {
                let cache = cache.clone();
                tokio::spawn(async move {
                    let key = format!("k{n}");
                    cache.call(&key, || async move { Ok::<u32, Failure>(n) }).await
                })
            })
            .collect();
        for task in tasks {
            assert!(task.await.unwrap().is_ok());
        }

        assert_eq!(cache.len().unwrap(), 16);
        for n in 0..16u32 {
            let key = format!("k{n}");
            let cached: Result<u32, Failure> =
                cache.call(&key, || async { Err(Failure::Flaky) }).await;
            assert_eq!(cached, Ok(n));
        }
    }
}

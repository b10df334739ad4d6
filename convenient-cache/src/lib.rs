//! Durable query-result cache with failure-classified fallback
//!
//! Wraps any fallible call so that every success is remembered on disk and a
//! later *transient* failure of the same call can be answered from the last
//! good result. Non-transient failures always propagate.
//!
//! # Features
//!
//! - One JSON file per cache, opened and closed per operation
//! - Atomic writes (temp file, fsync, rename)
//! - Failure classification through the [`Classify`] trait
//! - Async [`QueryCache::call`] (file access on the blocking pool) and
//!   blocking [`QueryCache::call_sync`]
//!
//! # Example
//!
//! ```no_run
//! use convenient_cache::{Classify, Disposition, QueryCache, cache_key};
//!
//! #[derive(Debug)]
//! struct Offline;
//!
//! impl std::fmt::Display for Offline {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "endpoint offline")
//!     }
//! }
//!
//! impl Classify for Offline {
//!     fn disposition(&self) -> Disposition {
//!         Disposition::Transient
//!     }
//! }
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let cache = QueryCache::open_default("graph-sbol")?;
//! let key = cache_key(&[&"SELECT ?s WHERE { ?s ?p ?o }", &"alice"]);
//!
//! let rows: Result<Vec<String>, Offline> =
//!     cache.call_sync(&key, || Ok(vec!["a".to_string()]));
//! assert_eq!(rows.ok(), Some(vec!["a".to_string()]));
//! # Ok(())
//! # }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]
#![warn(unused_results)]

pub mod resilient;
pub mod store;

pub use resilient::{KEY_SEPARATOR, cache_key};
pub use store::QueryCache;

/// Error types for cache operations
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// Filesystem failure
    #[error("Cache I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Entry could not be converted to or from JSON
    #[error("Cache serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Cache file exists but does not hold a cache document
    #[error("Corrupt cache file: {0}")]
    Corrupt(String),

    /// Blocking store access panicked or was cancelled
    #[error("Cache task failed: {0}")]
    Task(#[from] tokio::task::JoinError),

    /// No per-user cache directory on this platform
    #[error("No cache directory available")]
    NoCacheDir,
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

/// How a failure is treated by the cache wrapper.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Disposition {
    /// Recognized, possibly temporary failure: fall back to the cache
    Transient,
    /// Anything else: propagate without touching the cache
    Fatal,
}

/// Maps an error to its [`Disposition`].
pub trait Classify {
    /// The disposition of this error.
    fn disposition(&self) -> Disposition;

    /// Shorthand for `disposition() == Disposition::Transient`.
    fn is_transient(&self) -> bool {
        self.disposition() == Disposition::Transient
    }
}

//! Response cache
//!
//! A content-addressed store of fetched page bodies, keyed by the
//! normalized request URL plus the region identity. Its job is
//! correctness (never refetch an unchanged page within one crawl or a
//! short repeat window), not working-set management, so there is no
//! eviction; the operator clears it between runs when needed.

mod key;
mod store;

pub use key::RequestKey;
pub use store::{CacheEntry, CacheStore};

use thiserror::Error;

/// Errors that can occur during cache operations
#[derive(Debug, Error)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Malformed cache entry for key {0}")]
    Malformed(String),

    #[error("Cannot build cache key: {0}")]
    Key(String),
}

/// Result type for cache operations
pub type CacheResult<T> = Result<T, CacheError>;

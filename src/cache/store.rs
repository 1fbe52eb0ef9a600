//! SQLite-backed cache store
//!
//! Entries survive process restarts so repeat crawls within the freshness
//! window skip the network entirely. A single `INSERT OR REPLACE` per
//! write keeps entries atomic: either the full entry lands or nothing
//! does. Writes are idempotent and last-write-wins by timestamp.

use crate::cache::key::RequestKey;
use crate::cache::CacheResult;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

/// SQL schema for the cache database
const SCHEMA_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS cache_entries (
    key TEXT PRIMARY KEY,
    url TEXT NOT NULL,
    region TEXT NOT NULL,
    status INTEGER NOT NULL,
    body TEXT NOT NULL,
    fetched_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_cache_region ON cache_entries(region);
"#;

/// One cached response
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Normalized request URL the body was fetched from
    pub url: String,

    /// Region identity the response was localized for
    pub region: String,

    /// HTTP status of the original fetch
    pub status: u16,

    /// Raw response body
    pub body: String,

    /// When the response was fetched
    pub fetched_at: DateTime<Utc>,
}

/// Persistent response cache
///
/// Safe for concurrent use across worker tasks; all access goes through
/// one connection behind a mutex. Concurrent writers to the same key may
/// race, which is acceptable: content is idempotent per key.
pub struct CacheStore {
    conn: Mutex<Connection>,
}

impl CacheStore {
    /// Opens (or creates) the cache database at the given path
    pub fn open(path: &Path) -> CacheResult<Self> {
        let conn = Connection::open(path)?;

        conn.execute_batch(
            "
            PRAGMA journal_mode = WAL;
            PRAGMA synchronous = NORMAL;
            PRAGMA temp_store = MEMORY;
        ",
        )?;

        conn.execute_batch(SCHEMA_SQL)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Creates an in-memory cache (for testing)
    pub fn in_memory() -> CacheResult<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA_SQL)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Looks up the entry for a request key, if any
    pub fn lookup(&self, key: &RequestKey) -> CacheResult<Option<CacheEntry>> {
        let conn = self.conn.lock().expect("cache mutex poisoned");

        let mut stmt = conn.prepare(
            "SELECT url, region, status, body, fetched_at FROM cache_entries WHERE key = ?1",
        )?;

        let entry = stmt
            .query_row(params![key.digest()], |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, u16>(2)?,
                    row.get::<_, String>(3)?,
                    row.get::<_, String>(4)?,
                ))
            })
            .optional()?;

        match entry {
            Some((url, region, status, body, fetched_at)) => {
                let fetched_at = fetched_at
                    .parse::<DateTime<Utc>>()
                    .map_err(|_| crate::cache::CacheError::Malformed(key.digest()))?;
                Ok(Some(CacheEntry {
                    url,
                    region,
                    status,
                    body,
                    fetched_at,
                }))
            }
            None => Ok(None),
        }
    }

    /// Stores a fetched response under the given key
    ///
    /// Called unconditionally for every successful fetch, including those
    /// that bypassed a still-fresh entry via forced refresh.
    pub fn store(&self, key: &RequestKey, status: u16, body: &str) -> CacheResult<()> {
        let conn = self.conn.lock().expect("cache mutex poisoned");

        conn.execute(
            "INSERT OR REPLACE INTO cache_entries (key, url, region, status, body, fetched_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                key.digest(),
                key.url(),
                key.region(),
                status,
                body,
                Utc::now().to_rfc3339(),
            ],
        )?;

        Ok(())
    }

    /// Whether an entry can still be served without refetching
    ///
    /// Fresh means: the original fetch succeeded and the entry is no older
    /// than `max_age`.
    pub fn is_fresh(entry: &CacheEntry, max_age: chrono::Duration) -> bool {
        if !(200..300).contains(&entry.status) {
            return false;
        }
        Utc::now() - entry.fetched_at <= max_age
    }

    /// Removes every entry; the operator's between-runs reset
    pub fn clear(&self) -> CacheResult<usize> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let removed = conn.execute("DELETE FROM cache_entries", [])?;
        Ok(removed)
    }

    /// Number of stored entries
    pub fn len(&self) -> CacheResult<usize> {
        let conn = self.conn.lock().expect("cache mutex poisoned");
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM cache_entries", [], |row| row.get(0))?;
        Ok(count as usize)
    }

    pub fn is_empty(&self) -> CacheResult<bool> {
        Ok(self.len()? == 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::region::RegionContext;
    use url::Url;

    fn test_key(path: &str) -> RequestKey {
        let url = Url::parse(&format!("https://example.com{}", path)).unwrap();
        RequestKey::new(&url, &RegionContext::new("Краснодар", "uuid-1")).unwrap()
    }

    #[test]
    fn test_store_then_lookup_is_fresh() {
        let store = CacheStore::in_memory().unwrap();
        let key = test_key("/product?page=1");

        store.store(&key, 200, r#"{"success":true}"#).unwrap();

        let entry = store.lookup(&key).unwrap().expect("entry present");
        assert_eq!(entry.status, 200);
        assert_eq!(entry.body, r#"{"success":true}"#);
        assert!(CacheStore::is_fresh(&entry, chrono::Duration::hours(24)));
    }

    #[test]
    fn test_lookup_missing_key() {
        let store = CacheStore::in_memory().unwrap();
        assert!(store.lookup(&test_key("/missing")).unwrap().is_none());
    }

    #[test]
    fn test_store_is_idempotent_last_write_wins() {
        let store = CacheStore::in_memory().unwrap();
        let key = test_key("/product");

        store.store(&key, 200, "first").unwrap();
        store.store(&key, 200, "second").unwrap();

        let entry = store.lookup(&key).unwrap().unwrap();
        assert_eq!(entry.body, "second");
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_non_success_entry_is_never_fresh() {
        let store = CacheStore::in_memory().unwrap();
        let key = test_key("/product");

        store.store(&key, 500, "oops").unwrap();

        let entry = store.lookup(&key).unwrap().unwrap();
        assert!(!CacheStore::is_fresh(&entry, chrono::Duration::hours(24)));
    }

    #[test]
    fn test_aged_out_entry_is_stale() {
        let entry = CacheEntry {
            url: "https://example.com/product".to_string(),
            region: "uuid-1".to_string(),
            status: 200,
            body: String::new(),
            fetched_at: Utc::now() - chrono::Duration::hours(25),
        };
        assert!(!CacheStore::is_fresh(&entry, chrono::Duration::hours(24)));
        assert!(CacheStore::is_fresh(&entry, chrono::Duration::hours(48)));
    }

    #[test]
    fn test_zero_max_age_disables_reuse() {
        let store = CacheStore::in_memory().unwrap();
        let key = test_key("/product");
        store.store(&key, 200, "body").unwrap();

        let entry = store.lookup(&key).unwrap().unwrap();
        assert!(!CacheStore::is_fresh(&entry, chrono::Duration::zero()));
    }

    #[test]
    fn test_clear_removes_everything() {
        let store = CacheStore::in_memory().unwrap();
        store.store(&test_key("/a"), 200, "a").unwrap();
        store.store(&test_key("/b"), 200, "b").unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_entries_are_separated_by_region() {
        let store = CacheStore::in_memory().unwrap();
        let url = Url::parse("https://example.com/product").unwrap();
        let key_a = RequestKey::new(&url, &RegionContext::new("A", "uuid-a")).unwrap();
        let key_b = RequestKey::new(&url, &RegionContext::new("B", "uuid-b")).unwrap();

        store.store(&key_a, 200, "price for A").unwrap();

        assert!(store.lookup(&key_a).unwrap().is_some());
        assert!(store.lookup(&key_b).unwrap().is_none());
    }

    #[test]
    fn test_persists_across_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cache.db");
        let key = test_key("/product");

        {
            let store = CacheStore::open(&path).unwrap();
            store.store(&key, 200, "persisted").unwrap();
        }

        let store = CacheStore::open(&path).unwrap();
        let entry = store.lookup(&key).unwrap().unwrap();
        assert_eq!(entry.body, "persisted");
    }
}

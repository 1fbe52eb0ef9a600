//! Crawler module
//!
//! The crawl pipeline: fetch client with proxy rotation and retries,
//! cache-aware page source, category pagination, and the coordinator
//! that drives extraction and emits the output stream.

mod coordinator;
mod fetcher;
mod paginator;

pub use coordinator::{run_crawl, Coordinator};
pub use fetcher::{FetchClient, FetchOutcome, ProxyPool};
pub use paginator::{category_slug, CategoryPaginator, ListingPage, PaginationStep};

use crate::cache::{CacheStore, RequestKey};
use crate::output::RunStats;
use crate::region::RegionContext;
use std::sync::Arc;
use url::Url;

/// Fetch-through-cache page source
///
/// The composition every catalog request goes through: a fresh cache
/// entry answers without touching the network; anything else goes to the
/// fetch client and, on success, is written back unconditionally. Cache
/// failures degrade to plain fetches rather than failing the request;
/// the cache is an optimization for the caller, not a gatekeeper.
pub struct PageSource {
    fetcher: Arc<FetchClient>,
    cache: Arc<CacheStore>,
    region: RegionContext,
    max_age: chrono::Duration,
    refresh: bool,
    stats: Arc<RunStats>,
}

impl PageSource {
    pub fn new(
        fetcher: Arc<FetchClient>,
        cache: Arc<CacheStore>,
        region: RegionContext,
        max_age: chrono::Duration,
        refresh: bool,
        stats: Arc<RunStats>,
    ) -> Self {
        Self {
            fetcher,
            cache,
            region,
            max_age,
            refresh,
            stats,
        }
    }

    /// The region every request from this source is localized for
    pub fn region(&self) -> &RegionContext {
        &self.region
    }

    pub fn fetcher(&self) -> &FetchClient {
        &self.fetcher
    }

    /// Fetches a page, serving it from the cache when possible
    pub async fn get(&self, url: &Url) -> FetchOutcome {
        let key = match RequestKey::new(url, &self.region) {
            Ok(key) => Some(key),
            Err(e) => {
                tracing::warn!("Cannot build cache key for {}: {}", url, e);
                None
            }
        };

        if !self.refresh {
            if let Some(key) = &key {
                match self.cache.lookup(key) {
                    Ok(Some(entry)) if CacheStore::is_fresh(&entry, self.max_age) => {
                        tracing::debug!("Cache hit for {}", url);
                        self.stats.record_cache_hit();
                        return FetchOutcome::Success {
                            body: entry.body,
                            status: entry.status,
                            final_url: entry.url,
                        };
                    }
                    Ok(_) => {}
                    Err(e) => tracing::warn!("Cache lookup failed for {}: {}", url, e),
                }
            }
        }

        let outcome = self.fetcher.fetch(url, &self.region).await;

        if let FetchOutcome::Success { body, status, .. } = &outcome {
            self.stats.record_network_fetch();
            if let Some(key) = &key {
                if let Err(e) = self.cache.store(key, *status, body) {
                    tracing::warn!("Cache write failed for {}: {}", url, e);
                }
            }
        }

        outcome
    }
}

//! Run accounting
//!
//! Counters shared across worker tasks; the final snapshot is the run
//! summary surfaced to the operator. A crawl that fails midway still
//! produces partial, usable output plus these counts.

use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

/// Live counters updated by the fetch, pagination, and extraction paths
#[derive(Debug, Default)]
pub struct RunStats {
    listing_pages: AtomicU64,
    pages_failed: AtomicU64,
    cache_hits: AtomicU64,
    network_fetches: AtomicU64,
    items_listed: AtomicU64,
    items_full: AtomicU64,
    items_degraded: AtomicU64,
    items_dropped: AtomicU64,
    categories_partial: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record_listing_page(&self) {
        self.listing_pages.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_page_failed(&self) {
        self.pages_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_cache_hit(&self) {
        self.cache_hits.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_network_fetch(&self) {
        self.network_fetches.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_listed(&self) {
        self.items_listed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_full(&self) {
        self.items_full.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_degraded(&self) {
        self.items_degraded.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_item_dropped(&self) {
        self.items_dropped.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_category_partial(&self) {
        self.categories_partial.fetch_add(1, Ordering::Relaxed);
    }

    /// Point-in-time copy of the counters
    pub fn snapshot(&self) -> RunSummary {
        RunSummary {
            listing_pages: self.listing_pages.load(Ordering::Relaxed),
            pages_failed: self.pages_failed.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            network_fetches: self.network_fetches.load(Ordering::Relaxed),
            items_listed: self.items_listed.load(Ordering::Relaxed),
            items_full: self.items_full.load(Ordering::Relaxed),
            items_degraded: self.items_degraded.load(Ordering::Relaxed),
            items_dropped: self.items_dropped.load(Ordering::Relaxed),
            categories_partial: self.categories_partial.load(Ordering::Relaxed),
        }
    }
}

/// Final run summary
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RunSummary {
    /// Listing pages successfully fetched and extracted
    pub listing_pages: u64,

    /// Pages (listing or detail) that failed past all retries
    pub pages_failed: u64,

    /// Requests answered from the response cache
    pub cache_hits: u64,

    /// Requests that went to the network
    pub network_fetches: u64,

    /// Summaries emitted as terminal output (fast mode)
    pub items_listed: u64,

    /// Items with the full attribute set
    pub items_full: u64,

    /// Items emitted with listing data only after a detail failure
    pub items_degraded: u64,

    /// Items lost to detail failures under a strict emit policy
    pub items_dropped: u64,

    /// Categories that stopped early with partial results
    pub categories_partial: u64,
}

impl RunSummary {
    /// Total items that reached the sink
    pub fn items_emitted(&self) -> u64 {
        self.items_listed + self.items_full + self.items_degraded
    }
}

/// Prints the run summary to stdout in a formatted manner
pub fn print_summary(summary: &RunSummary) {
    println!("=== Crawl Summary ===\n");

    println!("Pages:");
    println!("  Listing pages extracted: {}", summary.listing_pages);
    println!("  Pages failed: {}", summary.pages_failed);
    println!("  Cache hits: {}", summary.cache_hits);
    println!("  Network fetches: {}", summary.network_fetches);
    println!();

    println!("Items:");
    if summary.items_listed > 0 {
        println!("  Summaries emitted: {}", summary.items_listed);
    }
    println!("  Fully parsed: {}", summary.items_full);
    println!("  Degraded: {}", summary.items_degraded);
    println!("  Dropped: {}", summary.items_dropped);
    println!();

    if summary.categories_partial > 0 {
        println!(
            "Categories with partial results: {}",
            summary.categories_partial
        );
    }

    println!("Total items emitted: {}", summary.items_emitted());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_reflects_counters() {
        let stats = RunStats::new();
        stats.record_listing_page();
        stats.record_listing_page();
        stats.record_item_full();
        stats.record_item_degraded();
        stats.record_cache_hit();

        let summary = stats.snapshot();
        assert_eq!(summary.listing_pages, 2);
        assert_eq!(summary.items_full, 1);
        assert_eq!(summary.items_degraded, 1);
        assert_eq!(summary.cache_hits, 1);
        assert_eq!(summary.items_emitted(), 2);
    }

    #[test]
    fn test_default_summary_is_zeroed() {
        let summary = RunStats::new().snapshot();
        assert_eq!(summary, RunSummary::default());
        assert_eq!(summary.items_emitted(), 0);
    }
}

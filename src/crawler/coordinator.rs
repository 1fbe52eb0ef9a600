//! Crawl coordinator
//!
//! Drives the whole pipeline: resolves the region once, runs one
//! paginator per category root under bounded concurrency, extracts
//! summaries from every listing page, and (in full mode) dispatches a
//! bounded pool of detail fetch+extract tasks, emitting each merged
//! record as it completes. Failures stay contained at the page or item
//! level; only an unknown region or a fully blocked proxy pool abort
//! the run.

use crate::cache::CacheStore;
use crate::config::Config;
use crate::crawler::paginator::{detail_url, CategoryPaginator, PaginationStep};
use crate::crawler::{FetchClient, FetchOutcome, PageSource};
use crate::extract::{detail, listing};
use crate::model::{CatalogItem, ProductSummary};
use crate::output::{ProductSink, RunStats, RunSummary};
use crate::region::resolve_region;
use crate::VitrinaError;
use std::path::Path;
use std::sync::{Arc, Mutex};
use std::time::Instant;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Main crawl coordinator structure
pub struct Coordinator {
    config: Arc<Config>,
    fetcher: Arc<FetchClient>,
    cache: Arc<CacheStore>,
    sink: Arc<Mutex<dyn ProductSink>>,
    stats: Arc<RunStats>,
    stop: CancellationToken,
    refresh: bool,
}

impl Coordinator {
    /// Creates a new coordinator instance
    ///
    /// # Arguments
    ///
    /// * `config` - The validated crawl configuration
    /// * `sink` - Receiver of the output stream
    /// * `refresh` - Bypass cache reads (responses are still written back)
    /// * `stop` - Cooperative stop signal; no new fetches start after it
    ///   fires, in-flight work drains and is still emitted
    pub fn new(
        config: Config,
        sink: Arc<Mutex<dyn ProductSink>>,
        refresh: bool,
        stop: CancellationToken,
    ) -> Result<Self, VitrinaError> {
        let fetcher = Arc::new(FetchClient::new(&config.crawler, &config.proxy)?);
        let cache = Arc::new(CacheStore::open(Path::new(&config.cache.database_path))?);

        Ok(Self {
            config: Arc::new(config),
            fetcher,
            cache,
            sink,
            stats: Arc::new(RunStats::new()),
            stop,
            refresh,
        })
    }

    /// Runs the crawl to completion (or cancellation) and returns the
    /// run summary
    pub async fn run(&self) -> Result<RunSummary, VitrinaError> {
        let started = Instant::now();

        // No meaningful crawl without a valid region; resolver failures
        // abort before any catalog page is requested
        let region = resolve_region(&self.fetcher, &self.config).await?;

        let source = Arc::new(PageSource::new(
            self.fetcher.clone(),
            self.cache.clone(),
            region,
            self.config.cache.max_age(),
            self.refresh,
            self.stats.clone(),
        ));

        let mode = if self.config.crawler.parse_product_details {
            "full"
        } else {
            "listing-only"
        };
        tracing::info!(
            "Starting {} crawl of {} categories for city '{}'",
            mode,
            self.config.catalog.roots.len(),
            source.region().city()
        );

        let category_sem = Arc::new(Semaphore::new(
            self.config.crawler.max_concurrent_categories,
        ));
        let detail_sem = Arc::new(Semaphore::new(self.config.crawler.max_concurrent_details));

        let mut categories: JoinSet<Result<(), VitrinaError>> = JoinSet::new();

        for root in &self.config.catalog.roots {
            let root = root.clone();
            let config = self.config.clone();
            let source = source.clone();
            let sink = self.sink.clone();
            let stats = self.stats.clone();
            let detail_sem = detail_sem.clone();
            let category_sem = category_sem.clone();
            let stop = self.stop.clone();

            categories.spawn(async move {
                let _permit = match category_sem.acquire_owned().await {
                    Ok(permit) => permit,
                    Err(_) => return Ok(()),
                };
                crawl_category(root, config, source, sink, stats, detail_sem, stop).await
            });
        }

        let mut fatal: Option<VitrinaError> = None;
        while let Some(joined) = categories.join_next().await {
            match joined {
                Ok(Ok(())) => {}
                Ok(Err(e)) => {
                    if fatal.is_none() {
                        tracing::error!("Fatal crawl failure: {}", e);
                        // Wind down the remaining categories; their
                        // in-flight work still drains and emits
                        self.stop.cancel();
                        fatal = Some(e);
                    }
                }
                Err(join_err) => {
                    tracing::error!("Category worker panicked: {}", join_err);
                }
            }
        }

        self.sink
            .lock()
            .expect("sink mutex poisoned")
            .finish()?;

        if let Some(e) = fatal {
            return Err(e);
        }

        let summary = self.stats.snapshot();
        tracing::info!(
            "Crawl completed in {:.1?}: {} items emitted ({} full, {} degraded, {} dropped), {} pages failed",
            started.elapsed(),
            summary.items_emitted(),
            summary.items_full,
            summary.items_degraded,
            summary.items_dropped,
            summary.pages_failed
        );

        Ok(summary)
    }
}

/// Crawls one category root to exhaustion, cancellation, or failure
async fn crawl_category(
    root: String,
    config: Arc<Config>,
    source: Arc<PageSource>,
    sink: Arc<Mutex<dyn ProductSink>>,
    stats: Arc<RunStats>,
    detail_sem: Arc<Semaphore>,
    stop: CancellationToken,
) -> Result<(), VitrinaError> {
    let mut paginator = match CategoryPaginator::new(source.clone(), config.api.clone(), &root) {
        Ok(paginator) => paginator,
        Err(e) => {
            // A bad root skips that category, not the run
            tracing::error!("Skipping category: {}", e);
            stats.record_category_partial();
            return Ok(());
        }
    };

    let mut details: JoinSet<()> = JoinSet::new();

    while !stop.is_cancelled() {
        match paginator.next_page().await {
            PaginationStep::Exhausted => break,

            PaginationStep::Failed { url, reason } => {
                stats.record_page_failed();
                stats.record_category_partial();
                tracing::warn!(
                    "Category '{}' stopped with partial results at {}: {}",
                    paginator.slug(),
                    url,
                    reason
                );
                break;
            }

            PaginationStep::Page(page) => {
                let summaries = match listing::extract(&page.body) {
                    Ok(summaries) => summaries,
                    Err(e) => {
                        // Page-scoped: log, count, move on
                        stats.record_page_failed();
                        tracing::warn!("Cannot extract listing page {}: {}", page.url, e);
                        continue;
                    }
                };

                stats.record_listing_page();
                tracing::info!(
                    "Category '{}' page {}: {} products",
                    paginator.slug(),
                    page.number,
                    summaries.len()
                );

                for summary in summaries {
                    if stop.is_cancelled() {
                        break;
                    }

                    let wants_detail =
                        config.crawler.parse_product_details && summary.slug.is_some();

                    if !wants_detail {
                        emit(&sink, &stats, CatalogItem::Summary(summary), Emit::Listed);
                        continue;
                    }

                    let permit = match detail_sem.clone().acquire_owned().await {
                        Ok(permit) => permit,
                        Err(_) => break,
                    };

                    let config = config.clone();
                    let source = source.clone();
                    let sink = sink.clone();
                    let stats = stats.clone();

                    details.spawn(async move {
                        let _permit = permit;
                        fetch_and_emit_detail(summary, config, source, sink, stats).await;
                    });
                }
            }
        }
    }

    // In-flight detail work is allowed to finish and still emits
    while details.join_next().await.is_some() {}

    if source.fetcher().pool_exhausted() {
        return Err(VitrinaError::ProxyPoolExhausted);
    }

    Ok(())
}

/// Fetches one product's detail page and emits the merged record, falling
/// back to the summary per the configured partial-emit policy
async fn fetch_and_emit_detail(
    summary: ProductSummary,
    config: Arc<Config>,
    source: Arc<PageSource>,
    sink: Arc<Mutex<dyn ProductSink>>,
    stats: Arc<RunStats>,
) {
    let Some(slug) = summary.slug.clone() else {
        emit(&sink, &stats, CatalogItem::Summary(summary), Emit::Listed);
        return;
    };

    let url = match detail_url(&config.api, source.region(), &slug) {
        Ok(url) => url,
        Err(e) => {
            tracing::warn!("Cannot build detail URL for '{}': {}", slug, e);
            degrade(&config, &sink, &stats, summary);
            return;
        }
    };

    let body = match source.get(&url).await {
        FetchOutcome::Success { body, .. } => body,
        other => {
            stats.record_page_failed();
            tracing::warn!(
                "Detail fetch failed for '{}' ({}): {}",
                summary.name,
                url,
                other.reason()
            );
            degrade(&config, &sink, &stats, summary);
            return;
        }
    };

    match detail::extract(&body, &summary) {
        Ok(record) => {
            emit(
                &sink,
                &stats,
                CatalogItem::Record(Box::new(record)),
                Emit::Full,
            );
        }
        Err(e) => {
            tracing::warn!("Detail extraction failed for '{}': {}", summary.name, e);
            degrade(&config, &sink, &stats, summary);
        }
    }
}

/// Applies the partial-emit policy after a detail failure
fn degrade(
    config: &Config,
    sink: &Arc<Mutex<dyn ProductSink>>,
    stats: &Arc<RunStats>,
    summary: ProductSummary,
) {
    if config.crawler.emit_partial_on_detail_failure {
        emit(sink, stats, CatalogItem::Summary(summary), Emit::Degraded);
    } else {
        stats.record_item_dropped();
    }
}

enum Emit {
    Listed,
    Full,
    Degraded,
}

fn emit(
    sink: &Arc<Mutex<dyn ProductSink>>,
    stats: &Arc<RunStats>,
    item: CatalogItem,
    kind: Emit,
) {
    let result = sink.lock().expect("sink mutex poisoned").emit(&item);

    match result {
        Ok(()) => match kind {
            Emit::Listed => stats.record_item_listed(),
            Emit::Full => stats.record_item_full(),
            Emit::Degraded => stats.record_item_degraded(),
        },
        Err(e) => {
            tracing::error!("Sink rejected item {}: {}", item.id(), e);
            stats.record_item_dropped();
        }
    }
}

/// Runs the main crawl operation
///
/// Convenience entry point: builds a coordinator and runs it.
///
/// # Example
///
/// ```no_run
/// use std::sync::{Arc, Mutex};
/// use tokio_util::sync::CancellationToken;
/// use vitrina::config::load_config;
/// use vitrina::crawler::run_crawl;
/// use vitrina::output::{ProductSink, VecSink};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = load_config(std::path::Path::new("config.toml"))?;
/// let sink: Arc<Mutex<dyn ProductSink>> = Arc::new(Mutex::new(VecSink::new()));
/// let summary = run_crawl(config, sink, false, CancellationToken::new()).await?;
/// println!("{} items", summary.items_emitted());
/// # Ok(())
/// # }
/// ```
pub async fn run_crawl(
    config: Config,
    sink: Arc<Mutex<dyn ProductSink>>,
    refresh: bool,
    stop: CancellationToken,
) -> Result<RunSummary, VitrinaError> {
    let coordinator = Coordinator::new(config, sink, refresh, stop)?;
    coordinator.run().await
}

//! Vitrina main entry point
//!
//! Command-line interface for the catalog crawler.

use anyhow::Context;
use clap::Parser;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;
use vitrina::cache::CacheStore;
use vitrina::config::{load_config, Config};
use vitrina::crawler::run_crawl;
use vitrina::output::{print_summary, JsonLinesSink, ProductSink};

/// Vitrina: region-aware storefront catalog crawler
///
/// Crawls the configured catalog categories, localized to the target
/// city, and writes one product record per line to the output feed.
#[derive(Parser, Debug)]
#[command(name = "vitrina")]
#[command(version)]
#[command(about = "Region-aware storefront catalog crawler", long_about = None)]
struct Cli {
    /// Path to TOML configuration file
    #[arg(value_name = "CONFIG")]
    config: PathBuf,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Suppress non-error output
    #[arg(short, long, conflicts_with = "verbose")]
    quiet: bool,

    /// Crawl listing pages only, regardless of the configured mode
    #[arg(long)]
    no_details: bool,

    /// Bypass cache reads; every page is refetched and written back
    #[arg(long)]
    refresh: bool,

    /// Clear the response cache and exit
    #[arg(long, conflicts_with = "dry_run")]
    clear_cache: bool,

    /// Validate config and show what would be crawled without crawling
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    setup_logging(cli.verbose, cli.quiet);

    tracing::info!("Loading configuration from: {}", cli.config.display());
    let mut config = load_config(&cli.config)
        .with_context(|| format!("failed to load {}", cli.config.display()))?;

    if cli.no_details {
        config.crawler.parse_product_details = false;
    }

    if cli.clear_cache {
        handle_clear_cache(&config)?;
        return Ok(());
    }

    if cli.dry_run {
        handle_dry_run(&config);
        return Ok(());
    }

    handle_crawl(config, cli.refresh).await
}

/// Sets up the tracing subscriber based on verbosity level
fn setup_logging(verbose: u8, quiet: bool) {
    let filter = if quiet {
        EnvFilter::new("error")
    } else {
        match verbose {
            0 => EnvFilter::new("vitrina=info,warn"),
            1 => EnvFilter::new("vitrina=debug,info"),
            2 => EnvFilter::new("vitrina=trace,debug"),
            _ => EnvFilter::new("trace"),
        }
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .init();
}

/// Handles --clear-cache: the operator's between-runs reset
fn handle_clear_cache(config: &Config) -> anyhow::Result<()> {
    let store = CacheStore::open(Path::new(&config.cache.database_path))?;
    let removed = store.clear()?;
    println!(
        "Cleared {} cached responses from {}",
        removed, config.cache.database_path
    );
    Ok(())
}

/// Handles --dry-run: validates config and shows the crawl plan
fn handle_dry_run(config: &Config) {
    println!("=== Vitrina Dry Run ===\n");

    println!("Region:");
    println!("  Target city: {}", config.region.target_city);

    println!("\nMode:");
    println!(
        "  {}",
        if config.crawler.parse_product_details {
            "full (listing + product details)"
        } else {
            "listing-only"
        }
    );
    println!(
        "  Concurrency: {} categories, {} detail fetches",
        config.crawler.max_concurrent_categories, config.crawler.max_concurrent_details
    );
    println!(
        "  Retries: {} with {}ms base backoff",
        config.crawler.max_retries, config.crawler.retry_base_delay_ms
    );

    println!("\nAPI:");
    println!("  Base URL: {}", config.api.base_url);
    println!("  Per page: {}", config.api.per_page);

    println!("\nProxy pool ({}):", config.proxy.endpoints.len());
    if config.proxy.endpoints.is_empty() {
        println!("  (direct requests)");
    }
    for endpoint in &config.proxy.endpoints {
        println!("  - {}", endpoint);
    }

    println!("\nCache:");
    println!("  Database: {}", config.cache.database_path);
    println!("  Max age: {}h", config.cache.max_age_hours);

    println!("\nOutput:");
    println!("  Products: {}", config.output.products_path);

    println!("\nCategories ({}):", config.catalog.roots.len());
    for root in &config.catalog.roots {
        println!("  - {}", root);
    }

    println!("\n✓ Configuration is valid");
}

/// Handles the main crawl operation
async fn handle_crawl(config: Config, refresh: bool) -> anyhow::Result<()> {
    let stop = CancellationToken::new();

    // First Ctrl-C stops dispatching new fetches; in-flight work drains
    {
        let stop = stop.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                tracing::warn!("Interrupt received, finishing in-flight work");
                stop.cancel();
            }
        });
    }

    let products_path = config.output.products_path.clone();
    let sink: Arc<Mutex<dyn ProductSink>> = Arc::new(Mutex::new(
        JsonLinesSink::create(Path::new(&products_path))
            .with_context(|| format!("cannot create {}", products_path))?,
    ));

    match run_crawl(config, sink, refresh, stop).await {
        Ok(summary) => {
            print_summary(&summary);
            println!("\nProducts written to: {}", products_path);
            Ok(())
        }
        Err(e) => {
            tracing::error!("Crawl failed: {}", e);
            Err(e.into())
        }
    }
}

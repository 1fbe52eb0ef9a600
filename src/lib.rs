//! Vitrina: a region-aware storefront catalog crawler
//!
//! This crate crawls a catalog web API, discovers product listings within
//! operator-selected categories, and extracts structured product records,
//! optionally visiting each product's detail endpoint for the full
//! attribute set. Responses are localized to a target city, cached across
//! runs, and fetched through an optional rotating proxy pool.

pub mod cache;
pub mod config;
pub mod crawler;
pub mod extract;
pub mod model;
pub mod output;
pub mod region;

use thiserror::Error;

/// Main error type for Vitrina operations
#[derive(Debug, Error)]
pub enum VitrinaError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Unknown region: city '{city}' is not offered by the origin site")]
    UnknownRegion { city: String },

    #[error("Failed to enumerate regions: {reason}")]
    RegionFetch { reason: String },

    #[error("Proxy pool exhausted: every endpoint is blocked by the origin site")]
    ProxyPoolExhausted,

    #[error("Category root '{0}' has no /catalog/<slug> path segment")]
    InvalidCategoryRoot(String),

    #[error("Cache error: {0}")]
    Cache(#[from] cache::CacheError),

    #[error("Output error: {0}")]
    Output(#[from] output::OutputError),

    #[error("HTTP client error: {0}")]
    Reqwest(#[from] reqwest::Error),

    #[error("URL parse error: {0}")]
    UrlParse(#[from] url::ParseError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Worker task failed: {0}")]
    Join(#[from] tokio::task::JoinError),
}

/// Configuration-specific errors
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse TOML: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Invalid URL in config: {0}")]
    InvalidUrl(String),

    #[error("Invalid proxy endpoint: {0}")]
    InvalidProxy(String),
}

/// Result type alias for Vitrina operations
pub type Result<T> = std::result::Result<T, VitrinaError>;

/// Result type alias for configuration operations
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

// Re-export commonly used types
pub use config::Config;
pub use crawler::{run_crawl, FetchOutcome};
pub use model::{CatalogItem, ProductRecord, ProductSummary};
pub use output::{ProductSink, RunSummary};
pub use region::RegionContext;

use serde::Deserialize;
use std::path::PathBuf;
use std::time::Duration;

/// Main configuration structure for Vitrina
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub crawler: CrawlerConfig,
    pub region: RegionConfig,
    #[serde(default)]
    pub api: ApiConfig,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub output: OutputConfig,
    pub catalog: CatalogConfig,
}

/// Crawler behavior configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CrawlerConfig {
    /// Visit each product's detail endpoint for the full attribute set
    #[serde(rename = "parse-product-details", default = "default_true")]
    pub parse_product_details: bool,

    /// Number of categories crawled concurrently
    #[serde(rename = "max-concurrent-categories", default = "default_categories")]
    pub max_concurrent_categories: usize,

    /// Number of in-flight detail fetches across the whole run
    #[serde(rename = "max-concurrent-details", default = "default_details")]
    pub max_concurrent_details: usize,

    /// Emit the listing summary when a detail fetch fails
    #[serde(rename = "emit-partial-on-detail-failure", default = "default_true")]
    pub emit_partial_on_detail_failure: bool,

    /// Per-request timeout in seconds
    #[serde(rename = "request-timeout-secs", default = "default_timeout")]
    pub request_timeout_secs: u64,

    /// Retries for transient failures (5xx, timeouts, connection resets)
    #[serde(rename = "max-retries", default = "default_retries")]
    pub max_retries: u32,

    /// Base delay for exponential backoff, in milliseconds
    #[serde(rename = "retry-base-delay-ms", default = "default_base_delay")]
    pub retry_base_delay_ms: u64,
}

impl CrawlerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            parse_product_details: true,
            max_concurrent_categories: default_categories(),
            max_concurrent_details: default_details(),
            emit_partial_on_detail_failure: true,
            request_timeout_secs: default_timeout(),
            max_retries: default_retries(),
            retry_base_delay_ms: default_base_delay(),
        }
    }
}

/// Region localization configuration
#[derive(Debug, Clone, Deserialize)]
pub struct RegionConfig {
    /// City to localize prices and availability against
    #[serde(rename = "target-city")]
    pub target_city: String,

    /// City UUID used to bootstrap the region enumeration request
    #[serde(rename = "initial-city-uuid", default = "default_initial_uuid")]
    pub initial_city_uuid: String,
}

/// Origin API endpoints
#[derive(Debug, Clone, Deserialize)]
pub struct ApiConfig {
    #[serde(rename = "base-url", default = "default_base_url")]
    pub base_url: String,

    #[serde(rename = "products-endpoint", default = "default_products_endpoint")]
    pub products_endpoint: String,

    #[serde(rename = "city-endpoint", default = "default_city_endpoint")]
    pub city_endpoint: String,

    /// Products requested per listing page
    #[serde(rename = "per-page", default = "default_per_page")]
    pub per_page: u32,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            products_endpoint: default_products_endpoint(),
            city_endpoint: default_city_endpoint(),
            per_page: default_per_page(),
        }
    }
}

/// Proxy rotation mode
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "kebab-case")]
pub enum RotationMode {
    #[default]
    RoundRobin,
    Random,
}

/// Outbound proxy pool; an empty pool means direct requests
#[derive(Debug, Clone, Deserialize, Default)]
pub struct ProxyConfig {
    /// Proxy endpoints, e.g. "http://host:port" or "socks5://host:port".
    /// Endpoints without a scheme are assumed to be HTTP.
    #[serde(default)]
    pub endpoints: Vec<String>,

    #[serde(default)]
    pub rotation: RotationMode,
}

/// Response cache configuration
#[derive(Debug, Clone, Deserialize)]
pub struct CacheConfig {
    #[serde(rename = "database-path", default = "default_cache_path")]
    pub database_path: String,

    /// Entries older than this are treated as stale and refetched
    #[serde(rename = "max-age-hours", default = "default_max_age")]
    pub max_age_hours: i64,
}

impl CacheConfig {
    pub fn max_age(&self) -> chrono::Duration {
        chrono::Duration::hours(self.max_age_hours)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            database_path: default_cache_path(),
            max_age_hours: default_max_age(),
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    /// Path of the JSON-lines product feed
    #[serde(rename = "products-path", default = "default_products_path")]
    pub products_path: String,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            products_path: default_products_path(),
        }
    }
}

/// Category roots to crawl
#[derive(Debug, Clone, Deserialize)]
pub struct CatalogConfig {
    /// Category root URLs listed inline
    #[serde(default)]
    pub roots: Vec<String>,

    /// Optional operator-maintained file with one category URL per line
    /// ('#' comments and blank lines are skipped)
    #[serde(rename = "roots-file")]
    pub roots_file: Option<PathBuf>,
}

fn default_true() -> bool {
    true
}

fn default_categories() -> usize {
    2
}

fn default_details() -> usize {
    4
}

fn default_timeout() -> u64 {
    20
}

fn default_retries() -> u32 {
    3
}

fn default_base_delay() -> u64 {
    1000
}

fn default_initial_uuid() -> String {
    "4a70f9e0-46ae-11e7-83ff-00155d026416".to_string()
}

fn default_base_url() -> String {
    "https://alkoteka.com/web-api/v1".to_string()
}

fn default_products_endpoint() -> String {
    "/product".to_string()
}

fn default_city_endpoint() -> String {
    "/city".to_string()
}

fn default_per_page() -> u32 {
    20
}

fn default_cache_path() -> String {
    "./vitrina-cache.db".to_string()
}

fn default_max_age() -> i64 {
    24
}

fn default_products_path() -> String {
    "./products.jsonl".to_string()
}

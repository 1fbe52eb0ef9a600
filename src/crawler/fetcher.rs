//! HTTP fetch client
//!
//! This module is the single place where requests leave the process:
//! - Building HTTP clients, one per configured proxy endpoint
//! - Proxy selection (round-robin or random) with blocked-strike tracking
//! - Response classification into fetch outcomes
//! - Retry with exponential backoff and jitter for transient failures
//!
//! It knows nothing about caching or extraction; it is a pure request
//! executor with a retry/rotation policy.

use crate::config::{CrawlerConfig, ProxyConfig, RotationMode};
use crate::region::RegionContext;
use crate::VitrinaError;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderValue, ACCEPT, ACCEPT_LANGUAGE};
use reqwest::{Client, Proxy, StatusCode};
use std::sync::atomic::{AtomicU32, AtomicUsize, Ordering};
use std::time::Duration;

/// Result of one fetch operation, as seen by the caller
///
/// Created per call, consumed immediately; only the success payload is
/// ever persisted (by the cache store, not by this module).
#[derive(Debug)]
pub enum FetchOutcome {
    /// 2xx response with a readable body
    Success {
        body: String,
        status: u16,
        final_url: String,
    },

    /// Retriable failure (5xx, timeout, connection reset); surfaced only
    /// after the retry budget is exhausted
    Transient { reason: String },

    /// The origin site refused us (403/429 or a blocked-page signature);
    /// surfaced after one rotation attempt so the caller can skip-and-report
    Blocked { reason: String },

    /// Permanent failure (other 4xx); never retried
    Terminal { reason: String },
}

impl FetchOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    /// Short human-readable failure reason; empty for successes
    pub fn reason(&self) -> &str {
        match self {
            Self::Success { .. } => "",
            Self::Transient { reason } | Self::Blocked { reason } | Self::Terminal { reason } => {
                reason
            }
        }
    }
}

/// Body markers of anti-bot challenge pages served with a 200 status
const BLOCK_SIGNATURES: &[&str] = &["captcha", "access denied", "доступ ограничен"];

/// Consecutive blocked responses before a proxy is considered dead
const MAX_BLOCK_STRIKES: u32 = 3;

/// Jitter added to every backoff delay, in milliseconds
const BACKOFF_JITTER_MS: u64 = 250;

struct ProxyEntry {
    /// Endpoint as configured, or "direct" for the no-proxy client
    label: String,
    client: Client,
    block_strikes: AtomicU32,
}

/// Shared pool of outbound clients
///
/// "No proxy" is a valid pool of size one (a single direct client).
/// Selection is lock-free: an atomic cursor for round-robin, thread RNG
/// for random mode. Entries accumulate blocked strikes and are skipped
/// once struck out; the pool is exhausted when no entry remains.
pub struct ProxyPool {
    entries: Vec<ProxyEntry>,
    rotation: RotationMode,
    cursor: AtomicUsize,
}

impl ProxyPool {
    /// Builds the pool from configuration
    pub fn build(
        crawler: &CrawlerConfig,
        proxy: &ProxyConfig,
    ) -> Result<Self, VitrinaError> {
        let mut entries = Vec::new();

        if proxy.endpoints.is_empty() {
            entries.push(ProxyEntry {
                label: "direct".to_string(),
                client: build_client(crawler, None)?,
                block_strikes: AtomicU32::new(0),
            });
        } else {
            for endpoint in &proxy.endpoints {
                let normalized = normalize_proxy_endpoint(endpoint);
                let client = build_client(crawler, Some(&normalized))?;
                entries.push(ProxyEntry {
                    label: normalized,
                    client,
                    block_strikes: AtomicU32::new(0),
                });
            }
        }

        Ok(Self {
            entries,
            rotation: proxy.rotation,
            cursor: AtomicUsize::new(0),
        })
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// True once every entry has struck out on blocked responses
    pub fn is_exhausted(&self) -> bool {
        self.entries
            .iter()
            .all(|e| e.block_strikes.load(Ordering::Relaxed) >= MAX_BLOCK_STRIKES)
    }

    /// Selects the next entry, preferring ones that are not struck out
    fn select(&self) -> usize {
        let len = self.entries.len();

        for _ in 0..len * 2 {
            let idx = match self.rotation {
                RotationMode::RoundRobin => self.cursor.fetch_add(1, Ordering::Relaxed) % len,
                RotationMode::Random => rand::thread_rng().gen_range(0..len),
            };
            if self.entries[idx].block_strikes.load(Ordering::Relaxed) < MAX_BLOCK_STRIKES {
                return idx;
            }
        }

        // Every entry struck out; keep rotating so the caller still gets
        // a definite Blocked outcome rather than a hang
        self.cursor.fetch_add(1, Ordering::Relaxed) % len
    }

    /// Selects an entry different from `idx`; None for a pool of one
    fn select_other(&self, idx: usize) -> Option<usize> {
        if self.entries.len() < 2 {
            return None;
        }
        for _ in 0..self.entries.len() * 2 {
            let candidate = self.select();
            if candidate != idx {
                return Some(candidate);
            }
        }
        Some((idx + 1) % self.entries.len())
    }

    fn record_success(&self, idx: usize) {
        self.entries[idx].block_strikes.store(0, Ordering::Relaxed);
    }

    fn record_block(&self, idx: usize) {
        let strikes = self.entries[idx]
            .block_strikes
            .fetch_add(1, Ordering::Relaxed)
            + 1;
        if strikes >= MAX_BLOCK_STRIKES {
            tracing::warn!(
                "Proxy {} struck out after {} blocked responses",
                self.entries[idx].label,
                strikes
            );
        }
    }
}

/// Assumes HTTP for endpoints configured without a scheme
fn normalize_proxy_endpoint(endpoint: &str) -> String {
    let endpoint = endpoint.trim();
    if endpoint.contains("://") {
        endpoint.to_string()
    } else {
        format!("http://{}", endpoint)
    }
}

/// Builds one HTTP client, optionally routed through a proxy
fn build_client(crawler: &CrawlerConfig, proxy: Option<&str>) -> Result<Client, VitrinaError> {
    let mut headers = HeaderMap::new();
    headers.insert(
        ACCEPT,
        HeaderValue::from_static("application/json, text/plain, */*"),
    );
    headers.insert(
        ACCEPT_LANGUAGE,
        HeaderValue::from_static("ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7"),
    );
    headers.insert(
        "X-Requested-With",
        HeaderValue::from_static("XMLHttpRequest"),
    );

    let mut builder = Client::builder()
        .default_headers(headers)
        .timeout(crawler.request_timeout())
        .connect_timeout(Duration::from_secs(10))
        .gzip(true)
        .brotli(true);

    if let Some(endpoint) = proxy {
        builder = builder.proxy(Proxy::all(endpoint)?);
    }

    builder.build().map_err(VitrinaError::from)
}

/// The fetch client: proxy pool + retry policy
pub struct FetchClient {
    pool: ProxyPool,
    max_retries: u32,
    base_delay: Duration,
}

impl FetchClient {
    pub fn new(crawler: &CrawlerConfig, proxy: &ProxyConfig) -> Result<Self, VitrinaError> {
        Ok(Self {
            pool: ProxyPool::build(crawler, proxy)?,
            max_retries: crawler.max_retries,
            base_delay: crawler.retry_base_delay(),
        })
    }

    /// True once every proxy is permanently blocked; the orchestrator
    /// escalates this to a fatal run failure
    pub fn pool_exhausted(&self) -> bool {
        self.pool.is_exhausted()
    }

    /// Fetches a URL under the given region context
    ///
    /// # Retry Logic
    ///
    /// | Outcome   | Action                                                |
    /// |-----------|-------------------------------------------------------|
    /// | Success   | Returned immediately                                  |
    /// | Transient | Up to `max_retries` retries, exponential backoff with |
    /// |           | jitter, different proxy per retry when available      |
    /// | Blocked   | One immediate retry on a different proxy, then        |
    /// |           | surfaced to the caller                                |
    /// | Terminal  | Never retried                                         |
    pub async fn fetch(&self, url: &url::Url, region: &RegionContext) -> FetchOutcome {
        // Localization is idempotent; applying it here guarantees no
        // request ever leaves without the region token
        let mut url = url.clone();
        region.localize(&mut url);

        let mut retries = 0u32;
        let mut blocked_retry_used = false;
        let mut idx = self.pool.select();

        loop {
            let outcome = self.attempt(idx, &url).await;

            match outcome {
                FetchOutcome::Success { .. } => {
                    self.pool.record_success(idx);
                    return outcome;
                }

                FetchOutcome::Terminal { .. } => return outcome,

                FetchOutcome::Transient { ref reason } => {
                    if retries >= self.max_retries {
                        tracing::warn!(
                            "Giving up on {} after {} retries: {}",
                            url,
                            retries,
                            reason
                        );
                        return outcome;
                    }

                    let delay = self.backoff_delay(retries);
                    retries += 1;
                    tracing::debug!(
                        "Transient failure for {} ({}), retry {}/{} in {:?}",
                        url,
                        reason,
                        retries,
                        self.max_retries,
                        delay
                    );
                    tokio::time::sleep(delay).await;
                    idx = self.pool.select_other(idx).unwrap_or_else(|| self.pool.select());
                }

                FetchOutcome::Blocked { ref reason } => {
                    self.pool.record_block(idx);

                    if !blocked_retry_used {
                        if let Some(other) = self.pool.select_other(idx) {
                            blocked_retry_used = true;
                            tracing::debug!(
                                "Blocked on {} ({}), retrying once via another proxy",
                                url,
                                reason
                            );
                            idx = other;
                            continue;
                        }
                    }

                    return outcome;
                }
            }
        }
    }

    /// One request attempt through one pool entry
    async fn attempt(&self, idx: usize, url: &url::Url) -> FetchOutcome {
        let client = &self.pool.entries[idx].client;

        let response = match client.get(url.clone()).send().await {
            Ok(response) => response,
            Err(e) => {
                let reason = if e.is_timeout() {
                    "request timeout".to_string()
                } else if e.is_connect() {
                    "connection failed".to_string()
                } else {
                    e.to_string()
                };
                return FetchOutcome::Transient { reason };
            }
        };

        let status = response.status();
        let final_url = response.url().to_string();

        if status == StatusCode::FORBIDDEN || status == StatusCode::TOO_MANY_REQUESTS {
            return FetchOutcome::Blocked {
                reason: format!("HTTP {}", status.as_u16()),
            };
        }

        if status.is_server_error() {
            return FetchOutcome::Transient {
                reason: format!("HTTP {}", status.as_u16()),
            };
        }

        if status.is_client_error() {
            return FetchOutcome::Terminal {
                reason: format!("HTTP {}", status.as_u16()),
            };
        }

        if !status.is_success() {
            return FetchOutcome::Terminal {
                reason: format!("unexpected HTTP {}", status.as_u16()),
            };
        }

        match response.text().await {
            Ok(body) => {
                if let Some(signature) = block_signature(&body) {
                    return FetchOutcome::Blocked {
                        reason: format!("blocked page signature '{}'", signature),
                    };
                }
                FetchOutcome::Success {
                    body,
                    status: status.as_u16(),
                    final_url,
                }
            }
            Err(e) => FetchOutcome::Transient {
                reason: format!("failed to read body: {}", e),
            },
        }
    }

    /// Exponential backoff: base * 2^retry, plus jitter
    fn backoff_delay(&self, retry: u32) -> Duration {
        let factor = 1u32 << retry.min(6);
        let jitter = rand::thread_rng().gen_range(0..BACKOFF_JITTER_MS);
        self.base_delay * factor + Duration::from_millis(jitter)
    }
}

/// Returns the matching block signature, if the body looks like an
/// anti-bot challenge page
fn block_signature(body: &str) -> Option<&'static str> {
    // Challenge pages are short; don't scan megabytes of catalog JSON
    if body.len() > 16 * 1024 || body.trim_start().starts_with('{') {
        return None;
    }
    let lowered = body.to_lowercase();
    BLOCK_SIGNATURES
        .iter()
        .find(|needle| lowered.contains(**needle))
        .copied()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn pool(endpoints: &[&str], rotation: RotationMode) -> ProxyPool {
        let crawler = CrawlerConfig::default();
        let proxy = ProxyConfig {
            endpoints: endpoints.iter().map(|s| s.to_string()).collect(),
            rotation,
        };
        ProxyPool::build(&crawler, &proxy).unwrap()
    }

    #[test]
    fn test_empty_endpoints_build_direct_pool_of_one() {
        let pool = pool(&[], RotationMode::RoundRobin);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.entries[0].label, "direct");
    }

    #[test]
    fn test_round_robin_cycles_all_entries() {
        let pool = pool(
            &["http://p1:8080", "http://p2:8080", "http://p3:8080"],
            RotationMode::RoundRobin,
        );

        let picks: Vec<usize> = (0..6).map(|_| pool.select()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2]);
    }

    #[test]
    fn test_select_other_returns_distinct_entry() {
        let pool = pool(&["http://p1:8080", "http://p2:8080"], RotationMode::RoundRobin);
        let idx = pool.select();
        let other = pool.select_other(idx).unwrap();
        assert_ne!(idx, other);
    }

    #[test]
    fn test_select_other_on_pool_of_one() {
        let pool = pool(&[], RotationMode::RoundRobin);
        assert!(pool.select_other(0).is_none());
    }

    #[test]
    fn test_struck_out_entries_are_skipped() {
        let pool = pool(&["http://p1:8080", "http://p2:8080"], RotationMode::RoundRobin);

        for _ in 0..MAX_BLOCK_STRIKES {
            pool.record_block(0);
        }

        for _ in 0..4 {
            assert_eq!(pool.select(), 1);
        }
        assert!(!pool.is_exhausted());
    }

    #[test]
    fn test_pool_exhaustion() {
        let pool = pool(&["http://p1:8080", "http://p2:8080"], RotationMode::RoundRobin);

        for idx in 0..2 {
            for _ in 0..MAX_BLOCK_STRIKES {
                pool.record_block(idx);
            }
        }
        assert!(pool.is_exhausted());
    }

    #[test]
    fn test_success_resets_strikes() {
        let pool = pool(&["http://p1:8080"], RotationMode::RoundRobin);
        pool.record_block(0);
        pool.record_block(0);
        pool.record_success(0);
        assert!(!pool.is_exhausted());
        for _ in 0..MAX_BLOCK_STRIKES {
            pool.record_block(0);
        }
        assert!(pool.is_exhausted());
    }

    #[test]
    fn test_random_rotation_stays_in_bounds() {
        let pool = pool(
            &["http://p1:8080", "http://p2:8080", "http://p3:8080"],
            RotationMode::Random,
        );
        for _ in 0..50 {
            assert!(pool.select() < 3);
        }
    }

    #[test]
    fn test_normalize_proxy_endpoint() {
        assert_eq!(normalize_proxy_endpoint("10.0.0.1:8080"), "http://10.0.0.1:8080");
        assert_eq!(
            normalize_proxy_endpoint("socks5://10.0.0.1:1080"),
            "socks5://10.0.0.1:1080"
        );
        assert_eq!(
            normalize_proxy_endpoint("  http://p:3128  "),
            "http://p:3128"
        );
    }

    #[test]
    fn test_block_signature_detection() {
        assert_eq!(block_signature("<html>Please solve the CAPTCHA</html>"), Some("captcha"));
        assert_eq!(block_signature("<html>Доступ ограничен</html>"), Some("доступ ограничен"));
        assert!(block_signature(r#"{"success": true, "results": []}"#).is_none());
    }

    #[test]
    fn test_backoff_delay_grows_exponentially() {
        let crawler = CrawlerConfig {
            retry_base_delay_ms: 100,
            ..CrawlerConfig::default()
        };
        let client = FetchClient::new(&crawler, &ProxyConfig::default()).unwrap();

        let d0 = client.backoff_delay(0);
        let d2 = client.backoff_delay(2);
        assert!(d0 >= Duration::from_millis(100));
        assert!(d0 < Duration::from_millis(100 + BACKOFF_JITTER_MS));
        assert!(d2 >= Duration::from_millis(400));
        assert!(d2 < Duration::from_millis(400 + BACKOFF_JITTER_MS));
    }
}

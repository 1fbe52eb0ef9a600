use crate::cache::{CacheError, CacheResult};
use crate::region::RegionContext;
use sha2::{Digest, Sha256};
use url::Url;

/// Normalized (URL, region) cache lookup key
///
/// Two keys are equal iff the URL and region identity match exactly after
/// normalization, so region-dependent content variance can never alias
/// between cities.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RequestKey {
    url: String,
    region: String,
}

impl RequestKey {
    /// Builds a key from a request URL and the region it will be issued under
    ///
    /// # Normalization Steps
    ///
    /// 1. Lowercase the scheme and host
    /// 2. Remove the fragment
    /// 3. Remove the trailing slash (except for the root path)
    /// 4. Sort query parameters alphabetically (stable for equal names)
    pub fn new(url: &Url, region: &RegionContext) -> CacheResult<Self> {
        Ok(Self {
            url: normalize_request_url(url)?,
            region: region.identity().to_string(),
        })
    }

    /// The normalized request URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// The region identity half of the key
    pub fn region(&self) -> &str {
        &self.region
    }

    /// Hex SHA-256 digest of the key, used as the store's primary key
    pub fn digest(&self) -> String {
        let mut hasher = Sha256::new();
        hasher.update(self.url.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.region.as_bytes());
        hex::encode(hasher.finalize())
    }
}

/// Normalizes a request URL for cache keying
fn normalize_request_url(url: &Url) -> CacheResult<String> {
    let mut url = url.clone();

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(CacheError::Key(format!(
            "only http(s) requests are cacheable, got scheme '{}'",
            url.scheme()
        )));
    }

    // Url already lowercases the scheme; the host may need it
    let host = url
        .host_str()
        .ok_or_else(|| CacheError::Key("request URL has no host".to_string()))?
        .to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| CacheError::Key(format!("failed to set host: {}", e)))?;

    url.set_fragment(None);

    // Trailing slash, except for the root path
    let path = url.path().to_string();
    if path.len() > 1 && path.ends_with('/') {
        url.set_path(path.trim_end_matches('/'));
    }

    // Sort query parameters for order-insensitive equality
    if url.query().is_some() {
        let mut params: Vec<(String, String)> = url
            .query_pairs()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        params.sort();

        if params.is_empty() {
            url.set_query(None);
        } else {
            let query = params
                .iter()
                .map(|(k, v)| format!("{}={}", k, v))
                .collect::<Vec<_>>()
                .join("&");
            url.set_query(Some(&query));
        }
    }

    Ok(url.to_string())
}

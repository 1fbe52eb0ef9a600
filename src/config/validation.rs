use crate::config::types::{ApiConfig, CatalogConfig, Config, CrawlerConfig, ProxyConfig, RegionConfig};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_crawler_config(&config.crawler)?;
    validate_region_config(&config.region)?;
    validate_api_config(&config.api)?;
    validate_proxy_config(&config.proxy)?;
    validate_catalog_config(&config.catalog)?;

    if config.cache.max_age_hours < 0 {
        return Err(ConfigError::Validation(format!(
            "cache max-age-hours must be >= 0, got {}",
            config.cache.max_age_hours
        )));
    }

    Ok(())
}

fn validate_crawler_config(config: &CrawlerConfig) -> Result<(), ConfigError> {
    if config.max_concurrent_categories < 1 || config.max_concurrent_categories > 16 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-categories must be between 1 and 16, got {}",
            config.max_concurrent_categories
        )));
    }

    if config.max_concurrent_details < 1 || config.max_concurrent_details > 64 {
        return Err(ConfigError::Validation(format!(
            "max-concurrent-details must be between 1 and 64, got {}",
            config.max_concurrent_details
        )));
    }

    if config.request_timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "request-timeout-secs must be >= 1".to_string(),
        ));
    }

    if config.max_retries > 10 {
        return Err(ConfigError::Validation(format!(
            "max-retries must be <= 10, got {}",
            config.max_retries
        )));
    }

    Ok(())
}

fn validate_region_config(config: &RegionConfig) -> Result<(), ConfigError> {
    if config.target_city.trim().is_empty() {
        return Err(ConfigError::Validation(
            "target-city cannot be empty".to_string(),
        ));
    }

    if config.initial_city_uuid.trim().is_empty() {
        return Err(ConfigError::Validation(
            "initial-city-uuid cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    Url::parse(&config.base_url)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid api base-url: {}", e)))?;

    for endpoint in [&config.products_endpoint, &config.city_endpoint] {
        if !endpoint.starts_with('/') {
            return Err(ConfigError::Validation(format!(
                "API endpoints must start with '/', got '{}'",
                endpoint
            )));
        }
    }

    if config.per_page < 1 || config.per_page > 100 {
        return Err(ConfigError::Validation(format!(
            "per-page must be between 1 and 100, got {}",
            config.per_page
        )));
    }

    Ok(())
}

/// Validates proxy endpoints; bare host:port entries are accepted
/// (the fetcher assumes HTTP for them, like the original proxy lists)
fn validate_proxy_config(config: &ProxyConfig) -> Result<(), ConfigError> {
    for endpoint in &config.endpoints {
        let endpoint = endpoint.trim();
        if endpoint.is_empty() {
            return Err(ConfigError::InvalidProxy(
                "empty proxy endpoint".to_string(),
            ));
        }

        if let Some((scheme, _)) = endpoint.split_once("://") {
            if !matches!(scheme, "http" | "https" | "socks4" | "socks5") {
                return Err(ConfigError::InvalidProxy(format!(
                    "unsupported proxy scheme '{}' in '{}'",
                    scheme, endpoint
                )));
            }
        }
    }

    Ok(())
}

fn validate_catalog_config(config: &CatalogConfig) -> Result<(), ConfigError> {
    if config.roots.is_empty() {
        return Err(ConfigError::Validation(
            "catalog roots cannot be empty (set [catalog] roots or roots-file)".to_string(),
        ));
    }

    for root in &config.roots {
        let url = Url::parse(root)
            .map_err(|e| ConfigError::InvalidUrl(format!("Invalid category root '{}': {}", root, e)))?;

        if url.scheme() != "http" && url.scheme() != "https" {
            return Err(ConfigError::InvalidUrl(format!(
                "Category root '{}' must be http(s)",
                root
            )));
        }
    }

    Ok(())
}

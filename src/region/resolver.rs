//! City-name to region-context resolution
//!
//! The origin site enumerates its regions through a paginated city
//! endpoint. Resolution walks that list until it finds a case-insensitive
//! match for the configured city, then freezes the match into a
//! [`RegionContext`]. These requests deliberately bypass the response
//! cache: region metadata must be current at crawl start.

use crate::config::Config;
use crate::crawler::{FetchClient, FetchOutcome};
use crate::region::RegionContext;
use crate::VitrinaError;
use url::Url;

/// Upper bound on city-list pages; the real list is a handful of pages,
/// so hitting this means the endpoint is misbehaving.
const MAX_CITY_PAGES: u32 = 100;

/// Resolves the configured target city against the origin site's region list
///
/// Fails with [`VitrinaError::UnknownRegion`] when the list is exhausted
/// without a match; there is no meaningful crawl without a valid region,
/// so the caller aborts the run.
pub async fn resolve_region(
    fetcher: &FetchClient,
    config: &Config,
) -> Result<RegionContext, VitrinaError> {
    let target = config.region.target_city.trim();
    let bootstrap = RegionContext::bootstrap(&config.region.initial_city_uuid);

    tracing::info!("Resolving region for city '{}'", target);

    let mut page = 1u32;
    let mut cities_seen = 0usize;

    loop {
        let url = city_list_url(config, &bootstrap, page)?;

        let body = match fetcher.fetch(&url, &bootstrap).await {
            FetchOutcome::Success { body, .. } => body,
            FetchOutcome::Transient { reason }
            | FetchOutcome::Blocked { reason }
            | FetchOutcome::Terminal { reason } => {
                return Err(VitrinaError::RegionFetch { reason });
            }
        };

        let listing = parse_city_page(&body).map_err(|reason| VitrinaError::RegionFetch {
            reason: format!("city list page {}: {}", page, reason),
        })?;

        cities_seen += listing.cities.len();

        if let Some((name, uuid)) = listing
            .cities
            .into_iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(target) || name_matches(name, target))
        {
            tracing::info!("Resolved city '{}' to region {}", name, uuid);
            return Ok(RegionContext::new(name, uuid));
        }

        if !listing.has_more_pages || page >= MAX_CITY_PAGES {
            tracing::warn!(
                "City '{}' not found among {} offered regions",
                target,
                cities_seen
            );
            return Err(VitrinaError::UnknownRegion {
                city: target.to_string(),
            });
        }

        page += 1;
    }
}

/// Case-insensitive comparison that also covers non-ASCII city names,
/// which `eq_ignore_ascii_case` does not.
fn name_matches(name: &str, target: &str) -> bool {
    name.to_lowercase() == target.to_lowercase()
}

fn city_list_url(
    config: &Config,
    bootstrap: &RegionContext,
    page: u32,
) -> Result<Url, VitrinaError> {
    let mut url = Url::parse(&format!(
        "{}{}",
        config.api.base_url.trim_end_matches('/'),
        config.api.city_endpoint
    ))?;

    url.query_pairs_mut().append_pair("page", &page.to_string());
    bootstrap.localize(&mut url);

    Ok(url)
}

struct CityPage {
    /// (name, uuid) pairs in listing order
    cities: Vec<(String, String)>,
    has_more_pages: bool,
}

fn parse_city_page(body: &str) -> Result<CityPage, String> {
    let value: serde_json::Value =
        serde_json::from_str(body).map_err(|e| format!("invalid JSON: {}", e))?;

    if value.get("success").and_then(|v| v.as_bool()) != Some(true) {
        return Err("endpoint reported success=false".to_string());
    }

    let results = value
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or_else(|| "missing results array".to_string())?;

    let cities = results
        .iter()
        .filter_map(|city| {
            let name = city.get("name")?.as_str()?;
            let uuid = city.get("uuid")?.as_str()?;
            Some((name.to_string(), uuid.to_string()))
        })
        .collect();

    let has_more_pages = value
        .get("meta")
        .and_then(|m| m.get("has_more_pages"))
        .and_then(|v| v.as_bool())
        .unwrap_or(false);

    Ok(CityPage {
        cities,
        has_more_pages,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const CITY_PAGE: &str = r#"{
        "success": true,
        "results": [
            {"name": "Краснодар", "uuid": "uuid-krasnodar", "slug": "krasnodar"},
            {"name": "Сочи", "uuid": "uuid-sochi", "slug": "sochi"}
        ],
        "meta": {"current_page": 1, "has_more_pages": true}
    }"#;

    #[test]
    fn test_parse_city_page() {
        let page = parse_city_page(CITY_PAGE).unwrap();
        assert_eq!(page.cities.len(), 2);
        assert_eq!(page.cities[0].0, "Краснодар");
        assert_eq!(page.cities[1].1, "uuid-sochi");
        assert!(page.has_more_pages);
    }

    #[test]
    fn test_parse_city_page_rejects_failure_flag() {
        let body = r#"{"success": false, "results": []}"#;
        assert!(parse_city_page(body).is_err());
    }

    #[test]
    fn test_parse_city_page_rejects_missing_results() {
        let body = r#"{"success": true}"#;
        assert!(parse_city_page(body).is_err());
    }

    #[test]
    fn test_parse_city_page_without_meta_is_last_page() {
        let body = r#"{"success": true, "results": []}"#;
        let page = parse_city_page(body).unwrap();
        assert!(page.cities.is_empty());
        assert!(!page.has_more_pages);
    }

    #[test]
    fn test_cyrillic_name_matching() {
        assert!(name_matches("Краснодар", "краснодар"));
        assert!(!name_matches("Краснодар", "Сочи"));
    }
}

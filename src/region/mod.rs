//! Region localization
//!
//! The origin site localizes prices and availability through a city UUID
//! attached to every catalog request. This module holds the immutable
//! session context for the resolved city and the resolver that maps an
//! operator-supplied city name to it.

mod resolver;

pub use resolver::resolve_region;

use url::Url;

/// Immutable region session context
///
/// Created once at crawl start by [`resolve_region`] and shared by
/// reference with every component that issues or keys requests. Nothing
/// downstream mutates it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegionContext {
    city_name: String,
    city_uuid: String,
}

impl RegionContext {
    pub fn new(city_name: impl Into<String>, city_uuid: impl Into<String>) -> Self {
        Self {
            city_name: city_name.into(),
            city_uuid: city_uuid.into(),
        }
    }

    /// Bootstrap context used only for the region enumeration requests,
    /// before the target city is known.
    pub(crate) fn bootstrap(initial_uuid: &str) -> Self {
        Self {
            city_name: String::new(),
            city_uuid: initial_uuid.to_string(),
        }
    }

    /// The resolved city name as the origin site spells it
    pub fn city(&self) -> &str {
        &self.city_name
    }

    /// Identity string used in cache keys; two contexts with the same
    /// identity localize responses identically.
    pub fn identity(&self) -> &str {
        &self.city_uuid
    }

    /// Attaches the localization token to a request URL
    pub fn localize(&self, url: &mut Url) {
        // Rebuild the query without any stale city_uuid pair first
        let pairs: Vec<(String, String)> = url
            .query_pairs()
            .filter(|(k, _)| k != "city_uuid")
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();

        url.query_pairs_mut()
            .clear()
            .extend_pairs(pairs)
            .append_pair("city_uuid", &self.city_uuid);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_localize_appends_city_uuid() {
        let region = RegionContext::new("Краснодар", "uuid-1");
        let mut url = Url::parse("https://example.com/web-api/v1/product?page=1").unwrap();

        region.localize(&mut url);

        assert!(url
            .query_pairs()
            .any(|(k, v)| k == "city_uuid" && v == "uuid-1"));
        assert!(url.query_pairs().any(|(k, v)| k == "page" && v == "1"));
    }

    #[test]
    fn test_localize_replaces_existing_city_uuid() {
        let region = RegionContext::new("Сочи", "uuid-2");
        let mut url =
            Url::parse("https://example.com/web-api/v1/product?city_uuid=stale&page=3").unwrap();

        region.localize(&mut url);

        let uuids: Vec<String> = url
            .query_pairs()
            .filter(|(k, _)| k == "city_uuid")
            .map(|(_, v)| v.to_string())
            .collect();
        assert_eq!(uuids, vec!["uuid-2".to_string()]);
    }

    #[test]
    fn test_identity_is_the_uuid() {
        let region = RegionContext::new("Краснодар", "4a70f9e0");
        assert_eq!(region.identity(), "4a70f9e0");
        assert_eq!(region.city(), "Краснодар");
    }
}

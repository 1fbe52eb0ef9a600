//! Content extractors
//!
//! Pure functions from raw page content to product records. Extractors
//! never perform I/O and never touch the cache; the orchestrator hands
//! them fetched bodies. Site-structure brittleness stays behind these
//! contracts: a change in the catalog payload shape surfaces as a
//! [`ParseError`] here and never touches pagination, caching, or retry
//! logic.

pub mod detail;
pub mod listing;

use thiserror::Error;

/// The page's structure does not match a catalog payload
///
/// Distinguishes "page has zero products" (valid, empty output) from
/// "page structure changed / is not a listing page" (fatal to that page
/// only).
#[derive(Debug, Error)]
pub enum ParseError {
    #[error("response body is not valid JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("missing structural marker: {0}")]
    MissingMarker(&'static str),

    #[error("endpoint reported success=false")]
    ApiFailure,
}

/// Detail-page extraction failure
#[derive(Debug, Error)]
pub enum DetailError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// The detail payload identifies a different product than the summary
    /// that sourced its URL: a stale cache entry or a redirect served the
    /// wrong page. Never silently merged.
    #[error("identity mismatch on {field}: expected '{expected}', got '{found}'")]
    IdentityMismatch {
        field: &'static str,
        expected: String,
        found: String,
    },
}

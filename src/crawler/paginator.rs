//! Category pagination
//!
//! A category root URL (`https://<host>/catalog/<slug>`) maps to a
//! paginated listing endpoint. The paginator walks those pages lazily:
//! each step fetches the current page through the shared fetch/cache
//! source and decides from the page's own envelope whether a next page
//! exists. Pagination is inherently sequential: page N+1 is only known
//! to exist after reading page N.

use crate::config::ApiConfig;
use crate::crawler::PageSource;
use crate::region::RegionContext;
use crate::VitrinaError;
use std::sync::Arc;
use url::Url;

/// Pagination state, owned solely by the paginator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PageCursor {
    Start,
    HasPage(u32),
    Exhausted,
}

/// One fetched listing page
#[derive(Debug)]
pub struct ListingPage {
    pub url: Url,
    pub number: u32,
    pub body: String,
}

/// Outcome of one pagination step
#[derive(Debug)]
pub enum PaginationStep {
    /// The next listing page, fetched and ready for extraction
    Page(ListingPage),

    /// The category has no more pages
    Exhausted,

    /// Pagination stopped early; pages already yielded stand (partial
    /// completion), but the rest of the category is unreachable
    Failed { url: String, reason: String },
}

/// Lazy, restartable walk over one category's listing pages
pub struct CategoryPaginator {
    source: Arc<PageSource>,
    api: ApiConfig,
    slug: String,
    root: String,
    cursor: PageCursor,
}

impl CategoryPaginator {
    /// Creates a paginator for a category root URL
    ///
    /// Fails when the root carries no `/catalog/<slug>` path segment;
    /// there is nothing to query without a slug.
    pub fn new(source: Arc<PageSource>, api: ApiConfig, root: &str) -> Result<Self, VitrinaError> {
        let slug = category_slug(root)
            .ok_or_else(|| VitrinaError::InvalidCategoryRoot(root.to_string()))?;

        Ok(Self {
            source,
            api,
            slug,
            root: root.to_string(),
            cursor: PageCursor::Start,
        })
    }

    pub fn slug(&self) -> &str {
        &self.slug
    }

    pub fn root(&self) -> &str {
        &self.root
    }

    /// Whether another page may still be yielded
    pub fn has_more(&self) -> bool {
        self.cursor != PageCursor::Exhausted
    }

    /// Restarts the walk from the first page
    pub fn reset(&mut self) {
        self.cursor = PageCursor::Start;
    }

    /// Fetches the next listing page and advances the cursor
    pub async fn next_page(&mut self) -> PaginationStep {
        let page_number = match self.cursor {
            PageCursor::Start => 1,
            PageCursor::HasPage(n) => n,
            PageCursor::Exhausted => return PaginationStep::Exhausted,
        };

        let url = match self.listing_url(page_number) {
            Ok(url) => url,
            Err(e) => {
                self.cursor = PageCursor::Exhausted;
                return PaginationStep::Failed {
                    url: self.root.clone(),
                    reason: e.to_string(),
                };
            }
        };

        let outcome = self.source.get(&url).await;

        let body = match outcome {
            crate::crawler::FetchOutcome::Success { body, .. } => body,
            other => {
                self.cursor = PageCursor::Exhausted;
                tracing::warn!(
                    "Category '{}' pagination stopped at page {}: {}",
                    self.slug,
                    page_number,
                    other.reason()
                );
                return PaginationStep::Failed {
                    url: url.to_string(),
                    reason: other.reason().to_string(),
                };
            }
        };

        // The page's own envelope is the only signal for a next page
        match crate::extract::listing::page_meta(&body) {
            Ok(meta) if meta.has_more_pages => {
                self.cursor = PageCursor::HasPage(page_number + 1);
            }
            Ok(_) => {
                self.cursor = PageCursor::Exhausted;
            }
            Err(e) => {
                // Without a readable envelope the next page is unknowable;
                // hand the body to the caller anyway and stop after it
                tracing::warn!(
                    "Category '{}' page {} has no pagination envelope: {}",
                    self.slug,
                    page_number,
                    e
                );
                self.cursor = PageCursor::Exhausted;
            }
        }

        PaginationStep::Page(ListingPage {
            url,
            number: page_number,
            body,
        })
    }

    /// Listing endpoint URL for one page of this category
    fn listing_url(&self, page: u32) -> Result<Url, url::ParseError> {
        let mut url = Url::parse(&format!(
            "{}{}",
            self.api.base_url.trim_end_matches('/'),
            self.api.products_endpoint
        ))?;

        url.query_pairs_mut()
            .append_pair("page", &page.to_string())
            .append_pair("per_page", &self.api.per_page.to_string())
            .append_pair("root_category_slug", &self.slug);

        Ok(url)
    }
}

/// Extracts the category slug from a catalog root URL
///
/// `https://alkoteka.com/catalog/vino` → `vino`
pub fn category_slug(root: &str) -> Option<String> {
    let url = Url::parse(root).ok()?;
    let mut segments = url.path_segments()?;

    segments
        .by_ref()
        .find(|segment| *segment == "catalog")
        .and_then(|_| segments.next())
        .filter(|slug| !slug.is_empty())
        .map(str::to_string)
}

/// Region-localized variant used by the orchestrator when building the
/// detail endpoint URL for one summary
pub fn detail_url(
    api: &ApiConfig,
    region: &RegionContext,
    slug: &str,
) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(&format!(
        "{}{}/{}",
        api.base_url.trim_end_matches('/'),
        api.products_endpoint,
        slug
    ))?;
    region.localize(&mut url);
    Ok(url)
}

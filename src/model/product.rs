use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Current and pre-discount price for the resolved region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceData {
    pub current: f64,

    /// Price before discount; equals `current` when no discount applies
    pub original: f64,

    /// Human-readable discount label, e.g. "Скидка 15%"
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sale_tag: Option<String>,
}

impl PriceData {
    /// Builds price data from a current and an optional previous price,
    /// deriving the discount label when the previous price is higher.
    pub fn from_prices(current: f64, previous: Option<f64>) -> Self {
        let original = previous.filter(|p| *p > 0.0).unwrap_or(current);

        let sale_tag = if original > current && original > 0.0 {
            let discount = ((original - current) / original * 100.0).round() as i64;
            Some(format!("Скидка {}%", discount))
        } else {
            None
        };

        Self {
            current,
            original,
            sale_tag,
        }
    }
}

/// Stock availability for the resolved region
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockData {
    pub in_stock: bool,
    pub count: i64,
}

/// Lightweight product entry parsed from one listing page
///
/// This is the terminal output in fast mode; in full mode it seeds the
/// detail fetch and the identity check on the resulting record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductSummary {
    /// Stable product identifier (site UUID)
    pub id: String,

    /// Product name as listed
    pub name: String,

    /// Public product page URL
    pub url: String,

    /// Detail endpoint handle, when the listing exposes one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub slug: Option<String>,

    /// Category path, outermost first
    pub section: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub brand: Option<String>,

    pub price: PriceData,

    pub stock: StockData,

    pub marketing_tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

/// Full product record merged from a listing summary and its detail page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProductRecord {
    #[serde(flatten)]
    pub summary: ProductSummary,

    pub description: String,

    /// Named characteristics (volume, strength, producer, country, ...)
    pub attributes: BTreeMap<String, String>,

    pub images: Vec<String>,

    /// Number of known volume/size variants; 0 when the product has none
    pub variants: u32,
}

/// One element of the crawl output stream
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum CatalogItem {
    Record(Box<ProductRecord>),
    Summary(ProductSummary),
}

impl CatalogItem {
    /// Stable product identifier regardless of variant
    pub fn id(&self) -> &str {
        match self {
            Self::Summary(s) => &s.id,
            Self::Record(r) => &r.summary.id,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Self::Summary(s) => &s.name,
            Self::Record(r) => &r.summary.name,
        }
    }

    /// True when this item carries the full attribute set
    pub fn is_full(&self) -> bool {
        matches!(self, Self::Record(_))
    }
}

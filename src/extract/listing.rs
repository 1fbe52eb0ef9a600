//! Listing-page extraction
//!
//! Turns one product-listing payload into lightweight [`ProductSummary`]
//! values, and exposes the pagination envelope separately for the
//! paginator. Both are pure functions of the content: extracting the same
//! page twice yields identical output.

use crate::extract::ParseError;
use crate::model::{PriceData, ProductSummary, StockData};
use serde_json::Value;

/// Pagination envelope of a listing page
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ListingMeta {
    pub current_page: u32,
    pub has_more_pages: bool,
    pub total: Option<u64>,
    pub per_page: Option<u32>,
}

/// Parses only the pagination envelope of a listing page
pub fn page_meta(content: &str) -> Result<ListingMeta, ParseError> {
    let value = parse_envelope(content)?;

    let meta = value
        .get("meta")
        .and_then(|m| m.as_object())
        .ok_or(ParseError::MissingMarker("meta"))?;

    Ok(ListingMeta {
        current_page: meta
            .get("current_page")
            .and_then(|v| v.as_u64())
            .unwrap_or(1) as u32,
        has_more_pages: meta
            .get("has_more_pages")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        total: meta.get("total").and_then(|v| v.as_u64()),
        per_page: meta.get("per_page").and_then(|v| v.as_u64()).map(|v| v as u32),
    })
}

/// Extracts every product summary from a listing page
///
/// A page with zero products yields an empty vector; a page whose
/// structural markers are absent yields [`ParseError`]. Entries missing
/// the identifying fields (uuid, name) are skipped.
pub fn extract(content: &str) -> Result<Vec<ProductSummary>, ParseError> {
    let value = parse_envelope(content)?;

    let results = value
        .get("results")
        .and_then(|v| v.as_array())
        .ok_or(ParseError::MissingMarker("results"))?;

    Ok(results
        .iter()
        .filter_map(|product| {
            let summary = summary_from_value(product);
            if summary.is_none() {
                tracing::debug!("Skipping listing entry without uuid/name");
            }
            summary
        })
        .collect())
}

/// Validates the response envelope shared by all catalog endpoints
pub(crate) fn parse_envelope(content: &str) -> Result<Value, ParseError> {
    let value: Value = serde_json::from_str(content)?;

    if !value.is_object() {
        return Err(ParseError::MissingMarker("top-level object"));
    }

    match value.get("success").and_then(|v| v.as_bool()) {
        Some(true) => Ok(value),
        Some(false) => Err(ParseError::ApiFailure),
        None => Err(ParseError::MissingMarker("success")),
    }
}

/// Builds one summary from a listing entry; None when the identifying
/// fields are missing
fn summary_from_value(product: &Value) -> Option<ProductSummary> {
    let id = product.get("uuid")?.as_str()?.to_string();
    let name = product.get("name")?.as_str()?.to_string();

    let url = product
        .get("product_url")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string();

    let slug = product
        .get("slug")
        .and_then(|v| v.as_str())
        .map(str::to_string);

    let price = PriceData::from_prices(
        number(product.get("price")).unwrap_or(0.0),
        number(product.get("prev_price")),
    );

    let count = product
        .get("quantity")
        .and_then(|v| v.as_i64())
        .filter(|n| *n > 0)
        .or_else(|| product.get("quantity_total").and_then(|v| v.as_i64()))
        .unwrap_or(0);

    let stock = StockData {
        in_stock: product
            .get("available")
            .and_then(|v| v.as_bool())
            .unwrap_or(false),
        count,
    };

    Some(ProductSummary {
        id,
        name,
        url,
        slug,
        section: extract_section(product),
        brand: filter_label(product, "brend"),
        price,
        stock,
        marketing_tags: extract_marketing_tags(product),
        image: product
            .get("image_url")
            .and_then(|v| v.as_str())
            .map(str::to_string),
    })
}

/// Category hierarchy, parent before child
pub(crate) fn extract_section(product: &Value) -> Vec<String> {
    let mut section = Vec::new();

    if let Some(category) = product.get("category").and_then(|v| v.as_object()) {
        if let Some(parent) = category
            .get("parent")
            .and_then(|v| v.get("name"))
            .and_then(|v| v.as_str())
        {
            section.push(parent.to_string());
        }
        if let Some(name) = category.get("name").and_then(|v| v.as_str()) {
            section.push(name.to_string());
        }
    }

    section
}

/// First filter label title with the given filter code
pub(crate) fn filter_label(product: &Value, filter: &str) -> Option<String> {
    product
        .get("filter_labels")
        .and_then(|v| v.as_array())?
        .iter()
        .find(|label| label.get("filter").and_then(|f| f.as_str()) == Some(filter))
        .and_then(|label| label.get("title"))
        .and_then(|t| t.as_str())
        .map(str::to_string)
}

/// Marketing tags from the boolean flags and action labels
pub(crate) fn extract_marketing_tags(product: &Value) -> Vec<String> {
    let mut tags = Vec::new();

    let flags = [
        ("new", "Новинка"),
        ("recomended", "Рекомендуемое"),
        ("gift_package", "Подарочная упаковка"),
    ];
    for (field, tag) in flags {
        if product.get(field).and_then(|v| v.as_bool()) == Some(true) {
            tags.push(tag.to_string());
        }
    }

    if let Some(labels) = product.get("action_labels").and_then(|v| v.as_array()) {
        for label in labels {
            let name = label
                .get("name")
                .or_else(|| label.get("text"))
                .or_else(|| label.get("title"))
                .and_then(|v| v.as_str());
            if let Some(name) = name {
                if !tags.iter().any(|t| t == name) {
                    tags.push(name.to_string());
                }
            }
        }
    }

    tags
}

pub(crate) fn number(value: Option<&Value>) -> Option<f64> {
    let value = value?;
    value
        .as_f64()
        .or_else(|| value.as_str().and_then(|s| s.parse().ok()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn listing_body(products: &str, has_more: bool) -> String {
        format!(
            r#"{{
                "success": true,
                "results": [{}],
                "meta": {{"current_page": 1, "has_more_pages": {}, "total": 42, "per_page": 20}}
            }}"#,
            products, has_more
        )
    }

    const PRODUCT: &str = r#"{
        "uuid": "p-1",
        "name": "Вино Кагор",
        "slug": "vino-kagor",
        "product_url": "https://alkoteka.com/product/vino/vino-kagor",
        "price": 750.0,
        "prev_price": 1000.0,
        "available": true,
        "quantity": 12,
        "new": true,
        "category": {"name": "Красное", "parent": {"name": "Вино"}},
        "filter_labels": [
            {"filter": "brend", "title": "Кагор Юг"},
            {"filter": "obem", "title": "0.75 л"}
        ],
        "action_labels": [{"name": "Акция"}],
        "image_url": "https://alkoteka.com/img/p-1.jpg"
    }"#;

    #[test]
    fn test_extract_single_product() {
        let body = listing_body(PRODUCT, false);
        let summaries = extract(&body).unwrap();

        assert_eq!(summaries.len(), 1);
        let s = &summaries[0];
        assert_eq!(s.id, "p-1");
        assert_eq!(s.name, "Вино Кагор");
        assert_eq!(s.slug.as_deref(), Some("vino-kagor"));
        assert_eq!(s.section, vec!["Вино".to_string(), "Красное".to_string()]);
        assert_eq!(s.brand.as_deref(), Some("Кагор Юг"));
        assert_eq!(s.price.current, 750.0);
        assert_eq!(s.price.sale_tag.as_deref(), Some("Скидка 25%"));
        assert!(s.stock.in_stock);
        assert_eq!(s.stock.count, 12);
        assert!(s.marketing_tags.contains(&"Новинка".to_string()));
        assert!(s.marketing_tags.contains(&"Акция".to_string()));
    }

    #[test]
    fn test_extract_is_idempotent() {
        let body = listing_body(PRODUCT, true);
        assert_eq!(extract(&body).unwrap(), extract(&body).unwrap());
    }

    #[test]
    fn test_empty_results_is_valid() {
        let body = listing_body("", false);
        assert!(extract(&body).unwrap().is_empty());
    }

    #[test]
    fn test_missing_results_is_parse_error() {
        let body = r#"{"success": true, "meta": {}}"#;
        assert!(matches!(
            extract(body),
            Err(ParseError::MissingMarker("results"))
        ));
    }

    #[test]
    fn test_success_false_is_parse_error() {
        let body = r#"{"success": false, "results": []}"#;
        assert!(matches!(extract(body), Err(ParseError::ApiFailure)));
    }

    #[test]
    fn test_invalid_json_is_parse_error() {
        assert!(matches!(
            extract("<html>not json</html>"),
            Err(ParseError::Json(_))
        ));
    }

    #[test]
    fn test_entries_without_identity_are_skipped() {
        let body = listing_body(r#"{"price": 100.0}, {"uuid": "p-2", "name": "Пиво"}"#, false);
        let summaries = extract(&body).unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].id, "p-2");
    }

    #[test]
    fn test_page_meta() {
        let body = listing_body(PRODUCT, true);
        let meta = page_meta(&body).unwrap();
        assert_eq!(meta.current_page, 1);
        assert!(meta.has_more_pages);
        assert_eq!(meta.total, Some(42));
        assert_eq!(meta.per_page, Some(20));
    }

    #[test]
    fn test_page_meta_missing_is_parse_error() {
        let body = r#"{"success": true, "results": []}"#;
        assert!(matches!(
            page_meta(body),
            Err(ParseError::MissingMarker("meta"))
        ));
    }

    #[test]
    fn test_string_price_is_parsed() {
        let product = r#"{"uuid": "p-3", "name": "Сидр", "price": "199.90"}"#;
        let body = listing_body(product, false);
        let summaries = extract(&body).unwrap();
        assert_eq!(summaries[0].price.current, 199.90);
    }

    #[test]
    fn test_quantity_total_fallback() {
        let product = r#"{"uuid": "p-4", "name": "Виски", "available": true, "quantity_total": 7}"#;
        let body = listing_body(product, false);
        let summaries = extract(&body).unwrap();
        assert_eq!(summaries[0].stock.count, 7);
    }
}

//! Detail-page extraction
//!
//! Merges one product-detail payload with the listing summary that
//! sourced it into a full [`ProductRecord`]. The identifying fields of
//! the payload must agree with the summary; a disagreement means a stale
//! cache entry or a redirect served the wrong product, and surfaces as
//! [`DetailError::IdentityMismatch`] instead of a silent merge.

use crate::extract::listing::{
    extract_marketing_tags, extract_section, filter_label, number, parse_envelope,
};
use crate::extract::{DetailError, ParseError};
use crate::model::{PriceData, ProductRecord, ProductSummary, StockData};
use lazy_static::lazy_static;
use regex::Regex;
use serde_json::Value;
use std::collections::BTreeMap;

lazy_static! {
    /// Detects a volume already present in a product name ("0.75 л",
    /// "500 мл", "1 l", ...)
    static ref VOLUME_RE: Regex =
        Regex::new(r"(?i)\d+(?:[.,]\d+)?\s*(?:л\b|мл\b|ml\b|l\b|литр)").expect("static regex");
}

/// Extracts a full product record, checking it against the expected summary
pub fn extract(content: &str, expected: &ProductSummary) -> Result<ProductRecord, DetailError> {
    let value = parse_envelope(content)?;

    let product = value
        .get("results")
        .filter(|v| v.is_object())
        .ok_or(ParseError::MissingMarker("results"))?;

    check_identity(product, expected)?;

    let mut summary = expected.clone();

    // The detail payload is authoritative for region-priced fields
    if product.get("price").is_some() {
        summary.price = PriceData::from_prices(
            number(product.get("price")).unwrap_or(summary.price.current),
            number(product.get("prev_price")),
        );
    }
    if let Some(available) = product.get("available").and_then(|v| v.as_bool()) {
        summary.stock = StockData {
            in_stock: available,
            count: product
                .get("quantity")
                .and_then(|v| v.as_i64())
                .filter(|n| *n > 0)
                .or_else(|| product.get("quantity_total").and_then(|v| v.as_i64()))
                .unwrap_or(summary.stock.count),
        };
    }

    let section = extract_section(product);
    if !section.is_empty() {
        summary.section = section;
    }

    if let Some(brand) = block_value(product, "brend").or_else(|| filter_label(product, "brend")) {
        summary.brand = Some(brand);
    }

    summary.marketing_tags = merge_tags(product, &summary.marketing_tags);

    let attributes = extract_attributes(product);

    // Decorate the display name with the volume only after the identity
    // check has passed on the raw name
    if !VOLUME_RE.is_match(&summary.name) {
        if let Some(volume) = attributes
            .get("Объем")
            .cloned()
            .or_else(|| filter_label(product, "obem"))
        {
            summary.name = format!("{}, {}", summary.name, volume);
        }
    }

    let mut images = Vec::new();
    for candidate in [
        product.get("image_url").and_then(|v| v.as_str()),
        expected.image.as_deref(),
    ]
    .into_iter()
    .flatten()
    {
        if !images.iter().any(|i| i == candidate) {
            images.push(candidate.to_string());
        }
    }
    if let Some(first) = images.first() {
        summary.image = Some(first.clone());
    }

    Ok(ProductRecord {
        summary,
        description: extract_description(product),
        attributes,
        images,
        variants: count_variants(product),
    })
}

/// Verifies that the payload identifies the expected product
fn check_identity(product: &Value, expected: &ProductSummary) -> Result<(), DetailError> {
    let id = product
        .get("uuid")
        .and_then(|v| v.as_str())
        .ok_or(ParseError::MissingMarker("uuid"))?;

    if id != expected.id {
        return Err(DetailError::IdentityMismatch {
            field: "id",
            expected: expected.id.clone(),
            found: id.to_string(),
        });
    }

    let name = product
        .get("name")
        .and_then(|v| v.as_str())
        .ok_or(ParseError::MissingMarker("name"))?;

    if name.to_lowercase() != expected.name.to_lowercase() {
        return Err(DetailError::IdentityMismatch {
            field: "name",
            expected: expected.name.clone(),
            found: name.to_string(),
        });
    }

    Ok(())
}

/// Product description: the dedicated text block, falling back to the
/// subtitle line
fn extract_description(product: &Value) -> String {
    if let Some(blocks) = product.get("text_blocks").and_then(|v| v.as_array()) {
        for block in blocks {
            if block.get("title").and_then(|v| v.as_str()) == Some("Описание") {
                if let Some(content) = block.get("content").and_then(|v| v.as_str()) {
                    return content.to_string();
                }
            }
        }
    }

    product
        .get("subname")
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

/// Named characteristics from the description blocks plus the scalar
/// detail fields
fn extract_attributes(product: &Value) -> BTreeMap<String, String> {
    let mut attributes = BTreeMap::new();

    if let Some(blocks) = product.get("description_blocks").and_then(|v| v.as_array()) {
        for block in blocks {
            let code = block.get("code").and_then(|v| v.as_str()).unwrap_or("");
            let title = block.get("title").and_then(|v| v.as_str()).unwrap_or("");

            match code {
                "obem" => {
                    if let Some(min) = number(block.get("min")) {
                        attributes.insert("Объем".to_string(), format!("{} л", min));
                    }
                }
                "krepost" => {
                    if let Some(min) = number(block.get("min")) {
                        attributes.insert("Крепость".to_string(), format!("{}%", min));
                    }
                }
                "proizvoditel" => {
                    if let Some(name) = first_value_name(block) {
                        attributes.insert("Производитель".to_string(), name);
                    }
                }
                "brend" => {
                    if let Some(name) = first_value_name(block) {
                        attributes.insert("Бренд".to_string(), name);
                    }
                }
                "strana" => {
                    if let Some(name) = first_value_name(block) {
                        attributes.insert("Страна".to_string(), name);
                    }
                }
                "vid-upakovki" => {
                    if let Some(name) = first_value_name(block) {
                        attributes.insert("Вид упаковки".to_string(), name);
                    }
                }
                _ if !title.is_empty() => {
                    if let Some(name) = first_value_name(block).or_else(|| first_value_raw(block))
                    {
                        attributes.insert(title.to_string(), name);
                    }
                }
                _ => {}
            }
        }
    }

    if let Some(vendor_code) = product.get("vendor_code") {
        if !vendor_code.is_null() {
            attributes.insert("Артикул".to_string(), scalar_to_string(vendor_code));
        }
    }

    if let Some(country) = product.get("country_name").and_then(|v| v.as_str()) {
        attributes
            .entry("Страна".to_string())
            .or_insert_with(|| country.to_string());
    }

    if let Some(code) = product.get("country_code").and_then(|v| v.as_str()) {
        attributes.insert("Код страны".to_string(), code.to_string());
    }

    if let Some(total) = product.get("quantity_total").and_then(|v| v.as_i64()) {
        if total > 0 {
            attributes.insert("Общее количество".to_string(), total.to_string());
        }
    }

    if let Some(gift) = product.get("gift_package").and_then(|v| v.as_bool()) {
        attributes.insert(
            "Подарочная упаковка".to_string(),
            if gift { "Да" } else { "Нет" }.to_string(),
        );
    }

    if let Some(offline) = number(product.get("offline_price")) {
        attributes.insert("Офлайн цена".to_string(), offline.to_string());
    }

    attributes
}

/// Marketing tags merged from the listing summary, the detail flags, and
/// the supplementary filter labels
fn merge_tags(product: &Value, existing: &[String]) -> Vec<String> {
    let mut tags = existing.to_vec();

    for tag in extract_marketing_tags(product) {
        if !tags.iter().any(|t| *t == tag) {
            tags.push(tag);
        }
    }

    if let Some(labels) = product.get("filter_labels").and_then(|v| v.as_array()) {
        for label in labels {
            if label.get("filter").and_then(|v| v.as_str()) == Some("dopolnitelno") {
                if let Some(title) = label.get("title").and_then(|v| v.as_str()) {
                    if !tags.iter().any(|t| t == title) {
                        tags.push(title.to_string());
                    }
                }
            }
        }
    }

    tags
}

/// Counts volume variants from the volume block's min/max range
fn count_variants(product: &Value) -> u32 {
    let Some(blocks) = product.get("description_blocks").and_then(|v| v.as_array()) else {
        return 0;
    };

    for block in blocks {
        if block.get("code").and_then(|v| v.as_str()) == Some("obem") {
            let min = number(block.get("min"));
            let max = number(block.get("max"));
            if let (Some(min), Some(max)) = (min, max) {
                if (min - max).abs() > f64::EPSILON {
                    return 2;
                }
            }
        }
    }

    0
}

/// First value name of the description block with the given code
fn block_value(product: &Value, code: &str) -> Option<String> {
    product
        .get("description_blocks")
        .and_then(|v| v.as_array())?
        .iter()
        .find(|block| block.get("code").and_then(|v| v.as_str()) == Some(code))
        .and_then(|block| first_value_name(block))
}

fn first_value_name(block: &Value) -> Option<String> {
    block
        .get("values")
        .and_then(|v| v.as_array())?
        .first()?
        .get("name")
        .and_then(|v| v.as_str())
        .map(str::to_string)
}

fn first_value_raw(block: &Value) -> Option<String> {
    let first = block.get("values").and_then(|v| v.as_array())?.first()?;
    if first.is_object() {
        return None;
    }
    Some(scalar_to_string(first))
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{PriceData, StockData};

    fn summary() -> ProductSummary {
        ProductSummary {
            id: "p-1".to_string(),
            name: "Вино Кагор".to_string(),
            url: "https://alkoteka.com/product/vino/vino-kagor".to_string(),
            slug: Some("vino-kagor".to_string()),
            section: vec!["Вино".to_string()],
            brand: None,
            price: PriceData::from_prices(800.0, None),
            stock: StockData {
                in_stock: true,
                count: 5,
            },
            marketing_tags: vec!["Новинка".to_string()],
            image: Some("https://alkoteka.com/img/p-1.jpg".to_string()),
        }
    }

    fn detail_body(uuid: &str, name: &str) -> String {
        format!(
            r#"{{
                "success": true,
                "results": {{
                    "uuid": "{}",
                    "name": "{}",
                    "subname": "Кагор десертный",
                    "price": 750.0,
                    "prev_price": 1000.0,
                    "available": true,
                    "quantity": 8,
                    "vendor_code": 12345,
                    "country_code": "RU",
                    "gift_package": false,
                    "description_blocks": [
                        {{"code": "obem", "title": "Объем", "min": 0.75, "max": 0.75}},
                        {{"code": "krepost", "title": "Крепость", "min": 16}},
                        {{"code": "brend", "title": "Бренд", "values": [{{"name": "Кагор Юг"}}]}},
                        {{"code": "strana", "title": "Страна", "values": [{{"name": "Россия"}}]}}
                    ],
                    "text_blocks": [
                        {{"title": "Описание", "content": "Десертное вино тёмного цвета."}}
                    ],
                    "filter_labels": [
                        {{"filter": "dopolnitelno", "title": "Лимитированная серия"}}
                    ]
                }}
            }}"#,
            uuid, name
        )
    }

    #[test]
    fn test_extract_full_record() {
        let record = extract(&detail_body("p-1", "Вино Кагор"), &summary()).unwrap();

        assert_eq!(record.summary.id, "p-1");
        // Volume appended to the display name
        assert_eq!(record.summary.name, "Вино Кагор, 0.75 л");
        assert_eq!(record.summary.price.current, 750.0);
        assert_eq!(record.summary.price.sale_tag.as_deref(), Some("Скидка 25%"));
        assert_eq!(record.summary.stock.count, 8);
        assert_eq!(record.summary.brand.as_deref(), Some("Кагор Юг"));
        assert_eq!(record.description, "Десертное вино тёмного цвета.");
        assert_eq!(record.attributes.get("Объем").unwrap(), "0.75 л");
        assert_eq!(record.attributes.get("Крепость").unwrap(), "16%");
        assert_eq!(record.attributes.get("Страна").unwrap(), "Россия");
        assert_eq!(record.attributes.get("Артикул").unwrap(), "12345");
        assert_eq!(record.attributes.get("Подарочная упаковка").unwrap(), "Нет");
        assert!(record
            .summary
            .marketing_tags
            .contains(&"Лимитированная серия".to_string()));
        assert!(record
            .summary
            .marketing_tags
            .contains(&"Новинка".to_string()));
        assert_eq!(record.variants, 0);
        assert_eq!(record.images, vec!["https://alkoteka.com/img/p-1.jpg".to_string()]);
    }

    #[test]
    fn test_identity_mismatch_on_id() {
        let err = extract(&detail_body("p-2", "Вино Кагор"), &summary()).unwrap_err();
        assert!(matches!(
            err,
            DetailError::IdentityMismatch { field: "id", .. }
        ));
    }

    #[test]
    fn test_identity_mismatch_on_name() {
        let err = extract(&detail_body("p-1", "Совсем другой товар"), &summary()).unwrap_err();
        assert!(matches!(
            err,
            DetailError::IdentityMismatch { field: "name", .. }
        ));
    }

    #[test]
    fn test_name_match_is_case_insensitive() {
        let record = extract(&detail_body("p-1", "ВИНО КАГОР"), &summary());
        assert!(record.is_ok());
    }

    #[test]
    fn test_volume_not_duplicated_in_name() {
        let mut expected = summary();
        expected.name = "Вино Кагор 0.75 л".to_string();
        let record = extract(&detail_body("p-1", "Вино Кагор 0.75 л"), &expected).unwrap();
        assert_eq!(record.summary.name, "Вино Кагор 0.75 л");
    }

    #[test]
    fn test_structural_mismatch_is_parse_error() {
        let body = r#"{"success": true, "results": []}"#;
        assert!(matches!(
            extract(body, &summary()),
            Err(DetailError::Parse(ParseError::MissingMarker("results")))
        ));
    }

    #[test]
    fn test_api_failure_is_parse_error() {
        let body = r#"{"success": false, "results": {}}"#;
        assert!(matches!(
            extract(body, &summary()),
            Err(DetailError::Parse(ParseError::ApiFailure))
        ));
    }

    #[test]
    fn test_variant_range_counts_as_two() {
        let body = r#"{
            "success": true,
            "results": {
                "uuid": "p-1",
                "name": "Вино Кагор",
                "description_blocks": [
                    {"code": "obem", "min": 0.5, "max": 1.0}
                ]
            }
        }"#;
        let record = extract(body, &summary()).unwrap();
        assert_eq!(record.variants, 2);
    }

    #[test]
    fn test_description_falls_back_to_subname() {
        let body = r#"{
            "success": true,
            "results": {
                "uuid": "p-1",
                "name": "Вино Кагор",
                "subname": "Запасное описание"
            }
        }"#;
        let record = extract(body, &summary()).unwrap();
        assert_eq!(record.description, "Запасное описание");
    }
}

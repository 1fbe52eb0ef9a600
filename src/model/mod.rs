//! Product data model
//!
//! The record types emitted by the crawl: lightweight listing summaries in
//! fast mode, full detail records in full mode.

mod product;

pub use product::{CatalogItem, PriceData, ProductRecord, ProductSummary, StockData};

//! Configuration module for Vitrina
//!
//! This module handles loading, parsing, and validating TOML configuration
//! files, including the operator-maintained category roots list.
//!
//! # Example
//!
//! ```no_run
//! use vitrina::config::load_config;
//! use std::path::Path;
//!
//! let config = load_config(Path::new("config.toml")).unwrap();
//! println!("Target city: {}", config.region.target_city);
//! ```

mod parser;
mod types;
mod validation;

// Re-export types
pub use types::{
    ApiConfig, CacheConfig, CatalogConfig, Config, CrawlerConfig, OutputConfig, ProxyConfig,
    RegionConfig, RotationMode,
};

// Re-export parser functions
pub use parser::load_config;

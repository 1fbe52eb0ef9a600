use crate::config::types::Config;
use crate::config::validation::validate;
use crate::ConfigError;
use std::path::Path;

/// Loads and parses a configuration file from the given path
///
/// Category roots listed in the optional roots-file are merged into
/// `config.catalog.roots` before validation, so downstream code only ever
/// sees one list.
///
/// # Arguments
///
/// * `path` - Path to the TOML configuration file
///
/// # Returns
///
/// * `Ok(Config)` - Successfully loaded and validated configuration
/// * `Err(ConfigError)` - Failed to load, parse, or validate the configuration
pub fn load_config(path: &Path) -> Result<Config, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    let mut config: Config = toml::from_str(&content)?;

    if let Some(roots_file) = config.catalog.roots_file.clone() {
        let extra = load_roots_file(&roots_file)?;
        tracing::info!(
            "Loaded {} category roots from {}",
            extra.len(),
            roots_file.display()
        );
        for root in extra {
            if !config.catalog.roots.contains(&root) {
                config.catalog.roots.push(root);
            }
        }
    }

    validate(&config)?;

    Ok(config)
}

/// Reads category root URLs from an operator-maintained list file
///
/// One URL per line; blank lines and lines starting with '#' are skipped.
fn load_roots_file(path: &Path) -> Result<Vec<String>, ConfigError> {
    let content = std::fs::read_to_string(path)?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(str::to_string)
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn create_temp_config(content: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(content.as_bytes()).unwrap();
        file.flush().unwrap();
        file
    }

    const MINIMAL_CONFIG: &str = r#"
[region]
target-city = "Краснодар"

[catalog]
roots = ["https://alkoteka.com/catalog/vino"]
"#;

    #[test]
    fn test_load_minimal_config_uses_defaults() {
        let file = create_temp_config(MINIMAL_CONFIG);
        let config = load_config(file.path()).unwrap();

        assert_eq!(config.region.target_city, "Краснодар");
        assert!(config.crawler.parse_product_details);
        assert_eq!(config.crawler.max_retries, 3);
        assert_eq!(config.api.per_page, 20);
        assert_eq!(config.cache.max_age_hours, 24);
        assert!(config.proxy.endpoints.is_empty());
        assert_eq!(config.catalog.roots.len(), 1);
    }

    #[test]
    fn test_load_full_config() {
        let config_content = r#"
[crawler]
parse-product-details = false
max-concurrent-categories = 3
max-concurrent-details = 8
emit-partial-on-detail-failure = false
request-timeout-secs = 10
max-retries = 5
retry-base-delay-ms = 250

[region]
target-city = "Сочи"
initial-city-uuid = "00000000-0000-0000-0000-000000000000"

[api]
base-url = "https://alkoteka.com/web-api/v1"
per-page = 50

[proxy]
endpoints = ["http://proxy1:8080", "socks5://proxy2:1080"]
rotation = "random"

[cache]
database-path = "./cache.db"
max-age-hours = 6

[output]
products-path = "./out.jsonl"

[catalog]
roots = ["https://alkoteka.com/catalog/vino"]
"#;

        let file = create_temp_config(config_content);
        let config = load_config(file.path()).unwrap();

        assert!(!config.crawler.parse_product_details);
        assert_eq!(config.crawler.max_concurrent_details, 8);
        assert_eq!(config.region.target_city, "Сочи");
        assert_eq!(config.proxy.endpoints.len(), 2);
        assert_eq!(
            config.proxy.rotation,
            crate::config::RotationMode::Random
        );
        assert_eq!(config.cache.max_age_hours, 6);
    }

    #[test]
    fn test_load_config_with_invalid_path() {
        let result = load_config(Path::new("/nonexistent/config.toml"));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_config_with_invalid_toml() {
        let file = create_temp_config("this is not valid TOML {{{");
        let result = load_config(file.path());
        assert!(result.is_err());
    }

    #[test]
    fn test_roots_file_merged_and_deduplicated() {
        let mut roots = NamedTempFile::new().unwrap();
        writeln!(roots, "# operator list").unwrap();
        writeln!(roots, "https://alkoteka.com/catalog/vino").unwrap();
        writeln!(roots).unwrap();
        writeln!(roots, "https://alkoteka.com/catalog/krepkiy-alkogol").unwrap();
        roots.flush().unwrap();

        let config_content = format!(
            r#"
[region]
target-city = "Краснодар"

[catalog]
roots = ["https://alkoteka.com/catalog/vino"]
roots-file = "{}"
"#,
            roots.path().display()
        );

        let file = create_temp_config(&config_content);
        let config = load_config(file.path()).unwrap();

        // vino appears once, krepkiy-alkogol appended from the file
        assert_eq!(config.catalog.roots.len(), 2);
    }

    #[test]
    fn test_missing_region_section_fails() {
        let file = create_temp_config(
            r#"
[catalog]
roots = ["https://alkoteka.com/catalog/vino"]
"#,
        );
        assert!(load_config(file.path()).is_err());
    }
}

//! Runtime configuration.
//!
//! Settings come from an optional YAML file; anything the file leaves out
//! takes the default below, and CLI flags override both.
//!
//! ```yaml
//! base_url: https://potadvisor.com
//! output_dir: output/normalized
//! zip_database: /data/zips.csv
//! max_retries: 5
//! ```

use crate::zip_state::sources::DEFAULT_BUNDLED_DATABASE;
use crate::zip_state::states::DEFAULT_BASE_URL;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, instrument};

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct AppConfig {
    /// Root of the dispensary directory site.
    pub base_url: String,
    pub output_dir: PathBuf,
    /// Caller-supplied ZIP database, tried before the bundled one.
    pub zip_database: Option<PathBuf>,
    pub bundled_database: PathBuf,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    /// Retries after the first attempt of each page fetch.
    pub max_retries: usize,
    pub retry_base_delay_ms: u64,
    /// Detail pages fetched at once within one state.
    pub detail_concurrency: usize,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            output_dir: PathBuf::from("output/normalized"),
            zip_database: None,
            bundled_database: PathBuf::from(DEFAULT_BUNDLED_DATABASE),
            user_agent: format!("{}/{}", env!("CARGO_PKG_NAME"), env!("CARGO_PKG_VERSION")),
            request_timeout_secs: 30,
            max_retries: 3,
            retry_base_delay_ms: 500,
            detail_concurrency: 4,
        }
    }
}

impl AppConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn retry_base_delay(&self) -> Duration {
        Duration::from_millis(self.retry_base_delay_ms)
    }
}

/// Parse a YAML config document.
pub fn parse_config(yaml: &str) -> Result<AppConfig, Box<dyn Error>> {
    if yaml.trim().is_empty() {
        return Ok(AppConfig::default());
    }
    Ok(serde_yaml::from_str(yaml)?)
}

/// Load config from `path`, or defaults when no path is given.
#[instrument(level = "info")]
pub fn load_config(path: Option<&Path>) -> Result<AppConfig, Box<dyn Error>> {
    let Some(path) = path else {
        return Ok(AppConfig::default());
    };
    let yaml = std::fs::read_to_string(path)?;
    let config = parse_config(&yaml)?;
    info!(path = %path.display(), "Loaded configuration");
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let c = AppConfig::default();
        assert_eq!(c.base_url, "https://potadvisor.com");
        assert_eq!(c.output_dir, PathBuf::from("output/normalized"));
        assert_eq!(c.bundled_database, PathBuf::from("data/zip_code_database.csv"));
        assert_eq!(c.request_timeout(), Duration::from_secs(30));
    }

    #[test]
    fn test_partial_yaml_keeps_defaults() {
        let c = parse_config("output_dir: /tmp/out\nmax_retries: 7\n").unwrap();
        assert_eq!(c.output_dir, PathBuf::from("/tmp/out"));
        assert_eq!(c.max_retries, 7);
        assert_eq!(c.detail_concurrency, 4);
        assert_eq!(c.zip_database, None);
    }

    #[test]
    fn test_empty_yaml_is_default() {
        assert_eq!(parse_config("").unwrap(), AppConfig::default());
    }

    #[test]
    fn test_bad_yaml_is_error() {
        assert!(parse_config("max_retries: [not, a, number]").is_err());
    }

    #[test]
    fn test_load_config_without_path() {
        assert_eq!(load_config(None).unwrap(), AppConfig::default());
    }

    #[test]
    fn test_load_config_missing_file() {
        let p = std::env::temp_dir().join("dispensary_intake_no_such_config.yaml");
        assert!(load_config(Some(&p)).is_err());
    }
}

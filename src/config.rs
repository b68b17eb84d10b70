use crate::error::{CrawlError, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Configuration for a crawl and the browser that performs it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CrawlerConfig {
    /// URL for the WebDriver instance
    #[serde(default = "default_webdriver_url")]
    pub webdriver_url: String,

    /// Run the browser without a visible window
    #[serde(default = "default_headless")]
    pub headless: bool,

    /// Emulated mobile viewport width in CSS pixels
    #[serde(default = "default_viewport_width")]
    pub viewport_width: u32,

    /// Emulated mobile viewport height in CSS pixels
    #[serde(default = "default_viewport_height")]
    pub viewport_height: u32,

    /// User agent the browser presents while rendering pages
    #[serde(default = "default_mobile_user_agent")]
    pub mobile_user_agent: String,

    /// User agent for robots.txt, sitemap and redirect probe requests
    #[serde(default = "default_bot_user_agent")]
    pub bot_user_agent: String,

    /// Page load timeout for a single navigation
    #[serde(default = "default_navigation_timeout_secs")]
    pub navigation_timeout_secs: u64,

    /// Timeout for scripts evaluated in the page
    #[serde(default = "default_script_timeout_secs")]
    pub script_timeout_secs: u64,

    #[serde(default = "default_robots_timeout_secs")]
    pub robots_timeout_secs: u64,

    #[serde(default = "default_sitemap_timeout_secs")]
    pub sitemap_timeout_secs: u64,

    /// Hard deadline for one whole crawl, enforced by the worker pool
    #[serde(default = "default_total_timeout_secs")]
    pub total_timeout_secs: u64,

    /// Number of worker processes kept by the pool
    #[serde(default = "default_pool_size")]
    pub pool_size: usize,

    /// Maximum redirect hops followed when probing a page
    #[serde(default = "default_max_redirects")]
    pub max_redirects: usize,

    /// Extra regex patterns for URLs that should never be fetched
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
}

fn default_webdriver_url() -> String {
    "http://localhost:4444".to_string()
}

fn default_headless() -> bool {
    true
}

fn default_viewport_width() -> u32 {
    375
}

fn default_viewport_height() -> u32 {
    667
}

fn default_mobile_user_agent() -> String {
    "Mozilla/5.0 (iPhone; CPU iPhone OS 13_5 like Mac OS X) AppleWebKit/605.1.15 \
     (KHTML, like Gecko) Version/13.1.1 Mobile/15E148 Safari/604.1"
        .to_string()
}

fn default_bot_user_agent() -> String {
    concat!("Mozilla/5.0 (compatible; crawl-audit/", env!("CARGO_PKG_VERSION"), ")").to_string()
}

fn default_navigation_timeout_secs() -> u64 {
    60
}

fn default_script_timeout_secs() -> u64 {
    10
}

fn default_robots_timeout_secs() -> u64 {
    10
}

fn default_sitemap_timeout_secs() -> u64 {
    15
}

fn default_total_timeout_secs() -> u64 {
    900
}

fn default_pool_size() -> usize {
    1
}

fn default_max_redirects() -> usize {
    10
}

impl Default for CrawlerConfig {
    fn default() -> Self {
        Self {
            webdriver_url: default_webdriver_url(),
            headless: default_headless(),
            viewport_width: default_viewport_width(),
            viewport_height: default_viewport_height(),
            mobile_user_agent: default_mobile_user_agent(),
            bot_user_agent: default_bot_user_agent(),
            navigation_timeout_secs: default_navigation_timeout_secs(),
            script_timeout_secs: default_script_timeout_secs(),
            robots_timeout_secs: default_robots_timeout_secs(),
            sitemap_timeout_secs: default_sitemap_timeout_secs(),
            total_timeout_secs: default_total_timeout_secs(),
            pool_size: default_pool_size(),
            max_redirects: default_max_redirects(),
            exclude_patterns: Vec::new(),
        }
    }
}

impl CrawlerConfig {
    /// Load configuration from a JSON file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path)
            .map_err(|e| CrawlError::Config(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&contents)
    }

    /// Load configuration from a JSON string
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| CrawlError::Config(e.to_string()))
    }

    /// Override the WebDriver URL with the `WEBDRIVER_URL` environment variable if set
    pub fn apply_env(mut self) -> Self {
        if let Ok(webdriver_url) = std::env::var("WEBDRIVER_URL") {
            if !webdriver_url.is_empty() {
                self.webdriver_url = webdriver_url;
            }
        }
        self
    }

    pub fn navigation_timeout(&self) -> Duration {
        Duration::from_secs(self.navigation_timeout_secs)
    }

    pub fn script_timeout(&self) -> Duration {
        Duration::from_secs(self.script_timeout_secs)
    }

    pub fn robots_timeout(&self) -> Duration {
        Duration::from_secs(self.robots_timeout_secs)
    }

    pub fn sitemap_timeout(&self) -> Duration {
        Duration::from_secs(self.sitemap_timeout_secs)
    }

    pub fn total_timeout(&self) -> Duration {
        Duration::from_secs(self.total_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_empty_json_uses_defaults() {
        let config = CrawlerConfig::from_json("{}").unwrap();
        assert_eq!(config, CrawlerConfig::default());
        assert_eq!(config.viewport_width, 375);
        assert_eq!(config.total_timeout(), Duration::from_secs(900));
    }

    #[test]
    fn test_from_file_overrides_fields() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(
            file,
            r#"{{"webdriver_url": "http://127.0.0.1:9515", "pool_size": 3, "exclude_patterns": ["/admin/"]}}"#
        )
        .unwrap();

        let config = CrawlerConfig::from_file(file.path()).unwrap();
        assert_eq!(config.webdriver_url, "http://127.0.0.1:9515");
        assert_eq!(config.pool_size, 3);
        assert_eq!(config.exclude_patterns, vec!["/admin/".to_string()]);
        assert_eq!(config.navigation_timeout_secs, 60);
    }

    #[test]
    fn test_invalid_config_is_a_config_error() {
        let err = CrawlerConfig::from_json("{\"pool_size\": \"many\"}").unwrap_err();
        assert_eq!(err.kind(), "config");

        let err = CrawlerConfig::from_file("/nonexistent/crawl-audit.json").unwrap_err();
        assert_eq!(err.kind(), "config");
    }
}

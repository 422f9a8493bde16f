use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use url::Url;

use crate::ratings::gaps::DEFAULT_IMPLAUSIBLE_THRESHOLD;
use crate::ratings::record::DEFAULT_MAX_VENUE_LEN;
use crate::ratings::{RaceAssembler, TrackingList};
use crate::store::DEFAULT_RACES_FILE;

/// Configuration for the race ratings run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Result page fetching
    pub fetch: FetchConfig,

    /// Gap sequence and scoring settings
    pub rating: RatingConfig,

    /// Series and categories eligible for rating
    pub tracking: TrackingConfig,

    /// Output and logging settings
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct FetchConfig {
    /// Results site root, race pages live under `race/<id>/`
    pub base_url: String,

    /// Browser user agent sent on direct requests
    pub user_agent: String,

    /// Timeout for direct requests (seconds)
    pub timeout_seconds: u64,

    /// Scraping proxy endpoint, used when an API key is set
    pub scraper_api_url: String,

    /// Scraping proxy API key
    pub scraper_api_key: Option<String>,

    /// Timeout for proxied requests (seconds)
    pub scraper_api_timeout_seconds: u64,

    /// Pause before each race page request (milliseconds)
    pub request_delay_ms: u64,

    /// Maximum number of discovered races to fetch
    pub max_races: usize,

    /// Extra attempts after a failed request
    pub max_retries: u32,

    /// Result rows read per race, leader included
    pub max_result_rows: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RatingConfig {
    /// Gaps at or above this many seconds are discarded
    pub implausible_threshold: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    /// Tracked series in priority order
    pub series: TrackingList,

    /// Tracked categories in priority order
    pub categories: TrackingList,

    /// Longest venue name written to a record
    pub max_venue_len: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Persisted race collection
    pub races_file: PathBuf,

    /// Log level
    pub log_level: String,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            base_url: "https://cyclocross24.com/".to_string(),
            user_agent: "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36".to_string(),
            timeout_seconds: 30,
            scraper_api_url: "http://api.scraperapi.com".to_string(),
            scraper_api_key: None,
            scraper_api_timeout_seconds: 60,
            request_delay_ms: 1500,
            max_races: 50,
            max_retries: 2,
            max_result_rows: 15,
        }
    }
}

impl Default for RatingConfig {
    fn default() -> Self {
        Self {
            implausible_threshold: DEFAULT_IMPLAUSIBLE_THRESHOLD,
        }
    }
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            series: TrackingList::default_series(),
            categories: TrackingList::default_categories(),
            max_venue_len: DEFAULT_MAX_VENUE_LEN,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            races_file: PathBuf::from(DEFAULT_RACES_FILE),
            log_level: "info".to_string(),
        }
    }
}

impl TrackingConfig {
    /// Assembler restricted to these allow-lists
    pub fn assembler(&self) -> RaceAssembler {
        RaceAssembler::new(self.series.clone(), self.categories.clone(), self.max_venue_len)
    }
}

impl Config {
    /// Load configuration from the first config file found, then apply environment overrides
    pub fn load() -> Result<Self> {
        let config_paths = ["cx-ratings.toml", "config/cx-ratings.toml"];

        for path in &config_paths {
            let path = Path::new(path);
            if !path.exists() {
                continue;
            }
            match Self::from_file(path) {
                Ok(config) => return Ok(config.with_env_overrides()),
                Err(e) => tracing::warn!("Failed to parse config file {}: {:#}", path.display(), e),
            }
        }

        Self::from_env()
    }

    /// Load configuration from a TOML file
    pub fn from_file(path: &Path) -> Result<Self> {
        let config_str =
            std::fs::read_to_string(path).with_context(|| format!("reading config {}", path.display()))?;
        let config: Config = toml::from_str(&config_str)?;
        tracing::info!("📄 Loaded configuration from: {}", path.display());
        Ok(config)
    }

    /// Load configuration from environment variables on top of the defaults
    pub fn from_env() -> Result<Self> {
        Ok(Self::default().with_env_overrides())
    }

    fn with_env_overrides(mut self) -> Self {
        if let Ok(output) = std::env::var("CX_RATINGS_OUTPUT") {
            self.output.races_file = PathBuf::from(output);
        }

        if let Ok(max_races) = std::env::var("CX_RATINGS_MAX_RACES") {
            self.fetch.max_races = max_races.parse().unwrap_or(self.fetch.max_races);
        }

        if let Ok(threshold) = std::env::var("CX_RATINGS_THRESHOLD") {
            self.rating.implausible_threshold = threshold.parse().unwrap_or(self.rating.implausible_threshold);
        }

        if let Ok(delay) = std::env::var("CX_RATINGS_DELAY_MS") {
            self.fetch.request_delay_ms = delay.parse().unwrap_or(self.fetch.request_delay_ms);
        }

        if let Ok(api_key) = std::env::var("SCRAPER_API_KEY") {
            if !api_key.trim().is_empty() {
                self.fetch.scraper_api_key = Some(api_key);
            }
        }

        if let Ok(log_level) = std::env::var("CX_RATINGS_LOG_LEVEL") {
            self.output.log_level = log_level;
        }

        self
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<()> {
        let config_str = toml::to_string_pretty(self)?;
        std::fs::write(path, config_str)?;
        tracing::info!("💾 Configuration saved to: {}", path.display());
        Ok(())
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        Url::parse(&self.fetch.base_url).map_err(|e| anyhow!("Invalid base_url {}: {}", self.fetch.base_url, e))?;

        if self.fetch.scraper_api_key.is_some() {
            Url::parse(&self.fetch.scraper_api_url)
                .map_err(|e| anyhow!("Invalid scraper_api_url {}: {}", self.fetch.scraper_api_url, e))?;
        }

        if self.fetch.timeout_seconds == 0 || self.fetch.scraper_api_timeout_seconds == 0 {
            return Err(anyhow!("Request timeouts must be greater than 0"));
        }

        if self.fetch.max_result_rows < 2 {
            return Err(anyhow!("max_result_rows must be at least 2"));
        }

        if self.rating.implausible_threshold == 0 {
            return Err(anyhow!("implausible_threshold must be greater than 0"));
        }

        if self.tracking.series.is_empty() || self.tracking.categories.is_empty() {
            return Err(anyhow!("At least one tracked series and one tracked category are required"));
        }

        if self.tracking.max_venue_len == 0 {
            return Err(anyhow!("max_venue_len must be greater than 0"));
        }

        tracing::debug!("✅ Configuration validation passed");
        Ok(())
    }

    /// Get runtime configuration summary
    pub fn summary(&self) -> String {
        format!(
            "CX Ratings Configuration:\n\
            - Source: {}\n\
            - Scraping proxy: {}\n\
            - Max races: {}\n\
            - Request delay: {}ms\n\
            - Implausible gap threshold: {}s\n\
            - Tracked series: {}\n\
            - Tracked categories: {}\n\
            - Output file: {}",
            self.fetch.base_url,
            if self.fetch.scraper_api_key.is_some() { "enabled" } else { "disabled" },
            self.fetch.max_races,
            self.fetch.request_delay_ms,
            self.rating.implausible_threshold,
            self.tracking.series.entries().len(),
            self.tracking.categories.entries().len(),
            self.output.races_file.display(),
        )
    }
}

/// Configuration builder for programmatic config creation
pub struct ConfigBuilder {
    config: Config,
}

impl ConfigBuilder {
    pub fn new() -> Self {
        Self {
            config: Config::default(),
        }
    }

    pub fn with_races_file(mut self, path: PathBuf) -> Self {
        self.config.output.races_file = path;
        self
    }

    pub fn with_max_races(mut self, max_races: usize) -> Self {
        self.config.fetch.max_races = max_races;
        self
    }

    pub fn with_request_delay_ms(mut self, delay_ms: u64) -> Self {
        self.config.fetch.request_delay_ms = delay_ms;
        self
    }

    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.config.fetch.base_url = base_url.to_string();
        self
    }

    pub fn with_scraper_api_key(mut self, api_key: String) -> Self {
        self.config.fetch.scraper_api_key = Some(api_key);
        self
    }

    pub fn with_implausible_threshold(mut self, threshold: u32) -> Self {
        self.config.rating.implausible_threshold = threshold;
        self
    }

    pub fn with_series(mut self, series: TrackingList) -> Self {
        self.config.tracking.series = series;
        self
    }

    pub fn with_categories(mut self, categories: TrackingList) -> Self {
        self.config.tracking.categories = categories;
        self
    }

    pub fn build(self) -> Config {
        self.config
    }
}

impl Default for ConfigBuilder {
    fn default() -> Self {
        Self::new()
    }
}

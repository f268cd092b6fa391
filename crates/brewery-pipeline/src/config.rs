//! Pipeline configuration
//!
//! Built once per run from the environment (`PipelineConfig::from_env`) and
//! passed by reference into every stage.

use brewery_common::{Layer, PipelineError, Result, RunDate};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use crate::bronze::RetryPolicy;
use crate::storage::config::StorageConfig;

// ============================================================================
// API Configuration Constants
// ============================================================================

/// Default Open Brewery DB endpoint.
pub const DEFAULT_API_BASE_URL: &str = "https://api.openbrewerydb.org/v1/breweries";

/// Default page size. Also the maximum the API accepts.
pub const DEFAULT_PER_PAGE: u32 = 200;

/// Largest `per_page` the API honours.
pub const MAX_PER_PAGE: u32 = 200;

/// Default request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Default number of attempts per page request.
pub const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default backoff factor in milliseconds.
pub const DEFAULT_RETRY_DELAY_MS: u64 = 5_000;

/// Default pause between page requests in milliseconds.
pub const DEFAULT_PAGE_DELAY_MS: u64 = 500;

// ============================================================================
// Data Lake Defaults
// ============================================================================

pub const DEFAULT_BRONZE_PATH: &str = "./data/bronze";
pub const DEFAULT_SILVER_PATH: &str = "./data/silver";
pub const DEFAULT_GOLD_PATH: &str = "./data/gold";

pub const DEFAULT_ENVIRONMENT: &str = "production";

/// Complete configuration for one pipeline run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    pub api: ApiConfig,
    pub datalake: DataLakeConfig,
    pub storage: StorageConfig,
    /// Deployment environment tag (e.g. "production", "dev")
    pub environment: String,
}

/// Upstream API settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub base_url: String,
    pub per_page: u32,
    pub timeout_secs: u64,
    /// Total attempts per page request, first try included
    pub max_retries: u32,
    /// Backoff factor; retry `n` waits `retry_delay * 2^(n-1)`
    pub retry_delay_ms: u64,
    /// Pause between consecutive page requests
    pub page_delay_ms: u64,
}

/// Local roots of the three medallion layers
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DataLakeConfig {
    pub bronze_path: PathBuf,
    pub silver_path: PathBuf,
    pub gold_path: PathBuf,
}

impl PipelineConfig {
    /// Load configuration from `.env` (if present) and the environment
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        let config = Self {
            api: ApiConfig::from_env(),
            datalake: DataLakeConfig::from_env(),
            storage: StorageConfig::from_env(),
            environment: std::env::var("ENVIRONMENT")
                .unwrap_or_else(|_| DEFAULT_ENVIRONMENT.to_string()),
        };

        config.validate()?;
        Ok(config)
    }

    /// Configuration rooted at a single directory, e.g. `root/bronze`, `root/silver`, `root/gold`
    pub fn with_lake_root(root: impl AsRef<Path>) -> Self {
        Self {
            datalake: DataLakeConfig::rooted_at(root),
            ..Default::default()
        }
    }

    pub fn validate(&self) -> Result<()> {
        self.api.validate()?;
        self.datalake.validate()?;

        if self.environment.trim().is_empty() {
            return Err(PipelineError::Config("ENVIRONMENT cannot be empty".to_string()));
        }

        Ok(())
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            api: ApiConfig::default(),
            datalake: DataLakeConfig::default(),
            storage: StorageConfig::default(),
            environment: DEFAULT_ENVIRONMENT.to_string(),
        }
    }
}

impl ApiConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: std::env::var("BREWERY_API_BASE_URL")
                .unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_string()),
            per_page: env_or("BREWERY_API_PER_PAGE", DEFAULT_PER_PAGE),
            timeout_secs: env_or("BREWERY_API_TIMEOUT_SECS", DEFAULT_TIMEOUT_SECS),
            max_retries: env_or("BREWERY_API_MAX_RETRIES", DEFAULT_MAX_RETRIES),
            retry_delay_ms: env_or("BREWERY_API_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY_MS),
            page_delay_ms: env_or("BREWERY_API_PAGE_DELAY_MS", DEFAULT_PAGE_DELAY_MS),
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(PipelineError::Config("API base URL cannot be empty".to_string()));
        }

        if reqwest::Url::parse(&self.base_url).is_err() {
            return Err(PipelineError::Config(format!(
                "API base URL is not a valid URL: {}",
                self.base_url
            )));
        }

        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(PipelineError::Config(format!(
                "per_page must be between 1 and {} (got {})",
                MAX_PER_PAGE, self.per_page
            )));
        }

        if self.timeout_secs == 0 {
            return Err(PipelineError::Config("API timeout must be greater than 0".to_string()));
        }

        if self.max_retries == 0 {
            return Err(PipelineError::Config(
                "max_retries must allow at least one attempt".to_string(),
            ));
        }

        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }

    pub fn page_delay(&self) -> Duration {
        Duration::from_millis(self.page_delay_ms)
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_retries, Duration::from_millis(self.retry_delay_ms))
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_string(),
            per_page: DEFAULT_PER_PAGE,
            timeout_secs: DEFAULT_TIMEOUT_SECS,
            max_retries: DEFAULT_MAX_RETRIES,
            retry_delay_ms: DEFAULT_RETRY_DELAY_MS,
            page_delay_ms: DEFAULT_PAGE_DELAY_MS,
        }
    }
}

impl DataLakeConfig {
    pub fn from_env() -> Self {
        Self {
            bronze_path: env_path("BRONZE_LAYER_PATH", DEFAULT_BRONZE_PATH),
            silver_path: env_path("SILVER_LAYER_PATH", DEFAULT_SILVER_PATH),
            gold_path: env_path("GOLD_LAYER_PATH", DEFAULT_GOLD_PATH),
        }
    }

    pub fn rooted_at(root: impl AsRef<Path>) -> Self {
        let root = root.as_ref();
        Self {
            bronze_path: root.join(Layer::Bronze.as_str()),
            silver_path: root.join(Layer::Silver.as_str()),
            gold_path: root.join(Layer::Gold.as_str()),
        }
    }

    pub fn validate(&self) -> Result<()> {
        for layer in Layer::ALL {
            if self.root(layer).as_os_str().is_empty() {
                return Err(PipelineError::Config(format!("{} layer path cannot be empty", layer)));
            }
        }
        Ok(())
    }

    pub fn root(&self, layer: Layer) -> &Path {
        match layer {
            Layer::Bronze => &self.bronze_path,
            Layer::Silver => &self.silver_path,
            Layer::Gold => &self.gold_path,
        }
    }

    /// `{layer_root}/date=YYYY-MM-DD`
    pub fn partition(&self, layer: Layer, run_date: &RunDate) -> PathBuf {
        self.root(layer).join(run_date.partition())
    }
}

impl Default for DataLakeConfig {
    fn default() -> Self {
        Self {
            bronze_path: PathBuf::from(DEFAULT_BRONZE_PATH),
            silver_path: PathBuf::from(DEFAULT_SILVER_PATH),
            gold_path: PathBuf::from(DEFAULT_GOLD_PATH),
        }
    }
}

/// Read and parse an env var, falling back to `default` when unset or unparsable
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|s| s.trim().parse().ok())
        .unwrap_or(default)
}

fn env_path(key: &str, default: &str) -> PathBuf {
    PathBuf::from(std::env::var(key).unwrap_or_else(|_| default.to_string()))
}

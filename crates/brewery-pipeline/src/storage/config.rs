use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// GCS XML API endpoint (S3-compatible)
pub const DEFAULT_STORAGE_ENDPOINT: &str = "https://storage.googleapis.com";

pub const DEFAULT_STORAGE_REGION: &str = "auto";

pub const DEFAULT_CREDENTIALS_PATH: &str = "./config/gcs_config.json";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Mirror bucket; `None` leaves mirroring unconfigured
    pub bucket: Option<String>,
    /// JSON HMAC key file: `{"access_key": "...", "secret_key": "..."}`
    pub credentials_path: PathBuf,
    pub endpoint: String,
    pub region: String,
}

impl StorageConfig {
    pub fn from_env() -> Self {
        Self {
            bucket: bucket_name(env::var("GCS_BUCKET_NAME").ok()),
            credentials_path: env::var("GOOGLE_APPLICATION_CREDENTIALS")
                .map(PathBuf::from)
                .unwrap_or_else(|_| PathBuf::from(DEFAULT_CREDENTIALS_PATH)),
            endpoint: env::var("GCS_ENDPOINT")
                .unwrap_or_else(|_| DEFAULT_STORAGE_ENDPOINT.to_string()),
            region: env::var("GCS_REGION").unwrap_or_else(|_| DEFAULT_STORAGE_REGION.to_string()),
        }
    }

    pub fn for_bucket(bucket: impl Into<String>, credentials_path: impl Into<PathBuf>) -> Self {
        Self {
            bucket: Some(bucket.into()),
            credentials_path: credentials_path.into(),
            ..Default::default()
        }
    }
}

/// A blank `GCS_BUCKET_NAME=` (common in compose files) means no mirror
pub fn bucket_name(raw: Option<String>) -> Option<String> {
    raw.map(|b| b.trim().to_string()).filter(|b| !b.is_empty())
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            bucket: None,
            credentials_path: PathBuf::from(DEFAULT_CREDENTIALS_PATH),
            endpoint: DEFAULT_STORAGE_ENDPOINT.to_string(),
            region: DEFAULT_STORAGE_REGION.to_string(),
        }
    }
}

/// Contents of the credentials file
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct HmacCredentials {
    pub access_key: String,
    pub secret_key: String,
}

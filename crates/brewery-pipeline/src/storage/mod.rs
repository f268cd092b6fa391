//! Best-effort object-storage mirror
//!
//! Every layer writes locally first and then mirrors its output to a bucket
//! under `{layer}/...`. The mirror speaks the S3-compatible XML API, which GCS
//! serves at `storage.googleapis.com` with HMAC keys.
//!
//! [`ObjectStorage`] is decided once at startup and never changes for the
//! life of the process:
//!
//! - `Unconfigured`: no bucket configured
//! - `Unreachable`: bucket configured but credentials or client setup failed
//! - `Active`: uploads are attempted
//!
//! Mutating calls never return errors. Failures are logged and reported as
//! `false` so a local-only run always completes.

use aws_sdk_s3::{
    config::{Credentials, Region, RequestChecksumCalculation, ResponseChecksumValidation},
    error::DisplayErrorContext,
    primitives::ByteStream,
    Client,
};
use brewery_common::{Layer, PipelineError, Result};
use std::path::Path;
use tracing::{debug, error, info, instrument, warn};
use walkdir::WalkDir;

pub mod config;

use config::{HmacCredentials, StorageConfig};

/// Object-storage capability, fixed at construction
#[derive(Debug, Clone)]
pub enum ObjectStorage {
    Unconfigured,
    Unreachable { reason: String },
    Active(Client),
}

impl ObjectStorage {
    /// Discover credentials and build a client.
    ///
    /// Never fails: any problem leaves the adapter disabled.
    pub fn connect(config: &StorageConfig) -> Self {
        let Some(bucket) = config.bucket.as_deref().filter(|b| !b.trim().is_empty()) else {
            info!("No storage bucket configured, running in local-only mode");
            return Self::Unconfigured;
        };

        match build_client(config) {
            Ok(client) => {
                info!(
                    bucket,
                    endpoint = %config.endpoint,
                    "Storage mirror client initialized"
                );
                Self::Active(client)
            },
            Err(e) => {
                warn!(
                    bucket,
                    error = %e,
                    "Storage mirror unavailable, running in local-only mode"
                );
                Self::Unreachable {
                    reason: e.to_string(),
                }
            },
        }
    }

    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Active(_))
    }

    pub fn status(&self) -> &'static str {
        match self {
            Self::Unconfigured => "unconfigured",
            Self::Unreachable { .. } => "unreachable",
            Self::Active(_) => "active",
        }
    }

    fn client(&self) -> Option<&Client> {
        match self {
            Self::Active(client) => Some(client),
            _ => None,
        }
    }

    /// `gs://{bucket}/{layer}/{file}`
    pub fn layer_uri(bucket: &str, layer: Layer, file: &str) -> String {
        format!("gs://{}/{}/{}", bucket, layer, file)
    }

    /// Bucket key for a path relative to a layer root
    pub fn layer_key(layer: Layer, relative: &str) -> String {
        format!("{}/{}", layer, relative.trim_start_matches('/'))
    }

    #[instrument(skip(self, data))]
    pub async fn put_object(&self, bucket: &str, key: &str, data: Vec<u8>, content_type: &str) -> bool {
        let Some(client) = self.client() else {
            debug!("Storage mirror disabled, skipping upload");
            return false;
        };

        match try_put_object(client, bucket, key, ByteStream::from(data), content_type).await {
            Ok(()) => {
                info!("Mirrored to gs://{}/{}", bucket, key);
                true
            },
            Err(e) => {
                error!(error = %e, "Failed to mirror object");
                false
            },
        }
    }

    /// Upload every Parquet file under `local_dir`, keeping relative paths below `key_prefix`
    #[instrument(skip(self))]
    pub async fn put_directory(&self, bucket: &str, key_prefix: &str, local_dir: &Path) -> bool {
        let Some(client) = self.client() else {
            debug!("Storage mirror disabled, skipping directory upload");
            return false;
        };

        match try_put_directory(client, bucket, key_prefix, local_dir).await {
            Ok(count) => {
                if count == 0 {
                    warn!("No parquet files found under {}", local_dir.display());
                }
                info!(files = count, "Mirrored directory to gs://{}/{}", bucket, key_prefix);
                true
            },
            Err(e) => {
                error!(error = %e, "Failed to mirror directory");
                false
            },
        }
    }

    /// List keys under `prefix`. Disabled adapters and failed listings yield no keys.
    #[instrument(skip(self))]
    pub async fn list_objects(&self, bucket: &str, prefix: &str) -> Vec<String> {
        let Some(client) = self.client() else {
            warn!("Storage mirror disabled, cannot list objects");
            return Vec::new();
        };

        match try_list_objects(client, bucket, prefix).await {
            Ok(keys) => keys,
            Err(e) => {
                error!(error = %e, "Failed to list objects");
                Vec::new()
            },
        }
    }

    #[instrument(skip(self))]
    pub async fn delete_by_prefix(&self, bucket: &str, prefix: &str) -> bool {
        let Some(client) = self.client() else {
            debug!("Storage mirror disabled, skipping delete");
            return false;
        };

        let result = async {
            let keys = try_list_objects(client, bucket, prefix).await?;
            for key in &keys {
                try_delete_object(client, bucket, key).await?;
                debug!("Deleted gs://{}/{}", bucket, key);
            }
            Ok::<_, PipelineError>(keys.len())
        }
        .await;

        match result {
            Ok(count) => {
                info!(deleted = count, "Cleared gs://{}/{}", bucket, prefix);
                true
            },
            Err(e) => {
                error!(error = %e, "Failed to delete objects");
                false
            },
        }
    }

    /// Delete every object of one layer
    pub async fn clear_layer(&self, bucket: &str, layer: Layer) -> bool {
        self.delete_by_prefix(bucket, &format!("{}/", layer)).await
    }
}

fn build_client(config: &StorageConfig) -> Result<Client> {
    let raw = std::fs::read_to_string(&config.credentials_path).map_err(|e| {
        PipelineError::StorageMirror(format!(
            "credentials not readable at {}: {}",
            config.credentials_path.display(),
            e
        ))
    })?;

    let credentials: HmacCredentials = serde_json::from_str(&raw).map_err(|e| {
        PipelineError::StorageMirror(format!(
            "credentials file {} is not a valid HMAC key file: {}",
            config.credentials_path.display(),
            e
        ))
    })?;

    if credentials.access_key.is_empty() || credentials.secret_key.is_empty() {
        return Err(PipelineError::StorageMirror(
            "credentials file has an empty access or secret key".to_string(),
        ));
    }

    reqwest::Url::parse(&config.endpoint).map_err(|e| {
        PipelineError::StorageMirror(format!("invalid endpoint '{}': {}", config.endpoint, e))
    })?;

    let s3_config = aws_sdk_s3::Config::builder()
        .credentials_provider(Credentials::new(
            credentials.access_key,
            credentials.secret_key,
            None,
            None,
            "brewery-storage",
        ))
        .region(Region::new(config.region.clone()))
        .endpoint_url(&config.endpoint)
        .force_path_style(true)
        // GCS interop rejects aws-chunked bodies with trailing checksums
        .request_checksum_calculation(RequestChecksumCalculation::WhenRequired)
        .response_checksum_validation(ResponseChecksumValidation::WhenRequired)
        .build();

    Ok(Client::from_conf(s3_config))
}

async fn try_put_object(
    client: &Client,
    bucket: &str,
    key: &str,
    body: ByteStream,
    content_type: &str,
) -> Result<()> {
    client
        .put_object()
        .bucket(bucket)
        .key(key)
        .content_type(content_type)
        .body(body)
        .send()
        .await
        .map_err(|e| {
            PipelineError::StorageMirror(format!(
                "upload of gs://{}/{} failed: {}",
                bucket,
                key,
                DisplayErrorContext(&e)
            ))
        })?;
    Ok(())
}

async fn try_put_directory(
    client: &Client,
    bucket: &str,
    key_prefix: &str,
    local_dir: &Path,
) -> Result<usize> {
    let prefix = key_prefix.trim_end_matches('/');
    let mut uploaded = 0;

    for entry in WalkDir::new(local_dir).sort_by_file_name() {
        let entry = entry.map_err(|e| PipelineError::StorageMirror(e.to_string()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().is_none_or(|ext| ext != "parquet") {
            continue;
        }

        let relative = path
            .strip_prefix(local_dir)
            .map_err(|e| PipelineError::StorageMirror(e.to_string()))?
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join("/");
        let key = format!("{}/{}", prefix, relative);

        let body = ByteStream::from_path(path).await.map_err(|e| {
            PipelineError::StorageMirror(format!("cannot read {}: {}", path.display(), e))
        })?;
        try_put_object(client, bucket, &key, body, "application/octet-stream").await?;
        debug!("Uploaded {} to gs://{}/{}", path.display(), bucket, key);
        uploaded += 1;
    }

    Ok(uploaded)
}

async fn try_list_objects(client: &Client, bucket: &str, prefix: &str) -> Result<Vec<String>> {
    let mut keys = Vec::new();
    let mut continuation: Option<String> = None;

    loop {
        let response = client
            .list_objects_v2()
            .bucket(bucket)
            .prefix(prefix)
            .set_continuation_token(continuation.take())
            .send()
            .await
            .map_err(|e| {
                PipelineError::StorageMirror(format!(
                    "listing gs://{}/{} failed: {}",
                    bucket,
                    prefix,
                    DisplayErrorContext(&e)
                ))
            })?;

        keys.extend(
            response
                .contents()
                .iter()
                .filter_map(|obj| obj.key().map(|k| k.to_string())),
        );

        match response.next_continuation_token() {
            Some(token) => continuation = Some(token.to_string()),
            None => break,
        }
    }

    Ok(keys)
}

async fn try_delete_object(client: &Client, bucket: &str, key: &str) -> Result<()> {
    client
        .delete_object()
        .bucket(bucket)
        .key(key)
        .send()
        .await
        .map_err(|e| {
            PipelineError::StorageMirror(format!(
                "delete of gs://{}/{} failed: {}",
                bucket,
                key,
                DisplayErrorContext(&e)
            ))
        })?;
    Ok(())
}

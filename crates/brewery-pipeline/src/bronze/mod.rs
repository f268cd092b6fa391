//! Bronze layer: raw ingestion from the Open Brewery DB API
//!
//! A run fetches every page, then writes the batch verbatim as one JSON
//! document under `{bronze_root}/date=YYYY-MM-DD/` next to a metadata sidecar.
//! Files are timestamped, so repeated ingests for one date accumulate rather
//! than overwrite.

pub mod client;
pub mod retry;

pub use client::BreweryApiClient;
pub use retry::RetryPolicy;

use brewery_common::{Layer, PipelineError, Result, RunDate};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::storage::ObjectStorage;

/// Filename timestamp; microseconds keep same-second ingests apart
const FILE_TIMESTAMP_FORMAT: &str = "%Y%m%d_%H%M%S_%6f";

/// Sidecar written next to every raw batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IngestionMetadata {
    pub run_date: RunDate,
    pub fetched_at: DateTime<Utc>,
    /// Timestamp shared by the batch and sidecar filenames
    pub timestamp: String,
    pub record_count: usize,
    pub output_file: String,
    pub storage_mirror_enabled: bool,
    pub storage_bucket: Option<String>,
    /// Whether the batch actually reached the bucket
    pub mirrored: bool,
}

/// Fetch everything and persist it to the bronze partition for `run_date`.
///
/// Returns the path of the raw JSON document.
#[instrument(skip_all, fields(run_date = %run_date))]
pub async fn ingest(
    client: &BreweryApiClient,
    config: &PipelineConfig,
    storage: &ObjectStorage,
    run_date: &RunDate,
) -> Result<PathBuf> {
    info!("Starting brewery ingestion");

    let records = client.fetch_all().await?;
    if records.is_empty() {
        warn!("API returned no breweries");
        return Err(PipelineError::NoData {
            run_date: run_date.to_string(),
        });
    }

    let partition = config.datalake.partition(Layer::Bronze, run_date);
    let bucket = config.storage.bucket.as_deref();
    let metadata = write_batch(&records, &partition, run_date, storage, bucket).await?;

    info!(
        records = metadata.record_count,
        mirrored = metadata.mirrored,
        "Bronze ingestion complete: {}",
        metadata.output_file
    );
    Ok(PathBuf::from(metadata.output_file))
}

/// Write a non-empty batch and its sidecar into `partition`, mirroring the batch when possible
pub async fn write_batch(
    records: &[Value],
    partition: &Path,
    run_date: &RunDate,
    storage: &ObjectStorage,
    bucket: Option<&str>,
) -> Result<IngestionMetadata> {
    tokio::fs::create_dir_all(partition).await?;

    let body = serde_json::to_vec_pretty(records)?;
    let (fetched_at, timestamp, output_file) = create_unique_batch(partition, &body).await?;
    info!("Saved {} breweries to {}", records.len(), output_file.display());

    let mirror_bucket = bucket.filter(|_| storage.is_enabled());
    let mut mirrored = false;
    if let Some(bucket) = mirror_bucket {
        let key = ObjectStorage::layer_key(
            Layer::Bronze,
            &format!("{}/breweries_{}.json", run_date.partition(), timestamp),
        );
        mirrored = storage
            .put_object(bucket, &key, body, "application/json")
            .await;
    }

    let metadata = IngestionMetadata {
        run_date: *run_date,
        fetched_at,
        timestamp: timestamp.clone(),
        record_count: records.len(),
        output_file: output_file.display().to_string(),
        storage_mirror_enabled: mirror_bucket.is_some(),
        storage_bucket: mirror_bucket.map(str::to_string),
        mirrored,
    };

    let metadata_file = partition.join(format!("metadata_{}.json", timestamp));
    tokio::fs::write(&metadata_file, serde_json::to_vec_pretty(&metadata)?).await?;
    info!("Metadata saved to {}", metadata_file.display());

    Ok(metadata)
}

/// Create `breweries_{ts}.json` with `create_new`, retrying on a name clash
async fn create_unique_batch(
    partition: &Path,
    body: &[u8],
) -> Result<(DateTime<Utc>, String, PathBuf)> {
    loop {
        let now = Utc::now();
        let timestamp = now.format(FILE_TIMESTAMP_FORMAT).to_string();
        let path = partition.join(format!("breweries_{}.json", timestamp));

        match tokio::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .open(&path)
            .await
        {
            Ok(mut file) => {
                file.write_all(body).await?;
                file.flush().await?;
                return Ok((now, timestamp, path));
            },
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => {
                tokio::time::sleep(Duration::from_millis(1)).await;
            },
            Err(e) => return Err(e.into()),
        }
    }
}

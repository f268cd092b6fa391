//! Silver layer: curated, deduplicated, location-partitioned Parquet
//!
//! Reads every raw batch of the bronze partition, derives the curated fields,
//! keeps one row per brewery id and writes
//! `{silver_root}/date=YYYY-MM-DD/breweries_per_location/country_normalized=<c>/state_province_normalized=<r>/part-00000.parquet`.
//! A rerun for the same date replaces the whole `date=` directory.

pub mod models;
pub mod normalize;

use brewery_common::{Layer, PipelineError, Result, RunDate};
use chrono::{DateTime, Utc};
use serde_json::Value;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument, warn};

use crate::config::PipelineConfig;
use crate::parquet_util::{self, PART_FILE};
use crate::storage::ObjectStorage;
use models::{CuratedBrewery, RawBrewery};

/// Directory holding the curated dataset inside a `date=` partition
pub const CURATED_DATASET: &str = "breweries_per_location";

/// Curate the bronze partition for `run_date`. Returns the silver `date=` directory.
#[instrument(skip_all, fields(run_date = %run_date))]
pub async fn transform(
    config: &PipelineConfig,
    storage: &ObjectStorage,
    run_date: &RunDate,
) -> Result<PathBuf> {
    info!("Starting silver transformation");

    let input = config.datalake.partition(Layer::Bronze, run_date);
    let raw = read_bronze_partition(&input).await?;
    info!("Loaded {} raw records from {}", raw.len(), input.display());

    let processed_at = Utc::now();
    let curated = curate_batch(raw, processed_at);
    if curated.is_empty() {
        warn!("No curated rows produced for {}", run_date);
    }

    let output = config.datalake.partition(Layer::Silver, run_date);
    if tokio::fs::try_exists(&output).await? {
        info!("Removing existing output directory: {}", output.display());
        tokio::fs::remove_dir_all(&output).await?;
    }

    let dataset = output.join(CURATED_DATASET);
    tokio::fs::create_dir_all(&dataset).await?;
    let partitions = write_partitioned(&dataset, &curated)?;
    info!(
        rows = curated.len(),
        partitions,
        "Curated data written to {}",
        dataset.display()
    );

    if let Some(bucket) = config.storage.bucket.as_deref().filter(|_| storage.is_enabled()) {
        let prefix = ObjectStorage::layer_key(
            Layer::Silver,
            &format!("{}/{}", run_date.partition(), CURATED_DATASET),
        );
        if !storage.put_directory(bucket, &prefix, &dataset).await {
            warn!("Silver mirror failed, local output is still available");
        }
    }

    Ok(output)
}

/// Curate and deduplicate one run's raw records with a shared processing timestamp
pub fn curate_batch(raw: Vec<RawBrewery>, processed_at: DateTime<Utc>) -> Vec<CuratedBrewery> {
    let total = raw.len();
    let curated: Vec<CuratedBrewery> = raw
        .into_iter()
        .filter_map(|record| normalize::curate(record, processed_at))
        .collect();

    if curated.len() < total {
        warn!("Skipped {} records without an id", total - curated.len());
    }

    let before = curated.len();
    let deduplicated = normalize::deduplicate(curated);
    if deduplicated.len() < before {
        info!("Removed {} duplicate records", before - deduplicated.len());
    }
    deduplicated
}

/// Read every raw batch document in a bronze partition, in filename order.
///
/// Metadata sidecars are skipped. Entries that are not JSON objects are dropped with a warning.
pub async fn read_bronze_partition(dir: &Path) -> Result<Vec<RawBrewery>> {
    let missing = || PipelineError::MissingInput {
        layer: Layer::Silver,
        path: dir.display().to_string(),
    };

    if !tokio::fs::try_exists(dir).await? {
        return Err(missing());
    }

    let mut documents = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(".json") && !name.starts_with("metadata_") {
            documents.push(entry.path());
        }
    }
    documents.sort();

    if documents.is_empty() {
        return Err(missing());
    }

    let mut records = Vec::new();
    for path in documents {
        let values: Vec<Value> = serde_json::from_slice(&tokio::fs::read(&path).await?)?;
        debug!("Read {} records from {}", values.len(), path.display());

        for value in values {
            match serde_json::from_value::<RawBrewery>(value) {
                Ok(record) => records.push(record),
                Err(e) => warn!("Skipping malformed record in {}: {}", path.display(), e),
            }
        }
    }

    Ok(records)
}

/// Write one Parquet file per (country, region). Returns the number of partitions written.
pub fn write_partitioned(dataset: &Path, rows: &[CuratedBrewery]) -> Result<usize> {
    let mut groups: BTreeMap<(&str, &str), Vec<CuratedBrewery>> = BTreeMap::new();
    for row in rows {
        groups
            .entry((row.country_normalized.as_str(), row.state_province_normalized.as_str()))
            .or_default()
            .push(row.clone());
    }

    for ((country, region), group) in &groups {
        let path = dataset
            .join(format!("country_normalized={}", escape_partition_value(country)))
            .join(format!("state_province_normalized={}", escape_partition_value(region)))
            .join(PART_FILE);
        parquet_util::write_curated(&path, group)?;
    }

    Ok(groups.len())
}

/// Hive-style escaping so a value can never form a path separator or `key=value` clash
pub fn escape_partition_value(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    for c in value.chars() {
        match c {
            '/' | '\\' | '%' | '=' | ':' | '"' | '*' | '?' | '<' | '>' | '|' | '#' | '\''
            | '\u{0}'..='\u{1f}' | '\u{7f}' => out.push_str(&format!("%{:02X}", c as u32)),
            _ => out.push(c),
        }
    }
    if out == "." || out == ".." {
        out = out.replace('.', "%2E");
    }
    out
}

/// Load every curated row of a silver `date=` partition
pub fn read_curated_partition(partition: &Path) -> Result<Vec<CuratedBrewery>> {
    let dataset = partition.join(CURATED_DATASET);
    let mut rows = Vec::new();
    for file in parquet_util::parquet_files(&dataset)? {
        rows.extend(parquet_util::read_curated(&file)?);
    }
    Ok(rows)
}

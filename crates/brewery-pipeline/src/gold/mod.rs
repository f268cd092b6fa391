//! Gold layer: business-ready aggregate tables
//!
//! Each table lands in `{gold_root}/date=YYYY-MM-DD/<table>/part-00000.parquet`
//! and is mirrored to `gold/date=YYYY-MM-DD/<table>/` when storage is active.

pub mod tables;

use brewery_common::{Layer, PipelineError, Result, RunDate};
use chrono::Utc;
use std::path::{Path, PathBuf};
use tracing::{info, instrument, warn};

use crate::config::PipelineConfig;
use crate::parquet_util::{self, PART_FILE};
use crate::silver;
use crate::storage::ObjectStorage;
use tables::{BY_LOCATION, BY_TYPE, BY_TYPE_AND_LOCATION};

/// Build all three tables for `run_date`. Returns the gold `date=` directory.
#[instrument(skip_all, fields(run_date = %run_date))]
pub async fn aggregate(
    config: &PipelineConfig,
    storage: &ObjectStorage,
    run_date: &RunDate,
) -> Result<PathBuf> {
    info!("Starting gold aggregation");

    let input = config.datalake.partition(Layer::Silver, run_date);
    let dataset = input.join(silver::CURATED_DATASET);
    if !tokio::fs::try_exists(&dataset).await? {
        return Err(PipelineError::MissingInput {
            layer: Layer::Gold,
            path: input.display().to_string(),
        });
    }

    let rows = silver::read_curated_partition(&input)?;
    info!("Loaded {} curated records from {}", rows.len(), dataset.display());

    let output = config.datalake.partition(Layer::Gold, run_date);
    if tokio::fs::try_exists(&output).await? {
        info!("Removing existing output directory: {}", output.display());
        tokio::fs::remove_dir_all(&output).await?;
    }

    let aggregated_at = Utc::now();

    let type_location = tables::by_type_and_location(&rows, aggregated_at);
    parquet_util::write_type_location(&table_file(&output, BY_TYPE_AND_LOCATION), &type_location)?;
    info!("{}: {} rows", BY_TYPE_AND_LOCATION, type_location.len());

    let by_type = tables::by_type(&rows, aggregated_at);
    parquet_util::write_type(&table_file(&output, BY_TYPE), &by_type)?;
    info!("{}: {} rows", BY_TYPE, by_type.len());

    let by_location = tables::by_location(&rows, aggregated_at);
    parquet_util::write_location(&table_file(&output, BY_LOCATION), &by_location)?;
    info!("{}: {} rows", BY_LOCATION, by_location.len());

    if let Some(bucket) = config.storage.bucket.as_deref().filter(|_| storage.is_enabled()) {
        for table in tables::TABLE_NAMES {
            let prefix = ObjectStorage::layer_key(
                Layer::Gold,
                &format!("{}/{}", run_date.partition(), table),
            );
            if !storage.put_directory(bucket, &prefix, &output.join(table)).await {
                warn!(table, "Gold mirror failed, local output is still available");
            }
        }
    }

    info!("Gold aggregations written to {}", output.display());
    Ok(output)
}

/// `<gold date partition>/<table>/part-00000.parquet`
pub fn table_file(partition: &Path, table: &str) -> PathBuf {
    partition.join(table).join(PART_FILE)
}

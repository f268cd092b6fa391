//! Sequential pipeline runner
//!
//! Runs ingest -> transform -> aggregate for one run date, then verifies that
//! every layer left output behind. A failed stage stops the run; its partial
//! output stays in place and is superseded by the next rerun.

use brewery_common::{Layer, PipelineError, Result, RunDate};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::{error, info, instrument};

use crate::bronze::{self, BreweryApiClient};
use crate::config::PipelineConfig;
use crate::gold;
use crate::parquet_util;
use crate::silver;
use crate::storage::ObjectStorage;

/// Outcome of the post-run layer checks
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct QualityReport {
    pub passed: Vec<String>,
    pub failed: Vec<String>,
}

impl QualityReport {
    pub fn is_ok(&self) -> bool {
        self.failed.is_empty()
    }
}

/// Paths produced by a full run
#[derive(Debug, Clone, Serialize)]
pub struct RunSummary {
    pub run_date: RunDate,
    pub bronze_file: PathBuf,
    pub silver_partition: PathBuf,
    pub gold_partition: PathBuf,
    pub quality: QualityReport,
}

/// Run all stages for `run_date` and verify the result
#[instrument(skip_all, fields(run_date = %run_date, environment = %config.environment))]
pub async fn run_pipeline(
    config: &PipelineConfig,
    storage: &ObjectStorage,
    run_date: &RunDate,
) -> Result<RunSummary> {
    info!(storage = storage.status(), "Starting brewery pipeline");

    let client = BreweryApiClient::new(&config.api)?;

    let bronze_file = stage(Layer::Bronze, bronze::ingest(&client, config, storage, run_date).await)?;
    let silver_partition = stage(Layer::Silver, silver::transform(config, storage, run_date).await)?;
    let gold_partition = stage(Layer::Gold, gold::aggregate(config, storage, run_date).await)?;

    let quality = quality_check(config, run_date)?;

    info!("Pipeline completed for {}", run_date);
    Ok(RunSummary {
        run_date: *run_date,
        bronze_file,
        silver_partition,
        gold_partition,
        quality,
    })
}

fn stage(layer: Layer, result: Result<PathBuf>) -> Result<PathBuf> {
    match result {
        Ok(path) => {
            info!("{} stage complete: {}", layer, path.display());
            Ok(path)
        },
        Err(e) => {
            error!(error = %e, "{} stage failed", layer);
            Err(e)
        },
    }
}

/// Inspect every layer's partition without failing
pub fn inspect_layers(config: &PipelineConfig, run_date: &RunDate) -> QualityReport {
    let mut report = QualityReport::default();

    for layer in Layer::ALL {
        let partition = config.datalake.partition(layer, run_date);
        let (extension, found) = match layer {
            Layer::Bronze => ("json", has_raw_batch(&partition)),
            Layer::Silver | Layer::Gold => ("parquet", has_parquet(&partition)),
        };

        if found {
            report
                .passed
                .push(format!("{} layer has data for {}", capitalize(layer), run_date));
        } else {
            report.failed.push(format!(
                "{} layer data missing for {} (no *.{} under {})",
                capitalize(layer),
                run_date,
                extension,
                partition.display()
            ));
        }
    }

    report
}

/// Verify each layer wrote output for `run_date`; any missing layer fails the run
#[instrument(skip(config))]
pub fn quality_check(config: &PipelineConfig, run_date: &RunDate) -> Result<QualityReport> {
    let report = inspect_layers(config, run_date);

    for check in &report.passed {
        info!("Quality check passed: {}", check);
    }
    if !report.is_ok() {
        for check in &report.failed {
            error!("Quality check failed: {}", check);
        }
        return Err(PipelineError::QualityCheck {
            failed: report.failed,
        });
    }

    info!("All quality checks passed");
    Ok(report)
}

fn has_raw_batch(partition: &Path) -> bool {
    std::fs::read_dir(partition)
        .map(|entries| {
            entries.flatten().any(|entry| {
                let name = entry.file_name();
                let name = name.to_string_lossy();
                name.ends_with(".json") && !name.starts_with("metadata_")
            })
        })
        .unwrap_or(false)
}

fn has_parquet(partition: &Path) -> bool {
    partition.is_dir()
        && parquet_util::parquet_files(partition)
            .map(|files| !files.is_empty())
            .unwrap_or(false)
}

fn capitalize(layer: Layer) -> String {
    let name = layer.as_str();
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

//! Brewery Pipeline Library
//!
//! Batch ETL over the Open Brewery DB API, organized as three medallion layers.
//!
//! # Layers
//!
//! - **Bronze**: raw API batches as JSON plus a metadata sidecar
//! - **Silver**: curated, deduplicated Parquet partitioned by location
//! - **Gold**: three aggregate tables (by type and location, by type, by location)
//!
//! Each layer is written under `date=YYYY-MM-DD` and optionally mirrored to a
//! bucket through [`storage::ObjectStorage`].
//!
//! # Example
//!
//! ```no_run
//! use brewery_common::RunDate;
//! use brewery_pipeline::{config::PipelineConfig, orchestrator, storage::ObjectStorage};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = PipelineConfig::from_env()?;
//!     let storage = ObjectStorage::connect(&config.storage);
//!     let summary = orchestrator::run_pipeline(&config, &storage, &RunDate::today()).await?;
//!     println!("{}", summary.gold_partition.display());
//!     Ok(())
//! }
//! ```
#![deny(clippy::unwrap_used, clippy::expect_used)]

pub mod bronze;
pub mod config;
pub mod gold;
pub mod orchestrator;
pub mod parquet_util;
pub mod silver;
pub mod storage;

pub use config::PipelineConfig;
pub use orchestrator::{quality_check, run_pipeline, QualityReport, RunSummary};
pub use storage::ObjectStorage;

//! Brewery Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared types, logging setup, and error handling for the brewery lake.
//!
//! - **Error Handling**: [`PipelineError`], the failure taxonomy every stage reports with
//! - **Logging**: tracing subscriber setup driven by `LOG_*` variables
//! - **Types**: medallion [`Layer`] and the [`RunDate`] partition key
//!
//! # Example
//!
//! ```
//! use brewery_common::{Layer, RunDate};
//!
//! let run_date: RunDate = "2024-01-01".parse().unwrap();
//! assert_eq!(format!("{}/{}", Layer::Bronze, run_date.partition()), "bronze/date=2024-01-01");
//! ```

pub mod error;
pub mod logging;
pub mod types;

pub use error::{PipelineError, Result};
pub use types::{Layer, RunDate};

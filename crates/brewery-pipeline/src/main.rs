//! Brewery Pipeline - medallion ETL for Open Brewery DB

use anyhow::{Context, Result};
use brewery_common::logging::{init_logging, LogConfig, LogLevel};
use brewery_common::RunDate;
use brewery_pipeline::{
    bronze::{self, BreweryApiClient},
    gold, orchestrator, silver, ObjectStorage, PipelineConfig,
};
use clap::{Args, Parser, Subcommand};
use tracing::info;

#[derive(Parser, Debug)]
#[command(name = "brewery-pipeline")]
#[command(author, version, about = "Brewery medallion pipeline")]
struct Cli {
    /// Stage to run
    #[command(subcommand)]
    command: Command,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Args, Debug)]
struct DateArg {
    /// Run date (YYYY-MM-DD); defaults to today in UTC
    #[arg(short, long, env = "RUN_DATE")]
    date: Option<RunDate>,
}

impl DateArg {
    fn resolve(&self) -> RunDate {
        self.date.unwrap_or_else(RunDate::today)
    }
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch every brewery into the bronze layer
    Ingest(DateArg),

    /// Curate bronze data into the silver layer
    Transform(DateArg),

    /// Build the gold aggregate tables from silver
    Aggregate(DateArg),

    /// Verify every layer has output for the run date
    QualityCheck(DateArg),

    /// Run all stages followed by the quality check
    Run(DateArg),
}

impl Command {
    /// Quality checks only read the local lake
    fn mirrors_output(&self) -> bool {
        !matches!(self, Command::QualityCheck(_))
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = if cli.verbose {
        LogLevel::Debug
    } else {
        LogLevel::Info
    };

    // Environment variables take precedence over flags
    let log_config = LogConfig::builder()
        .level(log_level)
        .log_file_prefix("brewery-pipeline")
        .filter_directives("aws_smithy_runtime=warn,aws_config=warn,hyper=info")
        .build()
        .merge_env()?;

    let _guard = init_logging(&log_config)?;

    let config = PipelineConfig::from_env().context("Failed to load pipeline configuration")?;

    let storage = if cli.command.mirrors_output() {
        ObjectStorage::connect(&config.storage)
    } else {
        ObjectStorage::Unconfigured
    };

    match cli.command {
        Command::Ingest(date) => {
            let run_date = date.resolve();
            let client = BreweryApiClient::new(&config.api)?;
            let path = bronze::ingest(&client, &config, &storage, &run_date).await?;
            println!("{}", path.display());
        },
        Command::Transform(date) => {
            let path = silver::transform(&config, &storage, &date.resolve()).await?;
            println!("{}", path.display());
        },
        Command::Aggregate(date) => {
            let path = gold::aggregate(&config, &storage, &date.resolve()).await?;
            println!("{}", path.display());
        },
        Command::QualityCheck(date) => {
            let report = orchestrator::quality_check(&config, &date.resolve())?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        },
        Command::Run(date) => {
            let summary = orchestrator::run_pipeline(&config, &storage, &date.resolve()).await?;
            println!("{}", serde_json::to_string_pretty(&summary)?);
        },
    }

    info!("Done");
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Cli {
        Cli::try_parse_from(std::iter::once("brewery-pipeline").chain(args.iter().copied())).unwrap()
    }

    #[test]
    fn test_quality_check_skips_storage() {
        let cli = parse(&["quality-check", "--date", "2024-01-01"]);
        assert!(!cli.command.mirrors_output());
    }

    #[test]
    fn test_stages_connect_storage() {
        for stage in ["ingest", "transform", "aggregate", "run"] {
            let cli = parse(&[stage, "--date", "2024-01-01"]);
            assert!(cli.command.mirrors_output(), "{} should mirror", stage);
        }
    }

    #[test]
    fn test_date_flag_is_parsed() {
        let cli = parse(&["-v", "run", "--date", "2024-03-15"]);
        assert!(cli.verbose);
        match cli.command {
            Command::Run(date) => assert_eq!(date.resolve().to_string(), "2024-03-15"),
            other => panic!("unexpected command {:?}", other),
        }
    }
}

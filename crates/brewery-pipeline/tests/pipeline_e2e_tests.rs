//! End-to-end tests: ingest -> transform -> aggregate -> quality check
//!
//! Uses the three sample breweries:
//! - San Francisco, micro: coordinates and contact details
//! - Portland, regional: coordinates, empty phone and website
//! - Denver, micro: no coordinates, contact details

mod common;

use brewery_common::{Layer, PipelineError, RunDate};
use brewery_pipeline::bronze::{self, BreweryApiClient};
use brewery_pipeline::gold::{self, tables};
use brewery_pipeline::parquet_util;
use brewery_pipeline::{orchestrator, silver, ObjectStorage};
use common::{mount_single_page, sample_breweries, test_config};
use wiremock::MockServer;

fn run_date() -> RunDate {
    "2024-01-01".parse().unwrap()
}

#[tokio::test]
async fn test_full_pipeline_on_sample_data() {
    let server = MockServer::start().await;
    mount_single_page(&server, sample_breweries()).await;

    let lake = tempfile::tempdir().unwrap();
    let config = test_config(lake.path(), &server);
    let storage = ObjectStorage::Unconfigured;

    let summary = orchestrator::run_pipeline(&config, &storage, &run_date())
        .await
        .unwrap();

    assert!(summary.quality.is_ok());
    assert_eq!(summary.quality.passed.len(), 3);
    assert_eq!(summary.silver_partition, lake.path().join("silver").join("date=2024-01-01"));
    assert_eq!(summary.gold_partition, lake.path().join("gold").join("date=2024-01-01"));

    // Global by-type table
    let by_type = parquet_util::read_type(&gold::table_file(&summary.gold_partition, tables::BY_TYPE)).unwrap();
    assert_eq!(by_type.len(), 2);
    assert_eq!(by_type[0].brewery_type, "micro");
    assert_eq!(by_type[0].brewery_count, 2);
    assert_eq!(by_type[0].countries_count, 1);
    assert_eq!(by_type[0].regions_count, 2);
    assert_eq!(by_type[0].avg_coordinate_completeness, 0.5);
    assert_eq!(by_type[0].percentage_of_total, 66.67);
    assert_eq!(by_type[1].brewery_type, "regional");
    assert_eq!(by_type[1].percentage_of_total, 33.33);

    // Quality scores per (region, category)
    let by_type_location = parquet_util::read_type_location(&gold::table_file(
        &summary.gold_partition,
        tables::BY_TYPE_AND_LOCATION,
    ))
    .unwrap();
    let scores: Vec<_> = by_type_location
        .iter()
        .map(|r| (r.state_province.as_str(), r.brewery_type.as_str(), r.data_quality_score))
        .collect();
    assert_eq!(
        scores,
        vec![
            ("California", "micro", 100.0),
            ("Colorado", "micro", 50.0),
            ("Oregon", "regional", 50.0),
        ]
    );
    assert!(by_type_location.iter().all(|r| r.country == "UNITED_STATES"));
    assert!(by_type_location.iter().all(|r| r.percentage_of_location == 100.0));

    // By-location table
    let by_location = parquet_util::read_location(&gold::table_file(&summary.gold_partition, tables::BY_LOCATION)).unwrap();
    assert_eq!(by_location.len(), 3);
    assert!(by_location.iter().all(|r| r.total_breweries == 1 && r.brewery_types_count == 1));
}

#[tokio::test]
async fn test_silver_rows_carry_derived_fields() {
    let server = MockServer::start().await;
    mount_single_page(&server, sample_breweries()).await;

    let lake = tempfile::tempdir().unwrap();
    let config = test_config(lake.path(), &server);
    let storage = ObjectStorage::Unconfigured;
    let client = BreweryApiClient::new(&config.api).unwrap();

    bronze::ingest(&client, &config, &storage, &run_date()).await.unwrap();
    let partition = silver::transform(&config, &storage, &run_date()).await.unwrap();

    let denver_file = partition
        .join(silver::CURATED_DATASET)
        .join("country_normalized=UNITED_STATES")
        .join("state_province_normalized=Colorado")
        .join(parquet_util::PART_FILE);
    let rows = parquet_util::read_curated(&denver_file).unwrap();
    assert_eq!(rows.len(), 1);

    let denver = &rows[0];
    assert_eq!(denver.name.as_deref(), Some("Test Brewery 3"));
    assert_eq!(denver.latitude_numeric, None);
    assert!(!denver.has_coordinates);
    assert!(denver.has_contact_info);
    assert_eq!(denver.full_address, ", , Denver, Colorado, 80202, United States");
    assert_eq!(denver.brewery_type_normalized, "micro");

    let all = silver::read_curated_partition(&partition).unwrap();
    let portland = all.iter().find(|r| r.city.as_deref() == Some("Portland")).unwrap();
    assert!(portland.has_coordinates);
    assert!(!portland.has_contact_info);

    // One processing timestamp per run
    assert!(all.iter().all(|r| r.processing_timestamp == all[0].processing_timestamp));
}

#[tokio::test]
async fn test_duplicate_ids_across_batches_are_collapsed() {
    let server = MockServer::start().await;
    mount_single_page(&server, sample_breweries()).await;

    let lake = tempfile::tempdir().unwrap();
    let config = test_config(lake.path(), &server);
    let storage = ObjectStorage::Unconfigured;
    let client = BreweryApiClient::new(&config.api).unwrap();

    bronze::ingest(&client, &config, &storage, &run_date()).await.unwrap();

    // Second fetch returns the same ids with renamed breweries
    let mut renamed = sample_breweries();
    for record in renamed.as_array_mut().unwrap() {
        let name = record["name"].as_str().unwrap().replace("Test", "Renamed");
        record["name"] = name.into();
    }
    server.reset().await;
    mount_single_page(&server, renamed).await;
    bronze::ingest(&client, &config, &storage, &run_date()).await.unwrap();

    let partition = silver::transform(&config, &storage, &run_date()).await.unwrap();
    let rows = silver::read_curated_partition(&partition).unwrap();
    assert_eq!(rows.len(), 3);

    let mut names: Vec<&str> = rows.iter().filter_map(|r| r.name.as_deref()).collect();
    names.sort();
    assert_eq!(names, ["Renamed Brewery 1", "Renamed Brewery 2", "Renamed Brewery 3"]);
}

#[tokio::test]
async fn test_rerun_overwrites_silver_and_gold() {
    let server = MockServer::start().await;
    mount_single_page(&server, sample_breweries()).await;

    let lake = tempfile::tempdir().unwrap();
    let config = test_config(lake.path(), &server);
    let storage = ObjectStorage::Unconfigured;
    let client = BreweryApiClient::new(&config.api).unwrap();

    bronze::ingest(&client, &config, &storage, &run_date()).await.unwrap();

    let silver_partition = silver::transform(&config, &storage, &run_date()).await.unwrap();
    let stale = silver_partition.join("stale.parquet");
    std::fs::write(&stale, b"not parquet").unwrap();

    silver::transform(&config, &storage, &run_date()).await.unwrap();
    assert!(!stale.exists());
    assert_eq!(parquet_util::parquet_files(&silver_partition).unwrap().len(), 3);
    assert_eq!(silver::read_curated_partition(&silver_partition).unwrap().len(), 3);

    let gold_partition = gold::aggregate(&config, &storage, &run_date()).await.unwrap();
    gold::aggregate(&config, &storage, &run_date()).await.unwrap();
    assert_eq!(parquet_util::parquet_files(&gold_partition).unwrap().len(), 3);
}

#[tokio::test]
async fn test_missing_inputs_name_the_layer() {
    let server = MockServer::start().await;
    let lake = tempfile::tempdir().unwrap();
    let config = test_config(lake.path(), &server);
    let storage = ObjectStorage::Unconfigured;

    let err = silver::transform(&config, &storage, &run_date()).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput { layer: Layer::Silver, .. }));
    assert!(err.to_string().starts_with("Missing input for silver layer"));

    let err = gold::aggregate(&config, &storage, &run_date()).await.unwrap_err();
    assert!(matches!(err, PipelineError::MissingInput { layer: Layer::Gold, .. }));
}

#[tokio::test]
async fn test_quality_check_reports_missing_layers() {
    let server = MockServer::start().await;
    mount_single_page(&server, sample_breweries()).await;

    let lake = tempfile::tempdir().unwrap();
    let config = test_config(lake.path(), &server);
    let storage = ObjectStorage::Unconfigured;
    let client = BreweryApiClient::new(&config.api).unwrap();

    bronze::ingest(&client, &config, &storage, &run_date()).await.unwrap();

    match orchestrator::quality_check(&config, &run_date()) {
        Err(PipelineError::QualityCheck { failed }) => {
            assert_eq!(failed.len(), 2);
            assert!(failed[0].starts_with("Silver layer data missing"));
            assert!(failed[1].starts_with("Gold layer data missing"));
        },
        other => panic!("expected quality check failure, got {:?}", other),
    }
}

#[tokio::test]
async fn test_pipeline_stops_when_ingestion_fails() {
    let server = MockServer::start().await;
    mount_single_page(&server, serde_json::json!([])).await;

    let lake = tempfile::tempdir().unwrap();
    let config = test_config(lake.path(), &server);

    let err = orchestrator::run_pipeline(&config, &ObjectStorage::Unconfigured, &run_date())
        .await
        .unwrap_err();
    assert!(matches!(err, PipelineError::NoData { .. }));
    assert!(!config.datalake.partition(Layer::Silver, &run_date()).exists());
}

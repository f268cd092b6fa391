//! Parquet encoding/decoding for the silver and gold layers.
//!
//! The schemas here are the on-disk contract of the lake:
//! - silver: one curated brewery per row, raw fields plus derived ones
//! - gold: `brewery_by_type_and_location`, `brewery_by_type`, `brewery_by_location`
//!
//! Timestamps are stored as microseconds in UTC.

use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arrow::array::{
    Array, ArrayRef, BooleanArray, Float64Array, Int64Array, ListArray, ListBuilder, StringArray,
    StringBuilder, TimestampMicrosecondArray,
};
use arrow::datatypes::{DataType, Field, Schema, TimeUnit};
use arrow::record_batch::RecordBatch;
use brewery_common::{PipelineError, Result};
use chrono::{DateTime, Utc};
use parquet::arrow::arrow_reader::ParquetRecordBatchReaderBuilder;
use parquet::arrow::ArrowWriter;
use parquet::file::properties::WriterProperties;
use parquet::format::KeyValue;
use walkdir::WalkDir;

use crate::gold::tables::{LocationAggregate, TypeAggregate, TypeLocationAggregate};
use crate::silver::models::CuratedBrewery;

/// File name used for every single-file table or partition
pub const PART_FILE: &str = "part-00000.parquet";

const UTC: &str = "UTC";

fn timestamp_type() -> DataType {
    DataType::Timestamp(TimeUnit::Microsecond, Some(UTC.into()))
}

fn curated_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("id", DataType::Utf8, false),
        Field::new("name", DataType::Utf8, true),
        Field::new("brewery_type", DataType::Utf8, true),
        Field::new("address_1", DataType::Utf8, true),
        Field::new("address_2", DataType::Utf8, true),
        Field::new("address_3", DataType::Utf8, true),
        Field::new("city", DataType::Utf8, true),
        Field::new("state_province", DataType::Utf8, true),
        Field::new("postal_code", DataType::Utf8, true),
        Field::new("country", DataType::Utf8, true),
        Field::new("longitude", DataType::Utf8, true),
        Field::new("latitude", DataType::Utf8, true),
        Field::new("phone", DataType::Utf8, true),
        Field::new("website_url", DataType::Utf8, true),
        Field::new("state", DataType::Utf8, true),
        Field::new("street", DataType::Utf8, true),
        Field::new("longitude_numeric", DataType::Float64, true),
        Field::new("latitude_numeric", DataType::Float64, true),
        Field::new("country_normalized", DataType::Utf8, false),
        Field::new("state_province_normalized", DataType::Utf8, false),
        Field::new("brewery_type_normalized", DataType::Utf8, false),
        Field::new("has_coordinates", DataType::Boolean, false),
        Field::new("has_contact_info", DataType::Boolean, false),
        Field::new("full_address", DataType::Utf8, false),
        Field::new("processing_timestamp", timestamp_type(), false),
    ]))
}

fn type_location_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("country", DataType::Utf8, false),
        Field::new("state_province", DataType::Utf8, false),
        Field::new("brewery_type", DataType::Utf8, false),
        Field::new("brewery_count", DataType::Int64, false),
        Field::new("with_coordinates", DataType::Int64, false),
        Field::new("with_contact_info", DataType::Int64, false),
        Field::new("unique_breweries", DataType::Int64, false),
        Field::new("percentage_of_location", DataType::Float64, false),
        Field::new("data_quality_score", DataType::Float64, false),
        Field::new("aggregation_timestamp", timestamp_type(), false),
    ]))
}

fn type_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("brewery_type", DataType::Utf8, false),
        Field::new("brewery_count", DataType::Int64, false),
        Field::new("countries_count", DataType::Int64, false),
        Field::new("regions_count", DataType::Int64, false),
        Field::new("avg_coordinate_completeness", DataType::Float64, false),
        Field::new("percentage_of_total", DataType::Float64, false),
        Field::new("aggregation_timestamp", timestamp_type(), false),
    ]))
}

fn location_schema() -> Arc<Schema> {
    Arc::new(Schema::new(vec![
        Field::new("country", DataType::Utf8, false),
        Field::new("state_province", DataType::Utf8, false),
        Field::new("total_breweries", DataType::Int64, false),
        Field::new("brewery_types_count", DataType::Int64, false),
        Field::new("with_coordinates", DataType::Int64, false),
        Field::new(
            "brewery_types",
            DataType::List(Arc::new(Field::new("item", DataType::Utf8, true))),
            false,
        ),
        Field::new("aggregation_timestamp", timestamp_type(), false),
    ]))
}

fn writer_properties() -> WriterProperties {
    let created_by = KeyValue {
        key: "created_by".to_string(),
        value: Some("brewery-pipeline".to_string()),
    };
    WriterProperties::builder()
        .set_key_value_metadata(Some(vec![created_by]))
        .build()
}

fn parquet_err(context: &str, path: &Path, e: impl std::fmt::Display) -> PipelineError {
    PipelineError::Parquet(format!("{} {}: {}", context, path.display(), e))
}

fn write_batch_to(path: &Path, schema: Arc<Schema>, columns: Vec<ArrayRef>) -> Result<()> {
    let batch = RecordBatch::try_new(schema.clone(), columns)
        .map_err(|e| parquet_err("record batch build failed for", path, e))?;

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let file = File::create(path)?;

    let mut writer = ArrowWriter::try_new(file, schema, Some(writer_properties()))
        .map_err(|e| parquet_err("parquet writer init failed for", path, e))?;
    writer
        .write(&batch)
        .map_err(|e| parquet_err("parquet write failed for", path, e))?;
    writer
        .close()
        .map_err(|e| parquet_err("parquet close failed for", path, e))?;
    Ok(())
}

fn read_batches(path: &Path) -> Result<Vec<RecordBatch>> {
    let file = File::open(path)?;
    let reader = ParquetRecordBatchReaderBuilder::try_new(file)
        .map_err(|e| parquet_err("parquet reader init failed for", path, e))?
        .build()
        .map_err(|e| parquet_err("parquet reader build failed for", path, e))?;

    reader
        .map(|batch| batch.map_err(|e| parquet_err("parquet read batch failed for", path, e)))
        .collect()
}

/// Every `*.parquet` file under `dir`, in path order
pub fn parquet_files(dir: &Path) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in WalkDir::new(dir).sort_by_file_name() {
        let entry = entry.map_err(|e| {
            PipelineError::Io(std::io::Error::other(format!("walking {}: {}", dir.display(), e)))
        })?;
        if entry.file_type().is_file() && entry.path().extension().is_some_and(|ext| ext == "parquet") {
            files.push(entry.into_path());
        }
    }
    Ok(files)
}

// ============================================================================
// Column helpers
// ============================================================================

fn column<'a, T: Array + 'static>(batch: &'a RecordBatch, name: &str) -> Result<&'a T> {
    let idx = batch
        .schema()
        .index_of(name)
        .map_err(|e| PipelineError::Parquet(format!("missing column '{}': {}", name, e)))?;

    batch
        .column(idx)
        .as_any()
        .downcast_ref::<T>()
        .ok_or_else(|| {
            PipelineError::Parquet(format!(
                "column '{}' has unexpected type {}",
                name,
                batch.column(idx).data_type()
            ))
        })
}

fn opt_str(col: &StringArray, row: usize) -> Option<String> {
    (!col.is_null(row)).then(|| col.value(row).to_string())
}

fn opt_f64(col: &Float64Array, row: usize) -> Option<f64> {
    (!col.is_null(row)).then(|| col.value(row))
}

fn timestamp_at(col: &TimestampMicrosecondArray, row: usize) -> Result<DateTime<Utc>> {
    let micros = col.value(row);
    DateTime::from_timestamp_micros(micros)
        .ok_or_else(|| PipelineError::Parquet(format!("timestamp out of range: {}", micros)))
}

fn strings<'a>(values: impl Iterator<Item = Option<&'a str>>) -> ArrayRef {
    Arc::new(values.collect::<StringArray>())
}

fn timestamps(values: impl Iterator<Item = DateTime<Utc>>) -> ArrayRef {
    Arc::new(
        TimestampMicrosecondArray::from(values.map(|t| t.timestamp_micros()).collect::<Vec<_>>())
            .with_timezone(UTC),
    )
}

fn int64s(values: impl Iterator<Item = i64>) -> ArrayRef {
    Arc::new(Int64Array::from(values.collect::<Vec<_>>()))
}

fn float64s(values: impl Iterator<Item = f64>) -> ArrayRef {
    Arc::new(Float64Array::from(values.collect::<Vec<_>>()))
}

// ============================================================================
// Silver
// ============================================================================

/// Writes curated rows to a single Parquet file at `path`.
pub fn write_curated(path: &Path, rows: &[CuratedBrewery]) -> Result<()> {
    let columns: Vec<ArrayRef> = vec![
        strings(rows.iter().map(|r| Some(r.id.as_str()))),
        strings(rows.iter().map(|r| r.name.as_deref())),
        strings(rows.iter().map(|r| r.brewery_type.as_deref())),
        strings(rows.iter().map(|r| r.address_1.as_deref())),
        strings(rows.iter().map(|r| r.address_2.as_deref())),
        strings(rows.iter().map(|r| r.address_3.as_deref())),
        strings(rows.iter().map(|r| r.city.as_deref())),
        strings(rows.iter().map(|r| r.state_province.as_deref())),
        strings(rows.iter().map(|r| r.postal_code.as_deref())),
        strings(rows.iter().map(|r| r.country.as_deref())),
        strings(rows.iter().map(|r| r.longitude.as_deref())),
        strings(rows.iter().map(|r| r.latitude.as_deref())),
        strings(rows.iter().map(|r| r.phone.as_deref())),
        strings(rows.iter().map(|r| r.website_url.as_deref())),
        strings(rows.iter().map(|r| r.state.as_deref())),
        strings(rows.iter().map(|r| r.street.as_deref())),
        Arc::new(rows.iter().map(|r| r.longitude_numeric).collect::<Float64Array>()),
        Arc::new(rows.iter().map(|r| r.latitude_numeric).collect::<Float64Array>()),
        strings(rows.iter().map(|r| Some(r.country_normalized.as_str()))),
        strings(rows.iter().map(|r| Some(r.state_province_normalized.as_str()))),
        strings(rows.iter().map(|r| Some(r.brewery_type_normalized.as_str()))),
        Arc::new(BooleanArray::from(rows.iter().map(|r| r.has_coordinates).collect::<Vec<_>>())),
        Arc::new(BooleanArray::from(rows.iter().map(|r| r.has_contact_info).collect::<Vec<_>>())),
        strings(rows.iter().map(|r| Some(r.full_address.as_str()))),
        timestamps(rows.iter().map(|r| r.processing_timestamp)),
    ];

    write_batch_to(path, curated_schema(), columns)
}

/// Reads curated rows from one Parquet file.
pub fn read_curated(path: &Path) -> Result<Vec<CuratedBrewery>> {
    let mut out = Vec::new();
    for batch in read_batches(path)? {
        let text = |name: &str| column::<StringArray>(&batch, name);

        let id = text("id")?;
        let name = text("name")?;
        let brewery_type = text("brewery_type")?;
        let address_1 = text("address_1")?;
        let address_2 = text("address_2")?;
        let address_3 = text("address_3")?;
        let city = text("city")?;
        let state_province = text("state_province")?;
        let postal_code = text("postal_code")?;
        let country = text("country")?;
        let longitude = text("longitude")?;
        let latitude = text("latitude")?;
        let phone = text("phone")?;
        let website_url = text("website_url")?;
        let state = text("state")?;
        let street = text("street")?;
        let longitude_numeric = column::<Float64Array>(&batch, "longitude_numeric")?;
        let latitude_numeric = column::<Float64Array>(&batch, "latitude_numeric")?;
        let country_normalized = text("country_normalized")?;
        let state_province_normalized = text("state_province_normalized")?;
        let brewery_type_normalized = text("brewery_type_normalized")?;
        let has_coordinates = column::<BooleanArray>(&batch, "has_coordinates")?;
        let has_contact_info = column::<BooleanArray>(&batch, "has_contact_info")?;
        let full_address = text("full_address")?;
        let processing_timestamp = column::<TimestampMicrosecondArray>(&batch, "processing_timestamp")?;

        for row in 0..batch.num_rows() {
            out.push(CuratedBrewery {
                id: id.value(row).to_string(),
                name: opt_str(name, row),
                brewery_type: opt_str(brewery_type, row),
                address_1: opt_str(address_1, row),
                address_2: opt_str(address_2, row),
                address_3: opt_str(address_3, row),
                city: opt_str(city, row),
                state_province: opt_str(state_province, row),
                postal_code: opt_str(postal_code, row),
                country: opt_str(country, row),
                longitude: opt_str(longitude, row),
                latitude: opt_str(latitude, row),
                phone: opt_str(phone, row),
                website_url: opt_str(website_url, row),
                state: opt_str(state, row),
                street: opt_str(street, row),
                longitude_numeric: opt_f64(longitude_numeric, row),
                latitude_numeric: opt_f64(latitude_numeric, row),
                country_normalized: country_normalized.value(row).to_string(),
                state_province_normalized: state_province_normalized.value(row).to_string(),
                brewery_type_normalized: brewery_type_normalized.value(row).to_string(),
                has_coordinates: has_coordinates.value(row),
                has_contact_info: has_contact_info.value(row),
                full_address: full_address.value(row).to_string(),
                processing_timestamp: timestamp_at(processing_timestamp, row)?,
            });
        }
    }
    Ok(out)
}

// ============================================================================
// Gold
// ============================================================================

pub fn write_type_location(path: &Path, rows: &[TypeLocationAggregate]) -> Result<()> {
    let columns: Vec<ArrayRef> = vec![
        strings(rows.iter().map(|r| Some(r.country.as_str()))),
        strings(rows.iter().map(|r| Some(r.state_province.as_str()))),
        strings(rows.iter().map(|r| Some(r.brewery_type.as_str()))),
        int64s(rows.iter().map(|r| r.brewery_count)),
        int64s(rows.iter().map(|r| r.with_coordinates)),
        int64s(rows.iter().map(|r| r.with_contact_info)),
        int64s(rows.iter().map(|r| r.unique_breweries)),
        float64s(rows.iter().map(|r| r.percentage_of_location)),
        float64s(rows.iter().map(|r| r.data_quality_score)),
        timestamps(rows.iter().map(|r| r.aggregation_timestamp)),
    ];
    write_batch_to(path, type_location_schema(), columns)
}

pub fn write_type(path: &Path, rows: &[TypeAggregate]) -> Result<()> {
    let columns: Vec<ArrayRef> = vec![
        strings(rows.iter().map(|r| Some(r.brewery_type.as_str()))),
        int64s(rows.iter().map(|r| r.brewery_count)),
        int64s(rows.iter().map(|r| r.countries_count)),
        int64s(rows.iter().map(|r| r.regions_count)),
        float64s(rows.iter().map(|r| r.avg_coordinate_completeness)),
        float64s(rows.iter().map(|r| r.percentage_of_total)),
        timestamps(rows.iter().map(|r| r.aggregation_timestamp)),
    ];
    write_batch_to(path, type_schema(), columns)
}

pub fn write_location(path: &Path, rows: &[LocationAggregate]) -> Result<()> {
    let mut brewery_types = ListBuilder::new(StringBuilder::new());
    for row in rows {
        for category in &row.brewery_types {
            brewery_types.values().append_value(category);
        }
        brewery_types.append(true);
    }

    let columns: Vec<ArrayRef> = vec![
        strings(rows.iter().map(|r| Some(r.country.as_str()))),
        strings(rows.iter().map(|r| Some(r.state_province.as_str()))),
        int64s(rows.iter().map(|r| r.total_breweries)),
        int64s(rows.iter().map(|r| r.brewery_types_count)),
        int64s(rows.iter().map(|r| r.with_coordinates)),
        Arc::new(brewery_types.finish()),
        timestamps(rows.iter().map(|r| r.aggregation_timestamp)),
    ];
    write_batch_to(path, location_schema(), columns)
}

pub fn read_type_location(path: &Path) -> Result<Vec<TypeLocationAggregate>> {
    let mut out = Vec::new();
    for batch in read_batches(path)? {
        let country = column::<StringArray>(&batch, "country")?;
        let state_province = column::<StringArray>(&batch, "state_province")?;
        let brewery_type = column::<StringArray>(&batch, "brewery_type")?;
        let brewery_count = column::<Int64Array>(&batch, "brewery_count")?;
        let with_coordinates = column::<Int64Array>(&batch, "with_coordinates")?;
        let with_contact_info = column::<Int64Array>(&batch, "with_contact_info")?;
        let unique_breweries = column::<Int64Array>(&batch, "unique_breweries")?;
        let percentage_of_location = column::<Float64Array>(&batch, "percentage_of_location")?;
        let data_quality_score = column::<Float64Array>(&batch, "data_quality_score")?;
        let aggregation_timestamp = column::<TimestampMicrosecondArray>(&batch, "aggregation_timestamp")?;

        for row in 0..batch.num_rows() {
            out.push(TypeLocationAggregate {
                country: country.value(row).to_string(),
                state_province: state_province.value(row).to_string(),
                brewery_type: brewery_type.value(row).to_string(),
                brewery_count: brewery_count.value(row),
                with_coordinates: with_coordinates.value(row),
                with_contact_info: with_contact_info.value(row),
                unique_breweries: unique_breweries.value(row),
                percentage_of_location: percentage_of_location.value(row),
                data_quality_score: data_quality_score.value(row),
                aggregation_timestamp: timestamp_at(aggregation_timestamp, row)?,
            });
        }
    }
    Ok(out)
}

pub fn read_type(path: &Path) -> Result<Vec<TypeAggregate>> {
    let mut out = Vec::new();
    for batch in read_batches(path)? {
        let brewery_type = column::<StringArray>(&batch, "brewery_type")?;
        let brewery_count = column::<Int64Array>(&batch, "brewery_count")?;
        let countries_count = column::<Int64Array>(&batch, "countries_count")?;
        let regions_count = column::<Int64Array>(&batch, "regions_count")?;
        let avg = column::<Float64Array>(&batch, "avg_coordinate_completeness")?;
        let percentage_of_total = column::<Float64Array>(&batch, "percentage_of_total")?;
        let aggregation_timestamp = column::<TimestampMicrosecondArray>(&batch, "aggregation_timestamp")?;

        for row in 0..batch.num_rows() {
            out.push(TypeAggregate {
                brewery_type: brewery_type.value(row).to_string(),
                brewery_count: brewery_count.value(row),
                countries_count: countries_count.value(row),
                regions_count: regions_count.value(row),
                avg_coordinate_completeness: avg.value(row),
                percentage_of_total: percentage_of_total.value(row),
                aggregation_timestamp: timestamp_at(aggregation_timestamp, row)?,
            });
        }
    }
    Ok(out)
}

pub fn read_location(path: &Path) -> Result<Vec<LocationAggregate>> {
    let mut out = Vec::new();
    for batch in read_batches(path)? {
        let country = column::<StringArray>(&batch, "country")?;
        let state_province = column::<StringArray>(&batch, "state_province")?;
        let total_breweries = column::<Int64Array>(&batch, "total_breweries")?;
        let brewery_types_count = column::<Int64Array>(&batch, "brewery_types_count")?;
        let with_coordinates = column::<Int64Array>(&batch, "with_coordinates")?;
        let brewery_types = column::<ListArray>(&batch, "brewery_types")?;
        let aggregation_timestamp = column::<TimestampMicrosecondArray>(&batch, "aggregation_timestamp")?;

        for row in 0..batch.num_rows() {
            let values = brewery_types.value(row);
            let categories = values
                .as_any()
                .downcast_ref::<StringArray>()
                .ok_or_else(|| {
                    PipelineError::Parquet("column 'brewery_types' is not a list of strings".to_string())
                })?
                .iter()
                .flatten()
                .map(str::to_string)
                .collect();

            out.push(LocationAggregate {
                country: country.value(row).to_string(),
                state_province: state_province.value(row).to_string(),
                total_breweries: total_breweries.value(row),
                brewery_types_count: brewery_types_count.value(row),
                with_coordinates: with_coordinates.value(row),
                brewery_types: categories,
                aggregation_timestamp: timestamp_at(aggregation_timestamp, row)?,
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::gold::tables;
    use crate::silver::models::RawBrewery;
    use crate::silver::normalize::curate;
    use chrono::TimeZone;

    fn curated() -> Vec<CuratedBrewery> {
        let at = Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap();
        vec![
            curate(
                RawBrewery {
                    id: Some("a".to_string()),
                    name: Some("Alpha".to_string()),
                    brewery_type: Some("micro".to_string()),
                    country: Some("United States".to_string()),
                    state_province: Some("Oregon".to_string()),
                    latitude: Some("45.5".to_string()),
                    longitude: Some("-122.6".to_string()),
                    ..Default::default()
                },
                at,
            )
            .unwrap(),
            curate(
                RawBrewery {
                    id: Some("b".to_string()),
                    website_url: Some("http://b.example".to_string()),
                    ..Default::default()
                },
                at,
            )
            .unwrap(),
        ]
    }

    #[test]
    fn test_curated_file_preserves_nulls_and_derived_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(PART_FILE);
        let rows = curated();

        write_curated(&path, &rows).unwrap();
        assert_eq!(read_curated(&path).unwrap(), rows);
    }

    #[test]
    fn test_location_table_keeps_category_lists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PART_FILE);
        let rows = tables::by_location(&curated(), Utc::now());

        write_location(&path, &rows).unwrap();
        let read = read_location(&path).unwrap();
        assert_eq!(read.len(), 2);
        assert_eq!(read[0].country, "UNITED_STATES");
        assert_eq!(read[0].brewery_types, vec!["micro"]);
        assert_eq!(read[1].brewery_types, vec!["unknown"]);
    }

    #[test]
    fn test_parquet_files_is_recursive_and_ordered() {
        let dir = tempfile::tempdir().unwrap();
        let rows = curated();
        write_curated(&dir.path().join("b=2").join(PART_FILE), &rows).unwrap();
        write_curated(&dir.path().join("a=1").join(PART_FILE), &rows).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "ignored").unwrap();

        let files = parquet_files(dir.path()).unwrap();
        assert_eq!(files.len(), 2);
        assert!(files[0].starts_with(dir.path().join("a=1")));
    }

    #[test]
    fn test_read_rejects_wrong_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(PART_FILE);
        write_type(&path, &tables::by_type(&curated(), Utc::now())).unwrap();

        assert!(matches!(read_curated(&path), Err(PipelineError::Parquet(_))));
    }
}

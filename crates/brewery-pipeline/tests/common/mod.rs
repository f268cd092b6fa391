//! Shared fixtures for pipeline integration tests

#![allow(dead_code)]

use brewery_pipeline::config::{ApiConfig, PipelineConfig};
use serde_json::{json, Value};
use std::path::Path;
use wiremock::{
    matchers::{method, path, query_param},
    Mock, MockServer, ResponseTemplate,
};

pub const ENDPOINT: &str = "/v1/breweries";

/// Three breweries: one complete, one without contact details, one without coordinates
pub fn sample_breweries() -> Value {
    json!([
        {
            "id": "5128df48-79fc-4f0f-8b52-d06be54d0cec",
            "name": "Test Brewery 1",
            "brewery_type": "micro",
            "address_1": "123 Main St",
            "city": "San Francisco",
            "state_province": "California",
            "postal_code": "94102",
            "country": "United States",
            "longitude": "-122.419906",
            "latitude": "37.774929",
            "phone": "4155551234",
            "website_url": "http://testbrewery1.com",
            "state": "California",
            "street": "123 Main St"
        },
        {
            "id": "9c5a66c8-cc13-416f-a5d9-0a769c87d318",
            "name": "Test Brewery 2",
            "brewery_type": "regional",
            "address_1": "456 Oak Ave",
            "city": "Portland",
            "state_province": "Oregon",
            "postal_code": "97201",
            "country": "United States",
            "longitude": "-122.676207",
            "latitude": "45.520247",
            "phone": "",
            "website_url": "",
            "state": "Oregon",
            "street": "456 Oak Ave"
        },
        {
            "id": "34e8c68b-6146-453f-a4b9-1f6cd99a5ada",
            "name": "Test Brewery 3",
            "brewery_type": "micro",
            "address_1": null,
            "city": "Denver",
            "state_province": "Colorado",
            "postal_code": "80202",
            "country": "United States",
            "longitude": null,
            "latitude": null,
            "phone": "3035551234",
            "website_url": "http://testbrewery3.com",
            "state": "Colorado",
            "street": null
        }
    ])
}

/// Serve `body` as page 1; any later page is empty
pub async fn mount_single_page(server: &MockServer, body: Value) {
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .with_priority(1)
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(ENDPOINT))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

/// Lake rooted at `root`, API pointed at the mock server
pub fn test_config(root: &Path, server: &MockServer) -> PipelineConfig {
    let mut config = PipelineConfig::with_lake_root(root);
    config.api = ApiConfig {
        base_url: format!("{}{}", server.uri(), ENDPOINT),
        per_page: 50,
        timeout_secs: 5,
        max_retries: 2,
        retry_delay_ms: 1,
        page_delay_ms: 0,
    };
    config
}

pub fn files_with_extension(dir: &Path, extension: &str) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .map(|entries| {
            entries
                .flatten()
                .map(|e| e.file_name().to_string_lossy().into_owned())
                .filter(|name| name.ends_with(extension))
                .collect()
        })
        .unwrap_or_default();
    names.sort();
    names
}

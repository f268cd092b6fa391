//! Open Brewery DB HTTP client

use brewery_common::{PipelineError, Result};
use reqwest::{Client, Method, StatusCode};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, info, warn};

use super::retry::RetryPolicy;
use crate::config::ApiConfig;

const USER_AGENT: &str = concat!("brewery-pipeline/", env!("CARGO_PKG_VERSION"));

/// Paginating client for the breweries endpoint
///
/// Records are kept as raw JSON values so the bronze layer stores exactly what
/// the API returned.
pub struct BreweryApiClient {
    client: Client,
    base_url: String,
    per_page: u32,
    page_delay: Duration,
    retry: RetryPolicy,
}

impl BreweryApiClient {
    pub fn new(config: &ApiConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(config.timeout())
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| PipelineError::Transport(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.clone(),
            per_page: config.per_page,
            page_delay: config.page_delay(),
            retry: config.retry_policy(),
        })
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Fetch one page, retrying transient failures per the retry policy
    pub async fn fetch_page(&self, page: u32, per_page: u32) -> Result<Vec<Value>> {
        let method = Method::GET;
        let mut attempt = 1;

        loop {
            debug!(page, per_page, attempt, "Fetching breweries page");

            let outcome = self
                .client
                .request(method.clone(), &self.base_url)
                .query(&[("page", page), ("per_page", per_page)])
                .send()
                .await;

            match outcome {
                Ok(response) if response.status().is_success() => {
                    let records = parse_page(response, page).await?;
                    info!("Fetched {} breweries from page {}", records.len(), page);
                    return Ok(records);
                },
                Ok(response) => {
                    let status = response.status();
                    if !self.retry.should_retry_status(&method, status, attempt) {
                        return Err(status_error(page, status, attempt));
                    }
                    self.wait_before_retry(page, attempt, &status.to_string()).await;
                },
                Err(e) => {
                    if !self.retry.should_retry_error(&method, &e, attempt) {
                        return Err(PipelineError::Transport(format!(
                            "request for page {} failed after {} attempt(s): {}",
                            page, attempt, e
                        )));
                    }
                    self.wait_before_retry(page, attempt, &e.to_string()).await;
                },
            }

            attempt += 1;
        }
    }

    /// Walk pages from 1 until an empty or short page
    pub async fn fetch_all(&self) -> Result<Vec<Value>> {
        let mut all = Vec::new();
        let mut page = 1;

        info!(per_page = self.per_page, "Starting to fetch all breweries");

        loop {
            let records = self.fetch_page(page, self.per_page).await?;
            let fetched = records.len();

            if fetched == 0 {
                info!("No more data at page {}", page);
                break;
            }

            all.extend(records);
            debug!(page, fetched, total = all.len(), "Accumulated page");

            if fetched < self.per_page as usize {
                info!("Reached last page (partial page of {} received)", fetched);
                break;
            }

            page += 1;
            tokio::time::sleep(self.page_delay).await;
        }

        info!("Completed fetching all breweries. Total: {}", all.len());
        Ok(all)
    }

    async fn wait_before_retry(&self, page: u32, attempt: u32, reason: &str) {
        let delay = self.retry.backoff(attempt);
        warn!(
            "Page {} attempt {}/{} failed ({}), retrying in {:?}",
            page,
            attempt,
            self.retry.max_attempts(),
            reason,
            delay
        );
        tokio::time::sleep(delay).await;
    }
}

async fn parse_page(response: reqwest::Response, page: u32) -> Result<Vec<Value>> {
    let body: Value = response.json().await.map_err(|e| {
        PipelineError::Transport(format!("page {} returned an unreadable body: {}", page, e))
    })?;

    match body {
        Value::Array(records) => Ok(records),
        other => Err(PipelineError::Transport(format!(
            "page {} returned a JSON {} instead of an array",
            page,
            json_kind(&other)
        ))),
    }
}

fn status_error(page: u32, status: StatusCode, attempts: u32) -> PipelineError {
    PipelineError::Transport(format!(
        "page {} returned {} after {} attempt(s)",
        page, status, attempts
    ))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

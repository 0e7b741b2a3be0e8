//! API extractor

use super::types::ExtractionTask;
use crate::auth::AuthConfig;
use crate::config::ApiConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RateLimiterConfig, RequestConfig};
use crate::stats::RunStats;
use crate::types::{JsonValue, Record};
use crate::warehouse::Loader;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{error, info, info_span, warn, Instrument};

/// Upper bound for a single backoff wait
const MAX_BACKOFF: Duration = Duration::from_secs(300);

/// Extracts API endpoints into the warehouse
#[derive(Debug)]
pub struct ApiExtractor {
    client: HttpClient,
    loader: Loader,
    max_attempts: u32,
}

impl ApiExtractor {
    /// Create an extractor
    ///
    /// Fails with [`Error::Auth`] when the username or password is empty.
    pub fn new(config: &ApiConfig, loader: Loader) -> Result<Self> {
        if config.username.trim().is_empty() || config.password.is_empty() {
            return Err(Error::auth("API username and password must be set"));
        }

        let mut http = HttpClientConfig::builder()
            .base_url(config.base_url.clone())
            .timeout(Duration::from_secs(config.timeout_seconds))
            .max_attempts(config.max_attempts)
            .backoff(Duration::from_millis(config.backoff_unit_ms), MAX_BACKOFF)
            .retry_client_errors(true);
        if let Some(rate_limit) = &config.rate_limit {
            http = http.rate_limit(RateLimiterConfig::from(rate_limit));
        }

        let client = HttpClient::with_auth(
            http.build(),
            AuthConfig::basic(config.username.clone(), config.password.clone()),
        )?;

        Ok(Self {
            client,
            loader,
            max_attempts: config.max_attempts,
        })
    }

    /// The loader records go through
    pub fn loader(&self) -> &Loader {
        &self.loader
    }

    /// Fetch one endpoint
    ///
    /// An array answer is returned as-is, a single object as a one-element
    /// list. When every attempt fails the result is empty.
    pub async fn fetch(
        &self,
        endpoint: &str,
        params: &BTreeMap<String, JsonValue>,
        max_attempts: u32,
    ) -> Vec<Record> {
        let request = RequestConfig::new()
            .query_values(params)
            .attempts(max_attempts);

        match self.client.get_json::<JsonValue>(endpoint, request).await {
            Ok(JsonValue::Array(items)) => items,
            Ok(JsonValue::Null) => Vec::new(),
            Ok(other) => vec![other],
            Err(e) => {
                error!(endpoint, error = %e, "Fetch failed");
                Vec::new()
            }
        }
    }

    /// Run every task in order
    ///
    /// Only dataset provisioning can fail the whole run.
    pub async fn run(&self, tasks: &[ExtractionTask]) -> Result<RunStats> {
        self.loader.ensure_dataset().await?;

        let mut stats = RunStats::start();
        info!(tasks = tasks.len(), dataset = self.loader.dataset(), "Starting API extraction");

        for (index, task) in tasks.iter().enumerate() {
            let span = info_span!("task", index = index + 1, endpoint = %task.endpoint, table = %task.table);
            match self.run_task(task).instrument(span).await {
                Some(records) => stats.record_success(records),
                None => stats.record_failure(),
            }
        }

        stats.finish();
        info!(
            success = stats.success,
            failed = stats.failed,
            records = stats.total_records,
            duration_ms = stats.duration_ms,
            "API extraction finished"
        );
        Ok(stats)
    }

    /// Fetch and load one task, returning the record count on success
    async fn run_task(&self, task: &ExtractionTask) -> Option<usize> {
        let records = self
            .fetch(&task.endpoint, &task.params, self.max_attempts)
            .await;

        if records.is_empty() {
            warn!("No data fetched");
            return None;
        }

        let count = records.len();
        if self.loader.load(&records, &task.table, task.write_mode).await {
            info!(records = count, "Task loaded");
            Some(count)
        } else {
            None
        }
    }
}

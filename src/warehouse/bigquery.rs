//! BigQuery warehouse over the REST API (v2)
//!
//! Loads are multipart uploads of newline-delimited JSON with schema
//! auto-detection. The job is polled until it reaches `DONE`.

use super::types::{LoadOutcome, Warehouse};
use crate::auth::{AuthConfig, ServiceAccountKey};
use crate::config::WarehouseConfig;
use crate::error::{Error, Result};
use crate::http::{HttpClient, HttpClientConfig, RequestConfig};
use crate::types::{JsonObject, JsonValue, WriteMode};
use async_trait::async_trait;
use bytes::{BufMut, BytesMut};
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;
use std::time::{Duration, Instant};
use tracing::debug;

const DEFAULT_ENDPOINT: &str = "https://bigquery.googleapis.com";
const BOUNDARY: &str = "daily_extract_load_boundary";
const UPLOAD_TIMEOUT_SECS: u64 = 300;

/// BigQuery REST warehouse
#[derive(Debug)]
pub struct BigQueryWarehouse {
    client: HttpClient,
    project_id: String,
    endpoint: String,
    poll_interval: Duration,
    job_timeout: Duration,
}

impl BigQueryWarehouse {
    /// Build the warehouse from configuration
    ///
    /// Credentials are taken, in order, from `access_token`,
    /// `credentials_path` and `GOOGLE_APPLICATION_CREDENTIALS`.
    pub fn from_config(config: &WarehouseConfig) -> Result<Self> {
        let auth = resolve_auth(config)?;
        let http = HttpClientConfig::builder()
            .timeout(Duration::from_secs(UPLOAD_TIMEOUT_SECS))
            .build();
        let client = HttpClient::with_auth(http, auth)?;

        Ok(Self {
            client,
            project_id: config.project_id.clone(),
            endpoint: config
                .endpoint
                .clone()
                .unwrap_or_else(|| DEFAULT_ENDPOINT.to_string())
                .trim_end_matches('/')
                .to_string(),
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            job_timeout: Duration::from_secs(config.job_timeout_seconds),
        })
    }

    fn api_url(&self, path: &str) -> String {
        format!(
            "{}/bigquery/v2/projects/{}/{path}",
            self.endpoint, self.project_id
        )
    }

    fn upload_url(&self) -> String {
        format!(
            "{}/upload/bigquery/v2/projects/{}/jobs?uploadType=multipart",
            self.endpoint, self.project_id
        )
    }

    async fn wait_for_job(&self, table: &str, mut job: Job) -> Result<Job> {
        let started = Instant::now();

        while !job.is_done() {
            if started.elapsed() > self.job_timeout {
                return Err(Error::load(
                    table,
                    format!(
                        "job {} not done after {}s",
                        job.job_reference.job_id,
                        self.job_timeout.as_secs()
                    ),
                ));
            }
            tokio::time::sleep(self.poll_interval).await;

            let mut request = RequestConfig::new();
            if let Some(location) = &job.job_reference.location {
                request = request.query("location", location.clone());
            }
            let url = self.api_url(&format!("jobs/{}", job.job_reference.job_id));
            job = self.client.get_json(&url, request).await?;
            debug!(job_id = %job.job_reference.job_id, state = %job.status.state, "Polled load job");
        }

        Ok(job)
    }
}

#[async_trait]
impl Warehouse for BigQueryWarehouse {
    fn name(&self) -> &'static str {
        "bigquery"
    }

    async fn dataset_exists(&self, dataset: &str) -> Result<bool> {
        let url = self.api_url(&format!("datasets/{dataset}"));
        match self
            .client
            .request(Method::GET, &url, RequestConfig::new().attempts(1))
            .await
        {
            Ok(_) => Ok(true),
            Err(Error::HttpStatus { status: 404, .. }) => Ok(false),
            Err(e) => Err(e),
        }
    }

    async fn create_dataset(&self, dataset: &str, location: &str) -> Result<()> {
        let body = json!({
            "datasetReference": {
                "projectId": self.project_id,
                "datasetId": dataset,
            },
            "location": location,
        });

        match self
            .client
            .request(Method::POST, &self.api_url("datasets"), RequestConfig::new().json(body))
            .await
        {
            Ok(_) | Err(Error::HttpStatus { status: 409, .. }) => Ok(()),
            Err(e) => Err(e),
        }
    }

    async fn load_json(
        &self,
        dataset: &str,
        table: &str,
        rows: &[JsonObject],
        mode: WriteMode,
    ) -> Result<LoadOutcome> {
        let metadata = json!({
            "configuration": {
                "load": {
                    "destinationTable": {
                        "projectId": self.project_id,
                        "datasetId": dataset,
                        "tableId": table,
                    },
                    "sourceFormat": "NEWLINE_DELIMITED_JSON",
                    "autodetect": true,
                    "writeDisposition": mode.disposition(),
                }
            }
        });

        let body = multipart_body(&metadata, rows)?;
        let request = RequestConfig::new()
            .raw(format!("multipart/related; boundary={BOUNDARY}"), body)
            .attempts(1);

        let job: Job = self.client.post_json(&self.upload_url(), request).await?;
        debug!(job_id = %job.job_reference.job_id, table, "Load job submitted");

        let job = self.wait_for_job(table, job).await?;
        if let Some(message) = job.error_message() {
            return Err(Error::load(table, message));
        }

        Ok(LoadOutcome {
            rows: job.output_rows().unwrap_or(rows.len()),
            reference: job.job_reference.job_id,
        })
    }
}

fn resolve_auth(config: &WarehouseConfig) -> Result<AuthConfig> {
    if let Some(token) = &config.access_token {
        return Ok(AuthConfig::Bearer {
            token: token.clone(),
        });
    }

    let path = config.credentials_path.clone().or_else(|| {
        std::env::var_os("GOOGLE_APPLICATION_CREDENTIALS").map(std::path::PathBuf::from)
    });

    match path {
        Some(path) => Ok(AuthConfig::service_account(ServiceAccountKey::from_file(
            path,
        )?)),
        None => Err(Error::auth(
            "No BigQuery credentials: set warehouse.access_token, warehouse.credentials_path \
             or GOOGLE_APPLICATION_CREDENTIALS",
        )),
    }
}

/// Encode the `multipart/related` upload: job metadata, then NDJSON rows
fn multipart_body(metadata: &JsonValue, rows: &[JsonObject]) -> Result<bytes::Bytes> {
    let mut buf = BytesMut::new();

    buf.put_slice(format!("--{BOUNDARY}\r\n").as_bytes());
    buf.put_slice(b"Content-Type: application/json; charset=UTF-8\r\n\r\n");
    buf.put_slice(serde_json::to_string(metadata)?.as_bytes());
    buf.put_slice(format!("\r\n--{BOUNDARY}\r\n").as_bytes());
    buf.put_slice(b"Content-Type: application/octet-stream\r\n\r\n");
    for row in rows {
        buf.put_slice(serde_json::to_string(row)?.as_bytes());
        buf.put_u8(b'\n');
    }
    buf.put_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());

    Ok(buf.freeze())
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Job {
    job_reference: JobReference,
    #[serde(default)]
    status: JobStatus,
    #[serde(default)]
    statistics: Option<JobStatistics>,
}

impl Job {
    fn is_done(&self) -> bool {
        self.status.state == "DONE"
    }

    fn error_message(&self) -> Option<String> {
        let result = self.status.error_result.as_ref()?;
        let details: Vec<&str> = self
            .status
            .errors
            .iter()
            .map(|e| e.message.as_str())
            .filter(|m| *m != result.message)
            .collect();

        if details.is_empty() {
            Some(result.message.clone())
        } else {
            Some(format!("{} ({})", result.message, details.join("; ")))
        }
    }

    fn output_rows(&self) -> Option<usize> {
        self.statistics
            .as_ref()?
            .load
            .as_ref()?
            .output_rows
            .as_deref()?
            .parse()
            .ok()
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobReference {
    job_id: String,
    #[serde(default)]
    location: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct JobStatus {
    #[serde(default)]
    state: String,
    #[serde(default)]
    error_result: Option<ErrorProto>,
    #[serde(default)]
    errors: Vec<ErrorProto>,
}

#[derive(Debug, Deserialize)]
struct ErrorProto {
    #[serde(default)]
    message: String,
}

#[derive(Debug, Deserialize)]
struct JobStatistics {
    #[serde(default)]
    load: Option<LoadStatistics>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoadStatistics {
    #[serde(default)]
    output_rows: Option<String>,
}

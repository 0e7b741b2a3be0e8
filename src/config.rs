//! Pipeline configuration
//!
//! The whole pipeline is described by one YAML file. String values may pull
//! secrets from the environment with `{{ env.NAME }}`; the file is rendered
//! before it is deserialized into [`PipelineConfig`].

use crate::error::{Error, Result};
use crate::partition::{parse_date, PartitionSpec};
use crate::template::{self, TemplateContext};
use crate::types::{JsonValue, WriteMode};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

// ============================================================================
// Top-Level Config
// ============================================================================

/// Complete pipeline configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Destination warehouse
    pub warehouse: WarehouseConfig,

    /// REST API source (skipped when absent)
    #[serde(default)]
    pub api: Option<ApiConfig>,

    /// MySQL-over-SSH source (skipped when absent)
    #[serde(default)]
    pub database: Option<DatabaseConfig>,

    /// Logging output
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl PipelineConfig {
    /// Load configuration from a YAML file, rendering `{{ env.* }}` templates
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                Error::FileNotFound {
                    path: path.display().to_string(),
                }
            } else {
                Error::Io(e)
            }
        })?;
        Self::from_yaml_str(&content, &TemplateContext::from_env())
    }

    /// Parse configuration from a YAML string with an explicit template context
    pub fn from_yaml_str(yaml: &str, ctx: &TemplateContext) -> Result<Self> {
        let raw: serde_yaml::Value = serde_yaml::from_str(yaml)?;
        let rendered = template::render_yaml(&raw, ctx)?;
        let config: PipelineConfig = serde_yaml::from_value(rendered)?;
        Ok(config)
    }

    /// Check required fields and value formats
    pub fn validate(&self) -> Result<()> {
        self.warehouse.validate()?;

        if let Some(api) = &self.api {
            api.validate()?;
        }
        if let Some(database) = &self.database {
            database.validate()?;
        }
        if self.api.is_none() && self.database.is_none() {
            return Err(Error::config(
                "At least one of 'api' or 'database' must be configured",
            ));
        }

        Ok(())
    }
}

fn require(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        Err(Error::missing_field(field))
    } else {
        Ok(())
    }
}

// ============================================================================
// Warehouse
// ============================================================================

/// Which warehouse backend receives the loads
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarehouseKind {
    /// Google BigQuery over its REST API
    #[default]
    Bigquery,
    /// Local Parquet files (dry runs and tests)
    Parquet,
}

/// Destination warehouse configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WarehouseConfig {
    /// Backend kind
    #[serde(default)]
    pub kind: WarehouseKind,

    /// Project that owns the datasets
    pub project_id: String,

    /// Location used when a dataset has to be created
    #[serde(default = "default_location")]
    pub location: String,

    /// Service account key file (falls back to GOOGLE_APPLICATION_CREDENTIALS)
    #[serde(default)]
    pub credentials_path: Option<PathBuf>,

    /// Pre-issued OAuth2 access token, used when no key file is available
    #[serde(default)]
    pub access_token: Option<String>,

    /// Override of the BigQuery API root (tests, emulators)
    #[serde(default)]
    pub endpoint: Option<String>,

    /// Root directory for the Parquet backend
    #[serde(default)]
    pub output_dir: Option<PathBuf>,

    /// Where backup artifacts of failed loads are written
    #[serde(default = "default_backup_dir")]
    pub backup_dir: PathBuf,

    /// Interval between load job status polls
    #[serde(default = "default_poll_interval_ms")]
    pub poll_interval_ms: u64,

    /// Give up waiting on a load job after this many seconds
    #[serde(default = "default_job_timeout")]
    pub job_timeout_seconds: u64,
}

fn default_location() -> String {
    "EU".to_string()
}

fn default_backup_dir() -> PathBuf {
    PathBuf::from(".")
}

fn default_poll_interval_ms() -> u64 {
    1000
}

fn default_job_timeout() -> u64 {
    600
}

impl WarehouseConfig {
    fn validate(&self) -> Result<()> {
        require("warehouse.project_id", &self.project_id)?;
        if self.kind == WarehouseKind::Parquet && self.output_dir.is_none() {
            return Err(Error::missing_field("warehouse.output_dir"));
        }
        Ok(())
    }
}

// ============================================================================
// API Source
// ============================================================================

/// REST API source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Base URL, endpoints are appended to it
    pub base_url: String,

    /// Basic auth user
    pub username: String,

    /// Basic auth password
    pub password: String,

    /// Destination dataset for every API table
    pub dataset: String,

    /// Per-request timeout
    #[serde(default = "default_timeout")]
    pub timeout_seconds: u64,

    /// Total attempts per request, first one included
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Backoff unit; attempt `i` waits `unit * 2^i` before the next one
    #[serde(default = "default_backoff_unit_ms")]
    pub backoff_unit_ms: u64,

    /// Optional client-side rate limit
    #[serde(default)]
    pub rate_limit: Option<RateLimitConfig>,

    /// Overall date range split into monthly periods
    #[serde(default)]
    pub periods: Option<PeriodRange>,

    /// Logical partitions (e.g. one per legal entity)
    #[serde(default)]
    pub partitions: Vec<PartitionConfig>,

    /// Endpoints to extract
    #[serde(default)]
    pub streams: Vec<StreamConfig>,
}

fn default_timeout() -> u64 {
    30
}

fn default_max_attempts() -> u32 {
    3
}

fn default_backoff_unit_ms() -> u64 {
    1000
}

impl ApiConfig {
    fn validate(&self) -> Result<()> {
        require("api.base_url", &self.base_url)?;
        url::Url::parse(&self.base_url)
            .map_err(|e| Error::invalid_value("api.base_url", e.to_string()))?;
        require("api.username", &self.username)?;
        require("api.password", &self.password)?;
        require("api.dataset", &self.dataset)?;

        if self.max_attempts == 0 {
            return Err(Error::invalid_value("api.max_attempts", "must be at least 1"));
        }

        if let Some(range) = &self.periods {
            parse_date(&range.start)?;
            parse_date(&range.end)?;
        }

        for partition in &self.partitions {
            PartitionSpec::try_from(partition)?;
        }

        for stream in &self.streams {
            require("api.streams[].endpoint", &stream.endpoint)?;
            require("api.streams[].table", &stream.table)?;
            if stream.monthly && self.periods.is_none() {
                return Err(Error::invalid_value(
                    "api.periods",
                    format!("stream '{}' is monthly but no period range is set", stream.endpoint),
                ));
            }
            if let Some(ids) = &stream.partitions {
                for id in ids {
                    if !self.partitions.iter().any(|p| &p.id == id) {
                        return Err(Error::invalid_value(
                            "api.streams[].partitions",
                            format!("unknown partition {id}"),
                        ));
                    }
                }
            }
        }

        Ok(())
    }
}

/// Token bucket settings for the API client
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per second
    pub requests_per_second: u32,
    /// Burst size
    #[serde(default = "default_burst")]
    pub burst: u32,
}

fn default_burst() -> u32 {
    1
}

/// Overall extraction window, both bounds inclusive (`YYYY-MM-DD`)
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PeriodRange {
    /// First day
    pub start: String,
    /// Last day
    pub end: String,
}

/// A logical source subdivision and its request formatting policy
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PartitionConfig {
    /// Identifier value sent to the API
    pub id: JsonValue,

    /// Query parameter carrying the identifier
    #[serde(default = "default_partition_param")]
    pub param: String,

    /// Query parameter for the period start
    #[serde(default = "default_start_param")]
    pub start_param: String,

    /// Query parameter for the period end
    #[serde(default = "default_end_param")]
    pub end_param: String,

    /// chrono format applied to this partition's period boundaries
    #[serde(default = "default_date_format")]
    pub date_format: String,
}

fn default_partition_param() -> String {
    "IDSociete".to_string()
}

fn default_start_param() -> String {
    "Debut".to_string()
}

fn default_end_param() -> String {
    "Fin".to_string()
}

/// Default request date format
pub fn default_date_format() -> String {
    "%Y-%m-%d".to_string()
}

/// One API endpoint to extract
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Path appended to the base URL
    pub endpoint: String,

    /// Destination table, may use `{{ partition.id }}`
    pub table: String,

    /// Fixed query parameters
    #[serde(default)]
    pub params: BTreeMap<String, JsonValue>,

    /// Expand into one task per partition and monthly period
    #[serde(default)]
    pub monthly: bool,

    /// Partition ids to expand over (all configured partitions when absent)
    #[serde(default)]
    pub partitions: Option<Vec<JsonValue>>,

    /// Write mode of the load job
    #[serde(default)]
    pub write_mode: WriteMode,
}

// ============================================================================
// Database Source
// ============================================================================

/// MySQL-over-SSH source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// SSH tunnel
    pub ssh: SshConfig,

    /// MySQL credentials
    pub mysql: MysqlConfig,

    /// Destination dataset for every table
    pub dataset: String,
}

impl DatabaseConfig {
    fn validate(&self) -> Result<()> {
        require("database.ssh.host", &self.ssh.host)?;
        require("database.ssh.user", &self.ssh.user)?;
        if self.ssh.private_key.is_none() && self.ssh.private_key_path.is_none() {
            return Err(Error::missing_field(
                "database.ssh.private_key or database.ssh.private_key_path",
            ));
        }
        require("database.mysql.user", &self.mysql.user)?;
        require("database.mysql.database", &self.mysql.database)?;
        require("database.dataset", &self.dataset)?;
        Ok(())
    }
}

/// SSH tunnel settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SshConfig {
    /// Bastion host
    pub host: String,

    /// Remote user
    pub user: String,

    /// SSH port on the bastion
    #[serde(default = "default_ssh_port")]
    pub port: u16,

    /// Private key contents (usually `{{ env.SSH_PRIVATE_KEY }}`)
    #[serde(default)]
    pub private_key: Option<String>,

    /// Private key file, read when `private_key` is absent
    #[serde(default)]
    pub private_key_path: Option<PathBuf>,

    /// Local end of the forwarding
    #[serde(default = "default_local_port")]
    pub local_port: u16,

    /// Database host as seen from the bastion
    #[serde(default = "default_remote_host")]
    pub remote_host: String,

    /// Database port as seen from the bastion
    #[serde(default = "default_remote_port")]
    pub remote_port: u16,

    /// Wait after spawning the tunnel before first use
    #[serde(default = "default_settle_seconds")]
    pub settle_seconds: u64,
}

fn default_ssh_port() -> u16 {
    22
}

fn default_local_port() -> u16 {
    13306
}

fn default_remote_host() -> String {
    "127.0.0.1".to_string()
}

fn default_remote_port() -> u16 {
    3306
}

fn default_settle_seconds() -> u64 {
    3
}

/// MySQL credentials
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MysqlConfig {
    /// User
    pub user: String,
    /// Password
    #[serde(default)]
    pub password: String,
    /// Database (schema) to extract
    pub database: String,
}

// ============================================================================
// Logging
// ============================================================================

/// Log line format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text
    #[default]
    Text,
    /// One JSON object per line
    Json,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Minimum level (overridden by RUST_LOG)
    #[serde(default = "default_level")]
    pub level: String,

    /// Line format
    #[serde(default)]
    pub format: LogFormat,

    /// Also write daily-rolling log files into this directory
    #[serde(default)]
    pub file_dir: Option<PathBuf>,

    /// File name prefix for rolling log files
    #[serde(default = "default_file_prefix")]
    pub file_prefix: String,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_file_prefix() -> String {
    "extraction".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            format: LogFormat::Text,
            file_dir: None,
            file_prefix: default_file_prefix(),
        }
    }
}

// Allow common clippy pedantic lints that aren't critical for this codebase
#![allow(clippy::cast_possible_truncation)]
#![allow(clippy::cast_sign_loss)]
#![allow(clippy::cast_lossless)]
#![allow(clippy::too_many_lines)]
#![allow(clippy::unused_self)]
#![allow(clippy::must_use_candidate)]
#![allow(clippy::items_after_statements)]
#![allow(clippy::unnecessary_wraps)]
#![allow(clippy::match_same_arms)]
#![allow(clippy::needless_pass_by_value)]
#![allow(clippy::unused_async)]

//! # daily-extract
//!
//! Daily extraction of two sources into a cloud warehouse:
//!
//! - a MySQL database reachable only through an SSH tunnel, copied table by
//!   table with `TRUNCATE`
//! - a REST API with basic auth, queried per endpoint and per monthly period
//!   of each partition, appended to partitioned tables
//!
//! Every load sanitizes field names, stamps `_extracted_at`, infers the schema
//! from the batch and leaves a JSON backup when it fails. Each source run
//! produces [`stats::RunStats`]; the exit code reports whether anything failed.
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use daily_extract::{config::PipelineConfig, pipeline::Orchestrator, Result};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() -> Result<()> {
//!     let config = PipelineConfig::from_file("daily_extract.yaml")?;
//!     config.validate()?;
//!
//!     let summary = Orchestrator::new(config).run().await;
//!     std::process::exit(summary.exit_code());
//! }
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                        Orchestrator                             │
//! │   build_tasks(api) → ApiExtractor::run → DatabaseExtractor::run │
//! └─────────────────────────────────────────────────────────────────┘
//!                                │
//! ┌───────────┬───────────┬──────┴──────┬─────────────┬────────────┐
//! │ Partition │   HTTP    │    Auth     │  Database   │ Warehouse  │
//! ├───────────┼───────────┼─────────────┼─────────────┼────────────┤
//! │ Periods   │ GET/POST  │ Basic       │ SSH tunnel  │ Sanitize   │
//! │ Monthly   │ Retry     │ Bearer      │ DuckDB      │ BigQuery   │
//! │ List      │ Rate Limit│ Service acct│ MySQL attach│ Parquet    │
//! │ DateFormat│ Backoff   │ JWT         │             │ Backup     │
//! └───────────┴───────────┴─────────────┴─────────────┴────────────┘
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]
#![allow(clippy::missing_errors_doc)]
#![allow(clippy::missing_panics_doc)]
#![allow(clippy::doc_markdown)]

// ============================================================================
// Module declarations
// ============================================================================

/// Error types for the pipeline
pub mod error;

/// Common types and type aliases
pub mod types;

/// Authentication implementations
pub mod auth;

/// HTTP client with retry and rate limiting
pub mod http;

/// Monthly periods and partition routing
pub mod partition;

/// Template interpolation
pub mod template;

/// Pipeline configuration
pub mod config;

/// Sanitizing loader and warehouse backends
pub mod warehouse;

/// Run statistics
pub mod stats;

/// REST API source
pub mod api;

/// MySQL source over an SSH tunnel
pub mod database;

/// Task plan and orchestrator
pub mod pipeline;

/// Subscriber setup for the binary
pub mod logging;

/// Command-line interface
pub mod cli;

// ============================================================================
// Re-exports
// ============================================================================

pub use error::{Error, Result};
pub use types::*;

/// Crate version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Crate name
pub const NAME: &str = env!("CARGO_PKG_NAME");

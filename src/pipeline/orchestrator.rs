//! Sequential two-source orchestrator

use super::plan::build_tasks;
use crate::api::ApiExtractor;
use crate::config::{ApiConfig, DatabaseConfig, PipelineConfig};
use crate::database::{DatabaseExtractor, MysqlConnectionInfo, MysqlSource, SshTunnel};
use crate::error::Result;
use crate::stats::{PipelineSummary, RunStats};
use crate::types::SourceKind;
use crate::warehouse::{build_warehouse, Loader, Warehouse};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::OnceCell;
use tracing::{error, info, info_span, warn, Instrument};

/// Runs the configured sources and aggregates their statistics
pub struct Orchestrator {
    config: PipelineConfig,
    only: Option<SourceKind>,
    warehouse: OnceCell<Arc<dyn Warehouse>>,
}

impl Orchestrator {
    /// Create an orchestrator over a validated configuration
    pub fn new(config: PipelineConfig) -> Self {
        Self {
            config,
            only: None,
            warehouse: OnceCell::new(),
        }
    }

    /// Restrict the run to one source
    #[must_use]
    pub fn only(mut self, source: Option<SourceKind>) -> Self {
        self.only = source;
        self
    }

    /// Use this warehouse instead of building one from the configuration
    #[must_use]
    pub fn with_warehouse(mut self, warehouse: Arc<dyn Warehouse>) -> Self {
        self.warehouse = OnceCell::from(warehouse);
        self
    }

    fn enabled(&self, source: SourceKind) -> bool {
        self.only.map_or(true, |only| only == source)
    }

    /// The warehouse shared by every source, built on first use
    pub(super) async fn warehouse(&self) -> Result<Arc<dyn Warehouse>> {
        self.warehouse
            .get_or_try_init(|| async { build_warehouse(&self.config.warehouse) })
            .await
            .cloned()
    }

    async fn loader(&self, dataset: &str) -> Result<Loader> {
        Ok(Loader::new(
            self.warehouse().await?,
            dataset,
            self.config.warehouse.location.clone(),
            self.config.warehouse.backup_dir.clone(),
        ))
    }

    /// Run the API source, then the database source
    ///
    /// A source that fails to start counts as one failure; the other source
    /// still runs.
    pub async fn run(&self) -> PipelineSummary {
        let started = Instant::now();
        let mut summary = PipelineSummary::default();

        if let Some(api) = self.config.api.as_ref().filter(|_| self.enabled(SourceKind::Api)) {
            let span = info_span!("source", kind = %SourceKind::Api, dataset = %api.dataset);
            summary.api = settle(SourceKind::Api, self.run_api(api).instrument(span).await);
        }

        if let Some(database) = self
            .config
            .database
            .as_ref()
            .filter(|_| self.enabled(SourceKind::Database))
        {
            let span =
                info_span!("source", kind = %SourceKind::Database, dataset = %database.dataset);
            summary.database = settle(
                SourceKind::Database,
                self.run_database(database).instrument(span).await,
            );
        }

        summary.elapsed_ms = started.elapsed().as_millis() as u64;

        info!(
            api_success = summary.api.success,
            api_failed = summary.api.failed,
            database_success = summary.database.success,
            database_failed = summary.database.failed,
            success = summary.total_success(),
            records = summary.total_records(),
            failures = summary.total_failures(),
            elapsed_ms = summary.elapsed_ms,
            "Pipeline finished"
        );
        if summary.total_failures() > 0 {
            warn!(failures = summary.total_failures(), "Pipeline finished with failures");
        }

        summary
    }

    async fn run_api(&self, api: &ApiConfig) -> Result<RunStats> {
        let tasks = build_tasks(api)?;
        let extractor = ApiExtractor::new(api, self.loader(&api.dataset).await?)?;
        extractor.run(&tasks).await
    }

    async fn run_database(&self, database: &DatabaseConfig) -> Result<RunStats> {
        let loader = self.loader(&database.dataset).await?;
        let source = MysqlSource::new(MysqlConnectionInfo::through_tunnel(
            &database.mysql,
            database.ssh.local_port,
        ));
        let tunnel = SshTunnel::new(database.ssh.clone());
        DatabaseExtractor::new(tunnel, source, loader).run().await
    }
}

/// Turn a source outcome into stats, logging setup failures
fn settle(source: SourceKind, outcome: Result<RunStats>) -> RunStats {
    match outcome {
        Ok(stats) => stats,
        Err(e) => {
            if e.is_setup_failure() {
                error!(source = %source, error = %e, "Source setup failed");
            } else {
                error!(source = %source, error = %e, "Source run aborted");
            }
            RunStats::failed_run()
        }
    }
}

impl std::fmt::Debug for Orchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Orchestrator")
            .field("only", &self.only)
            .field("api", &self.config.api.is_some())
            .field("database", &self.config.database.is_some())
            .finish_non_exhaustive()
    }
}

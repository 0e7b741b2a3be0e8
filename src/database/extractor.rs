//! Database extractor

use super::tunnel::Tunnel;
use crate::error::Result;
use crate::stats::RunStats;
use crate::types::{Record, WriteMode};
use crate::warehouse::Loader;
use tracing::{error, info, info_span, warn, Instrument};

/// Something that lists and reads whole tables
pub trait TableSource {
    /// Every table name, in a stable order
    fn list_tables(&self) -> Result<Vec<String>>;

    /// All rows of one table
    fn read_table(&self, table: &str) -> Result<Vec<Record>>;
}

/// Copies every table of a source into the warehouse with `TRUNCATE`
pub struct DatabaseExtractor<T, S> {
    tunnel: T,
    source: S,
    loader: Loader,
}

impl<T: Tunnel, S: TableSource> DatabaseExtractor<T, S> {
    /// Create an extractor
    pub fn new(tunnel: T, source: S, loader: Loader) -> Self {
        Self {
            tunnel,
            source,
            loader,
        }
    }

    /// Run the extraction
    ///
    /// The tunnel is closed exactly once, whether extraction succeeded,
    /// failed part-way or never got past opening the tunnel.
    pub async fn run(mut self) -> Result<RunStats> {
        let result = self.extract().await;
        self.tunnel.close();
        result
    }

    async fn extract(&mut self) -> Result<RunStats> {
        self.tunnel.open().await?;
        self.loader.ensure_dataset().await?;

        let tables = self.source.list_tables()?;
        info!(tables = tables.len(), dataset = self.loader.dataset(), "Starting database extraction");

        let mut stats = RunStats::start();
        for table in &tables {
            let span = info_span!("table", name = %table);
            match self.copy_table(table).instrument(span).await {
                Some(rows) => stats.record_success(rows),
                None => stats.record_failure(),
            }
        }

        stats.finish();
        info!(
            success = stats.success,
            failed = stats.failed,
            records = stats.total_records,
            duration_ms = stats.duration_ms,
            "Database extraction finished"
        );
        Ok(stats)
    }

    async fn copy_table(&self, table: &str) -> Option<usize> {
        let records = match self.source.read_table(table) {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Failed to read table");
                return None;
            }
        };
        if records.is_empty() {
            warn!("Table is empty");
            return None;
        }

        let count = records.len();
        if self.loader.load(&records, table, WriteMode::Truncate).await {
            info!(records = count, "Table loaded");
            Some(count)
        } else {
            None
        }
    }
}

/// Open the tunnel, list the source tables and tear the tunnel down
pub async fn list_tables<T: Tunnel, S: TableSource>(mut tunnel: T, source: &S) -> Result<Vec<String>> {
    let result = match tunnel.open().await {
        Ok(()) => source.list_tables(),
        Err(e) => Err(e),
    };
    tunnel.close();
    result
}

//! Batch loader with dataset provisioning and backups

use super::backup::write_backup;
use super::sanitize::prepare_row;
use super::types::Warehouse;
use crate::error::{Error, Result};
use crate::types::{JsonObject, Record, WriteMode};
use chrono::Local;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::OnceCell;
use tracing::{debug, error, info, warn};

/// Loads record batches into one dataset of a warehouse
pub struct Loader {
    warehouse: Arc<dyn Warehouse>,
    dataset: String,
    location: String,
    backup_dir: PathBuf,
    dataset_ready: OnceCell<()>,
}

impl Loader {
    /// Create a loader for `dataset`
    pub fn new(
        warehouse: Arc<dyn Warehouse>,
        dataset: impl Into<String>,
        location: impl Into<String>,
        backup_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            warehouse,
            dataset: dataset.into(),
            location: location.into(),
            backup_dir: backup_dir.into(),
            dataset_ready: OnceCell::new(),
        }
    }

    /// Destination dataset
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    /// Make sure the dataset exists, creating it if needed
    ///
    /// Runs at most once successfully per loader.
    pub async fn ensure_dataset(&self) -> Result<()> {
        self.dataset_ready
            .get_or_try_init(|| async {
                if self.warehouse.dataset_exists(&self.dataset).await? {
                    debug!(dataset = %self.dataset, "Dataset exists");
                } else {
                    self.warehouse
                        .create_dataset(&self.dataset, &self.location)
                        .await?;
                    info!(dataset = %self.dataset, location = %self.location, "Dataset created");
                }
                Ok::<(), Error>(())
            })
            .await
            .map(|_| ())
    }

    /// Load a batch into `table`
    ///
    /// Returns `false` for an empty batch (nothing is sent) and for a failed
    /// load, in which case the original batch is written to a backup file.
    pub async fn load(&self, records: &[Record], table: &str, mode: WriteMode) -> bool {
        if records.is_empty() {
            warn!(dataset = %self.dataset, table, "No records to load");
            return false;
        }

        let now = Local::now().naive_local();
        let rows: Vec<JsonObject> = records.iter().map(|r| prepare_row(r, now)).collect();

        match self
            .warehouse
            .load_json(&self.dataset, table, &rows, mode)
            .await
        {
            Ok(outcome) => {
                info!(
                    warehouse = self.warehouse.name(),
                    dataset = %self.dataset,
                    table,
                    mode = %mode,
                    rows = outcome.rows,
                    reference = %outcome.reference,
                    "Loaded batch"
                );
                true
            }
            Err(e) => {
                error!(dataset = %self.dataset, table, error = %e, "Load failed");
                match write_backup(&self.backup_dir, &self.dataset, table, records, now) {
                    Ok(path) => warn!(path = %path.display(), "Batch saved to backup"),
                    Err(backup_err) => {
                        error!(table, error = %backup_err, "Could not write backup");
                    }
                }
                false
            }
        }
    }
}

impl std::fmt::Debug for Loader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Loader")
            .field("warehouse", &self.warehouse.name())
            .field("dataset", &self.dataset)
            .field("location", &self.location)
            .field("backup_dir", &self.backup_dir)
            .finish_non_exhaustive()
    }
}

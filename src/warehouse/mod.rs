//! Warehouse module
//!
//! Everything between an extracted batch and the destination table.
//!
//! # Overview
//!
//! - [`sanitize`] rewrites field names the warehouse would reject
//! - [`Loader`] provisions the dataset, loads batches and writes backups of
//!   failed ones
//! - [`Warehouse`] is the backend seam: [`BigQueryWarehouse`] for production,
//!   [`ParquetWarehouse`] for local runs

mod backup;
mod bigquery;
mod columnar;
mod loader;
mod local;
mod sanitize;
mod types;

pub use backup::write_backup;
pub use bigquery::BigQueryWarehouse;
pub use columnar::{infer_schema, rows_to_batch};
pub use loader::Loader;
pub use local::ParquetWarehouse;
pub use sanitize::{prepare_row, sanitize, sanitize_key, sanitize_object, stamp, EXTRACTED_AT};
pub use types::{LoadOutcome, Warehouse};

use crate::config::{WarehouseConfig, WarehouseKind};
use crate::error::{Error, Result};
use std::sync::Arc;

/// Build the configured warehouse backend
pub fn build_warehouse(config: &WarehouseConfig) -> Result<Arc<dyn Warehouse>> {
    match config.kind {
        WarehouseKind::Bigquery => Ok(Arc::new(BigQueryWarehouse::from_config(config)?)),
        WarehouseKind::Parquet => {
            let root = config
                .output_dir
                .clone()
                .ok_or_else(|| Error::missing_field("warehouse.output_dir"))?;
            Ok(Arc::new(ParquetWarehouse::new(root)))
        }
    }
}

#[cfg(test)]
mod tests;

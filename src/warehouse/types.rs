//! Warehouse trait and shared types

use crate::error::Result;
use crate::types::{JsonObject, WriteMode};
use async_trait::async_trait;

/// Result of one successful load job
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadOutcome {
    /// Rows written to the destination
    pub rows: usize,
    /// Backend reference of the load (job id, file path)
    pub reference: String,
}

/// A destination that accepts batches of JSON rows
///
/// Implementations wait for the load to complete before returning.
#[async_trait]
pub trait Warehouse: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Whether the dataset exists
    async fn dataset_exists(&self, dataset: &str) -> Result<bool>;

    /// Create the dataset; an already existing dataset is not an error
    async fn create_dataset(&self, dataset: &str, location: &str) -> Result<()>;

    /// Load one batch of rows into `dataset.table`
    async fn load_json(
        &self,
        dataset: &str,
        table: &str,
        rows: &[JsonObject],
        mode: WriteMode,
    ) -> Result<LoadOutcome>;
}

//! Local Parquet warehouse
//!
//! Layout: `{root}/{dataset}/{table}/part-{timestamp}.parquet`. A load is
//! written to a staging file and renamed into place; a `TRUNCATE` load then
//! removes the table's previous part files. A failed write leaves the
//! existing parts untouched.

use super::columnar::rows_to_batch;
use super::types::{LoadOutcome, Warehouse};
use crate::error::Result;
use crate::types::{JsonObject, WriteMode};
use arrow::record_batch::RecordBatch;
use async_trait::async_trait;
use chrono::Utc;
use parquet::arrow::ArrowWriter;
use parquet::basic::Compression;
use parquet::file::properties::WriterProperties;
use std::fs::File;
use std::path::{Path, PathBuf};
use tracing::debug;

const STAGING_FILE: &str = "staging.parquet.partial";

/// Warehouse writing one Parquet file per load
#[derive(Debug, Clone)]
pub struct ParquetWarehouse {
    root: PathBuf,
}

impl ParquetWarehouse {
    /// Create a warehouse rooted at `root`
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Directory holding a table's part files
    pub fn table_dir(&self, dataset: &str, table: &str) -> PathBuf {
        self.root.join(dataset).join(table)
    }

    /// File a load is written to before it becomes a part
    pub fn staging_path(&self, dataset: &str, table: &str) -> PathBuf {
        self.table_dir(dataset, table).join(STAGING_FILE)
    }

    /// Part files of a table, sorted by name
    pub fn parts(&self, dataset: &str, table: &str) -> Result<Vec<PathBuf>> {
        let dir = self.table_dir(dataset, table);
        if !dir.is_dir() {
            return Ok(Vec::new());
        }

        let mut parts = Vec::new();
        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            if path.extension().is_some_and(|ext| ext == "parquet") {
                parts.push(path);
            }
        }
        parts.sort();
        Ok(parts)
    }
}

#[async_trait]
impl Warehouse for ParquetWarehouse {
    fn name(&self) -> &'static str {
        "parquet"
    }

    async fn dataset_exists(&self, dataset: &str) -> Result<bool> {
        Ok(self.root.join(dataset).is_dir())
    }

    async fn create_dataset(&self, dataset: &str, _location: &str) -> Result<()> {
        std::fs::create_dir_all(self.root.join(dataset))?;
        Ok(())
    }

    async fn load_json(
        &self,
        dataset: &str,
        table: &str,
        rows: &[JsonObject],
        mode: WriteMode,
    ) -> Result<LoadOutcome> {
        let batch = rows_to_batch(rows)?;

        let dir = self.table_dir(dataset, table);
        std::fs::create_dir_all(&dir)?;

        let staging = self.staging_path(dataset, table);
        if let Err(e) = write_part(&staging, &batch) {
            let _ = std::fs::remove_file(&staging);
            return Err(e);
        }

        let path = next_part_path(&dir);
        std::fs::rename(&staging, &path)?;

        if mode == WriteMode::Truncate {
            for part in self.parts(dataset, table)? {
                if part != path {
                    std::fs::remove_file(&part)?;
                    debug!(path = %part.display(), "Removed previous part");
                }
            }
        }

        Ok(LoadOutcome {
            rows: batch.num_rows(),
            reference: path.display().to_string(),
        })
    }
}

fn write_part(path: &Path, batch: &RecordBatch) -> Result<()> {
    let props = WriterProperties::builder()
        .set_compression(Compression::SNAPPY)
        .build();
    let mut writer = ArrowWriter::try_new(File::create(path)?, batch.schema(), Some(props))?;
    writer.write(batch)?;
    writer.close()?;
    Ok(())
}

fn next_part_path(dir: &Path) -> PathBuf {
    let stem = format!("part-{}", Utc::now().format("%Y%m%dT%H%M%S%6f"));
    let mut path = dir.join(format!("{stem}.parquet"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{stem}-{n}.parquet"));
        n += 1;
    }
    path
}

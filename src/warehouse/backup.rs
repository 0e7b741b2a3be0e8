//! Backup artifacts for failed loads

use crate::error::Result;
use crate::types::Record;
use chrono::NaiveDateTime;
use std::path::{Path, PathBuf};

/// Write the original batch as pretty JSON next to the other backups
///
/// The file is named `backup_{dataset}_{table}_{YYYYmmdd_HHMMSS}.json`; a
/// numeric suffix is added when that name is already used.
pub fn write_backup(
    dir: &Path,
    dataset: &str,
    table: &str,
    records: &[Record],
    at: NaiveDateTime,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;

    let stem = format!("backup_{dataset}_{table}_{}", at.format("%Y%m%d_%H%M%S"));
    let mut path = dir.join(format!("{stem}.json"));
    let mut n = 2;
    while path.exists() {
        path = dir.join(format!("{stem}_{n}.json"));
        n += 1;
    }

    let body = serde_json::to_string_pretty(records)?;
    std::fs::write(&path, body)?;
    Ok(path)
}

//! Common types used throughout the pipeline
//!
//! Shared type aliases and small enums used by more than one module.

use serde::{Deserialize, Serialize};
use std::fmt;

// ============================================================================
// Type Aliases
// ============================================================================

/// JSON value type (re-exported from serde_json)
pub type JsonValue = serde_json::Value;

/// JSON object type
pub type JsonObject = serde_json::Map<String, JsonValue>;

/// A single source record: field name to scalar, nested object or list
pub type Record = JsonValue;

// ============================================================================
// Write Mode
// ============================================================================

/// How a load job treats rows already in the destination table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum WriteMode {
    /// Add rows, keep existing ones
    #[default]
    Append,
    /// Replace the full table contents
    Truncate,
}

impl WriteMode {
    /// BigQuery `writeDisposition` value
    pub fn disposition(self) -> &'static str {
        match self {
            WriteMode::Append => "WRITE_APPEND",
            WriteMode::Truncate => "WRITE_TRUNCATE",
        }
    }
}

impl fmt::Display for WriteMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WriteMode::Append => write!(f, "APPEND"),
            WriteMode::Truncate => write!(f, "TRUNCATE"),
        }
    }
}

// ============================================================================
// Source Kind
// ============================================================================

/// The two sources a pipeline run knows about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum SourceKind {
    /// Paginated REST API
    Api,
    /// MySQL behind an SSH tunnel
    Database,
}

impl fmt::Display for SourceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceKind::Api => write!(f, "api"),
            SourceKind::Database => write!(f, "database"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_write_mode_serde() {
        let mode: WriteMode = serde_json::from_str("\"TRUNCATE\"").unwrap();
        assert_eq!(mode, WriteMode::Truncate);

        let json = serde_json::to_string(&WriteMode::Append).unwrap();
        assert_eq!(json, "\"APPEND\"");
    }

    #[test]
    fn test_write_mode_disposition() {
        assert_eq!(WriteMode::Append.disposition(), "WRITE_APPEND");
        assert_eq!(WriteMode::Truncate.disposition(), "WRITE_TRUNCATE");
        assert_eq!(WriteMode::default(), WriteMode::Append);
    }

    #[test]
    fn test_source_kind_display() {
        assert_eq!(SourceKind::Api.to_string(), "api");
        assert_eq!(SourceKind::Database.to_string(), "database");
    }
}

//! API task type

use crate::types::{JsonValue, WriteMode};
use serde::Serialize;
use std::collections::BTreeMap;

/// One request to make and where its records go
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExtractionTask {
    /// Path appended to the API base URL
    pub endpoint: String,
    /// Query parameters
    pub params: BTreeMap<String, JsonValue>,
    /// Destination table
    pub table: String,
    /// Write mode of the load
    pub write_mode: WriteMode,
}

impl ExtractionTask {
    /// Create a task with no parameters
    pub fn new(endpoint: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            params: BTreeMap::new(),
            table: table.into(),
            write_mode: WriteMode::Append,
        }
    }

    /// Add a query parameter
    #[must_use]
    pub fn with_param(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    /// Set the write mode
    #[must_use]
    pub fn with_write_mode(mut self, write_mode: WriteMode) -> Self {
        self.write_mode = write_mode;
        self
    }
}

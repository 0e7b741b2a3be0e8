//! Partition types and traits

use super::periods::Period;
use crate::config::PartitionConfig;
use crate::error::{Error, Result};
use crate::types::JsonValue;
use chrono::format::{Item, StrftimeItems};
use chrono::NaiveDate;
use std::collections::BTreeMap;

/// A single partition value: the query parameters of one request
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionValue {
    /// Identifier used in logs (e.g. "3:2025-01-01")
    pub id: String,
    /// Parameters to merge into the request
    pub values: BTreeMap<String, JsonValue>,
}

impl PartitionValue {
    /// Create a new partition value
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            values: BTreeMap::new(),
        }
    }

    /// Add a value to the partition
    #[must_use]
    pub fn with_value(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.values.insert(key.into(), value.into());
        self
    }

    /// Get a value by key
    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.values.get(key)
    }
}

/// Date rendering strategy attached to a partition
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DateFormat {
    pattern: String,
}

impl DateFormat {
    /// Build a strategy from a chrono strftime pattern
    pub fn new(pattern: impl Into<String>) -> Result<Self> {
        let pattern = pattern.into();
        if pattern.is_empty() || StrftimeItems::new(&pattern).any(|item| matches!(item, Item::Error)) {
            return Err(Error::invalid_value(
                "date_format",
                format!("'{pattern}' is not a valid date pattern"),
            ));
        }
        Ok(Self { pattern })
    }

    /// `YYYY-MM-DD`
    pub fn iso() -> Self {
        Self {
            pattern: "%Y-%m-%d".to_string(),
        }
    }

    /// Render a date
    pub fn format(&self, date: NaiveDate) -> String {
        date.format(&self.pattern).to_string()
    }

    /// The underlying pattern
    pub fn pattern(&self) -> &str {
        &self.pattern
    }
}

impl Default for DateFormat {
    fn default() -> Self {
        Self::iso()
    }
}

/// A logical source subdivision and how its requests are parameterised
#[derive(Debug, Clone, PartialEq)]
pub struct PartitionSpec {
    /// Identifier value sent to the API
    pub id: JsonValue,
    /// Parameter carrying the identifier
    pub param: String,
    /// Parameter carrying the period start
    pub start_param: String,
    /// Parameter carrying the period end
    pub end_param: String,
    /// How this partition renders period boundaries
    pub date_format: DateFormat,
}

impl PartitionSpec {
    /// Create a spec with the default parameter names and ISO dates
    pub fn new(id: impl Into<JsonValue>) -> Self {
        Self {
            id: id.into(),
            param: "IDSociete".to_string(),
            start_param: "Debut".to_string(),
            end_param: "Fin".to_string(),
            date_format: DateFormat::iso(),
        }
    }

    /// Override the date strategy
    #[must_use]
    pub fn with_date_format(mut self, date_format: DateFormat) -> Self {
        self.date_format = date_format;
        self
    }

    /// Override the period parameter names
    #[must_use]
    pub fn with_period_params(
        mut self,
        start_param: impl Into<String>,
        end_param: impl Into<String>,
    ) -> Self {
        self.start_param = start_param.into();
        self.end_param = end_param.into();
        self
    }

    /// Identifier as plain text (for logs and table names)
    pub fn id_string(&self) -> String {
        match &self.id {
            JsonValue::String(s) => s.clone(),
            other => other.to_string(),
        }
    }

    /// Parameters of one request covering `period`
    pub fn period_values(&self, period: &Period) -> PartitionValue {
        PartitionValue::new(format!("{}:{}", self.id_string(), period.start_date))
            .with_value(self.param.clone(), self.id.clone())
            .with_value(
                self.start_param.clone(),
                self.date_format.format(period.start_date),
            )
            .with_value(
                self.end_param.clone(),
                self.date_format.format(period.end_date),
            )
    }
}

impl TryFrom<&PartitionConfig> for PartitionSpec {
    type Error = Error;

    fn try_from(config: &PartitionConfig) -> Result<Self> {
        Ok(Self {
            id: config.id.clone(),
            param: config.param.clone(),
            start_param: config.start_param.clone(),
            end_param: config.end_param.clone(),
            date_format: DateFormat::new(config.date_format.clone())?,
        })
    }
}

/// Trait for partition routers
pub trait PartitionRouter {
    /// Generate partition values, in request order
    fn partitions(&self) -> Vec<PartitionValue>;
}

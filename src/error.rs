//! Error types for the extraction pipeline
//!
//! Every library API returns `Result<T, Error>`. Which variants are fatal and
//! which are converted into run statistics is decided by the extractors and
//! the orchestrator, not here.

use thiserror::Error;

/// The main error type for the pipeline
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    /// Configuration that cannot be used as written
    #[error("Configuration error: {message}")]
    Config {
        /// What is wrong
        message: String,
    },

    /// A required field is absent or empty
    #[error("Missing required config field: {field}")]
    MissingConfigField {
        /// Dotted path of the field
        field: String,
    },

    /// A field holds a value outside its accepted range or format
    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue {
        /// Dotted path of the field
        field: String,
        /// Why the value was rejected
        message: String,
    },

    /// A date that is not `YYYY-MM-DD`
    #[error("Invalid date '{value}': expected YYYY-MM-DD")]
    InvalidDateFormat {
        /// The rejected input
        value: String,
    },

    /// YAML that does not parse or does not match the config tree
    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    /// JSON that does not parse
    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    /// Missing credentials or a rejected token exchange
    #[error("Authentication failed: {message}")]
    Auth {
        /// What failed
        message: String,
    },

    /// The service-account assertion could not be signed
    #[error("JWT generation failed: {message}")]
    JwtGeneration {
        /// Signing failure
        message: String,
    },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    /// Transport failure reported by reqwest
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Non-2xx answer
    #[error("HTTP {status}: {body}")]
    HttpStatus {
        /// Status code
        status: u16,
        /// Response body, as text
        body: String,
    },

    /// No answer within the request timeout
    #[error("Request timeout after {timeout_ms}ms")]
    Timeout {
        /// Configured timeout
        timeout_ms: u64,
    },

    /// Every attempt failed
    #[error("Max attempts ({max_attempts}) exhausted")]
    MaxRetriesExceeded {
        /// Attempts made
        max_attempts: u32,
    },

    // ============================================================================
    // Source Errors
    // ============================================================================
    /// The SSH tunnel could not be opened
    #[error("SSH tunnel error: {message}")]
    Tunnel {
        /// What failed, with captured `ssh` stderr when there is any
        message: String,
    },

    /// DuckDB or MySQL failure
    #[error("Database error: {message}")]
    Database {
        /// What failed
        message: String,
    },

    // ============================================================================
    // Warehouse Errors
    // ============================================================================
    /// A batch was not loaded into its table
    #[error("Load into {table} failed: {message}")]
    Load {
        /// Destination table
        table: String,
        /// Why the load failed
        message: String,
    },

    /// Dataset lookup or creation failure
    #[error("Warehouse error: {message}")]
    Warehouse {
        /// What failed
        message: String,
    },

    /// Rows that do not convert to an Arrow batch
    #[error("Arrow error: {0}")]
    Arrow(#[from] arrow::error::ArrowError),

    /// Parquet write failure
    #[error("Parquet error: {0}")]
    Parquet(#[from] parquet::errors::ParquetError),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    /// Filesystem or process I/O failure
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A file that should exist does not
    #[error("File not found: {path}")]
    FileNotFound {
        /// Path as given
        path: String,
    },
}

impl Error {
    /// Create a config error
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Create a missing field error
    pub fn missing_field(field: impl Into<String>) -> Self {
        Self::MissingConfigField {
            field: field.into(),
        }
    }

    /// Create an invalid value error
    pub fn invalid_value(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self::InvalidConfigValue {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create an invalid date error
    pub fn invalid_date(value: impl Into<String>) -> Self {
        Self::InvalidDateFormat {
            value: value.into(),
        }
    }

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create an HTTP status error
    pub fn http_status(status: u16, body: impl Into<String>) -> Self {
        Self::HttpStatus {
            status,
            body: body.into(),
        }
    }

    /// Create a tunnel error
    pub fn tunnel(message: impl Into<String>) -> Self {
        Self::Tunnel {
            message: message.into(),
        }
    }

    /// Create a database error
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
        }
    }

    /// Create a load error for a destination table
    pub fn load(table: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Load {
            table: table.into(),
            message: message.into(),
        }
    }

    /// Create a warehouse error
    pub fn warehouse(message: impl Into<String>) -> Self {
        Self::Warehouse {
            message: message.into(),
        }
    }

    /// Check if this error is worth another attempt
    ///
    /// The fetcher retries every transport failure and every non-2xx status.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::Http(_) | Error::HttpStatus { .. } | Error::Timeout { .. } | Error::JsonParse(_)
        )
    }

    /// Whether this error aborts a whole source run rather than a single task
    pub fn is_setup_failure(&self) -> bool {
        matches!(
            self,
            Error::Tunnel { .. }
                | Error::Auth { .. }
                | Error::Config { .. }
                | Error::MissingConfigField { .. }
                | Error::InvalidConfigValue { .. }
        )
    }
}

/// Result type alias for the pipeline
pub type Result<T> = std::result::Result<T, Error>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("api.base_url");
        assert_eq!(
            err.to_string(),
            "Missing required config field: api.base_url"
        );

        let err = Error::invalid_date("2024-31-01");
        assert_eq!(
            err.to_string(),
            "Invalid date '2024-31-01': expected YYYY-MM-DD"
        );

        let err = Error::load("Presence_Soc_2", "quota exceeded");
        assert_eq!(
            err.to_string(),
            "Load into Presence_Soc_2 failed: quota exceeded"
        );
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::Timeout { timeout_ms: 30_000 }.is_retryable());
        assert!(Error::http_status(500, "").is_retryable());
        assert!(Error::http_status(404, "").is_retryable());

        assert!(!Error::config("test").is_retryable());
        assert!(!Error::tunnel("refused").is_retryable());
        assert!(!Error::load("t", "bad").is_retryable());
    }

    #[test]
    fn test_is_setup_failure() {
        assert!(Error::tunnel("exit 255").is_setup_failure());
        assert!(Error::auth("empty password").is_setup_failure());
        assert!(!Error::database("table gone").is_setup_failure());
        assert!(!Error::http_status(503, "").is_setup_failure());
    }
}

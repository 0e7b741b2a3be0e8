//! Auth configuration types

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use std::path::Path;

/// OAuth2 scope granting BigQuery read/write
pub const BIGQUERY_SCOPE: &str = "https://www.googleapis.com/auth/bigquery";

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

/// The fields of a Google service account key file that signing needs
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceAccountKey {
    /// Service account identity (`iss` claim)
    pub client_email: String,
    /// PEM-encoded RSA private key
    pub private_key: String,
    /// Key id, sent as the JWT `kid` header when present
    #[serde(default)]
    pub private_key_id: Option<String>,
    /// Token exchange endpoint (`aud` claim)
    #[serde(default = "default_token_uri")]
    pub token_uri: String,
}

impl ServiceAccountKey {
    /// Parse a key from its JSON text
    pub fn from_json(json: &str) -> Result<Self> {
        serde_json::from_str(json).map_err(|e| Error::auth(format!("Invalid service account key: {e}")))
    }

    /// Read and parse a key file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            Error::auth(format!(
                "Cannot read service account key {}: {e}",
                path.display()
            ))
        })?;
        Self::from_json(&content)
    }
}

/// Authentication configuration
#[derive(Debug, Clone, Default)]
pub enum AuthConfig {
    /// No authentication required
    #[default]
    None,

    /// HTTP Basic authentication
    Basic {
        /// Username
        username: String,
        /// Password
        password: String,
    },

    /// Static bearer token
    Bearer {
        /// The bearer token
        token: String,
    },

    /// Service account: a signed JWT exchanged for an access token
    ServiceAccount {
        /// Parsed key file
        key: ServiceAccountKey,
        /// Requested OAuth2 scope
        scope: String,
        /// Lifetime of the signed assertion
        token_lifetime_seconds: u64,
    },
}

impl AuthConfig {
    /// Basic auth from credentials
    pub fn basic(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self::Basic {
            username: username.into(),
            password: password.into(),
        }
    }

    /// Service account auth with the BigQuery scope
    pub fn service_account(key: ServiceAccountKey) -> Self {
        Self::ServiceAccount {
            key,
            scope: BIGQUERY_SCOPE.to_string(),
            token_lifetime_seconds: 3600,
        }
    }
}

/// Cached token with expiration
#[derive(Debug, Clone)]
pub struct CachedToken {
    /// The access token
    pub token: String,
    /// When the token expires
    pub expires_at: Option<DateTime<Utc>>,
}

impl CachedToken {
    /// Create a new cached token
    pub fn new(token: String, expires_at: Option<DateTime<Utc>>) -> Self {
        Self { token, expires_at }
    }

    /// Create a token that expires in N seconds from now
    pub fn expires_in(token: String, seconds: i64) -> Self {
        let expires_at = Utc::now() + chrono::Duration::seconds(seconds);
        Self {
            token,
            expires_at: Some(expires_at),
        }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false,
        }
    }
}

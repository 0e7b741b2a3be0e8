//! Authentication module
//!
//! Supports: Basic, Bearer, Google service accounts (JWT bearer grant)
//!
//! The `Authenticator` applies credentials to outgoing requests and caches
//! exchanged access tokens until shortly before they expire.

mod authenticator;
mod types;

pub use authenticator::Authenticator;
pub use types::{AuthConfig, CachedToken, ServiceAccountKey, BIGQUERY_SCOPE};

#[cfg(test)]
mod tests;

//! HTTP client with retry and rate limiting
//!
//! Every request runs through one attempt loop:
//! - rate limiter wait (when configured)
//! - send, check status, read the body, decode it
//! - on a retryable failure, sleep the backoff delay and try again
//!
//! Decoding happens inside the loop, so a body that does not parse counts as
//! a failed attempt like any transport error.

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use crate::types::JsonValue;
use bytes::Bytes;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for the HTTP client
#[derive(Debug, Clone)]
pub struct HttpClientConfig {
    /// Base URL for all requests
    pub base_url: Option<String>,
    /// Request timeout
    pub timeout: Duration,
    /// Total attempts per request, first one included
    pub max_attempts: u32,
    /// Delay unit for backoff
    pub backoff_unit: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    /// Retry 4xx answers as well as 5xx/429
    pub retry_client_errors: bool,
    /// Rate limiter configuration
    pub rate_limit: Option<RateLimiterConfig>,
    /// Default headers for all requests
    pub default_headers: BTreeMap<String, String>,
    /// User agent string
    pub user_agent: String,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            timeout: Duration::from_secs(30),
            max_attempts: 3,
            backoff_unit: Duration::from_secs(1),
            max_backoff: Duration::from_secs(60),
            retry_client_errors: false,
            rate_limit: None,
            default_headers: BTreeMap::new(),
            user_agent: format!("daily-extract/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl HttpClientConfig {
    /// Create a new config builder
    pub fn builder() -> HttpClientConfigBuilder {
        HttpClientConfigBuilder::default()
    }
}

/// Builder for HTTP client config
#[derive(Default)]
pub struct HttpClientConfigBuilder {
    config: HttpClientConfig,
}

impl HttpClientConfigBuilder {
    /// Set the base URL
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.config.base_url = Some(url.into());
        self
    }

    /// Set the request timeout
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    /// Set total attempts per request
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the exponential backoff unit and its cap
    pub fn backoff(mut self, unit: Duration, max: Duration) -> Self {
        self.config.backoff_unit = unit;
        self.config.max_backoff = max;
        self
    }

    /// Treat every non-2xx answer as retryable
    pub fn retry_client_errors(mut self, retry: bool) -> Self {
        self.config.retry_client_errors = retry;
        self
    }

    /// Set rate limiter
    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    /// Add a default header
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    /// Set user agent
    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    /// Build the config
    pub fn build(self) -> HttpClientConfig {
        self.config
    }
}

/// Configuration for a single request
#[derive(Debug, Clone, Default)]
pub struct RequestConfig {
    /// Query parameters
    pub query: BTreeMap<String, String>,
    /// Request headers
    pub headers: BTreeMap<String, String>,
    /// Request body (JSON)
    pub body: Option<JsonValue>,
    /// Pre-encoded body with its content type
    pub raw_body: Option<(String, Bytes)>,
    /// Override timeout for this request
    pub timeout: Option<Duration>,
    /// Override total attempts for this request
    pub max_attempts: Option<u32>,
}

impl RequestConfig {
    /// Create a new request config
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a query parameter
    #[must_use]
    pub fn query(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.query.insert(key.into(), value.into());
        self
    }

    /// Add query parameters from JSON scalars
    ///
    /// Strings are sent verbatim, other values in their JSON text form.
    #[must_use]
    pub fn query_values<'a>(
        mut self,
        params: impl IntoIterator<Item = (&'a String, &'a JsonValue)>,
    ) -> Self {
        for (key, value) in params {
            let value = match value {
                JsonValue::String(s) => s.clone(),
                other => other.to_string(),
            };
            self.query.insert(key.clone(), value);
        }
        self
    }

    /// Add a header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Set JSON body
    #[must_use]
    pub fn json(mut self, body: JsonValue) -> Self {
        self.body = Some(body);
        self
    }

    /// Set a pre-encoded body
    #[must_use]
    pub fn raw(mut self, content_type: impl Into<String>, body: impl Into<Bytes>) -> Self {
        self.raw_body = Some((content_type.into(), body.into()));
        self
    }

    /// Set timeout
    #[must_use]
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Set total attempts
    #[must_use]
    pub fn attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }
}

/// HTTP client with retry and rate limiting
pub struct HttpClient {
    client: Client,
    config: HttpClientConfig,
    authenticator: Option<Authenticator>,
    rate_limiter: Option<RateLimiter>,
}

impl HttpClient {
    /// Create a new HTTP client with default configuration
    pub fn new() -> Result<Self> {
        Self::with_config(HttpClientConfig::default())
    }

    /// Create a new HTTP client with custom configuration
    pub fn with_config(config: HttpClientConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent)
            .build()?;

        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator: None,
            rate_limiter,
        })
    }

    /// Create a client with authentication
    pub fn with_auth(config: HttpClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let mut client = Self::with_config(config)?;
        client.set_authenticator(auth_config);
        Ok(client)
    }

    /// Set the authenticator
    pub fn set_authenticator(&mut self, auth_config: AuthConfig) {
        self.authenticator = Some(Authenticator::with_client(auth_config, self.client.clone()));
    }

    /// Get the client configuration
    pub fn config(&self) -> &HttpClientConfig {
        &self.config
    }

    /// Make a GET request and parse the JSON response
    pub async fn get_json<T: DeserializeOwned>(&self, url: &str, config: RequestConfig) -> Result<T> {
        self.request_json(Method::GET, url, config).await
    }

    /// Make a POST request and parse the JSON response
    pub async fn post_json<T: DeserializeOwned>(&self, url: &str, config: RequestConfig) -> Result<T> {
        self.request_json(Method::POST, url, config).await
    }

    /// Make a request and parse the JSON response
    pub async fn request_json<T: DeserializeOwned>(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
    ) -> Result<T> {
        self.request_with(method, url, config, |body| {
            serde_json::from_slice(body).map_err(Error::JsonParse)
        })
        .await
    }

    /// Make a request and return the raw body
    pub async fn request(&self, method: Method, url: &str, config: RequestConfig) -> Result<Bytes> {
        self.request_with(method, url, config, |body| Ok(body.clone()))
            .await
    }

    /// Run the attempt loop, decoding each successful body with `decode`
    async fn request_with<T>(
        &self,
        method: Method,
        url: &str,
        config: RequestConfig,
        decode: impl Fn(&Bytes) -> Result<T>,
    ) -> Result<T> {
        let full_url = self.build_url(url);
        let max_attempts = config
            .max_attempts
            .unwrap_or(self.config.max_attempts)
            .max(1);

        for attempt in 0..max_attempts {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let outcome = match self.send_once(&method, &full_url, &config).await {
                Ok(body) => decode(&body),
                Err(e) => Err(e),
            };

            let err = match outcome {
                Ok(value) => {
                    debug!(method = %method, url = %full_url, attempt = attempt + 1, "Request succeeded");
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !self.should_retry(&err) {
                return Err(err);
            }

            warn!(
                url = %full_url,
                attempt = attempt + 1,
                max_attempts,
                error = %err,
                "Request attempt failed"
            );

            if attempt + 1 < max_attempts {
                tokio::time::sleep(self.calculate_backoff(attempt)).await;
            }
        }

        Err(Error::MaxRetriesExceeded { max_attempts })
    }

    /// One attempt: build, send, check status, read body
    async fn send_once(&self, method: &Method, url: &str, config: &RequestConfig) -> Result<Bytes> {
        let timeout = config.timeout.unwrap_or(self.config.timeout);
        let mut req = self.client.request(method.clone(), url).timeout(timeout);

        for (key, value) in &self.config.default_headers {
            req = req.header(key.as_str(), value.as_str());
        }
        for (key, value) in &config.headers {
            req = req.header(key.as_str(), value.as_str());
        }
        if !config.query.is_empty() {
            req = req.query(&config.query);
        }
        if let Some(ref body) = config.body {
            req = req.json(body);
        }
        if let Some((ref content_type, ref body)) = config.raw_body {
            req = req
                .header(reqwest::header::CONTENT_TYPE, content_type.as_str())
                .body(body.clone());
        }
        if let Some(ref auth) = self.authenticator {
            req = auth.apply(req).await?;
        }

        let response = req.send().await.map_err(|e| classify(e, timeout))?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(Error::http_status(status.as_u16(), body));
        }

        response.bytes().await.map_err(|e| classify(e, timeout))
    }

    fn should_retry(&self, err: &Error) -> bool {
        match err {
            Error::HttpStatus { status, .. } => {
                self.config.retry_client_errors
                    || *status == StatusCode::TOO_MANY_REQUESTS.as_u16()
                    || *status >= 500
            }
            other => other.is_retryable(),
        }
    }

    /// Build full URL from path
    fn build_url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            return path.to_string();
        }

        match &self.config.base_url {
            Some(base) => {
                let base = base.trim_end_matches('/');
                let path = path.trim_start_matches('/');
                format!("{base}/{path}")
            }
            None => path.to_string(),
        }
    }

    /// Delay after failed attempt `attempt` (counted from 0): `unit * 2^attempt`, capped
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = self
            .config
            .backoff_unit
            .saturating_mul(2u32.saturating_pow(attempt));
        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("config", &self.config)
            .field("has_authenticator", &self.authenticator.is_some())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Map a transport failure, keeping timeouts distinct
fn classify(err: reqwest::Error, timeout: Duration) -> Error {
    if err.is_timeout() {
        Error::Timeout {
            timeout_ms: timeout.as_millis() as u64,
        }
    } else {
        Error::Http(err)
    }
}

//! HTTP client module
//!
//! Provides HTTP client with retry, rate limiting and exponential backoff.
//!
//! # Features
//!
//! - **Automatic Retries**: bounded attempts with backoff between them
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff**: exponential, `unit * 2^attempt` up to a cap
//! - **Authentication**: Integration with auth module

mod client;
mod rate_limit;

pub use client::{HttpClient, HttpClientConfig, RequestConfig};
pub use rate_limit::{RateLimiter, RateLimiterConfig};

#[cfg(test)]
mod tests;

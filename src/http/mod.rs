//! HTTP transport module
//!
//! Provides the workspace API client with retry, rate limiting, and backoff strategies.
//!
//! # Features
//!
//! - **Automatic Retries**: 429, 5xx, timeouts and connection errors
//! - **Rate Limiting**: Token bucket rate limiter using governor
//! - **Backoff Strategies**: Constant, linear, and exponential backoff
//! - **Structured Errors**: Workspace `error_code`/`message` bodies become [`Error::Api`](crate::Error::Api)
//! - **Authentication**: Every request is signed by the client's authenticator

mod client;
mod rate_limit;

pub use client::{ApiClient, ClientConfig, ClientConfigBuilder, DEFAULT_API_VERSION};
pub use rate_limit::{RateLimiter, RateLimiterConfig, DEFAULT_RATE_LIMIT};

#[cfg(test)]
mod tests;

//! Workspace API client with retry and rate limiting
//!
//! [`ApiClient`] is the explicit client context handed to every resource.
//! It owns the transport, the rate limiter and the [`Authenticator`], and
//! handles:
//! - URL composition as `{host}/api/{version}{path}`
//! - Automatic retries with configurable backoff
//! - Structured API errors (`error_code` + `message`)

use super::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::auth::{AuthConfig, Authenticator};
use crate::error::{Error, Result};
use crate::types::{BackoffType, Method};
use bytes::Bytes;
use reqwest::{Client, Proxy, Response, StatusCode};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, warn};

/// Default REST API version
pub const DEFAULT_API_VERSION: &str = "2.0";

/// Transport configuration
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Request timeout
    pub timeout: Duration,
    /// Maximum number of retries
    pub max_retries: u32,
    /// Initial delay for backoff
    pub initial_backoff: Duration,
    /// Maximum delay for backoff
    pub max_backoff: Duration,
    pub backoff_type: BackoffType,
    pub rate_limit: Option<RateLimiterConfig>,
    /// Skip TLS certificate verification
    pub insecure_skip_verify: bool,
    /// Proxy for all requests
    pub proxy_url: Option<String>,
    /// Headers sent with every request
    pub default_headers: HashMap<String, String>,
    pub user_agent: String,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            max_retries: 3,
            initial_backoff: Duration::from_millis(250),
            max_backoff: Duration::from_secs(30),
            backoff_type: BackoffType::Exponential,
            rate_limit: Some(RateLimiterConfig::default()),
            insecure_skip_verify: false,
            proxy_url: None,
            default_headers: HashMap::new(),
            user_agent: format!("dbx-provider/{}", env!("CARGO_PKG_VERSION")),
        }
    }
}

impl ClientConfig {
    /// Create a new config builder
    pub fn builder() -> ClientConfigBuilder {
        ClientConfigBuilder::default()
    }
}

/// Builder for transport config
#[derive(Default)]
pub struct ClientConfigBuilder {
    config: ClientConfig,
}

impl ClientConfigBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set backoff strategy and bounds
    pub fn backoff(mut self, backoff_type: BackoffType, initial: Duration, max: Duration) -> Self {
        self.config.backoff_type = backoff_type;
        self.config.initial_backoff = initial;
        self.config.max_backoff = max;
        self
    }

    pub fn rate_limit(mut self, config: RateLimiterConfig) -> Self {
        self.config.rate_limit = Some(config);
        self
    }

    pub fn no_rate_limit(mut self) -> Self {
        self.config.rate_limit = None;
        self
    }

    pub fn insecure_skip_verify(mut self, skip: bool) -> Self {
        self.config.insecure_skip_verify = skip;
        self
    }

    pub fn proxy(mut self, url: impl Into<String>) -> Self {
        self.config.proxy_url = Some(url.into());
        self
    }

    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.default_headers.insert(key.into(), value.into());
        self
    }

    pub fn user_agent(mut self, agent: impl Into<String>) -> Self {
        self.config.user_agent = agent.into();
        self
    }

    pub fn build(self) -> ClientConfig {
        self.config
    }
}

/// Error body returned by workspace APIs
#[derive(Debug, Default, Deserialize)]
struct ApiErrorBody {
    #[serde(default)]
    error_code: Option<String>,
    #[serde(default)]
    message: Option<String>,
    /// SCIM endpoints report errors as `detail`
    #[serde(default)]
    detail: Option<String>,
}

/// Authenticated client for one workspace
pub struct ApiClient {
    client: Client,
    config: ClientConfig,
    authenticator: Authenticator,
    rate_limiter: Option<RateLimiter>,
}

impl ApiClient {
    /// Build the transport and resolve credentials
    pub fn new(config: ClientConfig, auth_config: AuthConfig) -> Result<Self> {
        let mut builder = Client::builder()
            .timeout(config.timeout)
            .user_agent(&config.user_agent);
        if config.insecure_skip_verify {
            warn!("TLS certificate verification is disabled");
            builder = builder.danger_accept_invalid_certs(true);
        }
        if let Some(proxy) = &config.proxy_url {
            let proxy = Proxy::all(proxy).map_err(|e| Error::InvalidConfigValue {
                field: "proxy_url".to_string(),
                message: e.to_string(),
            })?;
            builder = builder.proxy(proxy);
        }
        let client = builder.build()?;

        let authenticator = Authenticator::with_client(auth_config, client.clone())?;
        let rate_limiter = config.rate_limit.as_ref().map(RateLimiter::new);

        Ok(Self {
            client,
            config,
            authenticator,
            rate_limiter,
        })
    }

    /// The client's authenticator
    pub fn authenticator(&self) -> &Authenticator {
        &self.authenticator
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    /// GET with query parameters, decoding the JSON response
    pub async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, &str)]) -> Result<T> {
        let body = self
            .perform_query(Method::GET, path, DEFAULT_API_VERSION, query, None)
            .await?;
        decode(&body)
    }

    /// POST a JSON body, decoding the JSON response
    pub async fn post<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send_json(Method::POST, path, body).await
    }

    /// PUT a JSON body, decoding the JSON response
    pub async fn put<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send_json(Method::PUT, path, body).await
    }

    /// PATCH a JSON body, decoding the JSON response
    pub async fn patch<B: Serialize, T: DeserializeOwned>(&self, path: &str, body: &B) -> Result<T> {
        self.send_json(Method::PATCH, path, body).await
    }

    /// DELETE, optionally with a JSON body
    pub async fn delete<B: Serialize>(&self, path: &str, body: Option<&B>) -> Result<()> {
        let body = body.map(serde_json::to_value).transpose()?;
        self.perform_query(Method::DELETE, path, DEFAULT_API_VERSION, &[], body)
            .await?;
        Ok(())
    }

    async fn send_json<B: Serialize, T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &B,
    ) -> Result<T> {
        let body = serde_json::to_value(body)?;
        let response = self
            .perform_query(method, path, DEFAULT_API_VERSION, &[], Some(body))
            .await?;
        decode(&response)
    }

    /// Send one signed request to `{host}/api/{api_version}{path}`.
    ///
    /// Retries 429, 5xx, timeouts and connection errors with backoff. Other
    /// non-success statuses come back as [`Error::Api`].
    #[allow(clippy::too_many_lines)]
    pub async fn perform_query(
        &self,
        method: Method,
        path: &str,
        api_version: &str,
        query: &[(&str, &str)],
        body: Option<Value>,
    ) -> Result<Bytes> {
        let host = self.authenticator.host().await?;
        let url = format!("{host}/api/{api_version}{path}");
        let max_retries = self.config.max_retries;
        let timeout = self.config.timeout;

        let mut last_error = None;
        let mut attempt = 0;

        while attempt <= max_retries {
            if let Some(ref limiter) = self.rate_limiter {
                limiter.wait().await;
            }

            let mut req = self.client.request(method.into(), &url);
            for (key, value) in &self.config.default_headers {
                req = req.header(key.as_str(), value.as_str());
            }
            if !query.is_empty() {
                req = req.query(query);
            }
            if let Some(ref body) = body {
                req = req.json(body);
            }
            req = self.authenticator.sign_request(req).await?;

            debug!(%method, %url, attempt, "Sending request");
            match req.send().await {
                Ok(response) => {
                    let status = response.status();

                    if status.is_success() {
                        return Ok(response.bytes().await?);
                    }

                    if is_retryable_status(status) && attempt < max_retries {
                        let delay = retry_after(&response)
                            .unwrap_or_else(|| self.calculate_backoff(attempt));
                        warn!(
                            "{} {} failed with {}, attempt {}/{}, retrying in {:?}",
                            method,
                            path,
                            status.as_u16(),
                            attempt + 1,
                            max_retries + 1,
                            delay
                        );
                        last_error = Some(api_error(response).await);
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        continue;
                    }

                    return Err(api_error(response).await);
                }
                Err(e) => {
                    let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);
                    if (e.is_timeout() || e.is_connect()) && attempt < max_retries {
                        let delay = self.calculate_backoff(attempt);
                        warn!(
                            "{} {} transport error, attempt {}/{}, retrying in {:?}: {}",
                            method,
                            path,
                            attempt + 1,
                            max_retries + 1,
                            delay,
                            e
                        );
                        tokio::time::sleep(delay).await;
                        attempt += 1;
                        last_error = Some(if e.is_timeout() {
                            Error::Timeout { timeout_ms }
                        } else {
                            Error::Http(e)
                        });
                        continue;
                    }
                    if e.is_timeout() {
                        return Err(Error::Timeout { timeout_ms });
                    }
                    return Err(Error::Http(e));
                }
            }
        }

        Err(last_error.unwrap_or(Error::MaxRetriesExceeded { max_retries }))
    }

    /// Calculate backoff delay for a given attempt
    pub fn calculate_backoff(&self, attempt: u32) -> Duration {
        let delay = match self.config.backoff_type {
            BackoffType::Constant => self.config.initial_backoff,
            BackoffType::Linear => self.config.initial_backoff * (attempt + 1),
            BackoffType::Exponential => self.config.initial_backoff * 2u32.saturating_pow(attempt),
        };
        std::cmp::min(delay, self.config.max_backoff)
    }
}

impl std::fmt::Debug for ApiClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ApiClient")
            .field("config", &self.config)
            .field("credential", self.authenticator.credential())
            .field("has_rate_limiter", &self.rate_limiter.is_some())
            .finish_non_exhaustive()
    }
}

/// Decode a JSON response; an empty body decodes as `null`
fn decode<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(serde_json::from_value(Value::Null)?);
    }
    Ok(serde_json::from_slice(body)?)
}

/// Turn a non-success response into a structured API error
async fn api_error(response: Response) -> Error {
    let status = response.status();
    let text = response.text().await.unwrap_or_default();
    let parsed: ApiErrorBody = serde_json::from_str(&text).unwrap_or_default();

    let error_code = parsed.error_code.unwrap_or_else(|| {
        status
            .canonical_reason()
            .unwrap_or("UNKNOWN")
            .to_uppercase()
            .replace(' ', "_")
    });
    let message = parsed
        .message
        .or(parsed.detail)
        .unwrap_or_else(|| text.trim().to_string());

    Error::api(status.as_u16(), error_code, message)
}

fn is_retryable_status(status: StatusCode) -> bool {
    matches!(status.as_u16(), 429 | 500 | 502 | 503 | 504)
}

/// Delay requested by a `Retry-After` header, in seconds
fn retry_after(response: &Response) -> Option<Duration> {
    response
        .headers()
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.parse().ok())
        .map(Duration::from_secs)
}

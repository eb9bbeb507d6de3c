//! Error types for the provider
//!
//! This module defines the error hierarchy for the entire crate.
//! All public APIs return `Result<T, Error>` where Error is defined here.

use thiserror::Error;

/// The main error type for the provider
#[derive(Error, Debug)]
pub enum Error {
    // ============================================================================
    // Configuration Errors
    // ============================================================================
    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Missing required config field: {field}")]
    MissingConfigField { field: String },

    #[error("Invalid config value for '{field}': {message}")]
    InvalidConfigValue { field: String, message: String },

    #[error("Ambiguous credentials: {message}")]
    AmbiguousCredentials { message: String },

    #[error("Failed to parse YAML: {0}")]
    YamlParse(#[from] serde_yaml::Error),

    #[error("Failed to parse JSON: {0}")]
    JsonParse(#[from] serde_json::Error),

    // ============================================================================
    // Schema Errors
    // ============================================================================
    #[error("Schema generation failed: {message}")]
    SchemaGeneration { message: String },

    #[error("Cannot convert '{path}': {message}")]
    Conversion { path: String, message: String },

    #[error("'{field}' conflicts with '{conflicts_with}'")]
    ConfigConflict {
        field: String,
        conflicts_with: String,
    },

    #[error("Invalid value for '{path}': {message}")]
    Validation { path: String, message: String },

    // ============================================================================
    // Authentication Errors
    // ============================================================================
    #[error("Authentication failed: {message}")]
    Auth { message: String },

    // ============================================================================
    // HTTP Errors
    // ============================================================================
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("{error_code}: {message} (HTTP {status})")]
    Api {
        status: u16,
        error_code: String,
        message: String,
    },

    #[error("Rate limited, retry after {retry_after_seconds}s")]
    RateLimited { retry_after_seconds: u64 },

    #[error("Request timeout after {timeout_ms}ms")]
    Timeout { timeout_ms: u64 },

    #[error("Max retries ({max_retries}) exceeded")]
    MaxRetriesExceeded { max_retries: u32 },

    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    // ============================================================================
    // I/O Errors
    // ============================================================================
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("File not found: {path}")]
    FileNotFound { path: String },

    // ============================================================================
    // Generic Errors
    // ============================================================================
    #[error("{0}")]
    Other(String),

    #[error(transparent)]
    Anyhow(#[from] anyhow::Error),
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

    /// Create an auth error
    pub fn auth(message: impl Into<String>) -> Self {
        Self::Auth {
            message: message.into(),
        }
    }

    /// Create a schema generation error
    pub fn schema(message: impl Into<String>) -> Self {
        Self::SchemaGeneration {
            message: message.into(),
        }
    }

    /// Create a conversion error
    pub fn conversion(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Conversion {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create a validation error
    pub fn validation(path: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Validation {
            path: path.into(),
            message: message.into(),
        }
    }

    /// Create an API error
    pub fn api(status: u16, error_code: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Api {
            status,
            error_code: error_code.into(),
            message: message.into(),
        }
    }

    /// Create an error signalling that a remote object no longer exists.
    ///
    /// Read treats it like a 404 from the API.
    pub fn not_found(message: impl Into<String>) -> Self {
        Self::api(404, "RESOURCE_DOES_NOT_EXIST", message)
    }

    /// Whether the remote object is gone (HTTP 404)
    pub fn is_missing(&self) -> bool {
        match self {
            Error::Api { status, .. } => *status == 404,
            _ => false,
        }
    }

    /// Check if this error is retryable
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Http(_) | Error::RateLimited { .. } | Error::Timeout { .. } => true,
            Error::Api { status, .. } => is_retryable_status(*status),
            _ => false,
        }
    }
}

/// Check if an HTTP status code is retryable
fn is_retryable_status(status: u16) -> bool {
    matches!(status, 429 | 500 | 502 | 503 | 504)
}

/// Result type alias for the provider
pub type Result<T> = std::result::Result<T, Error>;

/// Extension trait for adding context to errors
pub trait ResultExt<T> {
    /// Add context to an error
    fn context(self, message: impl Into<String>) -> Result<T>;

    /// Add context with a closure (lazy evaluation)
    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T>;
}

impl<T, E: Into<Error>> ResultExt<T> for std::result::Result<T, E> {
    fn context(self, message: impl Into<String>) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", message.into(), inner))
        })
    }

    fn with_context<F: FnOnce() -> String>(self, f: F) -> Result<T> {
        self.map_err(|e| {
            let inner = e.into();
            Error::Other(format!("{}: {}", f(), inner))
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = Error::config("test message");
        assert_eq!(err.to_string(), "Configuration error: test message");

        let err = Error::missing_field("host");
        assert_eq!(err.to_string(), "Missing required config field: host");

        let err = Error::api(404, "RESOURCE_DOES_NOT_EXIST", "Not found");
        assert_eq!(
            err.to_string(),
            "RESOURCE_DOES_NOT_EXIST: Not found (HTTP 404)"
        );

        let err = Error::ConfigConflict {
            field: "schedule.0.daily".to_string(),
            conflicts_with: "schedule.0.weekly".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "'schedule.0.daily' conflicts with 'schedule.0.weekly'"
        );
    }

    #[test]
    fn test_is_missing() {
        assert!(Error::api(404, "RESOURCE_DOES_NOT_EXIST", "gone").is_missing());
        assert!(Error::api(404, "FEATURE_DISABLED", "tier").is_missing());
        assert!(Error::not_found("User has no role").is_missing());

        assert!(!Error::api(400, "INVALID_PARAMETER_VALUE", "bad").is_missing());
        assert!(!Error::api(500, "SERVER_ERROR", "boom").is_missing());
        assert!(!Error::config("test").is_missing());
    }

    #[test]
    fn test_is_retryable() {
        assert!(Error::RateLimited {
            retry_after_seconds: 60
        }
        .is_retryable());
        assert!(Error::Timeout { timeout_ms: 1000 }.is_retryable());
        assert!(Error::api(429, "TOO_MANY_REQUESTS", "").is_retryable());
        assert!(Error::api(503, "TEMPORARILY_UNAVAILABLE", "").is_retryable());

        assert!(!Error::api(400, "INVALID_REQUEST", "").is_retryable());
        assert!(!Error::api(404, "RESOURCE_DOES_NOT_EXIST", "").is_retryable());
        assert!(!Error::auth("expired").is_retryable());
    }

    #[test]
    fn test_result_context() {
        let result: Result<()> = Err(Error::config("inner"));
        let with_context = result.context("outer");
        assert!(with_context
            .unwrap_err()
            .to_string()
            .contains("outer: Configuration error: inner"));
    }
}

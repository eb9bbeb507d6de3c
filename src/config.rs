//! Provider configuration
//!
//! Settings come from a YAML (or JSON) file and from environment variables.
//! Values written in the file win; the environment fills whatever the file
//! leaves unset.
//!
//! ```yaml
//! host: https://adb-123.azuredatabricks.net
//! azure:
//!   resource_id: /subscriptions/.../workspaces/prod
//! http:
//!   max_retries: 5
//!   rate_limit: 10
//! ```

use crate::auth::{AuthConfig, AzureAuth};
use crate::error::{Error, Result};
use crate::http::{ClientConfig, RateLimiterConfig, DEFAULT_RATE_LIMIT};
use crate::types::BackoffType;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

/// Environment variables and the setting each one fills
const ENV_VARS: &[(&str, EnvField)] = &[
    ("DATABRICKS_HOST", EnvField::Host),
    ("DATABRICKS_TOKEN", EnvField::Token),
    ("DATABRICKS_USERNAME", EnvField::Username),
    ("DATABRICKS_PASSWORD", EnvField::Password),
    ("DATABRICKS_AZURE_WORKSPACE_RESOURCE_ID", EnvField::ResourceId),
    ("DATABRICKS_AZURE_RESOURCE_GROUP", EnvField::ResourceGroup),
    ("DATABRICKS_AZURE_WORKSPACE_NAME", EnvField::WorkspaceName),
    ("ARM_SUBSCRIPTION_ID", EnvField::SubscriptionId),
    ("ARM_CLIENT_ID", EnvField::ClientId),
    ("ARM_CLIENT_SECRET", EnvField::ClientSecret),
    ("ARM_TENANT_ID", EnvField::TenantId),
];

#[derive(Debug, Clone, Copy)]
enum EnvField {
    Host,
    Token,
    Username,
    Password,
    ResourceId,
    ResourceGroup,
    WorkspaceName,
    SubscriptionId,
    ClientId,
    ClientSecret,
    TenantId,
}

/// Complete provider configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ProviderConfig {
    pub host: Option<String>,
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub azure: AzureAuth,
    pub http: HttpSettings,
}

/// Transport settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_seconds: u64,
    pub max_retries: u32,
    pub backoff: BackoffType,
    pub initial_backoff_ms: u64,
    pub max_backoff_ms: u64,
    /// Requests per second; `0` disables rate limiting
    pub rate_limit: u32,
    pub insecure_skip_verify: bool,
    pub proxy_url: Option<String>,
    pub user_agent: Option<String>,
    pub headers: HashMap<String, String>,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_seconds: 60,
            max_retries: 3,
            backoff: BackoffType::Exponential,
            initial_backoff_ms: 250,
            max_backoff_ms: 30_000,
            rate_limit: DEFAULT_RATE_LIMIT,
            insecure_skip_verify: false,
            proxy_url: None,
            user_agent: None,
            headers: HashMap::new(),
        }
    }
}

impl ProviderConfig {
    /// Parse configuration from YAML or JSON text
    pub fn from_str(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        let config: Self = serde_yaml::from_str(content)?;
        config.check()?;
        Ok(config)
    }

    /// Load configuration from a file
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(Error::FileNotFound {
                path: path.display().to_string(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Self::from_str(&content)
    }

    /// Load from an optional file, then fill unset values from the process environment
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(path) => Self::from_file(path)?,
            None => Self::default(),
        };
        config.apply_env(|name| std::env::var(name).ok());
        Ok(config)
    }

    /// Fill unset credential settings from an environment lookup
    pub fn apply_env<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        for (name, field) in ENV_VARS {
            let Some(value) = lookup(name).filter(|v| !v.is_empty()) else {
                continue;
            };
            let slot = match field {
                EnvField::Host => &mut self.host,
                EnvField::Token => &mut self.token,
                EnvField::Username => &mut self.username,
                EnvField::Password => &mut self.password,
                EnvField::ResourceId => &mut self.azure.resource_id,
                EnvField::ResourceGroup => &mut self.azure.resource_group,
                EnvField::WorkspaceName => &mut self.azure.workspace_name,
                EnvField::SubscriptionId => &mut self.azure.subscription_id,
                EnvField::ClientId => &mut self.azure.client_id,
                EnvField::ClientSecret => &mut self.azure.client_secret,
                EnvField::TenantId => &mut self.azure.tenant_id,
            };
            if slot.as_deref().map_or(true, str::is_empty) {
                *slot = Some(value);
            }
        }
    }

    /// Credential settings for the authenticator
    pub fn auth_config(&self) -> AuthConfig {
        AuthConfig {
            host: self.host.clone(),
            token: self.token.clone(),
            username: self.username.clone(),
            password: self.password.clone(),
            azure: self.azure.clone(),
        }
    }

    /// Transport settings for the API client
    pub fn client_config(&self) -> ClientConfig {
        let http = &self.http;
        let mut builder = ClientConfig::builder()
            .timeout(Duration::from_secs(http.timeout_seconds))
            .max_retries(http.max_retries)
            .backoff(
                http.backoff,
                Duration::from_millis(http.initial_backoff_ms),
                Duration::from_millis(http.max_backoff_ms),
            )
            .insecure_skip_verify(http.insecure_skip_verify);
        builder = if http.rate_limit == 0 {
            builder.no_rate_limit()
        } else {
            builder.rate_limit(RateLimiterConfig::per_second(http.rate_limit))
        };
        if let Some(proxy) = &http.proxy_url {
            builder = builder.proxy(proxy.clone());
        }
        if let Some(agent) = &http.user_agent {
            builder = builder.user_agent(agent.clone());
        }
        for (key, value) in &http.headers {
            builder = builder.header(key.clone(), value.clone());
        }
        builder.build()
    }

    fn check(&self) -> Result<()> {
        if self.http.timeout_seconds == 0 {
            return Err(Error::InvalidConfigValue {
                field: "http.timeout_seconds".to_string(),
                message: "must be greater than zero".to_string(),
            });
        }
        if self.http.initial_backoff_ms > self.http.max_backoff_ms {
            return Err(Error::InvalidConfigValue {
                field: "http.initial_backoff_ms".to_string(),
                message: format!(
                    "must not exceed http.max_backoff_ms ({})",
                    self.http.max_backoff_ms
                ),
            });
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    #[test]
    fn test_parse_yaml() {
        let config = ProviderConfig::from_str(
            r"
host: https://adb-123.azuredatabricks.net
azure:
  resource_id: /subscriptions/a/resourceGroups/b/providers/Microsoft.Databricks/workspaces/c
http:
  max_retries: 5
  rate_limit: 0
  backoff: linear
  headers:
    X-Team: data
",
        )
        .unwrap();

        assert_eq!(
            config.host.as_deref(),
            Some("https://adb-123.azuredatabricks.net")
        );
        assert!(config.azure.resource_id.is_some());
        assert_eq!(
            config.azure.management_endpoint,
            crate::auth::DEFAULT_MANAGEMENT_ENDPOINT
        );
        assert_eq!(config.http.max_retries, 5);
        assert_eq!(config.http.timeout_seconds, 60);

        let client = config.client_config();
        assert_eq!(client.max_retries, 5);
        assert_eq!(client.backoff_type, BackoffType::Linear);
        assert!(client.rate_limit.is_none());
        assert_eq!(client.default_headers.get("X-Team"), Some(&"data".to_string()));
    }

    #[test]
    fn test_parse_json() {
        let config =
            ProviderConfig::from_str(r#"{"host": "h", "token": "t", "http": {"rate_limit": 4}}"#)
                .unwrap();
        assert_eq!(config.token.as_deref(), Some("t"));
        assert_eq!(
            config.client_config().rate_limit,
            Some(RateLimiterConfig::per_second(4))
        );
    }

    #[test]
    fn test_empty_is_default() {
        let config = ProviderConfig::from_str("  \n").unwrap();
        assert!(config.host.is_none());
        assert_eq!(config.http.rate_limit, DEFAULT_RATE_LIMIT);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = ProviderConfig::from_str("http:\n  timeout_seconds: 0").unwrap_err();
        assert!(matches!(err, Error::InvalidConfigValue { .. }));

        let err = ProviderConfig::from_str("http: [1, 2]").unwrap_err();
        assert!(matches!(err, Error::YamlParse(_)));
    }

    #[test]
    fn test_env_fills_unset_values_only() {
        let mut config = ProviderConfig::from_str("host: https://from-file").unwrap();
        config.apply_env(env(&[
            ("DATABRICKS_HOST", "https://from-env"),
            ("DATABRICKS_TOKEN", "dapi-env"),
            ("ARM_CLIENT_ID", "app"),
            ("ARM_TENANT_ID", ""),
        ]));

        assert_eq!(config.host.as_deref(), Some("https://from-file"));
        assert_eq!(config.token.as_deref(), Some("dapi-env"));
        assert_eq!(config.azure.client_id.as_deref(), Some("app"));
        assert_eq!(config.azure.tenant_id, None);
    }

    #[test]
    fn test_auth_config_from_env() {
        let mut config = ProviderConfig::default();
        config.apply_env(env(&[
            ("ARM_SUBSCRIPTION_ID", "a"),
            ("DATABRICKS_AZURE_RESOURCE_GROUP", "b"),
            ("DATABRICKS_AZURE_WORKSPACE_NAME", "c"),
        ]));

        let auth = config.auth_config();
        assert_eq!(
            auth.azure.resource_id().as_deref(),
            Some("/subscriptions/a/resourceGroups/b/providers/Microsoft.Databricks/workspaces/c")
        );
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "host: https://example.cloud.databricks.com").unwrap();
        writeln!(file, "username: admin").unwrap();
        writeln!(file, "password: pw").unwrap();

        let config = ProviderConfig::from_file(file.path()).unwrap();
        assert_eq!(config.username.as_deref(), Some("admin"));
    }

    #[test]
    fn test_from_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = ProviderConfig::from_file(dir.path().join("absent.yaml")).unwrap_err();
        assert!(matches!(err, Error::FileNotFound { .. }));
    }
}

//! Auth configuration types
//!
//! [`AuthConfig`] holds every credential setting the provider accepts.
//! [`Credential`] is the single strategy resolved from it.

use crate::error::{Error, Result};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Default Azure Resource Manager endpoint
pub const DEFAULT_MANAGEMENT_ENDPOINT: &str = "https://management.azure.com";

/// Default Azure AD login endpoint
pub const DEFAULT_LOGIN_ENDPOINT: &str = "https://login.microsoftonline.com";

/// Default instance metadata endpoint for managed identities
pub const DEFAULT_MSI_ENDPOINT: &str = "http://169.254.169.254/metadata/identity/oauth2/token";

/// Default resource the identity token is requested for
pub const DEFAULT_TOKEN_RESOURCE: &str = "https://management.core.windows.net/";

/// Credential settings as loaded from configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// Workspace URL; discovered through the management API for Azure when unset
    pub host: Option<String>,
    /// Personal access token
    pub token: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub azure: AzureAuth,
}

/// Azure identity settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AzureAuth {
    /// Full workspace resource identifier
    pub resource_id: Option<String>,
    pub subscription_id: Option<String>,
    pub resource_group: Option<String>,
    pub workspace_name: Option<String>,
    pub client_id: Option<String>,
    pub client_secret: Option<String>,
    pub tenant_id: Option<String>,
    pub management_endpoint: String,
    pub login_endpoint: String,
    pub msi_endpoint: String,
    pub token_resource: String,
    /// Lifetime requested for the workspace access token
    pub pat_lifetime_seconds: u64,
}

impl Default for AzureAuth {
    fn default() -> Self {
        Self {
            resource_id: None,
            subscription_id: None,
            resource_group: None,
            workspace_name: None,
            client_id: None,
            client_secret: None,
            tenant_id: None,
            management_endpoint: DEFAULT_MANAGEMENT_ENDPOINT.to_string(),
            login_endpoint: DEFAULT_LOGIN_ENDPOINT.to_string(),
            msi_endpoint: DEFAULT_MSI_ENDPOINT.to_string(),
            token_resource: DEFAULT_TOKEN_RESOURCE.to_string(),
            pat_lifetime_seconds: 3600,
        }
    }
}

impl AzureAuth {
    /// Workspace resource identifier, given directly or composed from its parts
    pub fn resource_id(&self) -> Option<String> {
        if let Some(id) = non_empty(&self.resource_id) {
            return Some(id.to_string());
        }
        match (
            non_empty(&self.subscription_id),
            non_empty(&self.resource_group),
            non_empty(&self.workspace_name),
        ) {
            (Some(sub), Some(group), Some(name)) => Some(format!(
                "/subscriptions/{sub}/resourceGroups/{group}/providers/Microsoft.Databricks/workspaces/{name}"
            )),
            _ => None,
        }
    }

    /// Whether a service principal secret can be used instead of a managed identity
    pub fn is_client_secret_set(&self) -> bool {
        non_empty(&self.client_id).is_some()
            && non_empty(&self.client_secret).is_some()
            && non_empty(&self.tenant_id).is_some()
    }

    /// Whether any Azure setting is present
    fn is_touched(&self) -> bool {
        [
            &self.resource_id,
            &self.subscription_id,
            &self.resource_group,
            &self.workspace_name,
            &self.client_id,
            &self.client_secret,
            &self.tenant_id,
        ]
        .into_iter()
        .any(|v| non_empty(v).is_some())
    }

    /// Settings still needed before the strategy can be used
    fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.resource_id().is_none() {
            for (name, value) in [
                ("subscription_id", &self.subscription_id),
                ("resource_group", &self.resource_group),
                ("workspace_name", &self.workspace_name),
            ] {
                if non_empty(value).is_none() {
                    missing.push(name);
                }
            }
        }
        let secret_parts = [
            ("client_id", &self.client_id),
            ("client_secret", &self.client_secret),
            ("tenant_id", &self.tenant_id),
        ];
        if secret_parts.iter().any(|(_, v)| non_empty(v).is_some()) {
            for (name, value) in secret_parts {
                if non_empty(value).is_none() {
                    missing.push(name);
                }
            }
        }
        missing
    }
}

/// The one credential strategy a client uses
#[derive(Clone)]
pub enum Credential {
    /// Static bearer token
    Token(String),
    /// Username and password
    Basic { username: String, password: String },
    /// Azure identity exchanged for a workspace access token
    AzureIdentity(Box<AzureAuth>),
}

impl Credential {
    /// Resolve the credential strategy from configuration.
    ///
    /// Exactly one fully configured strategy wins. With none complete, a single
    /// partial strategy reports what is missing and several are ambiguous.
    pub fn resolve(config: &AuthConfig) -> Result<Self> {
        let mut full = Vec::new();
        let mut partial: Vec<(&str, Vec<&str>)> = Vec::new();

        if let Some(token) = non_empty(&config.token) {
            full.push(Credential::Token(token.to_string()));
        }

        match (non_empty(&config.username), non_empty(&config.password)) {
            (Some(username), Some(password)) => full.push(Credential::Basic {
                username: username.to_string(),
                password: password.to_string(),
            }),
            (Some(_), None) => partial.push(("basic", vec!["password"])),
            (None, Some(_)) => partial.push(("basic", vec!["username"])),
            (None, None) => {}
        }

        if config.azure.is_touched() {
            let missing = config.azure.missing();
            if missing.is_empty() {
                full.push(Credential::AzureIdentity(Box::new(config.azure.clone())));
            } else {
                partial.push(("azure", missing));
            }
        }

        if full.len() > 1 {
            let kinds: Vec<&str> = full.iter().map(Credential::kind).collect();
            return Err(Error::AmbiguousCredentials {
                message: format!("more than one strategy configured: {}", kinds.join(", ")),
            });
        }
        if let Some(credential) = full.pop() {
            return Ok(credential);
        }
        match partial.as_slice() {
            [] => Err(Error::config(
                "no credentials configured: set a token, username and password, or Azure workspace settings",
            )),
            [(kind, missing)] => Err(Error::config(format!(
                "{kind} credentials incomplete, missing {}",
                missing.join(", ")
            ))),
            many => {
                let kinds: Vec<&str> = many.iter().map(|(kind, _)| *kind).collect();
                Err(Error::AmbiguousCredentials {
                    message: format!(
                        "several incomplete strategies configured: {}",
                        kinds.join(", ")
                    ),
                })
            }
        }
    }

    /// Strategy name for logs and errors
    pub fn kind(&self) -> &'static str {
        match self {
            Credential::Token(_) => "token",
            Credential::Basic { .. } => "basic",
            Credential::AzureIdentity(_) => "azure",
        }
    }
}

impl std::fmt::Debug for Credential {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Credential::Token(_) => f.write_str("Token(***)"),
            Credential::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"***")
                .finish(),
            Credential::AzureIdentity(azure) => f
                .debug_struct("AzureIdentity")
                .field("resource_id", &azure.resource_id())
                .field("client_secret", &azure.is_client_secret_set())
                .finish(),
        }
    }
}

/// Lifecycle of the authenticator's cached credentials
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthState {
    /// No token obtained yet, or the last exchange failed
    Unconfigured,
    /// A token exchange is in flight
    Resolving,
    /// A usable credential is available
    Authenticated,
    /// The cached token needs a refresh
    Expired,
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

    /// Create a token from a millisecond epoch expiry; zero or negative never expires
    pub fn expires_at_millis(token: String, millis: i64) -> Self {
        let expires_at = if millis > 0 {
            DateTime::from_timestamp_millis(millis)
        } else {
            None
        };
        Self { token, expires_at }
    }

    /// Check if the token is expired (with 30 second buffer)
    pub fn is_expired(&self) -> bool {
        match self.expires_at {
            Some(expires_at) => {
                let buffer = chrono::Duration::seconds(30);
                Utc::now() + buffer >= expires_at
            }
            None => false, // No expiration = never expires
        }
    }
}

fn non_empty(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

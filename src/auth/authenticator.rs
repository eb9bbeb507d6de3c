//! Authenticator implementation
//!
//! Signs requests with the resolved credential. The Azure strategy runs two
//! exchanges: an identity token from Azure AD (client secret or managed
//! identity), then a workspace access token from `/api/2.0/token/create`.
//! Both are cached; concurrent callers share one in-flight refresh.
//!
//! Locks are always taken in the order access token, host, identity token.

use super::types::{AuthConfig, AuthState, AzureAuth, CachedToken, Credential};
use crate::error::{Error, Result};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Deserializer};
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{OnceCell, RwLock};
use tracing::{debug, info, warn};

/// Management API version used for workspace discovery
const WORKSPACE_API_VERSION: &str = "2018-04-01";

/// Instance metadata API version
const MSI_API_VERSION: &str = "2018-02-01";

/// Authenticator handles applying authentication to HTTP requests
pub struct Authenticator {
    credential: Credential,
    /// Workspace URL, configured or discovered once
    host: OnceCell<String>,
    /// Azure AD token
    identity_token: Arc<RwLock<Option<CachedToken>>>,
    /// Workspace access token obtained with the identity token
    access_token: Arc<RwLock<Option<CachedToken>>>,
    resolving: AtomicBool,
    /// HTTP client for token requests
    http_client: Client,
}

impl Authenticator {
    /// Resolve the credential strategy and create an authenticator
    pub fn new(config: AuthConfig) -> Result<Self> {
        Self::with_client(config, Client::new())
    }

    /// Create an authenticator with a custom HTTP client
    pub fn with_client(config: AuthConfig, http_client: Client) -> Result<Self> {
        let credential = Credential::resolve(&config)?;
        let host = config
            .host
            .as_deref()
            .filter(|h| !h.is_empty())
            .map(normalize_host);
        if host.is_none() && !matches!(credential, Credential::AzureIdentity(_)) {
            return Err(Error::missing_field("host"));
        }
        info!(strategy = credential.kind(), "Resolved credentials");

        Ok(Self {
            credential,
            host: OnceCell::new_with(host),
            identity_token: Arc::new(RwLock::new(None)),
            access_token: Arc::new(RwLock::new(None)),
            resolving: AtomicBool::new(false),
            http_client,
        })
    }

    /// Apply authentication to a request builder
    pub async fn sign_request(&self, req: RequestBuilder) -> Result<RequestBuilder> {
        match &self.credential {
            Credential::Token(token) => Ok(req.bearer_auth(token)),
            Credential::Basic { username, password } => {
                Ok(req.basic_auth(username, Some(password)))
            }
            Credential::AzureIdentity(azure) => {
                let token = self.get_or_refresh_token(azure).await?;
                Ok(req.bearer_auth(token))
            }
        }
    }

    /// Workspace URL, discovering it through the management API when needed
    pub async fn host(&self) -> Result<String> {
        let host = self
            .host
            .get_or_try_init(|| async {
                match &self.credential {
                    Credential::AzureIdentity(azure) => self.discover_workspace_url(azure).await,
                    _ => Err(Error::missing_field("host")),
                }
            })
            .await?;
        Ok(host.clone())
    }

    /// Resolved credential strategy
    pub fn credential(&self) -> &Credential {
        &self.credential
    }

    /// Current lifecycle state
    pub async fn state(&self) -> AuthState {
        if self.resolving.load(Ordering::SeqCst) {
            return AuthState::Resolving;
        }
        match &self.credential {
            Credential::Token(_) | Credential::Basic { .. } => AuthState::Authenticated,
            Credential::AzureIdentity(_) => match self.access_token.read().await.as_ref() {
                None => AuthState::Unconfigured,
                Some(token) if token.is_expired() => AuthState::Expired,
                Some(_) => AuthState::Authenticated,
            },
        }
    }

    /// Drop cached tokens so the next request exchanges new ones
    pub async fn clear_cache(&self) {
        *self.access_token.write().await = None;
        *self.identity_token.write().await = None;
    }

    /// Get a valid workspace access token, refreshing if necessary
    async fn get_or_refresh_token(&self, azure: &AzureAuth) -> Result<String> {
        {
            let cached = self.access_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.access_token.write().await;

        // another caller may have refreshed while we waited
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        self.resolving.store(true, Ordering::SeqCst);
        let result = self.create_access_token(azure).await;
        self.resolving.store(false, Ordering::SeqCst);

        match result {
            Ok(token) => {
                let value = token.token.clone();
                *cached = Some(token);
                Ok(value)
            }
            Err(e) => {
                *cached = None;
                *self.identity_token.write().await = None;
                warn!(error = %e, "Workspace token exchange failed, cleared cached tokens");
                Err(match e {
                    Error::Auth { .. } => e,
                    other => Error::auth(other.to_string()),
                })
            }
        }
    }

    /// Exchange the identity token for a workspace access token
    async fn create_access_token(&self, azure: &AzureAuth) -> Result<CachedToken> {
        let host = self.host().await?;
        let identity = self.get_or_refresh_identity(azure).await?;
        let resource_id = azure
            .resource_id()
            .ok_or_else(|| Error::config("Azure workspace resource id is not configured"))?;

        debug!(host = %host, "Creating workspace access token");
        let response = self
            .http_client
            .post(format!("{host}/api/2.0/token/create"))
            .bearer_auth(&identity)
            .header("X-Databricks-Azure-SP-Management-Token", &identity)
            .header("X-Databricks-Azure-Workspace-Resource-Id", &resource_id)
            .json(&json!({
                "lifetime_seconds": azure.pat_lifetime_seconds,
                "comment": "dbx-provider session token",
            }))
            .send()
            .await
            .map_err(|e| Error::auth(format!("Token create request failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Token create failed with status {status}: {body}"
            )));
        }

        let created: TokenCreateResponse = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Invalid token create response: {e}")))?;
        let expiry = created.token_info.map_or(0, |info| info.expiry_time);
        info!("Obtained workspace access token");
        Ok(CachedToken::expires_at_millis(created.token_value, expiry))
    }

    /// Get a valid Azure AD token, refreshing if necessary
    async fn get_or_refresh_identity(&self, azure: &AzureAuth) -> Result<String> {
        {
            let cached = self.identity_token.read().await;
            if let Some(token) = cached.as_ref() {
                if !token.is_expired() {
                    return Ok(token.token.clone());
                }
            }
        }

        let mut cached = self.identity_token.write().await;
        if let Some(token) = cached.as_ref() {
            if !token.is_expired() {
                return Ok(token.token.clone());
            }
        }

        let token = if azure.is_client_secret_set() {
            self.fetch_client_secret_token(azure).await?
        } else {
            self.fetch_managed_identity_token(azure).await?
        };
        let value = token.token.clone();
        *cached = Some(token);
        Ok(value)
    }

    /// Client credentials grant against Azure AD
    async fn fetch_client_secret_token(&self, azure: &AzureAuth) -> Result<CachedToken> {
        let tenant = azure.tenant_id.as_deref().unwrap_or_default();
        let form = [
            ("grant_type", "client_credentials"),
            ("client_id", azure.client_id.as_deref().unwrap_or_default()),
            (
                "client_secret",
                azure.client_secret.as_deref().unwrap_or_default(),
            ),
            ("resource", azure.token_resource.as_str()),
        ];

        debug!(tenant = %tenant, "Requesting Azure AD token with client secret");
        let response = self
            .http_client
            .post(format!(
                "{}/{tenant}/oauth2/token",
                azure.login_endpoint.trim_end_matches('/')
            ))
            .form(&form)
            .send()
            .await
            .map_err(|e| Error::auth(format!("Azure AD token request failed: {e}")))?;

        read_identity_response(response).await
    }

    /// Token from the instance metadata service
    async fn fetch_managed_identity_token(&self, azure: &AzureAuth) -> Result<CachedToken> {
        debug!("Requesting Azure AD token from managed identity");
        let response = self
            .http_client
            .get(&azure.msi_endpoint)
            .query(&[
                ("api-version", MSI_API_VERSION),
                ("resource", azure.token_resource.as_str()),
            ])
            .header("Metadata", "true")
            .send()
            .await
            .map_err(|e| Error::auth(format!("Managed identity token request failed: {e}")))?;

        read_identity_response(response).await
    }

    /// Look up the workspace URL of the resource through the management API
    async fn discover_workspace_url(&self, azure: &AzureAuth) -> Result<String> {
        let resource_id = azure
            .resource_id()
            .ok_or_else(|| Error::config("Azure workspace resource id is not configured"))?;
        let identity = self.get_or_refresh_identity(azure).await?;

        debug!(resource_id = %resource_id, "Discovering workspace URL");
        let response = self
            .http_client
            .get(format!(
                "{}{resource_id}",
                azure.management_endpoint.trim_end_matches('/')
            ))
            .query(&[("api-version", WORKSPACE_API_VERSION)])
            .bearer_auth(identity)
            .send()
            .await
            .map_err(|e| Error::auth(format!("Workspace lookup failed: {e}")))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::auth(format!(
                "Workspace lookup failed with status {status}: {body}"
            )));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| Error::auth(format!("Invalid workspace lookup response: {e}")))?;
        let url = body
            .pointer("/properties/workspaceUrl")
            .and_then(Value::as_str)
            .ok_or_else(|| Error::auth("Workspace lookup response has no workspaceUrl"))?;

        let host = normalize_host(url);
        info!(host = %host, "Discovered workspace URL");
        Ok(host)
    }
}

async fn read_identity_response(response: reqwest::Response) -> Result<CachedToken> {
    if !response.status().is_success() {
        let status = response.status().as_u16();
        let body = response.text().await.unwrap_or_default();
        return Err(Error::auth(format!(
            "Azure AD token request failed with status {status}: {body}"
        )));
    }

    let token: IdentityTokenResponse = response
        .json()
        .await
        .map_err(|e| Error::auth(format!("Invalid Azure AD token response: {e}")))?;
    Ok(match token.expires_in {
        Some(secs) => CachedToken::expires_in(token.access_token, secs),
        None => CachedToken::new(token.access_token, None),
    })
}

/// Add a scheme to bare hostnames and drop trailing slashes
pub(crate) fn normalize_host(host: &str) -> String {
    let host = host.trim().trim_end_matches('/');
    if host.contains("://") {
        host.to_string()
    } else {
        format!("https://{host}")
    }
}

/// Azure AD token response
#[derive(Debug, Deserialize)]
struct IdentityTokenResponse {
    access_token: String,
    #[serde(default, deserialize_with = "lenient_seconds")]
    expires_in: Option<i64>,
}

/// Workspace token create response
#[derive(Debug, Deserialize)]
struct TokenCreateResponse {
    token_value: String,
    #[serde(default)]
    token_info: Option<TokenInfo>,
}

#[derive(Debug, Deserialize)]
struct TokenInfo {
    /// Milliseconds since the epoch
    #[serde(default)]
    expiry_time: i64,
}

/// Azure AD returns `expires_in` as a number or a numeric string
fn lenient_seconds<'de, D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Option<i64>, D::Error> {
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        Some(Value::Number(n)) => n.as_i64(),
        Some(Value::String(s)) => s.parse().ok(),
        _ => None,
    })
}

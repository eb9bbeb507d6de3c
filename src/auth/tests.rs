//! Tests for the auth module

use super::*;
use crate::error::Error;
use base64::Engine;
use chrono::Utc;
use futures::future::join_all;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

const RESOURCE_ID: &str = "/a/b/c";

fn token_config(token: &str) -> AuthConfig {
    AuthConfig {
        host: Some("https://example.cloud.databricks.com".to_string()),
        token: Some(token.to_string()),
        ..AuthConfig::default()
    }
}

fn azure_config(server: &MockServer) -> AuthConfig {
    AuthConfig {
        host: Some(server.uri()),
        azure: AzureAuth {
            resource_id: Some(RESOURCE_ID.to_string()),
            client_id: Some("app".to_string()),
            client_secret: Some("shh".to_string()),
            tenant_id: Some("tenant".to_string()),
            login_endpoint: server.uri(),
            management_endpoint: server.uri(),
            ..AzureAuth::default()
        },
        ..AuthConfig::default()
    }
}

fn future_millis(seconds: i64) -> i64 {
    (Utc::now() + chrono::Duration::seconds(seconds)).timestamp_millis()
}

async fn mount_identity(server: &MockServer, calls: u64) {
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/token"))
        .and(body_string_contains("grant_type=client_credentials"))
        .and(body_string_contains("client_id=app"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "aad-token",
            "expires_in": "3599",
            "token_type": "Bearer"
        })))
        .expect(calls)
        .mount(server)
        .await;
}

fn token_create_response(token: &str, expiry_time: i64) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(serde_json::json!({
        "token_value": token,
        "token_info": {
            "token_id": "qwertyu",
            "creation_time": 1_234_567,
            "expiry_time": expiry_time
        }
    }))
}

async fn authorization(auth: &Authenticator) -> crate::error::Result<String> {
    let req = reqwest::Client::new().get("https://example.com/api");
    let built = auth.sign_request(req).await?.build()?;
    Ok(built
        .headers()
        .get("Authorization")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string())
}

// ============================================================================
// Strategy resolution
// ============================================================================

#[test]
fn test_resolve_token() {
    let credential = Credential::resolve(&token_config("dapi123")).unwrap();
    assert_eq!(credential.kind(), "token");
}

#[test]
fn test_resolve_basic() {
    let config = AuthConfig {
        username: Some("admin".to_string()),
        password: Some("pw".to_string()),
        ..AuthConfig::default()
    };
    assert_eq!(Credential::resolve(&config).unwrap().kind(), "basic");
}

#[test]
fn test_resolve_azure_from_parts() {
    let config = AuthConfig {
        azure: AzureAuth {
            subscription_id: Some("a".to_string()),
            resource_group: Some("b".to_string()),
            workspace_name: Some("c".to_string()),
            ..AzureAuth::default()
        },
        ..AuthConfig::default()
    };
    assert_eq!(Credential::resolve(&config).unwrap().kind(), "azure");
}

#[test]
fn test_resolve_two_full_strategies_is_ambiguous() {
    let mut config = token_config("dapi123");
    config.username = Some("admin".to_string());
    config.password = Some("pw".to_string());

    let err = Credential::resolve(&config).unwrap_err();
    assert!(matches!(err, Error::AmbiguousCredentials { .. }));
    assert!(err.to_string().contains("token, basic"));
}

#[test]
fn test_resolve_full_strategy_wins_over_partial() {
    let mut config = token_config("dapi123");
    config.username = Some("admin".to_string());
    assert_eq!(Credential::resolve(&config).unwrap().kind(), "token");
}

#[test]
fn test_resolve_single_partial_names_missing_settings() {
    let config = AuthConfig {
        azure: AzureAuth {
            subscription_id: Some("a".to_string()),
            client_id: Some("app".to_string()),
            ..AzureAuth::default()
        },
        ..AuthConfig::default()
    };
    let err = Credential::resolve(&config).unwrap_err();
    assert!(matches!(err, Error::Config { .. }));
    let message = err.to_string();
    assert!(message.contains("resource_group"));
    assert!(message.contains("workspace_name"));
    assert!(message.contains("client_secret"));
    assert!(message.contains("tenant_id"));
}

#[test]
fn test_resolve_several_partials_is_ambiguous() {
    let config = AuthConfig {
        username: Some("admin".to_string()),
        azure: AzureAuth {
            subscription_id: Some("a".to_string()),
            ..AzureAuth::default()
        },
        ..AuthConfig::default()
    };
    assert!(matches!(
        Credential::resolve(&config),
        Err(Error::AmbiguousCredentials { .. })
    ));
}

#[test]
fn test_resolve_nothing_configured() {
    assert!(matches!(
        Credential::resolve(&AuthConfig::default()),
        Err(Error::Config { .. })
    ));
}

#[test]
fn test_token_without_host_fails_fast() {
    let config = AuthConfig {
        token: Some("dapi123".to_string()),
        ..AuthConfig::default()
    };
    assert!(matches!(
        Authenticator::new(config),
        Err(Error::MissingConfigField { .. })
    ));
}

// ============================================================================
// Static strategies
// ============================================================================

#[tokio::test]
async fn test_bearer_auth() {
    let auth = Authenticator::new(token_config("my-bearer-token")).unwrap();
    assert_eq!(
        authorization(&auth).await.unwrap(),
        "Bearer my-bearer-token"
    );
    assert_eq!(auth.state().await, AuthState::Authenticated);
    assert_eq!(
        auth.host().await.unwrap(),
        "https://example.cloud.databricks.com"
    );
}

#[tokio::test]
async fn test_basic_auth() {
    let auth = Authenticator::new(AuthConfig {
        host: Some("example.cloud.databricks.com/".to_string()),
        username: Some("user".to_string()),
        password: Some("pass".to_string()),
        ..AuthConfig::default()
    })
    .unwrap();

    let auth_header = authorization(&auth).await.unwrap();
    assert!(auth_header.starts_with("Basic "));

    let encoded = auth_header.strip_prefix("Basic ").unwrap();
    let decoded = base64::engine::general_purpose::STANDARD
        .decode(encoded)
        .unwrap();
    assert_eq!(String::from_utf8(decoded).unwrap(), "user:pass");

    assert_eq!(
        auth.host().await.unwrap(),
        "https://example.cloud.databricks.com"
    );
}

// ============================================================================
// Azure identity exchange
// ============================================================================

#[tokio::test]
async fn test_azure_exchange_headers() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .and(header("Authorization", "Bearer aad-token"))
        .and(header("X-Databricks-Azure-SP-Management-Token", "aad-token"))
        .and(header("X-Databricks-Azure-Workspace-Resource-Id", RESOURCE_ID))
        .and(body_string_contains("lifetime_seconds"))
        .respond_with(token_create_response("dapi234567", future_millis(3600)))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(azure_config(&server)).unwrap();
    assert_eq!(auth.state().await, AuthState::Unconfigured);

    assert_eq!(authorization(&auth).await.unwrap(), "Bearer dapi234567");
    assert_eq!(auth.state().await, AuthState::Authenticated);
}

#[tokio::test]
async fn test_azure_single_flight() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(
            token_create_response("dapi-shared", future_millis(3600))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let auth = Arc::new(Authenticator::new(azure_config(&server)).unwrap());
    let callers = (0..10).map(|_| {
        let auth = Arc::clone(&auth);
        async move { authorization(&auth).await }
    });

    for result in join_all(callers).await {
        assert_eq!(result.unwrap(), "Bearer dapi-shared");
    }
}

#[tokio::test]
async fn test_azure_token_reuse() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(token_create_response("dapi-cached", future_millis(3600)))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(azure_config(&server)).unwrap();
    for _ in 0..3 {
        assert_eq!(authorization(&auth).await.unwrap(), "Bearer dapi-cached");
    }
}

#[tokio::test]
async fn test_azure_token_without_expiry_never_refreshes() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(token_create_response("dapi-forever", 0))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(azure_config(&server)).unwrap();
    authorization(&auth).await.unwrap();
    authorization(&auth).await.unwrap();
    assert_eq!(auth.state().await, AuthState::Authenticated);
}

#[tokio::test]
async fn test_azure_expired_token_is_refreshed() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;

    // inside the 30 second buffer, so every call refreshes
    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(token_create_response("dapi-short", future_millis(10)))
        .expect(2)
        .mount(&server)
        .await;

    let auth = Authenticator::new(azure_config(&server)).unwrap();
    authorization(&auth).await.unwrap();
    assert_eq!(auth.state().await, AuthState::Expired);
    authorization(&auth).await.unwrap();
}

#[tokio::test]
async fn test_azure_failure_clears_cache_and_recovers() {
    let server = MockServer::start().await;
    mount_identity(&server, 2).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(token_create_response("dapi-second", future_millis(3600)))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(azure_config(&server)).unwrap();

    let err = authorization(&auth).await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
    assert!(err.to_string().contains("500"));
    assert_eq!(auth.state().await, AuthState::Unconfigured);

    assert_eq!(authorization(&auth).await.unwrap(), "Bearer dapi-second");
}

#[tokio::test]
async fn test_azure_identity_failure_is_auth_error() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/tenant/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_json(serde_json::json!({
            "error": "invalid_client"
        })))
        .mount(&server)
        .await;

    let auth = Authenticator::new(azure_config(&server)).unwrap();
    let err = authorization(&auth).await.unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
    assert!(err.to_string().contains("401"));
}

#[tokio::test]
async fn test_azure_managed_identity() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metadata/identity/oauth2/token"))
        .and(header("Metadata", "true"))
        .and(query_param("resource", DEFAULT_TOKEN_RESOURCE))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "msi-token",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .and(header("Authorization", "Bearer msi-token"))
        .respond_with(token_create_response("dapi-msi", future_millis(3600)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = azure_config(&server);
    config.azure.client_id = None;
    config.azure.client_secret = None;
    config.azure.tenant_id = None;
    config.azure.msi_endpoint = format!("{}/metadata/identity/oauth2/token", server.uri());

    let auth = Authenticator::new(config).unwrap();
    assert_eq!(authorization(&auth).await.unwrap(), "Bearer dapi-msi");
}

#[tokio::test]
async fn test_workspace_url_discovered_once() {
    let server = MockServer::start().await;
    mount_identity(&server, 1).await;

    Mock::given(method("GET"))
        .and(path(RESOURCE_ID))
        .and(query_param("api-version", "2018-04-01"))
        .and(header("Authorization", "Bearer aad-token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "properties": {"workspaceUrl": server.uri()}
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(token_create_response("dapi-discovered", future_millis(3600)))
        .expect(1)
        .mount(&server)
        .await;

    let mut config = azure_config(&server);
    config.host = None;
    let auth = Authenticator::new(config).unwrap();

    assert_eq!(auth.host().await.unwrap(), server.uri());
    assert_eq!(auth.host().await.unwrap(), server.uri());
    assert_eq!(authorization(&auth).await.unwrap(), "Bearer dapi-discovered");
}

#[tokio::test]
async fn test_clear_cache() {
    let server = MockServer::start().await;
    mount_identity(&server, 2).await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/token/create"))
        .respond_with(token_create_response("dapi", future_millis(3600)))
        .expect(2)
        .mount(&server)
        .await;

    let auth = Authenticator::new(azure_config(&server)).unwrap();
    authorization(&auth).await.unwrap();

    auth.clear_cache().await;
    assert_eq!(auth.state().await, AuthState::Unconfigured);

    authorization(&auth).await.unwrap();
}

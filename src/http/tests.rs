//! Tests for the HTTP transport module

use super::*;
use crate::auth::AuthConfig;
use crate::error::Error;
use crate::types::{BackoffType, Method};
use serde_json::{json, Value};
use std::time::Duration;
use test_case::test_case;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn token_auth(host: &str) -> AuthConfig {
    AuthConfig {
        host: Some(host.to_string()),
        token: Some("dapi-test".to_string()),
        ..AuthConfig::default()
    }
}

fn fast_config() -> ClientConfig {
    ClientConfig::builder()
        .max_retries(2)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(10),
            Duration::from_secs(1),
        )
        .no_rate_limit()
        .build()
}

fn client_for(server: &MockServer) -> ApiClient {
    ApiClient::new(fast_config(), token_auth(&server.uri())).unwrap()
}

#[test]
fn test_client_config_default() {
    let config = ClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(60));
    assert_eq!(config.max_retries, 3);
    assert_eq!(config.rate_limit, Some(RateLimiterConfig::per_second(15)));
    assert!(!config.insecure_skip_verify);
    assert!(config.user_agent.starts_with("dbx-provider/"));
}

#[test]
fn test_client_config_builder() {
    let config = ClientConfig::builder()
        .timeout(Duration::from_secs(5))
        .max_retries(5)
        .backoff(
            BackoffType::Linear,
            Duration::from_millis(200),
            Duration::from_secs(30),
        )
        .insecure_skip_verify(true)
        .proxy("http://proxy.internal:3128")
        .header("X-Custom", "value")
        .user_agent("test-agent/1.0")
        .build();

    assert_eq!(config.timeout, Duration::from_secs(5));
    assert_eq!(config.max_retries, 5);
    assert_eq!(config.backoff_type, BackoffType::Linear);
    assert!(config.insecure_skip_verify);
    assert_eq!(
        config.proxy_url.as_deref(),
        Some("http://proxy.internal:3128")
    );
    assert_eq!(
        config.default_headers.get("X-Custom"),
        Some(&"value".to_string())
    );
    assert_eq!(config.user_agent, "test-agent/1.0");
}

#[test]
fn test_invalid_proxy_rejected() {
    let config = ClientConfig::builder().proxy("http://[::1").build();
    let result = ApiClient::new(config, token_auth("https://example.com"));
    assert!(matches!(
        result,
        Err(Error::InvalidConfigValue { ref field, .. }) if field == "proxy_url"
    ));
}

#[tokio::test]
async fn test_perform_query_composes_url_and_signs() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/1.2/commands/status"))
        .and(query_param("commandId", "42"))
        .and(header("Authorization", "Bearer dapi-test"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"status":"Finished"}"#))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let body = client
        .perform_query(Method::GET, "/commands/status", "1.2", &[("commandId", "42")], None)
        .await
        .unwrap();

    assert_eq!(&body[..], br#"{"status":"Finished"}"#);
}

#[tokio::test]
async fn test_typed_post_and_default_headers() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/preview/ip-access-lists"))
        .and(header("X-Custom", "value"))
        .and(body_json(json!({"label": "office"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc"})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ClientConfig::builder()
        .no_rate_limit()
        .header("X-Custom", "value")
        .build();
    let client = ApiClient::new(config, token_auth(&server.uri())).unwrap();

    let created: Value = client
        .post("/preview/ip-access-lists", &json!({"label": "office"}))
        .await
        .unwrap();
    assert_eq!(created["id"], "abc");
}

#[tokio::test]
async fn test_empty_body_decodes_as_unit_and_null() {
    let server = MockServer::start().await;

    Mock::given(method("PATCH"))
        .and(path("/api/2.0/things"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;
    Mock::given(method("DELETE"))
        .and(path("/api/2.0/things"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .mount(&server)
        .await;

    let client = client_for(&server);
    let patched: Value = client.patch("/things", &json!({})).await.unwrap();
    assert_eq!(patched, Value::Null);
    client.delete::<Value>("/things", None).await.unwrap();
}

#[tokio::test]
async fn test_api_error_is_structured() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/preview/ip-access-lists/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({
            "error_code": "RESOURCE_DOES_NOT_EXIST",
            "message": "Can't find an IP access list with id: missing."
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = client_for(&server);
    let err = client
        .get::<Value>("/preview/ip-access-lists/missing", &[])
        .await
        .unwrap_err();

    assert!(err.is_missing());
    match err {
        Error::Api {
            status,
            error_code,
            message,
        } => {
            assert_eq!(status, 404);
            assert_eq!(error_code, "RESOURCE_DOES_NOT_EXIST");
            assert!(message.contains("missing"));
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[test_case(400, "not json at all", "BAD_REQUEST", "not json at all" ; "plain text body")]
#[test_case(404, r#"{"detail":"User not found","status":"404"}"#, "NOT_FOUND", "User not found" ; "scim body")]
#[tokio::test]
async fn test_api_error_fallbacks(status: u16, body: &str, code: &str, expected_message: &str) {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/odd"))
        .respond_with(ResponseTemplate::new(status).set_body_string(body))
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get::<Value>("/odd", &[])
        .await
        .unwrap_err();
    match err {
        Error::Api {
            error_code,
            message,
            ..
        } => {
            assert_eq!(error_code, code);
            assert_eq!(message, expected_message);
        }
        other => panic!("unexpected error: {other:?}"),
    }
}

#[tokio::test]
async fn test_retry_on_500() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let result: Value = client_for(&server).get("/flaky", &[]).await.unwrap();
    assert_eq!(result["ok"], true);
}

#[tokio::test]
async fn test_retry_on_429_honours_retry_after() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/limited"))
        .respond_with(
            ResponseTemplate::new(429)
                .insert_header("retry-after", "0")
                .set_body_json(json!({"error_code": "TOO_MANY_REQUESTS", "message": "slow down"})),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/2.0/limited"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let result: Value = client_for(&server).get("/limited", &[]).await.unwrap();
    assert_eq!(result["ok"], true);
}

#[tokio::test]
async fn test_retries_exhausted_returns_last_api_error() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/down"))
        .respond_with(ResponseTemplate::new(503).set_body_json(json!({
            "error_code": "TEMPORARILY_UNAVAILABLE",
            "message": "maintenance"
        })))
        .expect(3)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .get::<Value>("/down", &[])
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Api { status: 503, .. }));
}

#[tokio::test]
async fn test_client_error_is_not_retried() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/api/2.0/bad"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({
            "error_code": "INVALID_PARAMETER_VALUE",
            "message": "bad"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let err = client_for(&server)
        .post::<_, Value>("/bad", &json!({}))
        .await
        .unwrap_err();
    assert!(!err.is_retryable());
}

#[tokio::test]
async fn test_timeout_is_retried_then_reported() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .expect(2)
        .mount(&server)
        .await;

    let config = ClientConfig::builder()
        .timeout(Duration::from_millis(50))
        .max_retries(1)
        .backoff(
            BackoffType::Constant,
            Duration::from_millis(1),
            Duration::from_millis(1),
        )
        .no_rate_limit()
        .build();
    let client = ApiClient::new(config, token_auth(&server.uri())).unwrap();

    let err = client.get::<Value>("/slow", &[]).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_ms: 50 }));
}

#[tokio::test]
async fn test_with_rate_limiter() {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/2.0/data"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(3)
        .mount(&server)
        .await;

    let config = ClientConfig::builder()
        .rate_limit(RateLimiterConfig::per_second(100).burst(10))
        .build();
    let client = ApiClient::new(config, token_auth(&server.uri())).unwrap();

    for _ in 0..3 {
        let _: Value = client.get("/data", &[]).await.unwrap();
    }
}

#[test_case(BackoffType::Constant, &[100, 100, 100] ; "constant")]
#[test_case(BackoffType::Linear, &[100, 200, 300] ; "linear")]
#[test_case(BackoffType::Exponential, &[100, 200, 400] ; "exponential")]
fn test_calculate_backoff(backoff: BackoffType, expected_ms: &[u64]) {
    let config = ClientConfig::builder()
        .backoff(backoff, Duration::from_millis(100), Duration::from_secs(10))
        .no_rate_limit()
        .build();
    let client = ApiClient::new(config, token_auth("https://example.com")).unwrap();

    for (attempt, ms) in expected_ms.iter().enumerate() {
        assert_eq!(
            client.calculate_backoff(u32::try_from(attempt).unwrap()),
            Duration::from_millis(*ms)
        );
    }
}

#[test]
fn test_calculate_backoff_respects_max() {
    let config = ClientConfig::builder()
        .backoff(
            BackoffType::Exponential,
            Duration::from_millis(100),
            Duration::from_millis(500),
        )
        .no_rate_limit()
        .build();
    let client = ApiClient::new(config, token_auth("https://example.com")).unwrap();
    assert_eq!(client.calculate_backoff(10), Duration::from_millis(500));
}

#[test]
fn test_client_debug_hides_token() {
    let client = ApiClient::new(fast_config(), token_auth("https://example.com")).unwrap();
    let shown = format!("{client:?}");
    assert!(shown.contains("ApiClient"));
    assert!(!shown.contains("dapi-test"));
}

//! Tests for the HTTP client module

use super::*;
use crate::auth::AuthConfig;
use crate::Error;
use serde_json::{json, Value};
use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use wiremock::matchers::{header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn fast_config(uri: String) -> HttpClientConfig {
    HttpClientConfig::builder()
        .base_url(uri)
        .max_attempts(3)
        .backoff(Duration::from_millis(10), Duration::from_secs(1))
        .build()
}

#[test]
fn test_http_client_config_default() {
    let config = HttpClientConfig::default();
    assert_eq!(config.timeout, Duration::from_secs(30));
    assert_eq!(config.max_attempts, 3);
    assert_eq!(config.backoff_unit, Duration::from_secs(1));
    assert!(config.base_url.is_none());
    assert!(config.rate_limit.is_none());
    assert!(!config.retry_client_errors);
}

#[test]
fn test_request_config_query_values() {
    let mut params = BTreeMap::new();
    params.insert("IDSociete".to_string(), json!(3));
    params.insert("ACTION".to_string(), json!("INSCRIT"));

    let config = RequestConfig::new().query_values(&params);
    assert_eq!(config.query.get("IDSociete"), Some(&"3".to_string()));
    assert_eq!(config.query.get("ACTION"), Some(&"INSCRIT".to_string()));
}

#[tokio::test]
async fn test_get_json_with_query_and_basic_auth() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/SofiaEDC/API/Entite/GetEntite"))
        .and(query_param("IDSociete", "2"))
        .and(header("Authorization", "Basic dXNlcjpwYXNz"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{"id": 1}])))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client =
        HttpClient::with_auth(fast_config(mock_server.uri()), AuthConfig::basic("user", "pass"))
            .unwrap();
    let body: Value = client
        .get_json(
            "/SofiaEDC/API/Entite/GetEntite",
            RequestConfig::new().query("IDSociete", "2"),
        )
        .await
        .unwrap();

    assert_eq!(body, json!([{"id": 1}]));
}

#[tokio::test]
async fn test_retry_on_500_then_success() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(2)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let body: Value = client.get_json("/api/flaky", RequestConfig::new()).await.unwrap();

    assert_eq!(body["ok"], true);
}

#[tokio::test]
async fn test_attempts_exhausted() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/down"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let err = client
        .get_json::<Value>("/api/down", RequestConfig::new())
        .await
        .unwrap_err();

    assert!(matches!(err, Error::MaxRetriesExceeded { max_attempts: 3 }));
}

#[tokio::test]
async fn test_client_error_not_retried_by_default() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/datasets/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Not found"))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let err = client
        .get_json::<Value>("/datasets/missing", RequestConfig::new())
        .await
        .unwrap_err();

    match err {
        Error::HttpStatus { status, body } => {
            assert_eq!(status, 404);
            assert_eq!(body, "Not found");
        }
        other => panic!("Expected HttpStatus, got {other:?}"),
    }
}

#[tokio::test]
async fn test_client_error_retried_when_enabled() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/forbidden"))
        .respond_with(ResponseTemplate::new(403))
        .expect(2)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .max_attempts(2)
        .backoff(Duration::from_millis(5), Duration::from_secs(1))
        .retry_client_errors(true)
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let result = client
        .get_json::<Value>("/api/forbidden", RequestConfig::new())
        .await;
    assert!(result.is_err());
}

#[tokio::test]
async fn test_non_json_body_is_a_failed_attempt() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/html"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>maintenance</html>"))
        .up_to_n_times(1)
        .mount(&mock_server)
        .await;

    Mock::given(method("GET"))
        .and(path("/api/html"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let body: Value = client.get_json("/api/html", RequestConfig::new()).await.unwrap();
    assert_eq!(body, json!([]));
}

#[tokio::test]
async fn test_backoff_waits_between_attempts_only() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/api/down"))
        .respond_with(ResponseTemplate::new(500))
        .expect(3)
        .mount(&mock_server)
        .await;

    let config = HttpClientConfig::builder()
        .base_url(mock_server.uri())
        .max_attempts(3)
        .backoff(Duration::from_millis(100), Duration::from_secs(10))
        .build();
    let client = HttpClient::with_config(config).unwrap();

    let started = Instant::now();
    let _ = client
        .get_json::<Value>("/api/down", RequestConfig::new())
        .await;
    let elapsed = started.elapsed();

    // 100ms after the first attempt, 200ms after the second, none after the last
    assert!(elapsed >= Duration::from_millis(300));
    assert!(elapsed < Duration::from_millis(700));
}

#[tokio::test]
async fn test_raw_body_post() {
    let mock_server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/upload"))
        .and(header("Content-Type", "application/x-ndjson"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"done": true})))
        .expect(1)
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config(mock_server.uri())).unwrap();
    let body: Value = client
        .post_json(
            "/upload",
            RequestConfig::new().raw("application/x-ndjson", "{\"a\":1}\n"),
        )
        .await
        .unwrap();
    assert_eq!(body["done"], true);
}

#[tokio::test]
async fn test_full_url_bypasses_base() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/absolute"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .mount(&mock_server)
        .await;

    let client = HttpClient::with_config(fast_config("http://unused.invalid".to_string())).unwrap();
    let body = client
        .request(
            reqwest::Method::GET,
            &format!("{}/absolute", mock_server.uri()),
            RequestConfig::new(),
        )
        .await
        .unwrap();
    assert_eq!(&body[..], b"ok");
}

#[test]
fn test_calculate_backoff_exponential() {
    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .backoff(Duration::from_secs(1), Duration::from_secs(60))
            .build(),
    )
    .unwrap();

    assert_eq!(client.calculate_backoff(0), Duration::from_secs(1));
    assert_eq!(client.calculate_backoff(1), Duration::from_secs(2));
    assert_eq!(client.calculate_backoff(2), Duration::from_secs(4));
    assert_eq!(client.calculate_backoff(10), Duration::from_secs(60));
}

#[test]
fn test_http_client_with_rate_limiter() {
    let client = HttpClient::with_config(
        HttpClientConfig::builder()
            .rate_limit(RateLimiterConfig::new(5, 1))
            .build(),
    )
    .unwrap();
    assert!(format!("{client:?}").contains("has_rate_limiter: true"));
}

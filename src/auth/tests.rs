//! Tests for the auth module

use super::*;
use crate::Error;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const TEST_KEY: &str = include_str!("../../tests/fixtures/test_rsa_key.pem");

fn service_account(token_uri: String) -> AuthConfig {
    AuthConfig::service_account(ServiceAccountKey {
        client_email: "loader@analytics.iam.gserviceaccount.com".to_string(),
        private_key: TEST_KEY.to_string(),
        private_key_id: Some("k1".to_string()),
        token_uri,
    })
}

#[tokio::test]
async fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    let client = reqwest::Client::new();
    let req = auth.apply(client.get("https://example.com/api")).await.unwrap();

    let built = req.build().unwrap();
    assert!(built.headers().get("Authorization").is_none());
}

#[tokio::test]
async fn test_basic_auth() {
    let auth = Authenticator::new(AuthConfig::basic("user", "pass"));

    let client = reqwest::Client::new();
    let req = auth.apply(client.get("https://example.com/api")).await.unwrap();

    let built = req.build().unwrap();
    // base64("user:pass")
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Basic dXNlcjpwYXNz"
    );
}

#[tokio::test]
async fn test_bearer_auth() {
    let auth = Authenticator::new(AuthConfig::Bearer {
        token: "ya29.static".to_string(),
    });

    let client = reqwest::Client::new();
    let req = auth.apply(client.get("https://example.com/api")).await.unwrap();

    let built = req.build().unwrap();
    assert_eq!(
        built.headers().get("Authorization").unwrap(),
        "Bearer ya29.static"
    );
}

#[tokio::test]
async fn test_service_account_exchange_is_cached() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .and(body_string_contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"))
        .and(body_string_contains("assertion="))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "access_token": "ya29.exchanged",
            "expires_in": 3599,
            "token_type": "Bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let auth = Authenticator::new(service_account(format!("{}/token", server.uri())));
    let client = reqwest::Client::new();

    for _ in 0..2 {
        let req = auth.apply(client.get("https://example.com/api")).await.unwrap();
        let built = req.build().unwrap();
        assert_eq!(
            built.headers().get("Authorization").unwrap(),
            "Bearer ya29.exchanged"
        );
    }
}

#[tokio::test]
async fn test_service_account_exchange_rejected() {
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(path("/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let auth = Authenticator::new(service_account(format!("{}/token", server.uri())));
    let client = reqwest::Client::new();

    let err = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Auth { .. }));
    assert!(err.to_string().contains("invalid_grant"));
}

#[tokio::test]
async fn test_service_account_bad_key() {
    let auth = Authenticator::new(AuthConfig::service_account(ServiceAccountKey {
        client_email: "loader@analytics.iam.gserviceaccount.com".to_string(),
        private_key: "not a pem".to_string(),
        private_key_id: None,
        token_uri: "http://127.0.0.1:9/token".to_string(),
    }));
    let client = reqwest::Client::new();

    let err = auth
        .apply(client.get("https://example.com/api"))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::JwtGeneration { .. }));
}

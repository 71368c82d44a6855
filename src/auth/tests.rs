//! Tests for the auth module

use super::*;
use pretty_assertions::assert_eq;
use serde_json::json;

#[test]
fn test_no_auth() {
    let auth = Authenticator::new(AuthConfig::None);
    assert!(auth.headers().is_empty());
    assert!(auth.query_params().is_empty());
    assert!(auth.config().is_none());
}

#[test]
fn test_bearer_header() {
    let auth = Authenticator::new(AuthConfig::bearer("tok-1"));
    assert_eq!(
        auth.headers().get("Authorization"),
        Some(&"Bearer tok-1".to_string())
    );
    assert!(auth.query_params().is_empty());
}

#[test]
fn test_api_key_header() {
    let auth = Authenticator::new(AuthConfig::api_key_header("test-key-123"));
    assert_eq!(
        auth.headers().get("X-API-Key"),
        Some(&"test-key-123".to_string())
    );
    assert!(auth.query_params().is_empty());
}

#[test]
fn test_api_key_query() {
    let auth = Authenticator::new(AuthConfig::api_key_query("secret", "token"));
    assert!(auth.headers().is_empty());
    assert_eq!(auth.query_params().get("token"), Some(&json!("secret")));
}

#[test]
fn test_basic_auth_applied_to_request() {
    let auth = Authenticator::new(AuthConfig::basic("user", "pass"));
    assert!(auth.headers().is_empty());

    let client = reqwest::Client::new();
    let req = auth.apply(client.get("https://example.com/api"));
    let built = req.build().unwrap();
    let value = built.headers().get("Authorization").unwrap().to_str().unwrap();
    assert_eq!(value, "Basic dXNlcjpwYXNz");
}

#[test]
fn test_non_basic_apply_is_passthrough() {
    let auth = Authenticator::new(AuthConfig::bearer("tok"));
    let client = reqwest::Client::new();
    let built = auth
        .apply(client.get("https://example.com/api"))
        .build()
        .unwrap();
    assert!(built.headers().get("Authorization").is_none());
}

#[test]
fn test_deserialize_tagged() {
    let auth: AuthConfig = serde_yaml::from_str("type: bearer\ntoken: abc").unwrap();
    assert_eq!(auth, AuthConfig::bearer("abc"));

    let auth: AuthConfig = serde_yaml::from_str("type: api_key\nkey: k").unwrap();
    assert_eq!(auth, AuthConfig::api_key_header("k"));

    let auth: AuthConfig =
        serde_yaml::from_str("type: api_key\nkey: k\nlocation: query\nquery_param: apikey").unwrap();
    assert_eq!(auth, AuthConfig::api_key_query("k", "apikey"));

    let auth: AuthConfig = serde_yaml::from_str("type: none").unwrap();
    assert_eq!(auth.type_name(), "none");
}

#[test]
fn test_unknown_auth_type_rejected() {
    let result: std::result::Result<AuthConfig, _> = serde_yaml::from_str("type: oauth9\ntoken: x");
    assert!(result.is_err());
}

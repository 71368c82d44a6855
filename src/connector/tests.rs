//! Tests for the connector module

use super::*;
use crate::auth::AuthConfig;
use crate::config::{ConnectorConfig, EndpointConfig, PaginationSpec};
use crate::error::{ErrorCategory, MAX_ERROR_BODY_CHARS};
use crate::ratelimit::RateLimitSpec;
use crate::sleep::RecordingSleeper;
use crate::types::{JsonValue, Method, ValueMap};
use pretty_assertions::assert_eq;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn build(config: ConnectorConfig, sleeper: &RecordingSleeper) -> ApiConnector {
    ApiConnector::builder(config)
        .sleeper(Arc::new(sleeper.clone()))
        .build()
        .unwrap()
}

fn params(pairs: &[(&str, JsonValue)]) -> ValueMap {
    pairs
        .iter()
        .map(|(k, v)| ((*k).to_string(), v.clone()))
        .collect()
}

// ============================================================================
// Request preparation
// ============================================================================

#[test]
fn test_prepare_request_merges_headers_and_params() {
    let config = ConnectorConfig::builder("https://api.example.com/v1/")
        .auth(AuthConfig::bearer("secret"))
        .header("X-Client", "default")
        .header("X-Shared", "default")
        .header("Authorization", "ignored")
        .endpoint(
            "users",
            EndpointConfig::new("/users")
                .header("X-Shared", "endpoint")
                .param("limit", 10)
                .param("sort", "name"),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let request = connector
        .prepare_request("users", Some(&params(&[("limit", json!(50))])))
        .unwrap();

    assert_eq!(request.url, "https://api.example.com/v1/users");
    assert_eq!(request.method, Method::GET);
    assert_eq!(request.headers["X-Client"], "default");
    assert_eq!(request.headers["X-Shared"], "endpoint");
    assert_eq!(request.headers["Authorization"], "Bearer secret");
    assert_eq!(request.params["limit"], json!(50));
    assert_eq!(request.params["sort"], json!("name"));
    assert!(request.json.is_none());
}

#[test]
fn test_prepare_request_header_names_ignore_case() {
    let config = ConnectorConfig::builder("https://api.example.com")
        .auth(AuthConfig::bearer("secret"))
        .header("authorization", "Token stale")
        .header("x-trace", "default")
        .endpoint(
            "users",
            EndpointConfig::new("/users").header("X-Trace", "endpoint"),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let request = connector.prepare_request("users", None).unwrap();

    let names: Vec<&str> = request.headers.keys().map(String::as_str).collect();
    assert_eq!(names, vec!["Authorization", "X-Trace"]);
    assert_eq!(request.headers["Authorization"], "Bearer secret");
    assert_eq!(request.headers["X-Trace"], "endpoint");
}

#[test]
fn test_prepare_request_is_repeatable() {
    let config = ConnectorConfig::builder("https://api.example.com")
        .endpoint(
            "search",
            EndpointConfig::new("search")
                .method(Method::POST)
                .body_template(json!({"query": "*"})),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();
    let call = params(&[("q", json!("rust"))]);

    let first = connector.prepare_request("search", Some(&call)).unwrap();
    let second = connector.prepare_request("search", Some(&call)).unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_vec(&first).unwrap(),
        serde_json::to_vec(&second).unwrap()
    );
    assert_eq!(first.json, Some(json!({"query": "*"})));
}

#[test]
fn test_prepare_request_api_key_in_query_wins() {
    let config = ConnectorConfig::builder("https://api.example.com")
        .auth(AuthConfig::api_key_query("k-1", "api_key"))
        .endpoint("items", EndpointConfig::new("/items"))
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let request = connector
        .prepare_request("items", Some(&params(&[("api_key", json!("spoofed"))])))
        .unwrap();
    assert_eq!(request.params["api_key"], json!("k-1"));
    assert!(!request.headers.contains_key("X-API-Key"));
}

#[test]
fn test_unknown_endpoint() {
    let config = ConnectorConfig::builder("https://api.example.com")
        .endpoint("items", EndpointConfig::new("/items"))
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let err = connector.prepare_request("nope", None).unwrap_err();
    assert!(matches!(err, crate::Error::EndpointNotFound { .. }));
    assert!(err.is_config());
}

#[test]
fn test_invalid_base_url_rejected() {
    let config = ConnectorConfig::builder("not a url").build();
    let err = ApiConnector::new(config).unwrap_err();
    assert!(err.is_config());
}

#[test]
fn test_build_sse_request_headers() {
    let config = ConnectorConfig::builder("https://stream.example.com")
        .endpoint(
            "feed",
            EndpointConfig::new("/feed").header("accept", "application/x-ndjson"),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let fresh = connector.build_sse_request("feed", None, None).unwrap();
    assert_eq!(fresh.headers["accept"], "application/x-ndjson");
    assert!(!fresh.headers.contains_key("Accept"));
    assert_eq!(fresh.headers["Cache-Control"], "no-cache");
    assert!(!fresh.headers.contains_key("Last-Event-ID"));

    let resumed = connector
        .build_sse_request("feed", None, Some("evt-9"))
        .unwrap();
    assert_eq!(resumed.headers["Last-Event-ID"], "evt-9");
}

// ============================================================================
// Response processing
// ============================================================================

#[tokio::test]
async fn test_fetch_with_response_path() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/users"))
        .and(query_param("active", "true"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"users": [{"id": 1}, {"id": 2}]}
        })))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "users",
            EndpointConfig::new("/users")
                .param("active", true)
                .response_path("data.users"),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let data = connector.fetch_data("users", None).await.unwrap();
    assert_eq!(
        data,
        NormalizedData::List(vec![json!({"id": 1}), json!({"id": 2})])
    );
}

#[tokio::test]
async fn test_missing_response_path_returns_payload() {
    let server = MockServer::start().await;
    Mock::given(path("/users"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"rows": [1]})))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "users",
            EndpointConfig::new("/users").response_path("data.users"),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let data = connector.fetch_data("users", None).await.unwrap();
    assert_eq!(data.as_mapping().unwrap()["rows"], json!([1]));
}

#[tokio::test]
async fn test_scalar_response_is_wrapped() {
    let server = MockServer::start().await;
    Mock::given(path("/count"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!(42)))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint("count", EndpointConfig::new("/count"))
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let data = connector.fetch_data("count", None).await.unwrap();
    assert_eq!(data.into_value(), json!({"value": 42}));
}

#[tokio::test]
async fn test_response_schema_mismatch_is_not_an_error() {
    let server = MockServer::start().await;
    Mock::given(path("/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": "abc"})))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "user",
            EndpointConfig::new("/user").response_schema(json!({
                "type": "object",
                "properties": {"id": {"type": "integer"}}
            })),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let data = connector.fetch_data("user", None).await.unwrap();
    assert_eq!(data.as_mapping().unwrap()["id"], json!("abc"));
}

#[tokio::test]
async fn test_rate_limiter_sees_headers_of_failed_responses() {
    let server = MockServer::start().await;
    Mock::given(path("/limited"))
        .respond_with(
            ResponseTemplate::new(500)
                .insert_header("x-ratelimit-remaining", "7")
                .insert_header("x-ratelimit-limit", "10"),
        )
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .retry_count(1)
        .endpoint(
            "limited",
            EndpointConfig::new("/limited").rate_limit(RateLimitSpec::token_bucket(100.0, 10)),
        )
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    assert!(connector.fetch_data("limited", None).await.is_err());

    let limiter = connector.rate_limit_manager().get_limiter("limited").unwrap();
    assert_eq!(limiter.header_update_count(), 1);
    assert_eq!(limiter.hints().remaining, Some(7));
    assert_eq!(limiter.hints().limit, Some(10));
}

// ============================================================================
// Retries
// ============================================================================

#[tokio::test]
async fn test_fetch_retries_with_linear_backoff() {
    let server = MockServer::start().await;
    Mock::given(path("/flaky"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(path("/flaky"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .retry_count(3)
        .retry_delay(Duration::from_millis(500))
        .endpoint("flaky", EndpointConfig::new("/flaky"))
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    let data = connector.fetch_data("flaky", None).await.unwrap();
    assert_eq!(data.into_value(), json!({"ok": true}));
    assert_eq!(
        sleeper.calls(),
        vec![Duration::from_millis(500), Duration::from_millis(1000)]
    );
}

#[tokio::test]
async fn test_fetch_exhausted_raises_structured_error() {
    let server = MockServer::start().await;
    let body = "x".repeat(1500);
    Mock::given(path("/broken"))
        .respond_with(ResponseTemplate::new(500).set_body_string(body))
        .expect(3)
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint("broken", EndpointConfig::new("/broken"))
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    let call = params(&[("page", json!(1))]);
    let err = connector.fetch_data("broken", Some(&call)).await.unwrap_err();
    let api = err.as_api().unwrap();

    assert_eq!(api.category, ErrorCategory::Server);
    assert_eq!(api.status_code, Some(500));
    assert_eq!(
        api.response_body.as_ref().unwrap().chars().count(),
        MAX_ERROR_BODY_CHARS
    );
    assert_eq!(api.request_url.as_deref(), Some(format!("{}/broken", server.uri()).as_str()));
    assert_eq!(api.request_method.as_deref(), Some("GET"));
    assert_eq!(api.additional_context["endpoint"], json!("broken"));
    assert_eq!(api.additional_context["params"], json!({"page": 1}));
    assert_eq!(
        sleeper.calls(),
        vec![Duration::from_secs(1), Duration::from_secs(2)]
    );
}

#[tokio::test]
async fn test_fetch_authentication_failure_category() {
    let server = MockServer::start().await;
    Mock::given(path("/private"))
        .respond_with(ResponseTemplate::new(401))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .retry_count(1)
        .endpoint("private", EndpointConfig::new("/private"))
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    let err = connector.fetch_data("private", None).await.unwrap_err();
    assert_eq!(err.categorize(), (ErrorCategory::Authentication, Some(401)));
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn test_fetch_unknown_endpoint_is_not_retried() {
    let config = ConnectorConfig::builder("http://127.0.0.1:9")
        .endpoint("items", EndpointConfig::new("/items"))
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    let err = connector.fetch_data("missing", None).await.unwrap_err();
    assert!(err.is_config());
    assert_eq!(sleeper.count(), 0);
}

// ============================================================================
// Pagination
// ============================================================================

#[tokio::test]
async fn test_fetch_follows_next_token() {
    let server = MockServer::start().await;
    Mock::given(path("/items"))
        .and(query_param("cursor", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 2}]
        })))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 1}],
            "next": "abc"
        })))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "items",
            EndpointConfig::new("/items")
                .pagination(PaginationSpec::token("items", "next").page_param("cursor")),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let data = connector.fetch_data("items", None).await.unwrap();
    assert_eq!(
        data,
        NormalizedData::List(vec![json!({"id": 1}), json!({"id": 2})])
    );
}

#[tokio::test]
async fn test_fetch_page_counter_stops_at_max_pages() {
    let server = MockServer::start().await;
    Mock::given(path("/feed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "entries": ["a"]
        })))
        .expect(3)
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "feed",
            EndpointConfig::new("/feed").pagination(PaginationSpec::page_counter("entries", 3)),
        )
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let data = connector.fetch_data("feed", None).await.unwrap();
    assert_eq!(
        data,
        NormalizedData::List(vec![
            json!({"value": "a"}),
            json!({"value": "a"}),
            json!({"value": "a"})
        ])
    );
}

#[tokio::test]
async fn test_failed_page_keeps_collected_items() {
    let server = MockServer::start().await;
    Mock::given(path("/items"))
        .and(query_param("page", "p2"))
        .respond_with(ResponseTemplate::new(500))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(path("/items"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "items": [{"id": 1}],
            "next": "p2"
        })))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "items",
            EndpointConfig::new("/items").pagination(PaginationSpec::token("items", "next")),
        )
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    let data = connector.fetch_data("items", None).await.unwrap();
    assert_eq!(data, NormalizedData::List(vec![json!({"id": 1})]));
    assert_eq!(sleeper.count(), 0);
}

// ============================================================================
// Sending
// ============================================================================

#[tokio::test]
async fn test_send_batch_reports_partial_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/records"))
        .and(body_json(json!({"id": 2})))
        .respond_with(ResponseTemplate::new(422).set_body_string("bad record"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/records"))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"stored": true})))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint("records", EndpointConfig::new("/records").method(Method::POST))
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    let outcome = connector
        .send_data("records", json!([{"id": 1}, {"id": 2}, {"id": 3}]))
        .await
        .unwrap();

    let SendOutcome::Batch(report) = outcome else {
        panic!("expected a batch report");
    };
    assert!(!report.success);
    assert_eq!(report.sent_count, 2);
    assert_eq!(report.failed_count, 1);
    assert_eq!(report.results, vec![json!({"stored": true}), json!({"stored": true})]);

    let failure = &report.failures[0];
    assert_eq!(failure.category, ErrorCategory::Validation);
    assert_eq!(failure.status_code, Some(422));
    assert_eq!(failure.response_body.as_deref(), Some("bad record"));
    assert_eq!(failure.request_method.as_deref(), Some("POST"));
    assert_eq!(failure.additional_context["item_index"], json!(1));
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn test_send_single_with_empty_response() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/profile"))
        .and(header("content-type", "application/json"))
        .and(body_json(json!({"name": "Ada"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint("profile", EndpointConfig::new("/profile").method(Method::PUT))
        .build();
    let connector = ApiConnector::new(config).unwrap();

    let outcome = connector
        .send_data("profile", json!({"name": "Ada"}))
        .await
        .unwrap();
    assert!(outcome.is_success());
    assert_eq!(
        outcome,
        SendOutcome::Single {
            success: true,
            result: json!({})
        }
    );
}

#[tokio::test]
async fn test_send_request_schema_failure_sends_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "records",
            EndpointConfig::new("/records")
                .method(Method::POST)
                .request_schema(json!({"type": "object", "required": ["id"]})),
        )
        .build();
    let sleeper = RecordingSleeper::new();
    let connector = build(config, &sleeper);

    let err = connector
        .send_data("records", json!([{"id": 1}, {"name": "no id"}]))
        .await
        .unwrap_err();
    let api = err.as_api().unwrap();
    assert_eq!(api.category, ErrorCategory::Validation);
    assert_eq!(api.status_code, Some(0));
    assert_eq!(api.additional_context["endpoint"], json!("records"));
    assert!(api.additional_context["diffs"].as_array().is_some_and(|d| !d.is_empty()));
    assert_eq!(sleeper.count(), 0);
}

#[tokio::test]
async fn test_send_without_validator_skips_schema() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": 1})))
        .expect(1)
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri())
        .endpoint(
            "records",
            EndpointConfig::new("/records")
                .method(Method::POST)
                .request_schema(json!({"type": "object", "required": ["id"]})),
        )
        .build();
    let connector = ApiConnector::builder(config)
        .without_validation()
        .build()
        .unwrap();

    let outcome = connector.send_data("records", json!({"name": "x"})).await.unwrap();
    assert!(outcome.is_success());
}

// ============================================================================
// Health
// ============================================================================

#[tokio::test]
async fn test_check_health() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri()).build();
    let connector = ApiConnector::new(config).unwrap();

    let result = connector.check_health().await;
    assert!(result.is_healthy());
    assert_eq!(result.component, format!("connector:{}", server.uri()));
    assert_eq!(result.details["status_code"], json!(404));
    assert!(result.latency_ms >= 0.0);
}

#[tokio::test]
async fn test_check_health_server_error() {
    let server = MockServer::start().await;
    Mock::given(path("/"))
        .respond_with(ResponseTemplate::new(503))
        .mount(&server)
        .await;

    let config = ConnectorConfig::builder(server.uri()).build();
    let connector = ApiConnector::new(config).unwrap();

    let result = connector.check_health().await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert_eq!(result.message, "Server returned 503");
}

#[tokio::test]
async fn test_check_health_unreachable() {
    let port = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap().port()
    };
    let config = ConnectorConfig::builder(format!("http://127.0.0.1:{port}")).build();
    let connector = ApiConnector::new(config).unwrap();

    let result = connector.check_health().await;
    assert_eq!(result.status, HealthStatus::Unhealthy);
    assert!(result.details.is_empty());
}

// ============================================================================
// SSE connector
// ============================================================================

#[test]
fn test_sse_connector_defaults() {
    let connector = SseConnector::new("https://events.example.com").unwrap();
    assert_eq!(connector.default_endpoint(), DEFAULT_SSE_ENDPOINT);
    assert_eq!(connector.connector().connector_type(), "sse");

    let request = connector
        .connector()
        .build_sse_request(DEFAULT_SSE_ENDPOINT, None, None)
        .unwrap();
    assert_eq!(request.url, "https://events.example.com/events");
    assert_eq!(request.headers["Accept"], "text/event-stream");
    assert_eq!(request.headers["Cache-Control"], "no-cache");
}

#[test]
fn test_sse_connector_falls_back_to_first_endpoint() {
    let config = ConnectorConfig::builder("https://events.example.com")
        .endpoint("ticker", EndpointConfig::new("/ticker"))
        .endpoint("alerts", EndpointConfig::new("/alerts"))
        .build();
    let connector = SseConnector::from_connector(ApiConnector::new(config).unwrap()).unwrap();
    assert_eq!(connector.default_endpoint(), "alerts");

    let empty = ApiConnector::new(ConnectorConfig::builder("https://x.example.com").build()).unwrap();
    assert!(SseConnector::from_connector(empty).unwrap_err().is_config());
}

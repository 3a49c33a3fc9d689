mod support;

use std::collections::BTreeMap;
use std::sync::Arc;

use reqwest::Method;
use screenplay::{ApiAbility, ScreenplayError, SessionState};
use screenplay_common::{ApiConfig, ArtifactKind, AuthType};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use support::api_config;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

#[derive(Debug, Serialize)]
struct NewItem {
    display_name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Item {
    id: u64,
    display_name: String,
}

fn ability(config: ApiConfig) -> ApiAbility {
    ApiAbility::new(Arc::new(config), "Items api").unwrap()
}

#[tokio::test]
async fn test_post_records_exchange() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(body_json(json!({"displayName": "a"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "display_name": "a"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(api_config(dir.path(), &server.uri()));
    assert_eq!(api.state(), SessionState::Uninitialized);

    let item: Item = api
        .post(
            "/items",
            &NewItem {
                display_name: "a".to_string(),
            },
        )
        .await
        .unwrap();

    assert_eq!(item.id, 1);
    assert_eq!(item.display_name, "a");
    assert_eq!(api.state(), SessionState::Active);
    assert_eq!(api.last_status_code(), Some(201));
    assert_eq!(api.last_method(), Some("POST"));
    assert_eq!(api.last_url(), Some(format!("{}/items", server.uri()).as_str()));
    assert_eq!(api.last_request_body(), Some(r#"{"displayName":"a"}"#));
    assert_eq!(api.last_response_json().unwrap()["display_name"], "a");

    let kinds: Vec<ArtifactKind> = api.evidence().iter().map(|a| a.kind).collect();
    assert_eq!(kinds, vec![ArtifactKind::RequestLog, ArtifactKind::ResponseLog]);
    for artifact in api.evidence() {
        assert!(artifact.path.starts_with(dir.path().join("api").join("Items_api")));
        assert_eq!(artifact.step.as_deref(), Some("request_01"));
        assert!(artifact.sha256.is_some());
    }
    let request_log = std::fs::read_to_string(&api.evidence()[0].path).unwrap();
    assert!(request_log.contains("Method: POST"));
    assert!(request_log.contains("Status: 201"));
}

#[tokio::test]
async fn test_bearer_token_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/me"))
        .and(header("Authorization", "Bearer T"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"name": "me"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(ApiConfig {
        auth_type: AuthType::Bearer,
        bearer_token: Some("T".to_string()),
        ..api_config(dir.path(), &server.uri())
    });

    let me: Value = api.get("/me").await.unwrap();
    assert_eq!(me["name"], "me");
    assert_eq!(api.last_request_body(), None);
}

#[tokio::test]
async fn test_basic_auth_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/secure"))
        .and(header("Authorization", "Basic dTpw"))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(ApiConfig {
        auth_type: AuthType::Basic,
        basic_user: Some("u".to_string()),
        basic_password: Some("p".to_string()),
        ..api_config(dir.path(), &server.uri())
    });

    let body: Value = api.get("/secure").await.unwrap();
    assert_eq!(body, Value::Null);
    assert_eq!(api.last_status_code(), Some(204));

    let response_log = &api.evidence()[1].path;
    assert_eq!(std::fs::read_to_string(response_log).unwrap(), "null");
}

#[tokio::test]
async fn test_default_and_extra_headers_sent() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/tenant"))
        .and(header("X-Tenant", "acme"))
        .and(header("X-Trace", "abc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut headers = BTreeMap::new();
    headers.insert("X-Tenant".to_string(), "acme".to_string());
    let mut api = ability(ApiConfig {
        default_headers: headers,
        ..api_config(dir.path(), &server.uri())
    });
    api.set_header("X-Trace", "abc").unwrap();

    let _: Value = api.get("/tenant").await.unwrap();
}

#[tokio::test]
async fn test_error_status_fails_but_is_recorded() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/missing"))
        .respond_with(ResponseTemplate::new(404).set_body_json(json!({"error": "not found"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(api_config(dir.path(), &server.uri()));

    match api.get::<Value>("/missing").await {
        Err(ScreenplayError::HttpRequestFailed {
            status_code,
            url,
            method,
        }) => {
            assert_eq!(status_code, 404);
            assert!(url.ends_with("/missing"));
            assert_eq!(method, "GET");
        }
        other => panic!("expected HttpRequestFailed, got {:?}", other),
    }
    assert_eq!(api.last_status_code(), Some(404));
    assert_eq!(api.last_response_json().unwrap()["error"], "not found");

    let detail = api.capture_failure("status 404").await.unwrap();
    assert!(detail.starts_with(dir.path().join("errors")));
    let text = std::fs::read_to_string(detail).unwrap();
    assert!(text.contains("status 404"));
    assert!(text.contains("GET"));
}

#[tokio::test]
async fn test_absolute_endpoint_ignores_base_url() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/items/3"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(api_config(dir.path(), "https://api.example.invalid"));

    api.delete(&format!("{}/items/3", server.uri())).await.unwrap();
    assert_eq!(api.last_status_code(), Some(200));
}

#[tokio::test]
async fn test_send_with_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/search"))
        .and(query_param("q", "rust lang"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"Total_Count": 2})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(api_config(dir.path(), &server.uri()));

    let body = api
        .send(
            Method::GET,
            "search",
            &[("q".to_string(), "rust lang".to_string())],
            None,
        )
        .await
        .unwrap();
    assert_eq!(body["Total_Count"], 2);
}

#[tokio::test]
async fn test_put_then_close() {
    let server = MockServer::start().await;
    Mock::given(method("PUT"))
        .and(path("/items/1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": 1, "displayName": "b"})))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(api_config(dir.path(), &server.uri()));

    let item: Item = api
        .put(
            "/items/1",
            &NewItem {
                display_name: "b".to_string(),
            },
        )
        .await
        .unwrap();
    assert_eq!(item.display_name, "b");

    api.close().await.unwrap();
    assert_eq!(api.state(), SessionState::Closed);
    assert!(matches!(
        api.get::<Value>("/items/1").await,
        Err(ScreenplayError::AbilityClosed { .. })
    ));
}

#[tokio::test]
async fn test_unreachable_server_is_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(ApiConfig {
        timeout_ms: 2_000,
        ..api_config(dir.path(), "http://127.0.0.1:9")
    });

    let result = api.get::<Value>("/health").await;
    assert!(matches!(result, Err(ScreenplayError::Http(_))));
    assert_eq!(api.last_status_code(), None);
    assert_eq!(api.last_method(), Some("GET"));
}

#[tokio::test]
async fn test_post_plain_json() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/items"))
        .and(body_json(json!({"name": "a"})))
        .respond_with(ResponseTemplate::new(201).set_body_json(json!({"id": 1, "name": "a"})))
        .expect(1)
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let mut api = ability(api_config(dir.path(), &server.uri()));

    let created: Value = api.post("/items", &json!({"name": "a"})).await.unwrap();

    assert_eq!(api.last_status_code(), Some(201));
    assert_eq!(api.last_request_body(), Some(r#"{"name":"a"}"#));
    assert_eq!(created["id"], 1);
}

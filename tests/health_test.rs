// Jaskier Shared Pattern -- backend integration test
// gworkspace-mcp-relay - HTTP transport integration test
//
// The relay endpoint points at a closed local port; these tests only cover
// routing, listing and framing, which never leave the process.

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use serde_json::{json, Value};
use tower::ServiceExt;

use gworkspace_mcp_relay::config::RelayConfig;
use gworkspace_mcp_relay::mcp::http::router;
use gworkspace_mcp_relay::state::AppState;

fn test_app() -> axum::Router {
    let config = RelayConfig::from_lookup(|name| match name {
        "APPS_SCRIPT_URL" => Some("http://127.0.0.1:9/exec".to_string()),
        "APPS_SCRIPT_ACCESS_KEY" => Some("do-not-print".to_string()),
        _ => None,
    })
    .unwrap();
    router(AppState::new(config).expect("state should build"))
}

/// Collect a response body into a `serde_json::Value`.
async fn body_json(response: axum::response::Response) -> Value {
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    serde_json::from_slice(&bytes).unwrap()
}

fn post_mcp(body: impl Into<Body>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/mcp")
        .header("content-type", "application/json")
        .body(body.into())
        .unwrap()
}

#[tokio::test]
async fn health_endpoint_returns_ok() {
    let response = test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert_eq!(json["app"], "gworkspace-mcp-relay");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert!(json["tools"].as_u64().unwrap() >= 50);
    assert!(json["uptime_seconds"].is_u64());
}

#[tokio::test]
async fn health_endpoint_hides_access_key() {
    let response = test_app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();

    let json = body_json(response).await;
    assert_eq!(json["endpoint"], "http://127.0.0.1/exec");
    assert!(!json.to_string().contains("do-not-print"));
}

#[tokio::test]
async fn mcp_tools_list_over_http() {
    let request = json!({ "jsonrpc": "2.0", "id": 7, "method": "tools/list" });
    let response = test_app().oneshot(post_mcp(request.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], 7);
    let tools = json["result"]["tools"].as_array().unwrap();
    assert!(tools.iter().any(|t| t["name"] == "calendar_create_event"));
}

#[tokio::test]
async fn mcp_notification_is_accepted_without_body() {
    let request = json!({ "jsonrpc": "2.0", "method": "notifications/initialized" });
    let response = test_app().oneshot(post_mcp(request.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::ACCEPTED);
    let bytes = response.into_body().collect().await.unwrap().to_bytes();
    assert!(bytes.is_empty());
}

#[tokio::test]
async fn mcp_malformed_body_is_parse_error() {
    let response = test_app().oneshot(post_mcp("{oops")).await.unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    let json = body_json(response).await;
    assert_eq!(json["error"]["code"], -32700);
}

#[tokio::test]
async fn mcp_unknown_method_is_rpc_error() {
    let request = json!({ "jsonrpc": "2.0", "id": "x", "method": "resources/read" });
    let response = test_app().oneshot(post_mcp(request.to_string())).await.unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "x");
    assert_eq!(json["error"]["code"], -32601);
}

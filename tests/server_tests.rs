#![cfg(feature = "server")]

mod common;

use axum::body::Body;
use axum::http::{Method, Request, StatusCode};
use common::{resolver, FakeSearch, MapFetcher, SetValidator};
use link_preview::server::router;
use serde_json::Value;
use std::sync::Arc;
use tower::ServiceExt;

fn app() -> axum::Router {
    let fetcher = MapFetcher::default().page(
        "https://www.example.com/post",
        r#"<title>Hello World</title><meta property="og:image" content="https://www.example.com/hero.png">"#,
    );
    let search = FakeSearch::default()
        .results("example", &["https://img.test/d0.png"])
        .results("Hello World", &["https://img.test/p0.png"]);
    router(Arc::new(resolver(
        Arc::new(fetcher),
        None,
        Arc::new(search),
        SetValidator::new(&["https://www.example.com/hero.png"]),
    )))
}

async fn send(method: Method, uri: &str) -> (StatusCode, String) {
    let response = app()
        .oneshot(
            Request::builder()
                .method(method)
                .uri(uri)
                .header("origin", "https://client.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    (status, String::from_utf8(bytes.to_vec()).unwrap())
}

async fn send_json(uri: &str) -> (StatusCode, Value) {
    let (status, body) = send(Method::GET, uri).await;
    (status, serde_json::from_str(&body).unwrap())
}

#[tokio::test]
async fn test_health_check() {
    let (status, body) = send(Method::GET, "/").await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_preview_success() {
    let (status, json) =
        send_json("/api/link-preview?url=https%3A%2F%2Fwww.example.com%2Fpost").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["success"], true);
    assert_eq!(json["errors"], serde_json::json!([]));
    assert_eq!(json["result"]["siteData"]["title"], "Hello World");
    assert_eq!(json["result"]["imageSearch"], "Hello World");
    assert_eq!(
        json["result"]["imageResults"],
        serde_json::json!(["https://img.test/p0.png", "https://img.test/d0.png"])
    );
    assert_eq!(json["result"]["topImage"], "https://www.example.com/hero.png");
}

#[tokio::test]
async fn test_bad_flags_are_all_reported() {
    let (status, json) = send_json(
        "/api/link-preview?url=https%3A%2F%2Fwww.example.com%2Fpost&stealth=1&validate=maybe",
    )
    .await;

    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    let errors = json["errors"].as_array().unwrap();
    assert_eq!(errors.len(), 2);
    assert!(errors[0]["message"]
        .as_str()
        .unwrap()
        .contains("Stealth parameter must be boolean string"));
    assert!(errors[1]["message"]
        .as_str()
        .unwrap()
        .contains("Validate parameter must be boolean string"));
}

#[tokio::test]
async fn test_missing_or_invalid_url() {
    let (status, json) = send_json("/api/link-preview").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["errors"][0]["kind"], "invalid_url");

    let (status, json) = send_json("/api/link-preview?url=mailto%3Ame%40example.com").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(json["success"], false);
    assert!(json.get("result").is_none());
}

#[tokio::test]
async fn test_unresolvable_domain_is_server_error() {
    let (status, json) = send_json("/api/link-preview?url=http%3A%2F%2F127.0.0.1%2F").await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(json["success"], false);
    assert!(json["error"]
        .as_str()
        .unwrap()
        .contains("registrable domain"));
}

#[tokio::test]
async fn test_non_get_is_rejected() {
    let (status, _) = send(Method::POST, "/api/link-preview?url=https%3A%2F%2Fexample.com").await;
    assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED);
}

#[tokio::test]
async fn test_cors_headers() {
    let response = app()
        .oneshot(
            Request::builder()
                .uri("/")
                .header("origin", "https://client.test")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();
    assert_eq!(
        response.headers()["access-control-allow-origin"],
        "*"
    );
}

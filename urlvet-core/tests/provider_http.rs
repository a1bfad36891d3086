//! HTTP-level tests for the provider client against a local stub server.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use axum::http::{HeaderMap, StatusCode};
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::json;
use urlvet_core::{ScanProvider, UrlscanClient, UrlscanConfig};

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind stub server");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move {
        axum::serve(listener, app).await.expect("stub server");
    });
    format!("http://{addr}")
}

fn client(base_url: &str, max_retries: u32) -> UrlscanClient {
    UrlscanClient::new(UrlscanConfig {
        base_url: base_url.to_string(),
        api_key: "test-key".to_string(),
        max_retries,
        retry_initial_delay: Duration::from_millis(5),
        connect_timeout: Duration::from_secs(1),
        request_timeout: Duration::from_secs(2),
    })
    .expect("build client")
}

#[tokio::test]
async fn submit_returns_uuid_and_sends_api_key() {
    let app = Router::new().route(
        "/scan/",
        post(|headers: HeaderMap, Json(body): Json<serde_json::Value>| async move {
            if headers.get("API-Key").and_then(|v| v.to_str().ok()) != Some("test-key") {
                return (StatusCode::UNAUTHORIZED, Json(json!({})));
            }
            assert_eq!(body["url"], "https://example.com");
            (StatusCode::OK, Json(json!({"uuid": "abc-123"})))
        }),
    );
    let base = serve(app).await;

    let external_id = client(&base, 3).submit("https://example.com").await;
    assert_eq!(external_id.as_deref(), Some("abc-123"));
}

#[tokio::test]
async fn submit_exhausts_retries_when_rate_limited() {
    let hits = Arc::new(AtomicU32::new(0));
    let seen = hits.clone();
    let app = Router::new().route(
        "/scan/",
        post(move || {
            let hits = seen.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::TOO_MANY_REQUESTS
            }
        }),
    );
    let base = serve(app).await;

    let external_id = client(&base, 3).submit("https://example.com").await;
    assert!(external_id.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn submit_recovers_after_one_rate_limit() {
    let hits = Arc::new(AtomicU32::new(0));
    let seen = hits.clone();
    let app = Router::new().route(
        "/scan/",
        post(move || {
            let hits = seen.clone();
            async move {
                if hits.fetch_add(1, Ordering::SeqCst) == 0 {
                    (StatusCode::TOO_MANY_REQUESTS, Json(json!({})))
                } else {
                    (StatusCode::OK, Json(json!({"uuid": "after-retry"})))
                }
            }
        }),
    );
    let base = serve(app).await;

    let external_id = client(&base, 3).submit("https://example.com").await;
    assert_eq!(external_id.as_deref(), Some("after-retry"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn submit_does_not_retry_other_client_errors() {
    let hits = Arc::new(AtomicU32::new(0));
    let seen = hits.clone();
    let app = Router::new().route(
        "/scan/",
        post(move || {
            let hits = seen.clone();
            async move {
                hits.fetch_add(1, Ordering::SeqCst);
                StatusCode::BAD_REQUEST
            }
        }),
    );
    let base = serve(app).await;

    let external_id = client(&base, 3).submit("https://example.com").await;
    assert!(external_id.is_none());
    assert_eq!(hits.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn submit_handles_malformed_success_body() {
    let app = Router::new().route(
        "/scan/",
        post(|| async { (StatusCode::OK, "not json at all") }),
    );
    let base = serve(app).await;

    let external_id = client(&base, 3).submit("https://example.com").await;
    assert!(external_id.is_none());
}

#[tokio::test]
async fn fetch_result_returns_payload_when_ready() {
    let app = Router::new().route(
        "/result/{id}/",
        get(|axum::extract::Path(id): axum::extract::Path<String>| async move {
            Json(json!({"scan": id, "verdict": "clean"}))
        }),
    );
    let base = serve(app).await;

    let result = client(&base, 3).fetch_result("abc-123").await;
    assert_eq!(result, Some(json!({"scan": "abc-123", "verdict": "clean"})));
}

#[tokio::test]
async fn fetch_result_treats_404_as_not_ready() {
    let app = Router::new().route("/result/{id}/", get(|| async { StatusCode::NOT_FOUND }));
    let base = serve(app).await;

    let result = client(&base, 3).fetch_result("pending-scan").await;
    assert!(result.is_none());
}

#[tokio::test]
async fn fetch_result_swallows_server_errors() {
    let app = Router::new().route(
        "/result/{id}/",
        get(|| async { StatusCode::INTERNAL_SERVER_ERROR }),
    );
    let base = serve(app).await;

    let result = client(&base, 3).fetch_result("abc").await;
    assert!(result.is_none());
}

//! Integration tests for the webhook ingestion endpoint.
//!
//! Drives the full router through `tower::ServiceExt::oneshot` against a
//! spool-backed message store and an in-memory secret source, so the whole
//! pipeline runs without a database: identity resolution, secret lookup,
//! signature verification, body decoding, and persistence.

use std::{sync::Arc, time::Duration};

use axum::{
    body::Body,
    http::{Request, StatusCode},
    Router,
};
use serde_json::Value;
use tempfile::TempDir;
use tower::ServiceExt;
use trunkline_api::{create_router, crypto, secrets::StaticSecrets, AppState};
use trunkline_core::{
    storage::{FileSpool, MessageStore},
    RealClock,
};

const SENDER: &str = "abc123";
const SECRET: &str = "s3cr3t";

fn test_app(dir: &TempDir, secrets: StaticSecrets) -> Router {
    let state = AppState {
        store: Arc::new(MessageStore::Fallback(FileSpool::new(dir.path()))),
        secrets: Arc::new(secrets),
        clock: Arc::new(RealClock::new()),
    };
    create_router(state, Duration::from_secs(30))
}

fn registered_sender() -> StaticSecrets {
    StaticSecrets::new().with_secret(SENDER, SECRET)
}

fn post_signed(path: &str, body: &[u8], signature: &str) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header("content-type", "application/json")
        .header("x-signature", signature)
        .body(Body::from(body.to_vec()))
        .expect("build request")
}

async fn response_json(response: axum::response::Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX).await.expect("read body");
    serde_json::from_slice(&body).expect("parse response json")
}

fn spooled_records(dir: &TempDir) -> Vec<Value> {
    let mut records = Vec::new();
    let entries = match std::fs::read_dir(dir.path()) {
        Ok(entries) => entries,
        Err(_) => return records,
    };

    for entry in entries.flatten() {
        let name = entry.file_name().to_string_lossy().into_owned();
        if !name.ends_with(".jsonl") {
            continue;
        }
        let contents = std::fs::read_to_string(entry.path()).expect("read spool file");
        for line in contents.lines().filter(|line| !line.trim().is_empty()) {
            records.push(serde_json::from_str(line).expect("parse spool record"));
        }
    }
    records
}

#[tokio::test]
async fn valid_signature_stores_exactly_one_record() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;
    let signature = crypto::sign_body(body, SECRET).expect("sign");

    let response =
        app.oneshot(post_signed("/abc123", body, &signature)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["status"], "success");
    assert_eq!(json["customer_id"], SENDER);
    assert!(json["message_id"].is_string());
    assert!(json["timestamp"].is_string());

    let records = spooled_records(&dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["sender_identity"], SENDER);
    assert_eq!(records[0]["processed"], false);
    assert!(records[0]["processed_at"].is_null());
    assert_eq!(records[0]["message"]["event"], "new_call");
}

#[tokio::test]
async fn invalid_signature_is_rejected_and_nothing_is_stored() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;

    let response =
        app.oneshot(post_signed("/abc123", body, "deadbeef")).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = response_json(response).await;
    assert_eq!(json["status"], "error");
    assert_eq!(json["message"], "Unauthorized - Invalid signature");
    // The rejection must not leak the expected digest.
    assert!(json.get("error").is_none());

    assert!(spooled_records(&dir).is_empty());
}

#[tokio::test]
async fn unregistered_sender_is_rejected_regardless_of_signature() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;
    // A signature that would be correct for some other sender's secret.
    let signature = crypto::sign_body(body, "someone-elses-secret").expect("sign");

    let response =
        app.oneshot(post_signed("/zzz999", body, &signature)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = response_json(response).await;
    assert_eq!(json["message"], "Unauthorized - Client unknown or no secret");

    assert!(spooled_records(&dir).is_empty());
}

#[tokio::test]
async fn post_without_path_segment_resolves_to_unknown_and_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;
    let signature = crypto::sign_body(body, SECRET).expect("sign");

    let response = app.oneshot(post_signed("/", body, &signature)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert!(spooled_records(&dir).is_empty());
}

#[tokio::test]
async fn malformed_path_segment_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;
    let signature = crypto::sign_body(body, SECRET).expect("sign");

    // Too short to be a sender identity; resolves to the unknown sentinel.
    let response =
        app.oneshot(post_signed("/ab", body, &signature)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn sha256_prefixed_uppercase_signature_is_accepted() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;
    let signature = format!("sha256={}", crypto::sign_body(body, SECRET).expect("sign").to_uppercase());

    let response =
        app.oneshot(post_signed("/abc123", body, &signature)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn reformatted_json_verifies_against_canonical_form() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    // The sender signed its own compact serialization; the transport
    // delivered a prettified rendering of the same document.
    let compact = br#"{"event":"new_call","caller":"123456"}"#;
    let delivered = b"{\n  \"event\": \"new_call\",\n  \"caller\": \"123456\"\n}";
    let signature = crypto::sign_body(compact, SECRET).expect("sign");

    let response =
        app.oneshot(post_signed("/abc123", delivered, &signature)).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::OK);

    let records = spooled_records(&dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"]["caller"], "123456");
}

#[tokio::test]
async fn missing_signature_header_is_rejected() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let request = Request::builder()
        .method("POST")
        .uri("/abc123")
        .header("content-type", "application/json")
        .body(Body::from(&br#"{"event":"new_call"}"#[..]))
        .expect("build request");

    let response = app.oneshot(request).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);

    let json = response_json(response).await;
    assert_eq!(json["message"], "Unauthorized - Invalid signature");
}

#[tokio::test]
async fn alternative_signature_headers_are_accepted() {
    for header in ["x-wildix-signature", "x-hub-signature-256"] {
        let dir = TempDir::new().expect("tempdir");
        let app = test_app(&dir, registered_sender());

        let body = br#"{"event":"new_call"}"#;
        let signature = crypto::sign_body(body, SECRET).expect("sign");

        let request = Request::builder()
            .method("POST")
            .uri("/abc123")
            .header("content-type", "application/json")
            .header(header, &signature)
            .body(Body::from(body.to_vec()))
            .expect("build request");

        let response = app.oneshot(request).await.expect("execute request");
        assert_eq!(response.status(), StatusCode::OK, "header {header} should authenticate");
    }
}

#[tokio::test]
async fn form_bodies_are_captured_as_fields() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = b"event=new_call&caller=123456";
    // Non-JSON bodies are signed verbatim.
    let signature = crypto::sign_body(body, SECRET).expect("sign");

    let request = Request::builder()
        .method("POST")
        .uri("/abc123")
        .header("content-type", "application/x-www-form-urlencoded")
        .header("x-signature", &signature)
        .body(Body::from(body.to_vec()))
        .expect("build request");

    let response = app.oneshot(request).await.expect("execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let records = spooled_records(&dir);
    assert_eq!(records.len(), 1);
    assert_eq!(records[0]["message"]["event"], "new_call");
    assert_eq!(records[0]["message"]["caller"], "123456");
}

#[tokio::test]
async fn stored_records_carry_request_metadata() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;
    let signature = crypto::sign_body(body, SECRET).expect("sign");

    let response =
        app.oneshot(post_signed("/abc123", body, &signature)).await.expect("execute request");
    assert_eq!(response.status(), StatusCode::OK);

    let records = spooled_records(&dir);
    let request_info = &records[0]["message"]["request_info"];
    assert_eq!(request_info["method"], "POST");
    assert_eq!(request_info["authenticated"], true);
    assert_eq!(request_info["signature_validated"], true);
    assert!(request_info["url"].as_str().expect("url").contains("/abc123"));
    assert_eq!(request_info["headers"]["content-type"], "application/json");
}

#[tokio::test]
async fn count_increments_by_exactly_the_number_of_ingestions() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let count_request =
        || Request::builder().method("GET").uri("/messages/count").body(Body::empty()).unwrap();

    let response = app.clone().oneshot(count_request()).await.expect("count request");
    assert_eq!(response.status(), StatusCode::OK);
    let before = response_json(response).await;
    assert_eq!(before["total_messages"], 0);

    let body = br#"{"event":"new_call"}"#;
    let signature = crypto::sign_body(body, SECRET).expect("sign");

    for _ in 0..3 {
        let response = app
            .clone()
            .oneshot(post_signed("/abc123", body, &signature))
            .await
            .expect("execute request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    let response = app.oneshot(count_request()).await.expect("count request");
    assert_eq!(response.status(), StatusCode::OK);

    let after = response_json(response).await;
    assert_eq!(after["total_messages"], 3);
    assert!(after["files"].is_array(), "spool counts include a per-file breakdown");
}

#[tokio::test]
async fn identical_requests_store_two_records() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, registered_sender());

    let body = br#"{"event":"new_call"}"#;
    let signature = crypto::sign_body(body, SECRET).expect("sign");

    for _ in 0..2 {
        let response = app
            .clone()
            .oneshot(post_signed("/abc123", body, &signature))
            .await
            .expect("execute request");
        assert_eq!(response.status(), StatusCode::OK);
    }

    assert_eq!(spooled_records(&dir).len(), 2);
}

#[tokio::test]
async fn health_check_is_always_healthy() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, StaticSecrets::new());

    let request = Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.expect("execute request");

    assert_eq!(response.status(), StatusCode::OK);

    let json = response_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["service"], "trunkline");
}

#[tokio::test]
async fn responses_carry_a_request_id() {
    let dir = TempDir::new().expect("tempdir");
    let app = test_app(&dir, StaticSecrets::new());

    let request = Request::builder().method("GET").uri("/health").body(Body::empty()).unwrap();
    let response = app.oneshot(request).await.expect("execute request");

    assert!(response.headers().contains_key("X-Request-Id"));
}

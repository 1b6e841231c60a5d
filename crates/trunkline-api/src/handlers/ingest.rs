//! Webhook ingestion handler.
//!
//! Runs the authentication and persistence pipeline for one request:
//! identity resolution, secret lookup, signature verification, body
//! decoding, and durable storage. Each gate short-circuits into the
//! documented rejection envelope; every internal failure converts to the
//! 500 envelope at this boundary.

use std::{collections::HashMap, net::SocketAddr};

use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Json,
};
use bytes::Bytes;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{json, Value};
use tracing::{error, info, instrument, warn};
use trunkline_core::{SenderId, WebhookMessage};

use crate::{crypto, identity, AppState};

/// Largest accepted request body. The PBX platform sends events of a few
/// kilobytes; anything near this limit is not a webhook.
const MAX_PAYLOAD_SIZE: usize = 10 * 1024 * 1024;

/// Signature header names accepted from the platform, probed in order.
const SIGNATURE_HEADERS: [&str; 3] = ["x-signature", "x-wildix-signature", "x-hub-signature-256"];

/// Response for an accepted and stored webhook.
#[derive(Debug, Serialize)]
pub struct IngestAccepted {
    /// Always "success".
    pub status: &'static str,
    /// Human-readable confirmation.
    pub message: &'static str,
    /// Identifier assigned by the persistence adapter.
    pub message_id: String,
    /// Authenticated sender identity.
    pub customer_id: String,
    /// When the request was received.
    pub timestamp: DateTime<Utc>,
}

/// Response for a rejected or failed request.
#[derive(Debug, Serialize)]
pub struct IngestRejected {
    /// Always "error".
    pub status: &'static str,
    /// Human-readable rejection reason.
    pub message: String,
    /// Internal error detail, present on processing failures only.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// When the request was received.
    pub timestamp: DateTime<Utc>,
}

/// Ingests a webhook callback.
///
/// Handles both `POST /` and `POST /{sender_id}`; the identity comes from
/// the URL path either way. Two identical requests store two records:
/// deduplication is deliberately not provided.
#[instrument(
    name = "ingest_webhook",
    skip(state, request),
    fields(path = %request.uri().path(), remote_addr = tracing::field::Empty)
)]
pub async fn ingest_webhook(State(state): State<AppState>, request: Request) -> Response {
    let received_at = DateTime::<Utc>::from(state.clock.now_system());

    let remote_addr =
        request.extensions().get::<ConnectInfo<SocketAddr>>().map(|connect_info| connect_info.0);
    if let Some(addr) = remote_addr {
        tracing::Span::current().record("remote_addr", tracing::field::display(addr));
    }

    let (parts, body) = request.into_parts();
    let body = match axum::body::to_bytes(body, MAX_PAYLOAD_SIZE).await {
        Ok(body) => body,
        Err(err) => {
            error!(error = %err, "failed to read request body");
            return server_error("Failed to read request body", err.to_string(), received_at);
        },
    };

    // Gate 1: identity resolution never fails the request; sentinels fail
    // closed at the secret lookup.
    let sender = identity::resolve_sender(parts.uri.path());
    info!(sender_id = %sender, "processing webhook request");

    // Gate 2: secret lookup. A lookup error is treated as an unregistered
    // sender so storage trouble cannot open the door.
    let secret = match state.secrets.find_secret(&sender).await {
        Ok(secret) => secret,
        Err(err) => {
            warn!(sender_id = %sender, error = %err, "secret lookup failed, rejecting request");
            None
        },
    };

    let Some(secret) = secret else {
        warn!(sender_id = %sender, "no secret provisioned, rejecting request");
        return unauthorized("Unauthorized - Client unknown or no secret", received_at);
    };

    // Gate 3: signature verification. The response never carries the
    // expected digest.
    let signature = extract_signature(&parts.headers);
    let validation = crypto::verify_signature(&body, signature.as_deref(), Some(&secret));

    if !validation.is_valid {
        warn!(
            sender_id = %sender,
            reason = validation.error_message.as_deref().unwrap_or("signature mismatch"),
            "signature verification failed"
        );
        return unauthorized("Unauthorized - Invalid signature", received_at);
    }

    info!(sender_id = %sender, "webhook request authorized");

    // Gate 4: decode and persist. Malformed bodies fall back to raw-text
    // capture so no authenticated webhook is dropped.
    let payload = decode_body(&parts.headers, &body);
    let payload =
        attach_request_info(payload, &parts.method, &parts.headers, remote_addr, &parts.uri);

    let message = WebhookMessage::new(sender.clone(), payload, received_at);

    match state.store.save(&message).await {
        Ok(message_id) => {
            info!(sender_id = %sender, message_id = %message_id, "webhook stored");
            accepted(&sender, message_id.to_string(), received_at)
        },
        Err(err) => {
            error!(sender_id = %sender, error = %err, "failed to persist webhook");
            server_error("Failed to process webhook", err.to_string(), received_at)
        },
    }
}

/// Extracts the signature from the first recognized header.
fn extract_signature(headers: &HeaderMap) -> Option<String> {
    SIGNATURE_HEADERS
        .iter()
        .find_map(|name| headers.get(*name).and_then(|value| value.to_str().ok()))
        .map(str::to_string)
}

/// Decodes the request body according to its content type.
///
/// JSON bodies become structured values, form bodies become string fields,
/// and everything else (including JSON that fails to parse) is captured as
/// raw text alongside its content type.
fn decode_body(headers: &HeaderMap, body: &Bytes) -> Value {
    let content_type = headers
        .get(axum::http::header::CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .unwrap_or("");

    if content_type.contains("application/json") {
        if let Ok(value) = serde_json::from_slice(body) {
            return value;
        }
    } else if content_type.contains("application/x-www-form-urlencoded") {
        let fields: serde_json::Map<String, Value> = url::form_urlencoded::parse(body)
            .map(|(key, value)| (key.into_owned(), Value::String(value.into_owned())))
            .collect();
        if !fields.is_empty() {
            return Value::Object(fields);
        }
    }

    json!({
        "raw_data": String::from_utf8_lossy(body),
        "content_type": content_type,
    })
}

/// Attaches request metadata to the decoded payload.
///
/// Non-object payloads are wrapped so the metadata always has somewhere to
/// live.
fn attach_request_info(
    payload: Value,
    method: &Method,
    headers: &HeaderMap,
    remote_addr: Option<SocketAddr>,
    uri: &Uri,
) -> Value {
    let request_info = json!({
        "method": method.as_str(),
        "headers": extract_headers(headers),
        "remote_addr": remote_addr.map(|addr| addr.to_string()),
        "url": uri.to_string(),
        "authenticated": true,
        "signature_validated": true,
    });

    match payload {
        Value::Object(mut map) => {
            map.insert("request_info".to_string(), request_info);
            Value::Object(map)
        },
        other => json!({ "payload": other, "request_info": request_info }),
    }
}

/// Extracts headers into a map for storage.
fn extract_headers(headers: &HeaderMap) -> HashMap<String, String> {
    let mut map = HashMap::new();
    for (name, value) in headers {
        if let Ok(value_str) = value.to_str() {
            map.insert(name.as_str().to_string(), value_str.to_string());
        }
    }
    map
}

fn accepted(sender: &SenderId, message_id: String, timestamp: DateTime<Utc>) -> Response {
    (
        StatusCode::OK,
        Json(IngestAccepted {
            status: "success",
            message: "Webhook received and stored",
            message_id,
            customer_id: sender.to_string(),
            timestamp,
        }),
    )
        .into_response()
}

fn unauthorized(message: &str, timestamp: DateTime<Utc>) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(IngestRejected {
            status: "error",
            message: message.to_string(),
            error: None,
            timestamp,
        }),
    )
        .into_response()
}

fn server_error(message: &str, detail: String, timestamp: DateTime<Utc>) -> Response {
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(IngestRejected {
            status: "error",
            message: message.to_string(),
            error: Some(detail),
            timestamp,
        }),
    )
        .into_response()
}

//! Stored-message count handler for operational visibility.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{error, instrument};
use trunkline_core::SpoolFileCount;

use crate::AppState;

/// Response for the message count endpoint.
#[derive(Debug, Serialize)]
pub struct CountResponse {
    /// Total number of stored messages.
    pub total_messages: i64,
    /// Per-file breakdown, present when counting from the spool.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub files: Option<Vec<SpoolFileCount>>,
    /// Timestamp when the count was taken.
    pub timestamp: DateTime<Utc>,
}

/// Error response when the store cannot be counted.
#[derive(Debug, Serialize)]
pub struct CountUnavailable {
    /// Human-readable error description.
    pub error: String,
    /// Timestamp when the failure occurred.
    pub timestamp: DateTime<Utc>,
}

/// Returns the stored-message count from the persistence adapter.
///
/// 503 when the backing storage is unavailable.
#[instrument(name = "messages_count", skip(state))]
pub async fn messages_count(State(state): State<AppState>) -> Response {
    let timestamp = DateTime::<Utc>::from(state.clock.now_system());

    match state.store.count().await {
        Ok(count) => (
            StatusCode::OK,
            Json(CountResponse { total_messages: count.total, files: count.files, timestamp }),
        )
            .into_response(),
        Err(err) => {
            error!(error = %err, "failed to count stored messages");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                Json(CountUnavailable { error: "Message store unavailable".to_string(), timestamp }),
            )
                .into_response()
        },
    }
}

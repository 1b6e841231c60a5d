//! Health check handler.
//!
//! Liveness only: reports that the process is serving requests without
//! touching external dependencies. Storage visibility lives in the
//! `/messages/count` endpoint, which returns 503 when the store is down.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, instrument};

use crate::AppState;

/// Health check response structure.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Overall service status; always "healthy" while the process serves.
    pub status: &'static str,
    /// Service identifier.
    pub service: &'static str,
    /// Timestamp when the check was performed.
    pub timestamp: DateTime<Utc>,
}

/// Health check endpoint handler.
///
/// Designed to be called frequently by load balancers, so it performs no
/// expensive operations and always returns 200.
#[instrument(name = "health_check", skip(state))]
pub async fn health_check(State(state): State<AppState>) -> Response {
    debug!("Performing health check");

    let response = HealthResponse {
        status: "healthy",
        service: "trunkline",
        timestamp: DateTime::<Utc>::from(state.clock.now_system()),
    };

    (StatusCode::OK, Json(response)).into_response()
}

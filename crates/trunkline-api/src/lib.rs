//! Trunkline HTTP API.
//!
//! Implements the webhook ingestion pipeline: identity resolution from the
//! request path, per-sender secret lookup, HMAC-SHA256 signature
//! verification, and durable persistence, plus the health and count
//! endpoints.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod crypto;
pub mod handlers;
pub mod identity;
pub mod secrets;
pub mod server;

use std::sync::Arc;

use trunkline_core::{storage::MessageStore, Clock};

use crate::secrets::SecretSource;

pub use config::Config;
pub use server::{create_router, start_server};

/// Shared application state injected into every handler.
///
/// Built once in the composition root; the storage handles own the
/// connection pool, so no handler touches ambient global state.
#[derive(Clone)]
pub struct AppState {
    /// Persistence adapter for accepted messages.
    pub store: Arc<MessageStore>,

    /// Source of per-sender shared secrets.
    pub secrets: Arc<dyn SecretSource>,

    /// Clock for request timestamps.
    pub clock: Arc<dyn Clock>,
}

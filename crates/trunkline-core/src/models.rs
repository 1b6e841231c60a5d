//! Core domain models for accepted webhook messages.
//!
//! Defines the sender identity token, the accepted-message model, and the
//! tagged record identifier returned by the persistence adapter.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

type PgDb = sqlx::Postgres;
type PgValueRef<'r> = sqlx::postgres::PgValueRef<'r>;
type PgTypeInfo = sqlx::postgres::PgTypeInfo;
type PgArgumentBuffer = sqlx::postgres::PgArgumentBuffer;
type EncodeResult =
    Result<sqlx::encode::IsNull, Box<dyn std::error::Error + Send + Sync + 'static>>;
type BoxDynError = sqlx::error::BoxDynError;

/// Opaque token identifying the webhook-sending tenant.
///
/// Extracted from the request path and used as the lookup key for the
/// sender's shared secret. Valid tokens are alphanumeric and at least three
/// characters long. Requests that carry no usable token resolve to the
/// `unknown` sentinel; internal resolution failures map to the `error`
/// sentinel. Neither sentinel can have a provisioned secret, so
/// authentication for them always fails closed.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SenderId(pub String);

impl SenderId {
    /// Sentinel for requests without a usable path segment.
    pub fn unknown() -> Self {
        Self("unknown".to_string())
    }

    /// Sentinel for internal identity-resolution failures.
    pub fn error() -> Self {
        Self("error".to_string())
    }

    /// Whether `token` is a well-formed sender identity.
    ///
    /// Matches alphanumeric tokens of length three or more, the same rule
    /// the PBX platform applies when provisioning sender keys.
    pub fn is_valid_token(token: &str) -> bool {
        token.len() >= 3 && token.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Returns the identity as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SenderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<&str> for SenderId {
    fn from(token: &str) -> Self {
        Self(token.to_string())
    }
}

impl sqlx::Type<PgDb> for SenderId {
    fn type_info() -> PgTypeInfo {
        <String as sqlx::Type<PgDb>>::type_info()
    }
}

impl<'r> sqlx::Decode<'r, PgDb> for SenderId {
    fn decode(value: PgValueRef<'r>) -> Result<Self, BoxDynError> {
        let token = <String as sqlx::Decode<PgDb>>::decode(value)?;
        Ok(Self(token))
    }
}

impl sqlx::Encode<'_, PgDb> for SenderId {
    fn encode_by_ref(&self, buf: &mut PgArgumentBuffer) -> EncodeResult {
        <String as sqlx::Encode<PgDb>>::encode_by_ref(&self.0, buf)
    }
}

/// An accepted webhook payload, ready for durable storage.
///
/// Created only after signature verification succeeded for the sender.
/// The `processed` flag and `processed_at` timestamp belong to a downstream
/// consumer; this system writes them with their initial values and never
/// mutates or deletes stored messages.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WebhookMessage {
    /// Authenticated sender identity.
    pub sender_id: SenderId,

    /// Decoded payload plus attached request metadata.
    pub payload: serde_json::Value,

    /// When the request was received.
    pub received_at: DateTime<Utc>,

    /// Whether a downstream consumer has picked the message up.
    pub processed: bool,

    /// When the message was processed, if it has been.
    pub processed_at: Option<DateTime<Utc>>,
}

impl WebhookMessage {
    /// Creates a new unprocessed message.
    pub fn new(sender_id: SenderId, payload: serde_json::Value, received_at: DateTime<Utc>) -> Self {
        Self { sender_id, payload, received_at, processed: false, processed_at: None }
    }
}

/// Identifier assigned to a stored message.
///
/// Primary storage hands out sequential row ids; the file spool generates
/// local UUIDs in degraded mode. The tag records which path accepted the
/// message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StoredMessageId {
    /// Row id from the primary `webhook_messages` table.
    Database(i64),
    /// Locally generated id from the file spool.
    Spool(Uuid),
}

impl fmt::Display for StoredMessageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Database(id) => write!(f, "{id}"),
            Self::Spool(id) => write!(f, "{id}"),
        }
    }
}

/// Stored-message count reported by the persistence adapter.
#[derive(Debug, Clone, Serialize)]
pub struct MessageCount {
    /// Total number of stored messages.
    pub total: i64,

    /// Per-file breakdown, present when counting from the spool.
    pub files: Option<Vec<SpoolFileCount>>,
}

/// Line count for a single spool file.
#[derive(Debug, Clone, Serialize)]
pub struct SpoolFileCount {
    /// Spool file name.
    pub file: String,

    /// Number of records in the file.
    pub count: i64,
}

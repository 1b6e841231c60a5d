//! Core domain models and storage for the Trunkline webhook receiver.
//!
//! Provides the sender identity type, the accepted-message model, the error
//! taxonomy, and the persistence layer (PostgreSQL repositories plus the
//! file-spool degraded mode). The API crate builds the request pipeline on
//! top of these foundations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{MessageCount, SenderId, SpoolFileCount, StoredMessageId, WebhookMessage};
pub use time::{Clock, RealClock, TestClock};

//! Repository for accepted webhook messages.
//!
//! A message row is created exactly once per authenticated request; the
//! `processed` columns are mutated by a downstream consumer, never here.

use std::sync::Arc;

use sqlx::PgPool;

use crate::{error::Result, models::WebhookMessage};

/// Repository for webhook message database operations.
pub struct Repository {
    pool: Arc<PgPool>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>) -> Self {
        Self { pool }
    }

    /// Returns a reference to the database pool.
    pub fn pool(&self) -> Arc<PgPool> {
        self.pool.clone()
    }

    /// Inserts an accepted message and returns its row id.
    ///
    /// Single statement, single commit; the pool connection is returned
    /// unconditionally when the future completes.
    ///
    /// # Errors
    ///
    /// Returns error if the insert fails or a constraint is violated.
    pub async fn save(&self, message: &WebhookMessage) -> Result<i64> {
        let id: i64 = sqlx::query_scalar(
            r#"
            INSERT INTO webhook_messages (
                sender_identity, message, created_at, processed, processed_at
            ) VALUES (
                $1, $2, $3, $4, $5
            )
            RETURNING id
            "#,
        )
        .bind(message.sender_id.as_str())
        .bind(&message.payload)
        .bind(message.received_at)
        .bind(message.processed)
        .bind(message.processed_at)
        .fetch_one(&*self.pool)
        .await?;

        Ok(id)
    }

    /// Counts all stored messages.
    ///
    /// # Errors
    ///
    /// Returns error if the database is unavailable.
    pub async fn count(&self) -> Result<i64> {
        let total: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM webhook_messages")
            .fetch_one(&*self.pool)
            .await?;

        Ok(total)
    }
}

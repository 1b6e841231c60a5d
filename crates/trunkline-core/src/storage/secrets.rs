//! Repository for per-sender shared secrets.
//!
//! Secrets are provisioned out-of-band and read-only here. A secret may be
//! stored PGP-armored; when a decryption key is configured the repository
//! decrypts transiently per request and never persists the clear value.

use std::sync::Arc;

use sqlx::PgPool;
use tracing::warn;

use crate::{error::Result, models::SenderId};

const PGP_ARMOR_HEADER: &str = "-----BEGIN PGP MESSAGE-----";

/// Repository for webhook secret lookups.
pub struct Repository {
    pool: Arc<PgPool>,
    decryption_key: Option<String>,
}

impl Repository {
    /// Creates a new repository instance.
    pub fn new(pool: Arc<PgPool>, decryption_key: Option<String>) -> Self {
        Self { pool, decryption_key }
    }

    /// Looks up the shared secret for a sender identity.
    ///
    /// Absence of a row is a normal outcome (unregistered sender), not an
    /// error. Armored secrets are decrypted via `pgp_sym_decrypt`; if
    /// decryption fails the stored value is returned unchanged so senders
    /// provisioned before encryption keep working.
    ///
    /// # Errors
    ///
    /// Returns error if the lookup query itself fails; the pipeline treats
    /// that as "no secret found" and rejects the request.
    pub async fn find(&self, sender: &SenderId) -> Result<Option<String>> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT secret FROM webhook_secrets WHERE sender_identity = $1")
                .bind(sender.as_str())
                .fetch_optional(&*self.pool)
                .await?;

        match row {
            Some((stored,)) => Ok(Some(self.decrypt(sender, stored).await)),
            None => Ok(None),
        }
    }

    /// Decrypts an armored secret, falling back to the stored value.
    async fn decrypt(&self, sender: &SenderId, stored: String) -> String {
        let Some(key) = &self.decryption_key else {
            return stored;
        };

        if !stored.starts_with(PGP_ARMOR_HEADER) {
            return stored;
        }

        match sqlx::query_scalar::<_, String>("SELECT pgp_sym_decrypt(dearmor($1), $2)")
            .bind(&stored)
            .bind(key)
            .fetch_one(&*self.pool)
            .await
        {
            Ok(clear) => clear,
            Err(err) => {
                warn!(
                    sender_id = %sender,
                    error = %err,
                    "secret decryption failed, using stored value; re-provision this sender"
                );
                stored
            },
        }
    }
}

//! Secret source abstraction for the ingestion pipeline.
//!
//! Provides a trait seam over secret lookups so the pipeline can be tested
//! without a database. Production uses the PostgreSQL repository; tests
//! substitute an in-memory map.

use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

use trunkline_core::{storage::Storage, Result, SenderId};

/// Source of per-sender shared secrets.
///
/// Absence of a secret is a normal outcome: it means the sender is
/// unregistered and the request must be rejected. Lookup errors are
/// treated the same way by the pipeline, so storage trouble fails closed.
pub trait SecretSource: Send + Sync + 'static {
    /// Looks up the shared secret for a sender identity.
    fn find_secret<'a>(
        &'a self,
        sender: &'a SenderId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>>;
}

/// Production secret source backed by the PostgreSQL repository.
pub struct PostgresSecrets {
    storage: Arc<Storage>,
}

impl PostgresSecrets {
    /// Creates a new PostgreSQL secret source.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl SecretSource for PostgresSecrets {
    fn find_secret<'a>(
        &'a self,
        sender: &'a SenderId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        Box::pin(async move { self.storage.secrets.find(sender).await })
    }
}

/// In-memory secret source for tests and single-tenant setups.
#[derive(Debug, Clone, Default)]
pub struct StaticSecrets {
    secrets: HashMap<String, String>,
}

impl StaticSecrets {
    /// Creates an empty secret source; every lookup misses.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a secret for a sender identity.
    #[must_use]
    pub fn with_secret(mut self, sender: &str, secret: &str) -> Self {
        self.secrets.insert(sender.to_string(), secret.to_string());
        self
    }
}

impl SecretSource for StaticSecrets {
    fn find_secret<'a>(
        &'a self,
        sender: &'a SenderId,
    ) -> Pin<Box<dyn Future<Output = Result<Option<String>>> + Send + 'a>> {
        let secret = self.secrets.get(sender.as_str()).cloned();
        Box::pin(async move { Ok(secret) })
    }
}

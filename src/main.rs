//! Trunkline webhook receiver.
//!
//! Main entry point. Loads configuration, establishes the database pool,
//! selects the persistence mode, and serves the ingestion endpoints until
//! shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tracing::{info, warn};
use trunkline_api::{
    secrets::{PostgresSecrets, SecretSource, StaticSecrets},
    AppState, Config,
};
use trunkline_core::{
    storage::{FileSpool, MessageStore, Storage},
    RealClock,
};

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    info!("Starting Trunkline webhook receiver");

    let config = Config::load()?;
    info!(
        database_url = %config.database_url_masked(),
        host = %config.host,
        port = config.port,
        spool_dir = %config.spool_dir,
        "Configuration loaded"
    );

    let addr = config.parse_server_addr()?;
    let spool = FileSpool::new(&config.spool_dir);

    // Composition root: the pool is built here and injected into the
    // storage handles; when it cannot be built the service runs in
    // degraded mode, spooling accepted messages to disk. Secret lookups
    // have no fallback source, so degraded mode rejects every request
    // until the database returns.
    let (store, secrets): (MessageStore, Arc<dyn SecretSource>) =
        match create_database_pool(&config).await {
            Ok(pool) => {
                info!("Database connection pool established");
                check_messages_table(&pool).await;

                let storage = Arc::new(Storage::new(pool, config.secret_decryption_key.clone()));
                let store = MessageStore::Primary {
                    messages: storage.messages.clone(),
                    fallback: Some(spool),
                };

                (store, Arc::new(PostgresSecrets::new(storage)))
            },
            Err(err) => {
                warn!(
                    error = %err,
                    "database unavailable, falling back to file spool persistence; \
                     all requests will be rejected until secrets become reachable"
                );
                (MessageStore::Fallback(spool), Arc::new(StaticSecrets::new()))
            },
        };

    let state = AppState {
        store: Arc::new(store),
        secrets,
        clock: Arc::new(RealClock::new()),
    };

    info!(addr = %addr, "Trunkline is ready to receive webhooks");

    trunkline_api::start_server(state, addr, Duration::from_secs(config.request_timeout))
        .await
        .context("HTTP server failed")?;

    info!("Trunkline shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing() {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new("info,trunkline=debug,tower_http=debug"))
        .expect("Invalid RUST_LOG environment variable");

    let fmt_layer = fmt::layer().with_target(true).with_file(true).with_line_number(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with retry logic.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    let mut retries = 0;
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .min_connections(config.database_min_connections)
            .acquire_timeout(Duration::from_secs(config.database_connection_timeout))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                // Verify connection works
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("Failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "Database connection failed, retrying..."
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("Failed to create database connection pool after retries");
            },
        }
    }
}

/// Verifies the message table exists.
///
/// Schema migration is an administrative concern; the service only checks
/// and warns. Inserts against a missing table fail per request and land in
/// the spool fallback.
async fn check_messages_table(pool: &sqlx::PgPool) {
    let exists: Result<bool, sqlx::Error> = sqlx::query_scalar(
        "SELECT EXISTS (SELECT FROM information_schema.tables WHERE table_name = 'webhook_messages')",
    )
    .fetch_one(pool)
    .await;

    match exists {
        Ok(true) => info!("webhook_messages table found"),
        Ok(false) => warn!(
            "webhook_messages table is missing; run the schema migration, inserts will spool to disk until then"
        ),
        Err(err) => warn!(error = %err, "could not verify webhook_messages table"),
    }
}

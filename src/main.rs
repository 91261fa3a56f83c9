//! tidewatch marketplace monitor service.
//!
//! Main entry point: initializes logging, loads configuration, prepares the
//! database, wires the sync engine and notification dispatcher, and serves
//! the monitor API until shutdown.

use std::{sync::Arc, time::Duration};

use anyhow::{Context, Result};
use sqlx::postgres::PgPoolOptions;
use tidewatch_api::{AppState, Config};
use tidewatch_core::{storage::Storage, RealClock};
use tidewatch_notify::{NotificationDispatcher, WebhookClient};
use tidewatch_sync::{EventSyncEngine, MarketplaceClient, PostgresEventStore};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = Config::load()?;
    init_tracing(&config.rust_log);

    info!("starting tidewatch marketplace monitor");
    info!(
        database_url = %config.database_url_masked(),
        marketplace = %config.marketplace_base_url,
        "configuration loaded"
    );

    let db_pool = create_database_pool(&config).await?;
    info!("database connection pool established");

    prepare_schema(&db_pool).await?;
    info!("database schema ready");

    let clock = Arc::new(RealClock::new());

    let storage = Arc::new(Storage::new(db_pool.clone()));
    let store = Arc::new(PostgresEventStore::new(storage));

    let feed = Arc::new(
        MarketplaceClient::new(config.to_marketplace_config())
            .context("failed to build marketplace client")?,
    );

    let webhook_client = Arc::new(
        WebhookClient::new(config.to_webhook_config())
            .context("failed to build webhook client")?,
    );
    let dispatcher = Arc::new(NotificationDispatcher::new(
        webhook_client,
        clock.clone(),
        config.to_dispatcher_config(),
    ));

    let engine =
        Arc::new(EventSyncEngine::new(feed, store, dispatcher, clock, config.to_sync_config()));

    let addr = config.parse_server_addr()?;
    let server_handle = tokio::spawn({
        let state = AppState::new(engine);
        async move {
            if let Err(e) = tidewatch_api::start_server(state, addr).await {
                error!(error = %e, "server failed");
            }
        }
    });

    info!(addr = %addr, "tidewatch is ready");

    server_handle.await.context("server task panicked")?;

    db_pool.close().await;
    info!("database connections closed");

    info!("tidewatch shutdown complete");
    Ok(())
}

/// Initializes tracing with environment-based configuration.
fn init_tracing(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(default_filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let fmt_layer = fmt::layer().with_target(true);

    tracing_subscriber::registry().with(filter).with(fmt_layer).init();
}

/// Creates the database connection pool with bounded connect retries.
async fn create_database_pool(config: &Config) -> Result<sqlx::PgPool> {
    const MAX_RETRIES: u32 = 5;
    const RETRY_DELAY: Duration = Duration::from_secs(2);

    let mut retries = 0;

    loop {
        match PgPoolOptions::new()
            .max_connections(config.database_max_connections)
            .acquire_timeout(Duration::from_secs(10))
            .connect(&config.database_url)
            .await
        {
            Ok(pool) => {
                sqlx::query("SELECT 1")
                    .fetch_one(&pool)
                    .await
                    .context("failed to verify database connection")?;

                return Ok(pool);
            },
            Err(_e) if retries < MAX_RETRIES => {
                retries += 1;
                info!(
                    attempt = retries,
                    max_retries = MAX_RETRIES,
                    "database connection failed, retrying"
                );
                tokio::time::sleep(RETRY_DELAY).await;
            },
            Err(e) => {
                return Err(e).context("failed to create database connection pool after retries");
            },
        }
    }
}

/// Ensures the event table and watermark index exist.
async fn prepare_schema(pool: &sqlx::PgPool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS market_events (
            id TEXT PRIMARY KEY,
            collection_key TEXT NOT NULL,
            event_kind TEXT NOT NULL,
            created_at TIMESTAMPTZ NOT NULL,
            payload JSONB NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create market_events table")?;

    sqlx::query(
        r#"
        CREATE INDEX IF NOT EXISTS idx_market_events_watermark
        ON market_events(collection_key, event_kind, created_at DESC)
        "#,
    )
    .execute(pool)
    .await
    .context("failed to create watermark index")?;

    Ok(())
}

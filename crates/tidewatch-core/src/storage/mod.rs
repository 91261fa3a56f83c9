//! PostgreSQL storage for observed marketplace events.
//!
//! Events are stored as typed columns for the watermark query plus the full
//! serialized event as JSONB, so the domain model can evolve without column
//! churn. Upserts are keyed on the upstream event id, which makes re-writes
//! of an already-stored event a no-op rather than a duplicate.

pub mod market_events;

use std::sync::Arc;

use sqlx::PgPool;

/// Aggregates the repositories backed by one connection pool.
#[derive(Debug)]
pub struct Storage {
    /// Marketplace event repository.
    pub market_events: market_events::Repository,
}

impl Storage {
    /// Creates storage over a shared connection pool.
    pub fn new(pool: PgPool) -> Self {
        let pool = Arc::new(pool);
        Self { market_events: market_events::Repository::new(pool) }
    }
}

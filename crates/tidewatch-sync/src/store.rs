//! Storage abstraction consumed by the sync engine.
//!
//! Mirrors the three operations the engine needs — watermark lookup,
//! id-set membership, idempotent bulk upsert — so pagination and dedup can
//! be validated against an in-memory double. Production goes through
//! [`PostgresEventStore`] onto the core repository.

use std::{future::Future, pin::Pin, sync::Arc};

use tidewatch_core::{
    error::Result,
    models::{CollectionKey, EventId, EventKind, MarketEvent},
    storage::Storage,
};

/// Durable event storage operations required by the engine.
pub trait EventStore: Send + Sync {
    /// Most recently created persisted event for a (collection, kind) pair.
    ///
    /// Its `created_at` is the watermark: the lower bound of the next sync
    /// window. `None` on first run for the pair.
    fn most_recent(
        &self,
        collection: CollectionKey,
        kind: EventKind,
    ) -> Pin<Box<dyn Future<Output = Result<Option<MarketEvent>>> + Send + '_>>;

    /// Stored events whose ids appear in the candidate set.
    ///
    /// Used for cross-run dedup: anything returned here is dropped from the
    /// fetched page before accumulation.
    fn find_by_ids(
        &self,
        ids: Vec<EventId>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<MarketEvent>>> + Send + '_>>;

    /// Upserts a batch of events, idempotent by id.
    fn upsert_all(
        &self,
        events: Vec<MarketEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>>;
}

/// Production storage implementation over the PostgreSQL repository.
pub struct PostgresEventStore {
    storage: Arc<Storage>,
}

impl PostgresEventStore {
    /// Creates a new adapter over the core storage.
    pub fn new(storage: Arc<Storage>) -> Self {
        Self { storage }
    }
}

impl EventStore for PostgresEventStore {
    fn most_recent(
        &self,
        collection: CollectionKey,
        kind: EventKind,
    ) -> Pin<Box<dyn Future<Output = Result<Option<MarketEvent>>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.market_events.most_recent(&collection, kind).await })
    }

    fn find_by_ids(
        &self,
        ids: Vec<EventId>,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<MarketEvent>>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.market_events.find_by_ids(&ids).await })
    }

    fn upsert_all(
        &self,
        events: Vec<MarketEvent>,
    ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
        let storage = self.storage.clone();
        Box::pin(async move { storage.market_events.upsert_all(&events).await })
    }
}

pub mod mock {
    //! In-memory storage double for engine tests.

    use std::{collections::HashMap, future::Future, pin::Pin, sync::Arc};

    use tidewatch_core::{
        error::{CoreError, Result},
        models::{CollectionKey, EventId, EventKind, MarketEvent},
    };
    use tokio::sync::RwLock;

    use super::EventStore;

    /// Deterministic in-memory event store.
    ///
    /// Supports preloading state, injecting a one-shot failure, and
    /// inspecting what was persisted.
    #[derive(Default)]
    pub struct InMemoryEventStore {
        events: Arc<RwLock<HashMap<EventId, MarketEvent>>>,
        fail_next: Arc<RwLock<Option<String>>>,
    }

    impl InMemoryEventStore {
        /// Creates an empty store.
        pub fn new() -> Self {
            Self::default()
        }

        /// Preloads events as if persisted by an earlier run.
        pub async fn preload(&self, events: Vec<MarketEvent>) {
            let mut map = self.events.write().await;
            for event in events {
                map.insert(event.id.clone(), event);
            }
        }

        /// Makes the next storage operation fail with a database error.
        pub async fn inject_error(&self, message: &str) {
            *self.fail_next.write().await = Some(message.to_string());
        }

        /// Number of events currently stored.
        pub async fn stored_count(&self) -> usize {
            self.events.read().await.len()
        }

        /// Whether an event id is stored.
        pub async fn contains(&self, id: &EventId) -> bool {
            self.events.read().await.contains_key(id)
        }

        async fn take_injected_error(&self) -> Option<CoreError> {
            self.fail_next.write().await.take().map(CoreError::Database)
        }
    }

    impl EventStore for InMemoryEventStore {
        fn most_recent(
            &self,
            collection: CollectionKey,
            kind: EventKind,
        ) -> Pin<Box<dyn Future<Output = Result<Option<MarketEvent>>> + Send + '_>> {
            Box::pin(async move {
                if let Some(err) = self.take_injected_error().await {
                    return Err(err);
                }
                let events = self.events.read().await;
                Ok(events
                    .values()
                    .filter(|e| e.collection == collection && e.kind == kind)
                    .max_by_key(|e| e.created_at)
                    .cloned())
            })
        }

        fn find_by_ids(
            &self,
            ids: Vec<EventId>,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<MarketEvent>>> + Send + '_>> {
            Box::pin(async move {
                if let Some(err) = self.take_injected_error().await {
                    return Err(err);
                }
                let events = self.events.read().await;
                Ok(ids.iter().filter_map(|id| events.get(id).cloned()).collect())
            })
        }

        fn upsert_all(
            &self,
            batch: Vec<MarketEvent>,
        ) -> Pin<Box<dyn Future<Output = Result<()>> + Send + '_>> {
            Box::pin(async move {
                if let Some(err) = self.take_injected_error().await {
                    return Err(err);
                }
                let mut events = self.events.write().await;
                for event in batch {
                    events.insert(event.id.clone(), event);
                }
                Ok(())
            })
        }
    }
}

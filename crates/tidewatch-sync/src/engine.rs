//! Incremental, deduplicated retrieval of new marketplace events.
//!
//! One `sync` call resolves the watermark for its (collection, kind) pair,
//! pages backward from the current time until a termination condition
//! fires, persists the whole batch once, then fans it out to every
//! configured notification target. Pagination is strictly sequential: each
//! page's window depends on the previous page's oldest timestamp.

use std::{collections::HashSet, sync::Arc, time::Duration};

use tidewatch_core::{
    models::{CollectionKey, EventId, EventKind, MarketEvent, SyncRequest},
    time::Clock,
};
use tracing::{debug, info};

use crate::{
    error::Result,
    notify::Notifier,
    source::{EventSource, PageQuery},
    store::EventStore,
};

/// Events fetched per kind when seeding a baseline.
const BASELINE_EVENTS: usize = 1;

/// Tuning knobs for the sync loop.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    /// Pause between successive page fetches, keeping the engine under the
    /// upstream feed's throughput limits.
    pub page_delay: Duration,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self { page_delay: Duration::from_secs(2) }
    }
}

/// Why the pagination loop stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum StopReason {
    /// The feed returned an empty page.
    Exhausted,
    /// The accumulated batch exceeded the requested maximum.
    MaxEventsReached,
    /// The page contained the watermark event; the window has caught up to
    /// previously known state.
    ReachedWatermark,
    /// The feed returned fewer events than requested; no older pages exist.
    ShortPage,
    /// The page budget ran out.
    PageBudget,
}

impl StopReason {
    const fn as_str(self) -> &'static str {
        match self {
            Self::Exhausted => "exhausted",
            Self::MaxEventsReached => "max events reached",
            Self::ReachedWatermark => "reached watermark",
            Self::ShortPage => "short page",
            Self::PageBudget => "page budget",
        }
    }
}

/// Orchestrates incremental event retrieval, persistence, and fan-out.
pub struct EventSyncEngine {
    source: Arc<dyn EventSource>,
    store: Arc<dyn EventStore>,
    notifier: Arc<dyn Notifier>,
    clock: Arc<dyn Clock>,
    config: SyncConfig,
}

impl EventSyncEngine {
    /// Creates an engine over its collaborators.
    pub fn new(
        source: Arc<dyn EventSource>,
        store: Arc<dyn EventStore>,
        notifier: Arc<dyn Notifier>,
        clock: Arc<dyn Clock>,
        config: SyncConfig,
    ) -> Self {
        Self { source, store, notifier, clock, config }
    }

    /// Gathers events newer than the stored watermark, persists them, and
    /// notifies every configured target.
    ///
    /// Returns the gathered batch; an empty batch means the store already
    /// held everything the feed currently has. Persistence happens once,
    /// after accumulation completes, so a failed call commits nothing.
    ///
    /// # Errors
    ///
    /// Returns [`crate::SyncError::UpstreamFetch`] if any page fetch fails
    /// and [`crate::SyncError::Persistence`] if the store fails; either way
    /// the whole call is aborted.
    pub async fn sync(&self, request: SyncRequest) -> Result<Vec<MarketEvent>> {
        let watermark =
            self.store.most_recent(request.collection.clone(), request.kind).await?;

        let occurred_after = request.window.map_or_else(
            || watermark.as_ref().map_or(0, |event| event.created_at.timestamp()),
            |window| window.after,
        );
        let mut occurred_before = request
            .window
            .and_then(|window| window.before)
            .unwrap_or_else(|| self.clock.epoch_seconds());

        let watermark_id = watermark.map(|event| event.id);
        let page_size = request.page_size.max(1);
        let max_pages = (request.max_events / page_size).max(1);

        info!(
            collection = %request.collection,
            kind = %request.kind,
            occurred_after,
            occurred_before,
            max_pages,
            "starting event sync"
        );

        let mut collected: Vec<MarketEvent> = Vec::new();
        let mut collected_ids: HashSet<EventId> = HashSet::new();
        let mut stop = StopReason::PageBudget;

        for page in 0..max_pages {
            let query = PageQuery {
                collection: request.collection.clone(),
                kind: request.kind,
                occurred_after,
                occurred_before: Some(occurred_before),
                offset: 0,
                limit: page_size,
                only_marketplace: request.only_marketplace_auctions,
                auction_type: request.auction_type,
            };

            debug!(page, occurred_after, occurred_before, "fetching page");
            let raw_page = self.source.fetch_page(query).await?;

            if raw_page.is_empty() {
                stop = StopReason::Exhausted;
                break;
            }

            let fresh = self.drop_already_stored(&raw_page).await?;
            for event in fresh {
                if collected_ids.insert(event.id.clone()) {
                    collected.push(event);
                }
            }

            if collected.len() > request.max_events {
                stop = StopReason::MaxEventsReached;
                break;
            }

            if watermark_id
                .as_ref()
                .is_some_and(|id| raw_page.iter().any(|event| &event.id == id))
            {
                stop = StopReason::ReachedWatermark;
                break;
            }

            if raw_page.len() < page_size {
                stop = StopReason::ShortPage;
                break;
            }

            // Move the upper bound back to the oldest event seen so the next
            // page covers strictly older activity.
            if let Some(oldest) = raw_page.iter().min_by_key(|event| event.created_at) {
                occurred_before = oldest.created_at.timestamp();
            }

            self.clock.sleep(self.config.page_delay).await;
        }

        info!(
            collection = %request.collection,
            kind = %request.kind,
            gathered = collected.len(),
            reason = stop.as_str(),
            "event sync pagination finished"
        );

        self.store.upsert_all(collected.clone()).await?;

        for target in &request.targets {
            self.notifier.notify(collected.clone(), target.clone()).await;
        }

        Ok(collected)
    }

    /// Seeds one most-recent listing and one most-recent sale for a
    /// collection so a later `sync` has a watermark to start from instead of
    /// importing full history.
    ///
    /// Returns the listed batch, matching what the sync surface reports.
    ///
    /// # Errors
    ///
    /// Returns an error if either fetch or either upsert fails.
    pub async fn seed_baseline(&self, collection: CollectionKey) -> Result<Vec<MarketEvent>> {
        info!(collection = %collection, quantity = BASELINE_EVENTS, "seeding baseline events");

        let listed = self.fetch_baseline(collection.clone(), EventKind::Created).await?;
        self.store.upsert_all(listed.clone()).await?;

        let sold = self.fetch_baseline(collection.clone(), EventKind::Successful).await?;
        self.store.upsert_all(sold).await?;

        Ok(listed)
    }

    async fn fetch_baseline(
        &self,
        collection: CollectionKey,
        kind: EventKind,
    ) -> Result<Vec<MarketEvent>> {
        let query = PageQuery {
            collection,
            kind,
            occurred_after: 0,
            occurred_before: None,
            offset: 0,
            limit: BASELINE_EVENTS,
            only_marketplace: true,
            auction_type: None,
        };

        let raw_page = self.source.fetch_page(query).await?;
        self.drop_already_stored(&raw_page).await
    }

    /// Cross-run dedup: removes events whose ids are already persisted.
    async fn drop_already_stored(&self, page: &[MarketEvent]) -> Result<Vec<MarketEvent>> {
        let ids: Vec<EventId> = page.iter().map(|event| event.id.clone()).collect();
        let existing: HashSet<EventId> =
            self.store.find_by_ids(ids).await?.into_iter().map(|event| event.id).collect();

        if !existing.is_empty() {
            debug!(already_stored = existing.len(), "dropping previously persisted events");
        }

        Ok(page.iter().filter(|event| !existing.contains(&event.id)).cloned().collect())
    }
}

impl std::fmt::Debug for EventSyncEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventSyncEngine").field("config", &self.config).finish_non_exhaustive()
    }
}

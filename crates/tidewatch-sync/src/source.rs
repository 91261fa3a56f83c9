//! Upstream feed abstraction.
//!
//! The engine consumes the feed through [`EventSource`] so pagination logic
//! can be tested against scripted pages without HTTP. The production
//! implementation is [`crate::client::MarketplaceClient`].

use std::{future::Future, pin::Pin};

use tidewatch_core::models::{AuctionType, CollectionKey, EventKind, MarketEvent};

use crate::error::Result;

/// One page request against the upstream feed.
///
/// The window is `[occurred_after, occurred_before)` in epoch seconds; the
/// feed returns events newest-first within it.
#[derive(Debug, Clone, PartialEq)]
pub struct PageQuery {
    /// Collection to filter on.
    pub collection: CollectionKey,
    /// Event kind to filter on.
    pub kind: EventKind,
    /// Lower time bound, inclusive, epoch seconds.
    pub occurred_after: i64,
    /// Upper time bound, exclusive, epoch seconds. `None` means "up to now".
    pub occurred_before: Option<i64>,
    /// Page offset; the engine always pages by moving the window, not the
    /// offset.
    pub offset: usize,
    /// Maximum events in the page.
    pub limit: usize,
    /// Restrict to marketplace-native auctions.
    pub only_marketplace: bool,
    /// Auction mechanism filter.
    pub auction_type: Option<AuctionType>,
}

/// Paginated read-only access to the upstream feed.
pub trait EventSource: Send + Sync {
    /// Fetches one page of events for the query, newest-first.
    ///
    /// A page shorter than `query.limit` signals that no older events exist
    /// within the window.
    fn fetch_page(
        &self,
        query: PageQuery,
    ) -> Pin<Box<dyn Future<Output = Result<Vec<MarketEvent>>> + Send + '_>>;
}

pub mod mock {
    //! Scripted feed for engine tests.

    use std::{collections::VecDeque, future::Future, pin::Pin, sync::Arc};

    use tidewatch_core::models::MarketEvent;
    use tokio::sync::Mutex;

    use super::{EventSource, PageQuery};
    use crate::error::{Result, SyncError};

    /// Feed double that replays a fixed sequence of pages.
    ///
    /// Each `fetch_page` call pops the next scripted page; once the script
    /// runs out the source returns empty pages. Every received query is
    /// recorded for assertion.
    #[derive(Default)]
    pub struct ScriptedEventSource {
        pages: Arc<Mutex<VecDeque<Result<Vec<MarketEvent>>>>>,
        queries: Arc<Mutex<Vec<PageQuery>>>,
    }

    impl ScriptedEventSource {
        /// Creates a source with an empty script.
        pub fn new() -> Self {
            Self::default()
        }

        /// Appends a page to the script.
        pub async fn push_page(&self, events: Vec<MarketEvent>) {
            self.pages.lock().await.push_back(Ok(events));
        }

        /// Appends a failing fetch to the script.
        pub async fn push_error(&self, message: &str) {
            self.pages.lock().await.push_back(Err(SyncError::upstream(message)));
        }

        /// Queries received so far, in call order.
        pub async fn recorded_queries(&self) -> Vec<PageQuery> {
            self.queries.lock().await.clone()
        }
    }

    impl EventSource for ScriptedEventSource {
        fn fetch_page(
            &self,
            query: PageQuery,
        ) -> Pin<Box<dyn Future<Output = Result<Vec<MarketEvent>>> + Send + '_>> {
            let pages = self.pages.clone();
            let queries = self.queries.clone();
            Box::pin(async move {
                queries.lock().await.push(query);
                pages.lock().await.pop_front().unwrap_or_else(|| Ok(Vec::new()))
            })
        }
    }
}

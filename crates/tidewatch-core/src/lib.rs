//! Core domain types for the tidewatch event monitor.
//!
//! Provides the marketplace event model, strongly-typed identifiers, the
//! error taxonomy shared across crates, a clock abstraction for testable
//! waits, and the PostgreSQL repository for durable event storage. The
//! sync, notify, and api crates all build on these foundations.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod error;
pub mod models;
pub mod storage;
pub mod time;

pub use error::{CoreError, Result};
pub use models::{
    AssetInfo, AuctionType, CollectionInfo, CollectionKey, EventId, EventKind, MarketEvent,
    PaymentToken, SyncRequest, TimeWindow, Wallet, WebhookTarget,
};
pub use time::{Clock, RealClock, TestClock};

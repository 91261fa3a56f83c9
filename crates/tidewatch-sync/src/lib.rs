//! Incremental event synchronization engine.
//!
//! Pages backward through the upstream marketplace feed from the current
//! time toward the last persisted watermark, deduplicating against both the
//! accumulated batch and durable storage, then persists the batch once and
//! fans it out to the configured notification targets.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod engine;
pub mod error;
pub mod notify;
pub mod source;
pub mod store;

pub use client::{MarketplaceClient, MarketplaceConfig};
pub use engine::{EventSyncEngine, SyncConfig};
pub use error::{Result, SyncError};
pub use notify::{NoOpNotifier, Notifier};
pub use source::{EventSource, PageQuery};
pub use store::{EventStore, PostgresEventStore};

//! HTTP surface for the tidewatch service.
//!
//! Exposes the two engine operations — sync events for a collection, seed
//! baseline events for a collection — plus health checks, and owns the
//! layered configuration the binary wires everything from.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod config;
pub mod handlers;
pub mod server;

use std::sync::Arc;

use tidewatch_sync::EventSyncEngine;

pub use config::Config;
pub use server::{create_router, start_server};

/// Shared state handed to every handler.
#[derive(Clone, Debug)]
pub struct AppState {
    /// The sync engine serving both operations.
    pub engine: Arc<EventSyncEngine>,
}

impl AppState {
    /// Creates state around a shared engine.
    pub fn new(engine: Arc<EventSyncEngine>) -> Self {
        Self { engine }
    }
}

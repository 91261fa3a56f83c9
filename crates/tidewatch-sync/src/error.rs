//! Error types for sync operations.
//!
//! A sync either returns the full gathered batch or fails as a whole: both
//! variants abort the current call with no partial persistence, since the
//! engine only writes after accumulation completes.

use thiserror::Error;
use tidewatch_core::CoreError;

/// Result type alias for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;

/// Failures that abort a sync or seed call.
#[derive(Debug, Clone, Error)]
pub enum SyncError {
    /// The upstream feed could not be fetched or decoded.
    #[error("upstream fetch failed: {message}")]
    UpstreamFetch {
        /// What went wrong talking to the feed.
        message: String,
    },

    /// The durable store failed.
    #[error("persistence failed: {message}")]
    Persistence {
        /// What went wrong in storage.
        message: String,
    },
}

impl SyncError {
    /// Creates an upstream fetch error.
    pub fn upstream(message: impl Into<String>) -> Self {
        Self::UpstreamFetch { message: message.into() }
    }

    /// Creates a persistence error.
    pub fn persistence(message: impl Into<String>) -> Self {
        Self::Persistence { message: message.into() }
    }
}

impl From<CoreError> for SyncError {
    fn from(err: CoreError) -> Self {
        Self::Persistence { message: err.to_string() }
    }
}

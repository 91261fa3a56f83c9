//! Error types for notification delivery.
//!
//! An over-limit response is the only recoverable failure: the dispatcher
//! sleeps on its guidance and retries the event once. Everything else
//! aborts the current dispatch call for its target; events already sent
//! stay sent.

use thiserror::Error;

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;

/// Failures raised while delivering notifications.
#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// The target returned an over-limit (429) response.
    #[error("webhook rate limited, retry after {retry_after_ms:?}ms")]
    RateLimited {
        /// Provider guidance on how long to back off, milliseconds.
        retry_after_ms: Option<u64>,
    },

    /// The target rejected the delivery.
    #[error("webhook delivery failed: HTTP {status}: {message}")]
    Transport {
        /// HTTP status returned by the target.
        status: u16,
        /// Response detail.
        message: String,
    },

    /// The target could not be reached.
    #[error("webhook network failure: {message}")]
    Network {
        /// Connection-level detail.
        message: String,
    },

    /// The client could not be configured.
    #[error("webhook configuration error: {message}")]
    Configuration {
        /// Configuration detail.
        message: String,
    },
}

impl DispatchError {
    /// Creates an over-limit error with optional backoff guidance.
    pub fn rate_limited(retry_after_ms: Option<u64>) -> Self {
        Self::RateLimited { retry_after_ms }
    }

    /// Creates a transport error from an HTTP response.
    pub fn transport(status: u16, message: impl Into<String>) -> Self {
        Self::Transport { status, message: message.into() }
    }

    /// Creates a network error.
    pub fn network(message: impl Into<String>) -> Self {
        Self::Network { message: message.into() }
    }

    /// Creates a configuration error.
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration { message: message.into() }
    }

    /// Whether the dispatcher may recover from this failure in place.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

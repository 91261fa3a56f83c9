//! Rate-limited webhook notification dispatch.
//!
//! Formats newly observed marketplace events into embed-style webhook
//! messages and delivers them oldest-first to each configured target,
//! pausing for the provider's quota headers and retrying a single time on
//! an over-limit response.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod client;
pub mod dispatcher;
pub mod error;
pub mod message;
pub mod transport;

pub use client::{WebhookClient, WebhookConfig};
pub use dispatcher::{DispatcherConfig, NotificationDispatcher};
pub use error::{DispatchError, Result};
pub use message::{build_notification, Notification};
pub use transport::{NotificationTransport, TransportResponse};

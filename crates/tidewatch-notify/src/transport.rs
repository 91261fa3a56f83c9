//! Transport abstraction for webhook delivery.
//!
//! The dispatcher consumes the provider through [`NotificationTransport`],
//! and reads its quota state from the response headers: remaining calls,
//! the epoch second the quota resets at, and (on an over-limit failure)
//! how long to back off.

use std::{collections::HashMap, future::Future, pin::Pin};

use tidewatch_core::models::WebhookTarget;

use crate::{error::Result, message::Notification};

/// Remaining-quota response header.
pub const RATE_LIMIT_REMAINING_HEADER: &str = "x-ratelimit-remaining";
/// Quota-reset-epoch response header, epoch seconds.
pub const RATE_LIMIT_RESET_HEADER: &str = "x-ratelimit-reset";
/// Backoff guidance header on over-limit responses, milliseconds.
pub const RETRY_AFTER_HEADER: &str = "retry-after";

/// Transport-level response metadata from one delivery.
#[derive(Debug, Clone, Default)]
pub struct TransportResponse {
    /// HTTP status of the delivery.
    pub status: u16,
    /// Response headers, lowercased names.
    pub headers: HashMap<String, String>,
}

impl TransportResponse {
    /// Creates a successful response with no headers.
    pub fn ok() -> Self {
        Self { status: 200, headers: HashMap::new() }
    }

    /// Creates a successful response carrying the given headers.
    pub fn with_headers(headers: HashMap<String, String>) -> Self {
        Self { status: 200, headers }
    }

    fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).map(String::as_str)
    }

    /// Remaining quota reported by the provider, if readable.
    pub fn rate_limit_remaining(&self) -> Option<u32> {
        self.header(RATE_LIMIT_REMAINING_HEADER).and_then(|v| v.trim().parse().ok())
    }

    /// Epoch second the quota resets at, if readable.
    pub fn rate_limit_reset_epoch(&self) -> Option<i64> {
        self.header(RATE_LIMIT_RESET_HEADER).and_then(|v| v.trim().parse().ok())
    }
}

/// Delivers one formatted message to one webhook endpoint.
pub trait NotificationTransport: Send + Sync {
    /// Posts the notification to the target.
    ///
    /// An over-limit response surfaces as
    /// [`crate::DispatchError::RateLimited`] rather than a response, so the
    /// dispatcher's retry path never has to inspect statuses.
    fn post(
        &self,
        notification: Notification,
        target: WebhookTarget,
    ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + '_>>;
}

pub mod mock {
    //! Scripted transport for dispatcher tests.

    use std::{collections::VecDeque, future::Future, pin::Pin, sync::Arc};

    use tidewatch_core::models::WebhookTarget;
    use tokio::sync::Mutex;

    use super::{NotificationTransport, TransportResponse};
    use crate::{
        error::{DispatchError, Result},
        message::Notification,
    };

    /// Transport double that replays scripted outcomes.
    ///
    /// Each `post` pops the next scripted outcome; once the script runs out
    /// every delivery succeeds with a plain 200. All posted notifications
    /// are recorded in order.
    #[derive(Default)]
    pub struct ScriptedTransport {
        script: Arc<Mutex<VecDeque<Result<TransportResponse>>>>,
        posts: Arc<Mutex<Vec<(WebhookTarget, Notification)>>>,
    }

    impl ScriptedTransport {
        /// Creates a transport with an empty script.
        pub fn new() -> Self {
            Self::default()
        }

        /// Appends a response to the script.
        pub async fn push_response(&self, response: TransportResponse) {
            self.script.lock().await.push_back(Ok(response));
        }

        /// Appends a failing delivery to the script.
        pub async fn push_error(&self, error: DispatchError) {
            self.script.lock().await.push_back(Err(error));
        }

        /// Notifications posted so far, in delivery order.
        pub async fn recorded_posts(&self) -> Vec<(WebhookTarget, Notification)> {
            self.posts.lock().await.clone()
        }
    }

    impl NotificationTransport for ScriptedTransport {
        fn post(
            &self,
            notification: Notification,
            target: WebhookTarget,
        ) -> Pin<Box<dyn Future<Output = Result<TransportResponse>> + Send + '_>> {
            let script = self.script.clone();
            let posts = self.posts.clone();
            Box::pin(async move {
                posts.lock().await.push((target, notification));
                script.lock().await.pop_front().unwrap_or_else(|| Ok(TransportResponse::ok()))
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn parses_quota_headers() {
        let mut headers = HashMap::new();
        headers.insert(RATE_LIMIT_REMAINING_HEADER.to_string(), "0".to_string());
        headers.insert(RATE_LIMIT_RESET_HEADER.to_string(), "1700000001".to_string());

        let response = TransportResponse::with_headers(headers);
        assert_eq!(response.rate_limit_remaining(), Some(0));
        assert_eq!(response.rate_limit_reset_epoch(), Some(1_700_000_001));
    }

    #[test]
    fn unreadable_quota_headers_read_as_absent() {
        let mut headers = HashMap::new();
        headers.insert(RATE_LIMIT_REMAINING_HEADER.to_string(), "0".to_string());
        headers.insert(RATE_LIMIT_RESET_HEADER.to_string(), "soon".to_string());

        let response = TransportResponse::with_headers(headers);
        assert_eq!(response.rate_limit_remaining(), Some(0));
        assert_eq!(response.rate_limit_reset_epoch(), None);

        assert_eq!(TransportResponse::ok().rate_limit_remaining(), None);
    }
}

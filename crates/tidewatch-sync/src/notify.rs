//! Notification fan-out seam.
//!
//! The engine hands the persisted batch to a [`Notifier`] once per target.
//! Implementations own their failure handling: a target that cannot be
//! notified must not fail the sync that produced the batch, so the seam
//! returns nothing and implementations log what they drop.

use std::{future::Future, pin::Pin};

use tidewatch_core::models::{MarketEvent, WebhookTarget};

/// Delivers a batch of newly observed events to one notification target.
pub trait Notifier: Send + Sync {
    /// Delivers the batch to the target, handling failures internally.
    fn notify(
        &self,
        events: Vec<MarketEvent>,
        target: WebhookTarget,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

/// Notifier that drops every batch. Useful for tests and for running the
/// engine without any configured targets.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoOpNotifier;

impl Notifier for NoOpNotifier {
    fn notify(
        &self,
        _events: Vec<MarketEvent>,
        _target: WebhookTarget,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async {})
    }
}

pub mod mock {
    //! Recording notifier for engine tests.

    use std::{future::Future, pin::Pin, sync::Arc};

    use tidewatch_core::models::{MarketEvent, WebhookTarget};
    use tokio::sync::RwLock;

    use super::Notifier;

    /// Records every dispatch call for assertion.
    #[derive(Default)]
    pub struct RecordingNotifier {
        calls: Arc<RwLock<Vec<(WebhookTarget, Vec<MarketEvent>)>>>,
    }

    impl RecordingNotifier {
        /// Creates a notifier with no recorded calls.
        pub fn new() -> Self {
            Self::default()
        }

        /// Dispatch calls received so far, in order.
        pub async fn recorded_calls(&self) -> Vec<(WebhookTarget, Vec<MarketEvent>)> {
            self.calls.read().await.clone()
        }
    }

    impl Notifier for RecordingNotifier {
        fn notify(
            &self,
            events: Vec<MarketEvent>,
            target: WebhookTarget,
        ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
            let calls = self.calls.clone();
            Box::pin(async move {
                calls.write().await.push((target, events));
            })
        }
    }
}

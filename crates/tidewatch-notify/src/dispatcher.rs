//! Ordered, quota-aware notification dispatch.
//!
//! One dispatch call delivers a batch to one target, oldest event first.
//! Two deliveries for the same target are never in flight at once: the
//! loop is strictly sequential, with waits driven by the provider's quota
//! headers plus a fixed politeness delay between sends.

use std::{future::Future, pin::Pin, sync::Arc, time::Duration};

use tidewatch_core::{
    models::{MarketEvent, WebhookTarget},
    time::Clock,
};
use tidewatch_sync::Notifier;
use tracing::{error, info, warn};

use crate::{
    error::{DispatchError, Result},
    message::build_notification,
    transport::{NotificationTransport, TransportResponse},
};

/// Tuning knobs for the dispatcher.
#[derive(Debug, Clone)]
pub struct DispatcherConfig {
    /// Fixed delay between successive deliveries to the same target,
    /// regardless of rate-limit state.
    pub send_delay: Duration,
    /// Minimum wait once the provider reports an exhausted quota.
    pub rate_limit_floor: Duration,
    /// Marketplace origin used for seller/buyer profile links.
    pub profile_base_url: String,
    /// Symbol of the reference currency that gets smallest-unit scaling and
    /// a USD line.
    pub reference_symbol: String,
}

impl Default for DispatcherConfig {
    fn default() -> Self {
        Self {
            send_delay: Duration::from_millis(250),
            rate_limit_floor: Duration::from_millis(2000),
            profile_base_url: "https://opensea.io".to_string(),
            reference_symbol: "ETH".to_string(),
        }
    }
}

/// Delivers formatted notifications for a batch of events to one target at
/// a time.
pub struct NotificationDispatcher {
    transport: Arc<dyn NotificationTransport>,
    clock: Arc<dyn Clock>,
    config: DispatcherConfig,
}

impl NotificationDispatcher {
    /// Creates a dispatcher over a transport and clock.
    pub fn new(
        transport: Arc<dyn NotificationTransport>,
        clock: Arc<dyn Clock>,
        config: DispatcherConfig,
    ) -> Self {
        Self { transport, clock, config }
    }

    /// Delivers the batch to the target, oldest event first.
    ///
    /// An over-limit delivery sleeps on the provider's guidance and is
    /// retried exactly once, after which the loop moves on regardless of
    /// the retry's outcome. An over-limit response without guidance, or any
    /// other transport failure, aborts the call: remaining events in the
    /// batch are not sent to this target.
    ///
    /// # Errors
    ///
    /// Returns the aborting [`DispatchError`]; deliveries made before the
    /// abort stay delivered.
    pub async fn dispatch(&self, events: &[MarketEvent], target: &WebhookTarget) -> Result<()> {
        info!(count = events.len(), target = %target, "dispatching notifications");

        let mut ordered: Vec<&MarketEvent> = events.iter().collect();
        ordered.sort_by_key(|event| event.created_at);

        for event in ordered {
            let notification = build_notification(
                event,
                &self.config.profile_base_url,
                &self.config.reference_symbol,
                self.clock.now_utc(),
            );

            match self.transport.post(notification.clone(), target.clone()).await {
                Ok(response) => self.respect_quota(&response).await,
                Err(DispatchError::RateLimited { retry_after_ms }) => {
                    match retry_after_ms.filter(|ms| *ms > 0) {
                        Some(ms) => {
                            warn!(
                                event_id = %event.id,
                                retry_after_ms = ms,
                                "delivery over limit, sleeping and retrying once"
                            );
                            self.clock.sleep(Duration::from_millis(ms)).await;
                            if let Err(retry_error) =
                                self.transport.post(notification, target.clone()).await
                            {
                                warn!(
                                    event_id = %event.id,
                                    error = %retry_error,
                                    "retry delivery failed, moving on"
                                );
                            }
                        },
                        None => {
                            return Err(DispatchError::transport(
                                429,
                                "over limit with no retry-after guidance",
                            ));
                        },
                    }
                },
                Err(other) => return Err(other),
            }

            self.clock.sleep(self.config.send_delay).await;
        }

        Ok(())
    }

    /// Honors the provider's quota headers after a successful delivery.
    ///
    /// A zero remaining quota with a readable reset epoch waits until that
    /// instant, clamped up to the floor; an unreadable reset waits the floor
    /// alone.
    async fn respect_quota(&self, response: &TransportResponse) {
        let Some(remaining) = response.rate_limit_remaining() else {
            return;
        };
        if remaining != 0 {
            return;
        }

        let Some(reset_epoch) = response.rate_limit_reset_epoch() else {
            info!("quota exhausted with unreadable reset, waiting floor");
            self.clock.sleep(self.config.rate_limit_floor).await;
            return;
        };

        let wait_ms = reset_epoch * 1000 - self.clock.epoch_millis();
        if wait_ms > 0 {
            let wait =
                Duration::from_millis(wait_ms.unsigned_abs()).max(self.config.rate_limit_floor);
            info!(wait_ms = wait.as_millis() as u64, "quota exhausted, waiting for reset");
            self.clock.sleep(wait).await;
        }
    }
}

impl Notifier for NotificationDispatcher {
    fn notify(
        &self,
        events: Vec<MarketEvent>,
        target: WebhookTarget,
    ) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(async move {
            if let Err(dispatch_error) = self.dispatch(&events, &target).await {
                error!(
                    target = %target,
                    error = %dispatch_error,
                    "notification dispatch aborted for target"
                );
            }
        })
    }
}

impl std::fmt::Debug for NotificationDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationDispatcher")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

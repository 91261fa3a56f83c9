//! Clock abstraction for testable waits.
//!
//! The sync engine's inter-page delay and the dispatcher's rate-limit and
//! politeness waits all go through [`Clock`], so production code sleeps on
//! the tokio timer while tests advance virtual time instantly.

use std::{
    fmt,
    future::Future,
    pin::Pin,
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::Duration,
};

use chrono::{DateTime, TimeZone, Utc};

/// Time source and sleep provider.
pub trait Clock: Send + Sync + fmt::Debug {
    /// Current time, UTC.
    fn now_utc(&self) -> DateTime<Utc>;

    /// Suspends for the given duration.
    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>>;
}

impl dyn Clock {
    /// Current time as epoch seconds, the unit the upstream feed paginates in.
    pub fn epoch_seconds(&self) -> i64 {
        self.now_utc().timestamp()
    }

    /// Current time as epoch milliseconds, the unit rate-limit math runs in.
    pub fn epoch_millis(&self) -> i64 {
        self.now_utc().timestamp_millis()
    }
}

/// Production clock backed by the system time and the tokio timer.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now_utc(&self) -> DateTime<Utc> {
        Utc::now()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        Box::pin(tokio::time::sleep(duration))
    }
}

/// Deterministic clock for tests.
///
/// Holds virtual time as epoch milliseconds; `sleep` advances the clock
/// instead of waiting, so time-dependent paths run instantly and the
/// advanced amount can be asserted on.
#[derive(Debug, Clone)]
pub struct TestClock {
    epoch_ms: Arc<AtomicI64>,
}

impl TestClock {
    /// Creates a test clock starting at the given epoch milliseconds.
    pub fn starting_at(epoch_ms: i64) -> Self {
        Self { epoch_ms: Arc::new(AtomicI64::new(epoch_ms)) }
    }

    /// Creates a test clock starting at the current system time.
    pub fn new() -> Self {
        Self::starting_at(Utc::now().timestamp_millis())
    }

    /// Advances virtual time.
    pub fn advance(&self, duration: Duration) {
        let ms = i64::try_from(duration.as_millis()).unwrap_or(i64::MAX);
        self.epoch_ms.fetch_add(ms, Ordering::AcqRel);
    }

    /// Jumps virtual time to a specific instant.
    pub fn set_to(&self, instant: DateTime<Utc>) {
        self.epoch_ms.store(instant.timestamp_millis(), Ordering::Release);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now_utc(&self) -> DateTime<Utc> {
        let ms = self.epoch_ms.load(Ordering::Acquire);
        Utc.timestamp_millis_opt(ms).single().unwrap_or_default()
    }

    fn sleep(&self, duration: Duration) -> Pin<Box<dyn Future<Output = ()> + Send + '_>> {
        self.advance(duration);
        // Yield so other tasks observe the advanced clock.
        Box::pin(tokio::task::yield_now())
    }
}

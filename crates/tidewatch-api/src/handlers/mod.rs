//! Request handlers for the monitor API.

mod events;
mod health;

pub use events::{seed_baseline, sync_events};
pub use health::health_check;

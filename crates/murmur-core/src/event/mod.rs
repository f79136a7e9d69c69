//! Runtime event bus.
//!
//! Provides an `EventBus` that distributes `RuntimeEvent` messages (run
//! lifecycle, actions, model usage) to all subscribers via a
//! `tokio::sync::broadcast` channel.

pub mod bus;

pub use bus::{EventBus, RunSubscription};

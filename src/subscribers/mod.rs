//! # Event subscribers for the pinwatch runtime.
//!
//! This module provides the [`Subscribe`] trait and the [`SubscriberSet`]
//! fan-out used to deliver runtime events broadcast through the
//! [`Bus`](crate::events::Bus) to user-defined handlers.
//!
//! ## Architecture
//! ```text
//! ReaderActor / Poller / Monitor ── publish(Event) ──► Bus
//!                                                       │
//!                                            subscriber listener (Monitor)
//!                                                       │
//!                                              SubscriberSet::emit(&Event)
//!                                              ┌─────────┼─────────┐
//!                                              ▼         ▼         ▼
//!                                         [queue S1] [queue S2] [queue SN]
//!                                              │         │         │
//!                                         worker S1  worker S2  worker SN
//!                                              ▼         ▼         ▼
//!                                        sub.on_event(&Event)  (per subscriber)
//! ```
//!
//! ## Implementing custom subscribers
//! ```rust
//! use async_trait::async_trait;
//! use pinwatch::{Event, EventKind, Subscribe};
//!
//! struct FailureCounter;
//!
//! #[async_trait]
//! impl Subscribe for FailureCounter {
//!     async fn on_event(&self, event: &Event) {
//!         if event.kind == EventKind::ReaderSpawnFailed {
//!             // increment a counter, page someone, ...
//!         }
//!     }
//!
//!     fn name(&self) -> &'static str {
//!         "failure-counter"
//!     }
//! }
//! ```

#[cfg(feature = "logging")]
mod log;
mod set;
mod subscribe;

#[cfg(feature = "logging")]
pub use log::LogWriter;
pub use set::SubscriberSet;
pub use subscribe::Subscribe;

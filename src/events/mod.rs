//! Runtime events: types and broadcast bus.
//!
//! This module groups the event **data model** and the **bus** used to
//! publish/subscribe to runtime events emitted by the monitor, reader actors
//! and session pollers.
//!
//! ## Contents
//! - [`EventKind`], [`Event`] — event classification and payload metadata
//! - [`Bus`] — thin wrapper over `tokio::sync::broadcast`
//!
//! ## Quick reference
//! - **Publishers**: `Monitor` (registration/teardown/shutdown),
//!   `ReaderActor` (spawn/output/exit), `Poller` (change emissions).
//! - **Consumers**: the monitor's subscriber listener (fans out to the
//!   [`SubscriberSet`](crate::SubscriberSet)) and anything holding a
//!   [`Bus::subscribe`] receiver (tests do this a lot).

mod bus;
mod event;

pub use bus::Bus;
pub use event::{Event, EventKind};

//! Runtime core: registration, polling and lifecycle.
//!
//! The only entry point here is [`Monitor`], which owns the shared store, the
//! event bus and the reader handles, and hands out [`Session`]s.
//!
//! Internal modules:
//! - [`core`]: the [`Monitor`] itself — registration, teardown, shutdown;
//! - [`builder`]: wiring of bus, store and subscriber fan-out;
//! - [`poller`]: per-session fixed-period differ;
//! - [`session`]: the consumer-facing handle and its lifecycle;
//! - [`shutdown`]: cross-platform OS signal handling.

mod builder;
mod core;
mod poller;
mod session;
mod shutdown;

pub use builder::MonitorBuilder;
pub use core::Monitor;
pub use session::{ChangeEvent, Session, SessionId, SessionStatus};

pub(crate) use core::Shared;

//! Reader process supervision.
//!
//! One [`ReaderActor`] exists per claimed fingerprint. It owns the external
//! reader process end to end: spawning, pumping stdout into the store,
//! forwarding stderr diagnostics, and deciding between respawn (unexpected
//! exit) and terminal wind-down (owner teardown).
//!
//! Internal modules:
//! - [`command`]: builds the `loop` command line from a [`SourceConfig`](crate::SourceConfig);
//! - [`actor`]: the supervision loop.

mod actor;
mod command;

pub(crate) use actor::ReaderActor;

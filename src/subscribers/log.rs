//! # Simple logging subscriber for debugging and demos.
//!
//! [`LogWriter`] prints events to stdout in a human-readable format.
//! Primarily useful for development, debugging, and examples.
//!
//! ## Output format
//! ```text
//! [registered] session=1 fingerprint=74HC165-03ab.. role=owner
//! [spawned] fingerprint=74HC165-03ab.. pid=4242
//! [line] fingerprint=74HC165-03ab.. raw=9
//! [change] session=1 bit=3 active=true
//! [exited] fingerprint=74HC165-03ab.. status="exit status: 1"
//! [respawning] fingerprint=74HC165-03ab..
//! [killed] fingerprint=74HC165-03ab..
//! ```

use async_trait::async_trait;

use crate::events::{Event, EventKind};
use crate::subscribers::Subscribe;

/// Simple stdout logging subscriber.
///
/// Enabled via the `logging` feature. Prints human-readable event
/// descriptions for debugging and demonstration purposes.
///
/// Not intended for production use — implement a custom [`Subscribe`] for
/// structured logging or metrics collection.
#[derive(Default)]
pub struct LogWriter;

impl LogWriter {
    /// Creates a new writer.
    pub fn new() -> Self {
        Self
    }
}

fn opt<T: std::fmt::Display>(v: &Option<T>) -> String {
    v.as_ref().map(|v| v.to_string()).unwrap_or_default()
}

#[async_trait]
impl Subscribe for LogWriter {
    async fn on_event(&self, e: &Event) {
        match e.kind {
            EventKind::SessionRegistered => {
                println!(
                    "[registered] session={} fingerprint={} role={}",
                    opt(&e.session),
                    opt(&e.fingerprint),
                    e.reason.as_deref().unwrap_or("?")
                );
            }
            EventKind::SessionClosed => {
                println!(
                    "[closed] session={} fingerprint={}",
                    opt(&e.session),
                    opt(&e.fingerprint)
                );
            }
            EventKind::ReaderSpawned => {
                println!(
                    "[spawned] fingerprint={} pid={}",
                    opt(&e.fingerprint),
                    opt(&e.pid)
                );
            }
            EventKind::ReaderSpawnFailed => {
                println!(
                    "[spawn-failed] fingerprint={} err={:?}",
                    opt(&e.fingerprint),
                    e.reason
                );
            }
            EventKind::ReaderLine => {
                println!(
                    "[line] fingerprint={} raw={}",
                    opt(&e.fingerprint),
                    e.line.as_deref().unwrap_or("")
                );
            }
            EventKind::ReaderStderr => {
                println!(
                    "[stderr] fingerprint={} line={}",
                    opt(&e.fingerprint),
                    e.line.as_deref().unwrap_or("")
                );
            }
            EventKind::ReaderExited => {
                println!(
                    "[exited] fingerprint={} status={:?}",
                    opt(&e.fingerprint),
                    e.reason
                );
            }
            EventKind::ReaderRespawning => {
                println!("[respawning] fingerprint={}", opt(&e.fingerprint));
            }
            EventKind::ReaderKilled => {
                println!("[killed] fingerprint={}", opt(&e.fingerprint));
            }
            EventKind::ChangeEmitted => {
                println!(
                    "[change] session={} bit={} active={}",
                    opt(&e.session),
                    opt(&e.bit),
                    e.active.unwrap_or(false)
                );
            }
            EventKind::SessionOverflow => {
                println!(
                    "[overflow] session={} bit={}",
                    opt(&e.session),
                    opt(&e.bit)
                );
            }
            EventKind::ShutdownRequested => {
                println!("[shutdown-requested]");
            }
            EventKind::AllStoppedWithin => {
                println!("[all-stopped-within-grace]");
            }
            EventKind::GraceExceeded => {
                println!("[grace-exceeded]");
            }
        }
    }

    fn name(&self) -> &'static str {
        "log-writer"
    }
}

//! # Runtime events emitted by the supervisor, reader actors and pollers.
//!
//! [`EventKind`] classifies events across four categories:
//! - **Session events**: registration and close of consumer sessions
//! - **Reader events**: spawn, output, exit, respawn and kill of the process
//! - **Data events**: change emissions and session queue overflow
//! - **Shutdown events**: runtime-wide teardown
//!
//! The [`Event`] struct carries optional metadata (fingerprint, session id,
//! reader line, reason) depending on the kind.
//!
//! ## Ordering guarantees
//! Each event has a globally unique sequence number (`seq`) that increases
//! monotonically. Use `seq` to restore the exact order when events are
//! delivered out of order.

use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;
use std::time::SystemTime;

use crate::fingerprint::Fingerprint;
use crate::monitor::SessionId;

/// Global sequence counter for event ordering.
static EVENT_SEQ: AtomicU64 = AtomicU64::new(0);

/// Classification of runtime events.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventKind {
    // === Session events ===
    /// A consumer session registered.
    ///
    /// Sets: `session`, `fingerprint`, `reason` (`"owner"` / `"observer"`).
    SessionRegistered,

    /// A consumer session closed.
    ///
    /// Sets: `session`, `fingerprint`.
    SessionClosed,

    // === Reader process events ===
    /// A reader process was spawned for a fingerprint.
    ///
    /// Sets: `fingerprint`, `pid` (when the OS reported one).
    ReaderSpawned,

    /// Spawning the reader failed; the actor retries immediately.
    ///
    /// Sets: `fingerprint`, `reason`.
    ReaderSpawnFailed,

    /// The reader reported a new raw reading on stdout.
    ///
    /// Sets: `fingerprint`, `line` (trimmed).
    ReaderLine,

    /// The reader wrote a diagnostic line on stderr (non-fatal).
    ///
    /// Sets: `fingerprint`, `line`.
    ReaderStderr,

    /// The reader exited without the supervisor having killed it.
    ///
    /// Sets: `fingerprint`, `reason` (exit status).
    ReaderExited,

    /// The actor is about to respawn after an unexpected exit.
    ///
    /// Sets: `fingerprint`.
    ReaderRespawning,

    /// The reader was killed by an owner-initiated teardown (terminal).
    ///
    /// Sets: `fingerprint`.
    ReaderKilled,

    // === Data path events ===
    /// A session emitted a change event to its consumer.
    ///
    /// Sets: `session`, `fingerprint`, `bit`, `active`.
    ChangeEmitted,

    /// A session's change queue was full; the event was dropped for it.
    ///
    /// Sets: `session`, `fingerprint`, `bit`.
    SessionOverflow,

    // === Shutdown events ===
    /// Runtime shutdown requested.
    ShutdownRequested,

    /// All reader actors finished within the configured grace period.
    AllStoppedWithin,

    /// Grace period exceeded; some reader actors were still running.
    GraceExceeded,
}

/// Runtime event with optional metadata.
///
/// - `seq`: monotonic global sequence for ordering
/// - `at`: wall-clock timestamp (for logs)
/// - other fields are set depending on the [`EventKind`]
#[derive(Clone, Debug)]
pub struct Event {
    /// Globally unique, monotonically increasing sequence number.
    pub seq: u64,
    /// Wall-clock timestamp.
    pub at: SystemTime,
    /// Event classification.
    pub kind: EventKind,

    /// Fingerprint of the source this event concerns.
    pub fingerprint: Option<Fingerprint>,
    /// Session the event concerns, if any.
    pub session: Option<SessionId>,
    /// Reader output line (stdout or stderr).
    pub line: Option<Arc<str>>,
    /// Human-readable reason (spawn errors, exit status, etc.).
    pub reason: Option<Arc<str>>,
    /// OS process id of the reader.
    pub pid: Option<u32>,
    /// Observed bit index.
    pub bit: Option<u8>,
    /// Boolean payload of a change emission.
    pub active: Option<bool>,
}

impl Event {
    /// Creates a new event of the given kind with current timestamp and next
    /// sequence number.
    pub fn new(kind: EventKind) -> Self {
        Self {
            seq: EVENT_SEQ.fetch_add(1, AtomicOrdering::Relaxed),
            at: SystemTime::now(),
            kind,
            fingerprint: None,
            session: None,
            line: None,
            reason: None,
            pid: None,
            bit: None,
            active: None,
        }
    }

    /// Attaches a fingerprint.
    #[inline]
    pub fn with_fingerprint(mut self, fingerprint: &Fingerprint) -> Self {
        self.fingerprint = Some(fingerprint.clone());
        self
    }

    /// Attaches a session id.
    #[inline]
    pub fn with_session(mut self, session: SessionId) -> Self {
        self.session = Some(session);
        self
    }

    /// Attaches a reader output line.
    #[inline]
    pub fn with_line(mut self, line: impl Into<Arc<str>>) -> Self {
        self.line = Some(line.into());
        self
    }

    /// Attaches a human-readable reason.
    #[inline]
    pub fn with_reason(mut self, reason: impl Into<Arc<str>>) -> Self {
        self.reason = Some(reason.into());
        self
    }

    /// Attaches the reader's OS process id.
    #[inline]
    pub fn with_pid(mut self, pid: u32) -> Self {
        self.pid = Some(pid);
        self
    }

    /// Attaches an observed bit index.
    #[inline]
    pub fn with_bit(mut self, bit: u8) -> Self {
        self.bit = Some(bit);
        self
    }

    /// Attaches the boolean payload of a change emission.
    #[inline]
    pub fn with_active(mut self, active: bool) -> Self {
        self.active = Some(active);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seq_is_monotonic() {
        let a = Event::new(EventKind::ReaderSpawned);
        let b = Event::new(EventKind::ReaderExited);
        assert!(b.seq > a.seq);
    }

    #[test]
    fn test_builders_set_fields() {
        let ev = Event::new(EventKind::ChangeEmitted)
            .with_session(SessionId(4))
            .with_bit(3)
            .with_active(true);
        assert_eq!(ev.session, Some(SessionId(4)));
        assert_eq!(ev.bit, Some(3));
        assert_eq!(ev.active, Some(true));
    }
}

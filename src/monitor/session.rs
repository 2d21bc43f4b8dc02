//! # Consumer session: one observer of one bit.
//!
//! A [`Session`] is what [`Monitor::register`](crate::Monitor::register)
//! returns: a handle bundling the change-event stream, the live status, and
//! the close path. Each session has its own poller and its own last-seen
//! value; sessions sharing a fingerprint share nothing else.
//!
//! ## Lifecycle
//! ```text
//! Waiting ──(first emitting poll)──► On | Off ──(close)──► Closing
//!    └────────────(close)─────────────────────────────────► Closing
//! ```
//! `Closing` is terminal. Close cancels the poll timer cooperatively (no
//! further ticks run once `close` returns) and, for the owning session,
//! tears the reader process down. A non-owner closing never affects the
//! process.
//!
//! Dropping a session without calling [`Session::close`] cancels its poller
//! but skips the owner teardown; owners should always close explicitly.

use std::fmt;
use std::sync::Arc;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::events::{Event, EventKind};
use crate::fingerprint::Fingerprint;
use crate::monitor::Shared;

/// Identity of a consumer session, unique within one [`Monitor`](crate::Monitor).
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SessionId(pub u64);

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Presentation status of a session, derived 1:1 from its state machine.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionStatus {
    /// No reading observed yet.
    Waiting,
    /// Last observed bit was set.
    On,
    /// Last observed bit was clear.
    Off,
    /// Session closed; terminal.
    Closing,
}

/// Change notification delivered to a session's consumer.
///
/// Emitted only when the masked integer value of the observed bit differs
/// from the previous emission for this session.
#[derive(Clone, Debug)]
pub struct ChangeEvent {
    /// Emitting session.
    pub id: SessionId,
    /// Observed bit index.
    pub bit: u8,
    /// Whether the bit is set in the latest reading.
    pub payload: bool,
    /// Fingerprint of the shared source.
    pub fingerprint: Fingerprint,
}

/// Registered observer of one bit of one source.
pub struct Session {
    id: SessionId,
    fingerprint: Fingerprint,
    bit: u8,
    is_owner: bool,
    changes: mpsc::Receiver<ChangeEvent>,
    status: watch::Receiver<SessionStatus>,
    cancel: CancellationToken,
    poll_join: Option<JoinHandle<()>>,
    shared: Arc<Shared>,
    closed: bool,
}

impl Session {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        id: SessionId,
        fingerprint: Fingerprint,
        bit: u8,
        is_owner: bool,
        changes: mpsc::Receiver<ChangeEvent>,
        status: watch::Receiver<SessionStatus>,
        cancel: CancellationToken,
        poll_join: JoinHandle<()>,
        shared: Arc<Shared>,
    ) -> Self {
        Self {
            id,
            fingerprint,
            bit,
            is_owner,
            changes,
            status,
            cancel,
            poll_join: Some(poll_join),
            shared,
            closed: false,
        }
    }

    /// Session identity.
    pub fn id(&self) -> SessionId {
        self.id
    }

    /// Fingerprint of the shared source this session observes.
    pub fn fingerprint(&self) -> &Fingerprint {
        &self.fingerprint
    }

    /// Observed bit index.
    pub fn bit(&self) -> u8 {
        self.bit
    }

    /// True if this session's registration spawned the reader process.
    ///
    /// Only the owner's [`close`](Session::close) tears the process down.
    pub fn is_owner(&self) -> bool {
        self.is_owner
    }

    /// Current presentation status.
    pub fn status(&self) -> SessionStatus {
        *self.status.borrow()
    }

    /// Returns an independent watcher of status transitions.
    pub fn status_updates(&self) -> watch::Receiver<SessionStatus> {
        self.status.clone()
    }

    /// Receives the next change event.
    ///
    /// Returns `None` once the poller has stopped and the queue is drained.
    pub async fn recv(&mut self) -> Option<ChangeEvent> {
        self.changes.recv().await
    }

    /// Closes the session: cancel the poller, then (owner only) tear the
    /// reader process down.
    ///
    /// The poller is joined before teardown, so no tick runs after this
    /// returns. Closing a non-owner never affects the shared process.
    pub async fn close(mut self) {
        self.closed = true;
        self.cancel.cancel();
        if let Some(join) = self.poll_join.take() {
            let _ = join.await;
        }

        if self.is_owner {
            self.shared.teardown(&self.fingerprint, self.id).await;
        }

        self.shared.bus.publish(
            Event::new(EventKind::SessionClosed)
                .with_session(self.id)
                .with_fingerprint(&self.fingerprint),
        );
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        if !self.closed {
            self.cancel.cancel();
        }
    }
}

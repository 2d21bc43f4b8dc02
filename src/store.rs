//! # Shared state store: one entry per fingerprint.
//!
//! The store is the single rendezvous point between the reader actor (writes
//! each stdout line) and the session pollers (read on every tick). It keeps
//! pure key/value semantics; everything event-shaped lives on the bus.
//!
//! ## The three-valued reading
//! [`RawValue`] distinguishes three situations that must not be conflated:
//! - `NotPresent` — no reader process exists for this fingerprint;
//! - `Pending` — a reader is running (or being spawned) but has not reported;
//! - `Present(line)` — the latest raw reading is available.
//!
//! The spawn decision ([`StateStore::claim`]) and the poller's no-op decision
//! both depend on telling these apart.
//!
//! ## Concurrency
//! Registration is check-then-act: read the entry, decide, write it. On a
//! multi-threaded runtime that sequence needs a lock, so the atomic
//! transitions (`claim`, `recycle`, `clear`) each run under the store's
//! internal mutex. Callers never observe a half-applied transition.
//!
//! ## Rules
//! - At most one owner per fingerprint at a time (`claim` enforces it).
//! - `clear` is terminal from the supervisor's point of view: a subsequent
//!   `recycle` by a stale actor fails and the actor winds down.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use crate::fingerprint::Fingerprint;
use crate::monitor::SessionId;

/// Three-state reading slot for one fingerprint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum RawValue {
    /// No reader process exists.
    NotPresent,
    /// Reader running, no reading reported yet.
    Pending,
    /// Latest raw reading (trimmed stdout line).
    Present(Arc<str>),
}

impl RawValue {
    /// True if a reading is available.
    pub fn is_present(&self) -> bool {
        matches!(self, RawValue::Present(_))
    }
}

/// Keyed storage shared by the supervisor and every session poller.
///
/// Implementations must make each method atomic with respect to the others;
/// the default [`MemoryStore`] holds everything under one mutex.
pub trait StateStore: Send + Sync + 'static {
    /// Returns the reading slot for `fingerprint` (`NotPresent` if unknown).
    fn raw(&self, fingerprint: &Fingerprint) -> RawValue;

    /// Returns the owning session, if a reader entry exists.
    fn owner(&self, fingerprint: &Fingerprint) -> Option<SessionId>;

    /// Atomic registration step: `NotPresent → Pending` with `owner` recorded.
    ///
    /// Returns `true` if this call performed the transition (the caller is
    /// now the owner and must spawn the reader), `false` if an entry already
    /// existed (the caller becomes a non-owning observer).
    fn claim(&self, fingerprint: &Fingerprint, owner: SessionId) -> bool;

    /// Stores a trimmed stdout line as `Present`.
    ///
    /// No-op if the entry was cleared in the meantime: a line from a reader
    /// that lost a teardown race must not resurrect the entry.
    fn put(&self, fingerprint: &Fingerprint, line: &str);

    /// Atomic respawn step after an unexpected exit: if the entry still
    /// belongs to `owner`, drop the stale reading (`→ Pending`) and return
    /// `true`. Returns `false` if the entry is gone or re-owned, in which
    /// case the caller must not respawn.
    fn recycle(&self, fingerprint: &Fingerprint, owner: SessionId) -> bool;

    /// Owner-initiated teardown: entry back to `NotPresent`, permanently.
    fn clear(&self, fingerprint: &Fingerprint);
}

/// Per-fingerprint entry: owner identity plus the reading slot.
#[derive(Debug)]
struct Entry {
    owner: SessionId,
    /// Only `Pending` or `Present`; `NotPresent` is the absent entry.
    raw: RawValue,
}

/// Process-wide in-memory store, the default [`StateStore`].
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<Fingerprint, Entry>>,
}

impl MemoryStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateStore for MemoryStore {
    fn raw(&self, fingerprint: &Fingerprint) -> RawValue {
        let entries = self.entries.lock().expect("store lock poisoned");
        entries
            .get(fingerprint)
            .map(|e| e.raw.clone())
            .unwrap_or(RawValue::NotPresent)
    }

    fn owner(&self, fingerprint: &Fingerprint) -> Option<SessionId> {
        let entries = self.entries.lock().expect("store lock poisoned");
        entries.get(fingerprint).map(|e| e.owner)
    }

    fn claim(&self, fingerprint: &Fingerprint, owner: SessionId) -> bool {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if entries.contains_key(fingerprint) {
            return false;
        }
        entries.insert(
            fingerprint.clone(),
            Entry {
                owner,
                raw: RawValue::Pending,
            },
        );
        true
    }

    fn put(&self, fingerprint: &Fingerprint, line: &str) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        if let Some(entry) = entries.get_mut(fingerprint) {
            entry.raw = RawValue::Present(line.trim().into());
        }
    }

    fn recycle(&self, fingerprint: &Fingerprint, owner: SessionId) -> bool {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        match entries.get_mut(fingerprint) {
            Some(entry) if entry.owner == owner => {
                entry.raw = RawValue::Pending;
                true
            }
            _ => false,
        }
    }

    fn clear(&self, fingerprint: &Fingerprint) {
        let mut entries = self.entries.lock().expect("store lock poisoned");
        entries.remove(fingerprint);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SourceConfig;

    fn fp() -> Fingerprint {
        Fingerprint::of(&SourceConfig::default())
    }

    #[test]
    fn test_claim_is_exclusive() {
        let store = MemoryStore::new();
        assert!(store.claim(&fp(), SessionId(1)));
        assert!(!store.claim(&fp(), SessionId(2)));
        assert_eq!(store.owner(&fp()), Some(SessionId(1)));
        assert_eq!(store.raw(&fp()), RawValue::Pending);
    }

    #[test]
    fn test_put_trims_and_requires_entry() {
        let store = MemoryStore::new();

        // No entry: a stray line must not create one.
        store.put(&fp(), "42");
        assert_eq!(store.raw(&fp()), RawValue::NotPresent);

        store.claim(&fp(), SessionId(1));
        store.put(&fp(), "  42\n");
        assert_eq!(store.raw(&fp()), RawValue::Present("42".into()));
    }

    #[test]
    fn test_recycle_only_for_owner() {
        let store = MemoryStore::new();
        store.claim(&fp(), SessionId(1));
        store.put(&fp(), "7");

        assert!(!store.recycle(&fp(), SessionId(2)));
        assert_eq!(store.raw(&fp()), RawValue::Present("7".into()));

        assert!(store.recycle(&fp(), SessionId(1)));
        assert_eq!(store.raw(&fp()), RawValue::Pending);
    }

    #[test]
    fn test_clear_is_terminal_for_stale_actor() {
        let store = MemoryStore::new();
        store.claim(&fp(), SessionId(1));
        store.clear(&fp());

        assert_eq!(store.raw(&fp()), RawValue::NotPresent);
        // The actor that lost the teardown race cannot respawn.
        assert!(!store.recycle(&fp(), SessionId(1)));
        // But a fresh registration can claim again.
        assert!(store.claim(&fp(), SessionId(3)));
    }
}

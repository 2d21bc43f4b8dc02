//! # Per-session differential poller.
//!
//! Every session runs one [`Poller`] on a fixed period. A tick reads the
//! store, masks out the session's bit and emits a [`ChangeEvent`] only when
//! the masked value differs from the previous emission. Pollers across
//! sessions are independent — ticks are unordered relative to each other and
//! to reader output, so staleness up to one poll period is expected.
//!
//! ## Tick decision table
//! ```text
//! store.raw(fp)      cursor.observe(raw)       effect
//! ─────────────      ───────────────────       ──────
//! NotPresent/Pending        —                  no-op (status stays Waiting)
//! Present(raw)          Skip (unparsable)      no-op
//! Present(raw)          Unchanged{active}      status → On/Off
//! Present(raw)          Changed{active}        status → On/Off, emit event
//! ```
//!
//! The dedup comparison is on the **masked integer value**, not on the
//! boolean derived from it. This mirrors the observable contract exactly.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::time::{self, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::events::{Bus, Event, EventKind};
use crate::fingerprint::Fingerprint;
use crate::monitor::session::{ChangeEvent, SessionId, SessionStatus};
use crate::store::{RawValue, StateStore};

/// Differ state for one session: bit position plus last emitted masked value.
///
/// `last = None` is the sentinel for "nothing emitted yet", distinct from any
/// real masked value, so the first observation always emits.
pub(crate) struct BitCursor {
    bit: u8,
    last: Option<u64>,
}

/// Outcome of feeding one raw reading to a [`BitCursor`].
pub(crate) enum Observation {
    /// Reading is not a valid integer; ignore the tick.
    Skip,
    /// Masked value equals the last emission.
    Unchanged { active: bool },
    /// Masked value differs; an event is due.
    Changed { active: bool },
}

impl BitCursor {
    pub(crate) fn new(bit: u8) -> Self {
        Self { bit, last: None }
    }

    /// Parses `raw` and compares the masked bit value against the last
    /// emission.
    pub(crate) fn observe(&mut self, raw: &str) -> Observation {
        let Ok(value) = raw.trim().parse::<u64>() else {
            return Observation::Skip;
        };

        // Bit positions beyond the value width mask to zero.
        let mask = 1u64.checked_shl(u32::from(self.bit)).unwrap_or(0) & value;
        let active = mask != 0;

        if self.last == Some(mask) {
            Observation::Unchanged { active }
        } else {
            self.last = Some(mask);
            Observation::Changed { active }
        }
    }
}

/// Fixed-period poll loop for one session.
pub(crate) struct Poller {
    pub(crate) session: SessionId,
    pub(crate) fingerprint: Fingerprint,
    pub(crate) bit: u8,
    pub(crate) period: Duration,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) bus: Bus,
    pub(crate) changes: mpsc::Sender<ChangeEvent>,
    pub(crate) status: watch::Sender<SessionStatus>,
}

impl Poller {
    /// Ticks until cancelled; marks the session `Closing` on the way out.
    pub(crate) async fn run(self, token: CancellationToken) {
        let mut cursor = BitCursor::new(self.bit);
        let mut ticker = time::interval(self.period);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    let _ = self.status.send(SessionStatus::Closing);
                    return;
                }
                _ = ticker.tick() => self.tick(&mut cursor),
            }
        }
    }

    fn tick(&self, cursor: &mut BitCursor) {
        let RawValue::Present(raw) = self.store.raw(&self.fingerprint) else {
            // No process or no reading yet; the session keeps waiting.
            return;
        };

        match cursor.observe(&raw) {
            Observation::Skip => {}
            Observation::Unchanged { active } => self.refresh_status(active),
            Observation::Changed { active } => {
                self.refresh_status(active);
                self.emit(active);
            }
        }
    }

    /// Recomputes On/Off on every tick with a reading, like the status glyph
    /// of the original presentation layer.
    fn refresh_status(&self, active: bool) {
        let next = if active {
            SessionStatus::On
        } else {
            SessionStatus::Off
        };
        self.status.send_if_modified(|current| {
            if *current != next {
                *current = next;
                true
            } else {
                false
            }
        });
    }

    fn emit(&self, active: bool) {
        let change = ChangeEvent {
            id: self.session,
            bit: self.bit,
            payload: active,
            fingerprint: self.fingerprint.clone(),
        };

        match self.changes.try_send(change) {
            Ok(()) => {
                self.bus.publish(
                    Event::new(EventKind::ChangeEmitted)
                        .with_session(self.session)
                        .with_fingerprint(&self.fingerprint)
                        .with_bit(self.bit)
                        .with_active(active),
                );
            }
            Err(mpsc::error::TrySendError::Full(_)) => {
                self.bus.publish(
                    Event::new(EventKind::SessionOverflow)
                        .with_session(self.session)
                        .with_fingerprint(&self.fingerprint)
                        .with_bit(self.bit),
                );
            }
            // Consumer dropped the session half; close() cancels us shortly.
            Err(mpsc::error::TrySendError::Closed(_)) => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_changed(obs: Observation, expected: bool) {
        match obs {
            Observation::Changed { active } => assert_eq!(active, expected),
            _ => panic!("expected Changed"),
        }
    }

    fn assert_unchanged(obs: Observation) {
        assert!(matches!(obs, Observation::Unchanged { .. }));
    }

    #[test]
    fn test_first_observation_always_emits() {
        let mut cursor = BitCursor::new(0);
        assert_changed(cursor.observe("0"), false);
    }

    #[test]
    fn test_raw_stream_example_bit3() {
        // Raw stream "0", "8", "9" as seen by a bit-3 watcher:
        // masks are 0, 8, 8 → emit false, emit true, silent.
        let mut cursor = BitCursor::new(3);
        assert_changed(cursor.observe("0"), false);
        assert_changed(cursor.observe("8"), true);
        assert_unchanged(cursor.observe("9"));
    }

    #[test]
    fn test_raw_stream_example_bit0() {
        // Same stream for a bit-0 watcher: masks 0, 0, 1.
        let mut cursor = BitCursor::new(0);
        assert_changed(cursor.observe("0"), false);
        assert_unchanged(cursor.observe("8"));
        assert_changed(cursor.observe("9"), true);
    }

    #[test]
    fn test_unparsable_reading_is_skipped() {
        let mut cursor = BitCursor::new(0);
        assert!(matches!(cursor.observe("garbage"), Observation::Skip));
        assert!(matches!(cursor.observe(""), Observation::Skip));
        // Cursor state untouched: next valid reading is still "first".
        assert_changed(cursor.observe("1"), true);
    }

    #[test]
    fn test_whitespace_is_tolerated() {
        let mut cursor = BitCursor::new(1);
        assert_changed(cursor.observe(" 2\n"), true);
    }

    #[test]
    fn test_out_of_range_bit_masks_to_zero() {
        let mut cursor = BitCursor::new(64);
        assert_changed(cursor.observe("18446744073709551615"), false);
        assert_unchanged(cursor.observe("5"));
    }
}

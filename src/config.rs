//! # Monitor and source configuration.
//!
//! Two layers of configuration:
//! 1. **Per-source**: [`SourceConfig`] describes the physical wiring of one
//!    register (three pins + width) and [`WatchSpec`] adds the per-session
//!    observed bit on top of it.
//! 2. **Global**: [`MonitorConfig`] carries runtime-wide settings (reader
//!    program path, poll period, channel capacities, shutdown grace).
//!
//! ## Field semantics
//! - `poll_period`: fixed tick period for every session poller.
//! - `session_capacity`: per-session change-event queue; on overflow the
//!   event is dropped for that session and reported on the bus.
//! - `bus_capacity`: event bus ring buffer size (min 1; clamped by `Bus`).
//! - `grace`: maximum wait for reader actors to exit during shutdown.

use std::path::PathBuf;
use std::time::Duration;

/// Physical wiring of one parallel-in shift register.
///
/// These are the fields that decide *which* reader process a session shares:
/// two configs with identical wiring map to the same
/// [`Fingerprint`](crate::Fingerprint) and therefore the same process. The
/// observed bit index deliberately lives in [`WatchSpec`], not here.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct SourceConfig {
    /// Serial-out pin (board numbering).
    pub serial_out: u8,
    /// Load-data (latch) pin.
    pub load_data: u8,
    /// Clock pin.
    pub clock: u8,
    /// Register width in bits (8 per chip; more when chips are daisy-chained).
    pub bits: u8,
}

impl Default for SourceConfig {
    /// Default wiring of the reference reader program:
    /// pins 11/13/15, a single 8-bit chip.
    fn default() -> Self {
        Self {
            serial_out: 11,
            load_data: 13,
            clock: 15,
            bits: 8,
        }
    }
}

/// What one session observes: a source plus the bit index within its reading.
#[derive(Clone, Copy, Debug)]
pub struct WatchSpec {
    /// Physical source shared with every other session on the same wiring.
    pub source: SourceConfig,
    /// Bit position within the packed integer reading (0-based).
    pub bit: u8,
}

impl WatchSpec {
    /// Creates a spec for watching `bit` of `source`.
    pub fn new(source: SourceConfig, bit: u8) -> Self {
        Self { source, bit }
    }
}

/// Global configuration for the [`Monitor`](crate::Monitor) runtime.
#[derive(Clone, Debug)]
pub struct MonitorConfig {
    /// Path to the reader executable.
    ///
    /// Invoked as `<program> loop --serialOut .. --loadData .. --clock ..
    /// --bits ..`; it must print one line per changed packed reading on
    /// stdout and keep running until killed.
    pub program: PathBuf,

    /// Fixed poll period of every session's differ (default 500 ms).
    pub poll_period: Duration,

    /// Capacity of each session's change-event queue.
    ///
    /// When a session's consumer falls behind, further change events are
    /// dropped for it and reported on the bus.
    pub session_capacity: usize,

    /// Capacity of the event bus broadcast channel ring buffer.
    pub bus_capacity: usize,

    /// Maximum wait for reader actors to finish during [`Monitor::shutdown`](crate::Monitor::shutdown).
    pub grace: Duration,
}

impl MonitorConfig {
    /// Creates a config for the given reader program, everything else default.
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            ..Self::default()
        }
    }

    /// Returns a bus capacity clamped to a minimum of 1.
    #[inline]
    pub fn bus_capacity_clamped(&self) -> usize {
        self.bus_capacity.max(1)
    }

    /// Returns a session queue capacity clamped to a minimum of 1.
    #[inline]
    pub fn session_capacity_clamped(&self) -> usize {
        self.session_capacity.max(1)
    }
}

impl Default for MonitorConfig {
    /// Default configuration:
    ///
    /// - `program = "74HC165.py"` (resolved via `PATH`/cwd)
    /// - `poll_period = 500ms`
    /// - `session_capacity = 64`
    /// - `bus_capacity = 1024`
    /// - `grace = 5s`
    fn default() -> Self {
        Self {
            program: PathBuf::from("74HC165.py"),
            poll_period: Duration::from_millis(500),
            session_capacity: 64,
            bus_capacity: 1024,
            grace: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = MonitorConfig::default();
        assert_eq!(cfg.poll_period, Duration::from_millis(500));
        assert_eq!(cfg.bus_capacity_clamped(), 1024);
    }

    #[test]
    fn test_capacities_clamped() {
        let cfg = MonitorConfig {
            bus_capacity: 0,
            session_capacity: 0,
            ..MonitorConfig::default()
        };
        assert_eq!(cfg.bus_capacity_clamped(), 1);
        assert_eq!(cfg.session_capacity_clamped(), 1);
    }
}

//! Error types used by the pinwatch runtime.
//!
//! This module defines two error enums:
//!
//! - [`MonitorError`] — errors raised by the monitor runtime itself.
//! - [`ReaderError`] — errors around the external reader process.
//!
//! Sessions never receive error values: every reader failure is handled
//! inside the supervisor (respawn or teardown) and surfaced only as events.
//! The indirect symptom of a reader that never produces data is a session
//! that stays in `Waiting` indefinitely.

use std::time::Duration;
use thiserror::Error;

/// # Errors produced by the monitor runtime.
///
/// These represent failures of the orchestration layer, such as a shutdown
/// sequence exceeding its grace period.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum MonitorError {
    /// Shutdown grace period was exceeded; some reader actors were still running.
    #[error("shutdown grace {grace:?} exceeded; stuck readers: {stuck:?}")]
    GraceExceeded {
        /// The configured grace duration.
        grace: Duration,
        /// Fingerprints whose reader actors did not finish in time.
        stuck: Vec<String>,
    },
}

impl MonitorError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use std::time::Duration;
    /// use pinwatch::MonitorError;
    ///
    /// let err = MonitorError::GraceExceeded { grace: Duration::from_secs(5), stuck: vec![] };
    /// assert_eq!(err.as_label(), "monitor_grace_exceeded");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            MonitorError::GraceExceeded { .. } => "monitor_grace_exceeded",
        }
    }

    /// Returns a human-readable message with details about the error.
    pub fn as_message(&self) -> String {
        match self {
            MonitorError::GraceExceeded { grace, stuck } => {
                format!("grace exceeded after {grace:?}; stuck readers={stuck:?}")
            }
        }
    }
}

/// # Errors around the external reader process.
///
/// Never propagated to sessions: a spawn failure is indistinguishable from an
/// immediate crash and both take the unexpected-exit path (respawn, no
/// backoff). The typed error exists so the actor can attach a precise reason
/// to the events it publishes.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum ReaderError {
    /// The reader executable failed to start.
    #[error("failed to spawn reader: {source}")]
    Spawn {
        /// Underlying OS error.
        #[source]
        source: std::io::Error,
    },
}

impl ReaderError {
    /// Returns a short stable label (snake_case) for use in logs/metrics.
    ///
    /// # Example
    /// ```
    /// use pinwatch::ReaderError;
    ///
    /// let err = ReaderError::Spawn {
    ///     source: std::io::Error::from(std::io::ErrorKind::NotFound),
    /// };
    /// assert_eq!(err.as_label(), "reader_spawn_failed");
    /// ```
    pub fn as_label(&self) -> &'static str {
        match self {
            ReaderError::Spawn { .. } => "reader_spawn_failed",
        }
    }
}

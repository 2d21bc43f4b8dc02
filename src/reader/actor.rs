//! # Reader actor: one external process per fingerprint, restarted forever.
//!
//! The actor is the only component that touches the child process. It runs a
//! spawn/pump loop until either the owner tears it down (token cancelled) or
//! the store entry disappears from under it.
//!
//! ## Loop
//! ```text
//! loop {
//!   spawn reader ──fail──► publish ReaderSpawnFailed ─► recycle store ─► retry
//!     │
//!     ├─ stdout line ─► store.put(Present) + publish ReaderLine
//!     ├─ stderr line ─► publish ReaderStderr            (non-fatal)
//!     ├─ token cancelled ─► SIGKILL ─► publish ReaderKilled ─► exit (terminal)
//!     └─ process exited ─► publish ReaderExited
//!            └─ store.recycle(owner) ── true ──► publish ReaderRespawning, loop
//!                                    └─ false ─► exit (torn down concurrently)
//! }
//! ```
//!
//! ## Rules
//! - Unexpected exit and spawn failure take the **same** path: immediate,
//!   unconditional respawn with **no backoff**. A permanently broken reader
//!   therefore crash-loops; callers that need damping can watch
//!   `ReaderSpawnFailed` on the bus and close the owning session.
//! - Teardown is cooperative: the owner clears the store entry and cancels
//!   the token; the actor kills the process and never respawns.
//! - The store entry is never resurrected by a stale actor: `recycle` fails
//!   once the entry is cleared or re-owned.

use std::path::PathBuf;
use std::process::ExitStatus;
use std::sync::Arc;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Child;
use tokio_util::sync::CancellationToken;

use crate::config::SourceConfig;
use crate::error::ReaderError;
use crate::events::{Bus, Event, EventKind};
use crate::fingerprint::Fingerprint;
use crate::monitor::SessionId;
use crate::reader::command::reader_command;
use crate::store::StateStore;

/// How one pump round ended.
enum PumpExit {
    /// Killed by teardown; terminal.
    Killed,
    /// Exited on its own (status, if the OS reported one).
    Exited(Option<ExitStatus>),
}

/// Owns and supervises the reader process for one fingerprint.
pub(crate) struct ReaderActor {
    pub(crate) fingerprint: Fingerprint,
    pub(crate) source: SourceConfig,
    pub(crate) program: PathBuf,
    pub(crate) owner: SessionId,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) bus: Bus,
}

impl ReaderActor {
    /// Runs the supervision loop until teardown or loss of the store entry.
    pub(crate) async fn run(self, token: CancellationToken) {
        loop {
            if token.is_cancelled() {
                break;
            }

            let mut child = match self.spawn() {
                Ok(child) => child,
                Err(err) => {
                    self.bus.publish(
                        Event::new(EventKind::ReaderSpawnFailed)
                            .with_fingerprint(&self.fingerprint)
                            .with_reason(err.to_string()),
                    );
                    if !self.store.recycle(&self.fingerprint, self.owner) {
                        break;
                    }
                    // Immediate retry, but let the runtime schedule teardown.
                    tokio::task::yield_now().await;
                    continue;
                }
            };

            let mut spawned =
                Event::new(EventKind::ReaderSpawned).with_fingerprint(&self.fingerprint);
            if let Some(pid) = child.id() {
                spawned = spawned.with_pid(pid);
            }
            self.bus.publish(spawned);

            match self.pump(&mut child, &token).await {
                PumpExit::Killed => {
                    // Teardown already cleared the store entry; leave it be.
                    self.bus.publish(
                        Event::new(EventKind::ReaderKilled).with_fingerprint(&self.fingerprint),
                    );
                    break;
                }
                PumpExit::Exited(status) => {
                    let reason = status
                        .map(|s| s.to_string())
                        .unwrap_or_else(|| "unknown exit status".to_string());
                    self.bus.publish(
                        Event::new(EventKind::ReaderExited)
                            .with_fingerprint(&self.fingerprint)
                            .with_reason(reason),
                    );

                    if !self.store.recycle(&self.fingerprint, self.owner) {
                        break;
                    }
                    self.bus.publish(
                        Event::new(EventKind::ReaderRespawning)
                            .with_fingerprint(&self.fingerprint),
                    );
                }
            }
        }
    }

    fn spawn(&self) -> Result<Child, ReaderError> {
        reader_command(&self.program, &self.source)
            .spawn()
            .map_err(|source| ReaderError::Spawn { source })
    }

    /// Pumps process output until the child exits or teardown kills it.
    async fn pump(&self, child: &mut Child, token: &CancellationToken) -> PumpExit {
        self.forward_stderr(child);

        let stdout = match child.stdout.take() {
            Some(stdout) => stdout,
            None => return PumpExit::Exited(child.wait().await.ok()),
        };
        let mut lines = BufReader::new(stdout).lines();
        let mut stdout_open = true;

        loop {
            tokio::select! {
                _ = token.cancelled() => {
                    // SIGKILL: unmaskable, the reader cannot ignore it.
                    let _ = child.start_kill();
                    let _ = child.wait().await;
                    return PumpExit::Killed;
                }
                line = lines.next_line(), if stdout_open => match line {
                    Ok(Some(line)) => {
                        self.store.put(&self.fingerprint, &line);
                        self.bus.publish(
                            Event::new(EventKind::ReaderLine)
                                .with_fingerprint(&self.fingerprint)
                                .with_line(line.trim()),
                        );
                    }
                    // EOF or read error: stop pumping, wait for the exit.
                    _ => stdout_open = false,
                },
                status = child.wait(), if !stdout_open => {
                    return PumpExit::Exited(status.ok());
                }
            }
        }
    }

    /// Forwards stderr lines to the bus from a side task.
    ///
    /// Diagnostic only: nothing here terminates the process. The task drains
    /// on EOF when the process dies.
    fn forward_stderr(&self, child: &mut Child) {
        let Some(stderr) = child.stderr.take() else {
            return;
        };
        let bus = self.bus.clone();
        let fingerprint = self.fingerprint.clone();

        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                bus.publish(
                    Event::new(EventKind::ReaderStderr)
                        .with_fingerprint(&fingerprint)
                        .with_line(line),
                );
            }
        });
    }
}

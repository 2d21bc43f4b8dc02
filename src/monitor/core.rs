//! # Monitor: registration, exactly-one-reader dedup and teardown.
//!
//! The [`Monitor`] hands out [`Session`]s and enforces the core invariant:
//! **at most one reader process per fingerprint**, regardless of how many
//! sessions register for that fingerprint or in what order.
//!
//! ## Registration flow
//! ```text
//! register(spec)
//!   ├─► Fingerprint::of(spec.source)                (bit index excluded)
//!   ├─► store.claim(fp, id)
//!   │      ├─ true  ─► spawn ReaderActor(fp)        (this session owns it)
//!   │      └─ false ─► non-owning observer          (reader already running)
//!   ├─► spawn Poller (one per session, period = cfg.poll_period)
//!   └─► Session { change stream, status watch, close }
//! ```
//!
//! `claim` is atomic inside the store, so two sessions racing to register the
//! same fingerprint cannot both spawn: whichever claim lands first owns the
//! reader and the other becomes an observer.
//!
//! ## Teardown flow
//! Owner close → under the readers lock: owner-checked `store.clear(fp)` and
//! removal of the owner's handle → cancel the actor token → actor SIGKILLs
//! the process and exits.
//!
//! Registration takes the same lock around `claim` + handle insertion, and
//! each handle records its owning session. A close racing with a fresh
//! registration for the same wiring therefore cannot cancel the replacement
//! reader or leave its own process running: the stale teardown only touches
//! state that still belongs to the closing session.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::{MonitorConfig, WatchSpec};
use crate::error::MonitorError;
use crate::events::{Bus, Event, EventKind};
use crate::fingerprint::Fingerprint;
use crate::monitor::builder::MonitorBuilder;
use crate::monitor::poller::Poller;
use crate::monitor::session::{Session, SessionId, SessionStatus};
use crate::monitor::shutdown;
use crate::reader::ReaderActor;
use crate::store::StateStore;
use crate::subscribers::SubscriberSet;

/// Handle to a running reader actor.
pub(crate) struct ReaderHandle {
    /// Session whose registration spawned this reader.
    pub(crate) owner: SessionId,
    /// Teardown token for this reader.
    pub(crate) cancel: CancellationToken,
    /// Join handle for the actor's supervision loop.
    pub(crate) join: JoinHandle<()>,
}

/// State shared between the monitor and its sessions.
pub(crate) struct Shared {
    pub(crate) cfg: MonitorConfig,
    pub(crate) store: Arc<dyn StateStore>,
    pub(crate) bus: Bus,
    pub(crate) readers: Mutex<HashMap<Fingerprint, ReaderHandle>>,
    pub(crate) runtime_token: CancellationToken,
    next_session: AtomicU64,
}

impl Shared {
    pub(crate) fn new(
        cfg: MonitorConfig,
        store: Arc<dyn StateStore>,
        bus: Bus,
        runtime_token: CancellationToken,
    ) -> Self {
        Self {
            cfg,
            store,
            bus,
            readers: Mutex::new(HashMap::new()),
            runtime_token,
            next_session: AtomicU64::new(1),
        }
    }

    fn next_session_id(&self) -> SessionId {
        SessionId(self.next_session.fetch_add(1, AtomicOrdering::Relaxed))
    }

    /// Owner-initiated teardown for one fingerprint; terminal, no respawn.
    ///
    /// Both the store entry and the reader handle are touched only if they
    /// still belong to `owner`: a registration that already replaced them
    /// keeps its entry and its reader.
    pub(crate) async fn teardown(&self, fingerprint: &Fingerprint, owner: SessionId) {
        let handle = {
            let mut readers = self.readers.lock().await;
            // Clear under the lock: once the entry is gone, a racing actor
            // cannot recycle it and respawn past this point, and no new
            // claim can interleave with a half-done teardown.
            if self.store.owner(fingerprint) == Some(owner) {
                self.store.clear(fingerprint);
            }
            match readers.get(fingerprint) {
                Some(handle) if handle.owner == owner => readers.remove(fingerprint),
                _ => None,
            }
        };

        if let Some(handle) = handle {
            handle.cancel.cancel();
            let _ = handle.join.await;
        }
    }
}

/// Coordinates reader actors, session pollers and the event bus.
///
/// Cheap to clone; all clones share the same runtime.
///
/// ## Example
/// ```no_run
/// use pinwatch::{Monitor, MonitorConfig, SourceConfig, WatchSpec};
///
/// #[tokio::main(flavor = "current_thread")]
/// async fn main() {
///     let monitor = Monitor::new(MonitorConfig::new("/opt/ichipy/74HC165.py"));
///
///     let mut session = monitor
///         .register(WatchSpec::new(SourceConfig::default(), 3))
///         .await;
///
///     while let Some(change) = session.recv().await {
///         println!("bit {} -> {}", change.bit, change.payload);
///     }
/// }
/// ```
#[derive(Clone)]
pub struct Monitor {
    shared: Arc<Shared>,
}

impl Monitor {
    /// Creates a monitor with no subscribers and the default in-memory store.
    pub fn new(cfg: MonitorConfig) -> Self {
        MonitorBuilder::new(cfg).build()
    }

    /// Returns a builder for a monitor with subscribers or a custom store.
    pub fn builder(cfg: MonitorConfig) -> MonitorBuilder {
        MonitorBuilder::new(cfg)
    }

    pub(crate) fn from_shared(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    /// Returns a handle to the event bus (subscribe for observability).
    pub fn bus(&self) -> Bus {
        self.shared.bus.clone()
    }

    /// Returns the shared state store.
    pub fn store(&self) -> Arc<dyn StateStore> {
        Arc::clone(&self.shared.store)
    }

    /// Registers a consumer session for one bit of one source.
    ///
    /// If no reader process exists for the source's fingerprint, this call
    /// claims ownership and spawns one; otherwise the session piggybacks on
    /// the running reader. Registration itself never fails — a reader that
    /// cannot start keeps being retried in the background while the session
    /// waits.
    pub async fn register(&self, spec: WatchSpec) -> Session {
        let shared = &self.shared;
        let fingerprint = Fingerprint::of(&spec.source);
        let id = shared.next_session_id();

        // Serialized with teardown by the readers lock, so the claim and the
        // handle insertion land as one step.
        let is_owner = {
            let mut readers = shared.readers.lock().await;
            let claimed = shared.store.claim(&fingerprint, id);
            if claimed {
                let handle = self.spawn_reader(&fingerprint, &spec, id);
                readers.insert(fingerprint.clone(), handle);
            }
            claimed
        };

        let (changes_tx, changes_rx) = mpsc::channel(shared.cfg.session_capacity_clamped());
        let (status_tx, status_rx) = watch::channel(SessionStatus::Waiting);
        let cancel = shared.runtime_token.child_token();

        let poller = Poller {
            session: id,
            fingerprint: fingerprint.clone(),
            bit: spec.bit,
            period: shared.cfg.poll_period,
            store: Arc::clone(&shared.store),
            bus: shared.bus.clone(),
            changes: changes_tx,
            status: status_tx,
        };
        let poll_join = tokio::spawn(poller.run(cancel.clone()));

        shared.bus.publish(
            Event::new(EventKind::SessionRegistered)
                .with_session(id)
                .with_fingerprint(&fingerprint)
                .with_reason(if is_owner { "owner" } else { "observer" }),
        );

        Session::new(
            id,
            fingerprint,
            spec.bit,
            is_owner,
            changes_rx,
            status_rx,
            cancel,
            poll_join,
            Arc::clone(shared),
        )
    }

    fn spawn_reader(&self, fingerprint: &Fingerprint, spec: &WatchSpec, owner: SessionId) -> ReaderHandle {
        let shared = &self.shared;
        let actor = ReaderActor {
            fingerprint: fingerprint.clone(),
            source: spec.source,
            program: shared.cfg.program.clone(),
            owner,
            store: Arc::clone(&shared.store),
            bus: shared.bus.clone(),
        };

        let cancel = shared.runtime_token.child_token();
        let join = tokio::spawn(actor.run(cancel.clone()));
        ReaderHandle {
            owner,
            cancel,
            join,
        }
    }

    /// Shuts the whole runtime down: cancels every poller and reader actor,
    /// then waits up to [`MonitorConfig::grace`] for the actors to finish.
    pub async fn shutdown(&self) -> Result<(), MonitorError> {
        let shared = &self.shared;
        shared.bus.publish(Event::new(EventKind::ShutdownRequested));
        shared.runtime_token.cancel();

        let mut handles: Vec<(Fingerprint, ReaderHandle)> =
            shared.readers.lock().await.drain().collect();

        let all_joined = async {
            for (_, handle) in handles.iter_mut() {
                let _ = (&mut handle.join).await;
            }
        };
        let finished = tokio::time::timeout(shared.cfg.grace, all_joined).await;

        match finished {
            Ok(()) => {
                shared.bus.publish(Event::new(EventKind::AllStoppedWithin));
                Ok(())
            }
            Err(_) => {
                let stuck: Vec<String> = handles
                    .iter()
                    .filter(|(_, handle)| !handle.join.is_finished())
                    .map(|(fingerprint, _)| fingerprint.to_string())
                    .collect();
                shared.bus.publish(Event::new(EventKind::GraceExceeded));
                Err(MonitorError::GraceExceeded {
                    grace: shared.cfg.grace,
                    stuck,
                })
            }
        }
    }

    /// Blocks until the process receives a termination signal, then runs
    /// [`Monitor::shutdown`]. Convenience for binaries and demos.
    pub async fn run_until_signal(&self) -> Result<(), MonitorError> {
        let _ = shutdown::wait_for_shutdown_signal().await;
        self.shutdown().await
    }

    /// Subscribes to the bus and forwards events to the subscriber set
    /// (fire-and-forget). Called once during build.
    pub(crate) fn spawn_subscriber_listener(bus: &Bus, subs: Arc<SubscriberSet>) {
        if subs.is_empty() {
            return;
        }
        let mut rx = bus.subscribe();
        tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(ev) => subs.emit(&ev),
                    Err(broadcast::error::RecvError::Lagged(_)) => continue,
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
    }
}

//! End-to-end tests driving the real supervisor against fake reader scripts.
//!
//! Each test writes a small `/bin/sh` script standing in for the hardware
//! reader, registers sessions through a real [`Monitor`] and observes the
//! bus plus the session change streams. Poll period is shortened to 50 ms so
//! the suite stays fast; readings in the scripts are spaced several poll
//! periods apart so every intermediate value is observed.

#![cfg(unix)]

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::broadcast;
use tokio::time::timeout;

use pinwatch::{
    Event, EventKind, Fingerprint, MemoryStore, Monitor, MonitorConfig, RawValue, Session,
    SessionId, SessionStatus, SourceConfig, StateStore, WatchSpec,
};

/// Writes an executable fixture script and returns its path.
fn fixture(name: &str, body: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!("pinwatch-tests-{}", std::process::id()));
    fs::create_dir_all(&dir).unwrap();
    let path = dir.join(name);
    fs::write(&path, format!("#!/bin/sh\n{body}\n")).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn test_config(program: PathBuf) -> MonitorConfig {
    MonitorConfig {
        poll_period: Duration::from_millis(50),
        grace: Duration::from_secs(2),
        ..MonitorConfig::new(program)
    }
}

/// Waits for the next bus event of `kind`, skipping others.
async fn wait_for_kind(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
    wait: Duration,
) -> Option<Event> {
    timeout(wait, async {
        loop {
            match rx.recv().await {
                Ok(ev) if ev.kind == kind => return Some(ev),
                Ok(_) => continue,
                Err(broadcast::error::RecvError::Lagged(_)) => continue,
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    })
    .await
    .unwrap_or(None)
}

/// Counts bus events of `kind` arriving within `window`.
async fn count_kind(
    rx: &mut broadcast::Receiver<Event>,
    kind: EventKind,
    window: Duration,
) -> usize {
    let mut count = 0;
    let deadline = tokio::time::Instant::now() + window;
    loop {
        let left = deadline.saturating_duration_since(tokio::time::Instant::now());
        if left.is_zero() {
            return count;
        }
        match timeout(left, rx.recv()).await {
            Ok(Ok(ev)) if ev.kind == kind => count += 1,
            Ok(Ok(_)) | Ok(Err(broadcast::error::RecvError::Lagged(_))) => continue,
            Ok(Err(broadcast::error::RecvError::Closed)) | Err(_) => return count,
        }
    }
}

/// Collects up to `n` change payloads, giving up after `wait` per event.
async fn collect_payloads(session: &mut Session, n: usize, wait: Duration) -> Vec<bool> {
    let mut payloads = Vec::new();
    while payloads.len() < n {
        match timeout(wait, session.recv()).await {
            Ok(Some(change)) => payloads.push(change.payload),
            _ => break,
        }
    }
    payloads
}

#[tokio::test]
async fn one_reader_regardless_of_session_count() {
    let script = fixture("single_reader.sh", "printf '0\\n'; sleep 60");
    let monitor = Monitor::new(test_config(script));
    let mut bus = monitor.bus().subscribe();

    let source = SourceConfig::default();
    let a = monitor.register(WatchSpec::new(source, 3)).await;
    let b = monitor.register(WatchSpec::new(source, 0)).await;
    let c = monitor.register(WatchSpec::new(source, 5)).await;

    assert_eq!(a.fingerprint(), b.fingerprint());
    assert_eq!(a.fingerprint(), c.fingerprint());
    assert!(a.is_owner());
    assert!(!b.is_owner());
    assert!(!c.is_owner());

    let spawns = count_kind(&mut bus, EventKind::ReaderSpawned, Duration::from_millis(500)).await;
    assert_eq!(spawns, 1);

    c.close().await;
    b.close().await;
    a.close().await;
}

#[tokio::test]
async fn distinct_wiring_gets_distinct_readers() {
    let script = fixture("two_sources.sh", "sleep 60");
    let monitor = Monitor::new(test_config(script));
    let mut bus = monitor.bus().subscribe();

    let a = monitor
        .register(WatchSpec::new(SourceConfig::default(), 0))
        .await;
    let other = SourceConfig {
        clock: 16,
        ..SourceConfig::default()
    };
    let b = monitor.register(WatchSpec::new(other, 0)).await;

    assert_ne!(a.fingerprint(), b.fingerprint());
    assert!(a.is_owner());
    assert!(b.is_owner());

    let spawns = count_kind(&mut bus, EventKind::ReaderSpawned, Duration::from_millis(500)).await;
    assert_eq!(spawns, 2);

    a.close().await;
    b.close().await;
}

#[tokio::test]
async fn masked_value_diffing_per_session() {
    // Readings 0, 8, 9 spaced well beyond the poll period. For bit 3 the
    // masks are 0, 8, 8 (two emissions); for bit 0 they are 0, 0, 1 (the
    // 0 -> 8 step is silent even though the raw value changed).
    let script = fixture(
        "steps.sh",
        "printf '0\\n'; sleep 0.4; printf '8\\n'; sleep 0.4; printf '9\\n'; sleep 60",
    );
    let monitor = Monitor::new(test_config(script));

    let source = SourceConfig::default();
    let mut high = monitor.register(WatchSpec::new(source, 3)).await;
    let mut low = monitor.register(WatchSpec::new(source, 0)).await;

    let high_payloads = collect_payloads(&mut high, 3, Duration::from_millis(700)).await;
    let low_payloads = collect_payloads(&mut low, 3, Duration::from_millis(700)).await;

    assert_eq!(high_payloads, vec![false, true]);
    assert_eq!(low_payloads, vec![false, false, true]);

    assert_eq!(high.status(), SessionStatus::On);
    assert_eq!(low.status(), SessionStatus::On);

    low.close().await;
    high.close().await;
}

#[tokio::test]
async fn non_owner_close_leaves_reader_running() {
    let script = fixture("non_owner.sh", "printf '1\\n'; sleep 60");
    let monitor = Monitor::new(test_config(script));
    let store = monitor.store();

    let source = SourceConfig::default();
    let a = monitor.register(WatchSpec::new(source, 0)).await;
    let b = monitor.register(WatchSpec::new(source, 1)).await;
    let fingerprint = a.fingerprint().clone();

    let mut bus = monitor.bus().subscribe();
    b.close().await;

    let killed = wait_for_kind(&mut bus, EventKind::ReaderKilled, Duration::from_millis(300)).await;
    assert!(killed.is_none(), "observer close must not kill the reader");
    assert_ne!(store.raw(&fingerprint), RawValue::NotPresent);

    a.close().await;
    let killed = wait_for_kind(&mut bus, EventKind::ReaderKilled, Duration::from_secs(2)).await;
    assert!(killed.is_some(), "owner close must kill the reader");
    assert_eq!(store.raw(&fingerprint), RawValue::NotPresent);
}

#[tokio::test]
async fn owner_close_is_terminal_for_observers() {
    let script = fixture("terminal.sh", "printf '2\\n'; sleep 60");
    let monitor = Monitor::new(test_config(script));
    let store = monitor.store();

    let source = SourceConfig::default();
    let a = monitor.register(WatchSpec::new(source, 1)).await;
    let mut b = monitor.register(WatchSpec::new(source, 1)).await;
    let fingerprint = a.fingerprint().clone();

    // Both see the first reading.
    let first = timeout(Duration::from_secs(1), b.recv()).await.unwrap();
    assert_eq!(first.unwrap().payload, true);

    a.close().await;

    // Entry is cleared permanently; the observer gets no further events.
    assert_eq!(store.raw(&fingerprint), RawValue::NotPresent);
    let next = timeout(Duration::from_millis(300), b.recv()).await;
    assert!(next.is_err(), "no events after owner teardown");

    b.close().await;
}

#[tokio::test]
async fn unexpected_exit_respawns_without_new_registration() {
    // Reader prints once and dies; the supervisor must respawn it
    // unconditionally, with no registration call in between.
    let script = fixture("crashy.sh", "printf '5\\n'; sleep 0.05; exit 1");
    let monitor = Monitor::new(test_config(script));
    let mut bus = monitor.bus().subscribe();

    let session = monitor
        .register(WatchSpec::new(SourceConfig::default(), 0))
        .await;

    let exited = wait_for_kind(&mut bus, EventKind::ReaderExited, Duration::from_secs(2)).await;
    assert!(exited.is_some());
    let respawning =
        wait_for_kind(&mut bus, EventKind::ReaderRespawning, Duration::from_secs(2)).await;
    assert!(respawning.is_some());
    let spawned = wait_for_kind(&mut bus, EventKind::ReaderSpawned, Duration::from_secs(2)).await;
    assert!(spawned.is_some(), "a fresh reader must be spawned");

    session.close().await;
}

#[tokio::test]
async fn spawn_failure_retries_until_teardown() {
    let monitor = Monitor::new(test_config(PathBuf::from("/nonexistent/pinwatch-reader")));
    let mut bus = monitor.bus().subscribe();

    let session = monitor
        .register(WatchSpec::new(SourceConfig::default(), 0))
        .await;

    let failures = count_kind(
        &mut bus,
        EventKind::ReaderSpawnFailed,
        Duration::from_millis(200),
    )
    .await;
    assert!(failures >= 2, "spawn failure must retry, got {failures}");

    // Owner close stops the retry loop.
    session.close().await;
    let mut bus = monitor.bus().subscribe();
    let failures = count_kind(
        &mut bus,
        EventKind::ReaderSpawnFailed,
        Duration::from_millis(200),
    )
    .await;
    assert_eq!(failures, 0, "teardown must end the retry loop");
}

#[tokio::test]
async fn stderr_is_diagnostic_only() {
    let script = fixture(
        "stderr.sh",
        "echo oops >&2; printf '4\\n'; sleep 60",
    );
    let monitor = Monitor::new(test_config(script));
    let mut bus = monitor.bus().subscribe();

    let mut session = monitor
        .register(WatchSpec::new(SourceConfig::default(), 2))
        .await;

    let diag = wait_for_kind(&mut bus, EventKind::ReaderStderr, Duration::from_secs(2)).await;
    assert_eq!(diag.unwrap().line.as_deref(), Some("oops"));

    // The process kept running and the reading still arrived.
    let change = timeout(Duration::from_secs(1), session.recv()).await.unwrap();
    assert_eq!(change.unwrap().payload, true);

    session.close().await;
}

#[tokio::test]
async fn silent_reader_keeps_session_waiting() {
    let script = fixture("silent.sh", "sleep 60");
    let monitor = Monitor::new(test_config(script));

    let mut session = monitor
        .register(WatchSpec::new(SourceConfig::default(), 0))
        .await;
    let status = session.status_updates();

    let change = timeout(Duration::from_millis(300), session.recv()).await;
    assert!(change.is_err(), "no reading, no event");
    assert_eq!(session.status(), SessionStatus::Waiting);

    session.close().await;
    assert_eq!(*status.borrow(), SessionStatus::Closing);
}

/// In-contract store whose `clear` takes long enough that a concurrent
/// registration can try to slip into the middle of an owner teardown.
struct SlowClearStore {
    inner: MemoryStore,
}

impl StateStore for SlowClearStore {
    fn raw(&self, fingerprint: &Fingerprint) -> RawValue {
        self.inner.raw(fingerprint)
    }
    fn owner(&self, fingerprint: &Fingerprint) -> Option<SessionId> {
        self.inner.owner(fingerprint)
    }
    fn claim(&self, fingerprint: &Fingerprint, owner: SessionId) -> bool {
        self.inner.claim(fingerprint, owner)
    }
    fn put(&self, fingerprint: &Fingerprint, line: &str) {
        self.inner.put(fingerprint, line)
    }
    fn recycle(&self, fingerprint: &Fingerprint, owner: SessionId) -> bool {
        self.inner.recycle(fingerprint, owner)
    }
    fn clear(&self, fingerprint: &Fingerprint) {
        std::thread::sleep(Duration::from_millis(100));
        self.inner.clear(fingerprint)
    }
}

fn process_alive(pid: u32) -> bool {
    std::process::Command::new("kill")
        .arg("-0")
        .arg(pid.to_string())
        .status()
        .map(|status| status.success())
        .unwrap_or(false)
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn close_racing_with_reregistration_keeps_one_reader() {
    let script = fixture("reopen_race.sh", "printf '1\\n'; sleep 60");
    let monitor = Monitor::builder(test_config(script))
        .with_store(Arc::new(SlowClearStore {
            inner: MemoryStore::new(),
        }))
        .build();
    let mut bus = monitor.bus().subscribe();

    let source = SourceConfig::default();
    let a = monitor.register(WatchSpec::new(source, 0)).await;
    let first = wait_for_kind(&mut bus, EventKind::ReaderSpawned, Duration::from_secs(2))
        .await
        .unwrap();
    let first_pid = first.pid.unwrap();

    // Re-register the same wiring while the owner's close is mid-teardown.
    let reopen = {
        let monitor = monitor.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(30)).await;
            monitor.register(WatchSpec::new(source, 0)).await
        })
    };
    a.close().await;
    let mut b = reopen.await.unwrap();

    // The late registration claims fresh and owns a new reader; the old
    // reader was killed and reaped, not left running against B's entry.
    assert!(b.is_owner(), "registration after close must claim fresh");
    assert!(!process_alive(first_pid), "closed owner's reader must die");

    let second = wait_for_kind(&mut bus, EventKind::ReaderSpawned, Duration::from_secs(2))
        .await
        .unwrap();
    assert_ne!(second.pid.unwrap(), first_pid);

    let change = timeout(Duration::from_secs(2), b.recv()).await.unwrap();
    assert_eq!(change.unwrap().payload, true);

    b.close().await;
}

#[tokio::test]
async fn queue_overflow_is_reported_and_delivery_resumes() {
    // Reading flips every 50 ms against a 10 ms poll and a single-slot
    // queue; an idle consumer overflows after the second change.
    let script = fixture(
        "flapper.sh",
        "while true; do printf '0\\n'; sleep 0.05; printf '1\\n'; sleep 0.05; done",
    );
    let mut cfg = test_config(script);
    cfg.poll_period = Duration::from_millis(10);
    cfg.session_capacity = 1;
    let monitor = Monitor::new(cfg);
    let mut bus = monitor.bus().subscribe();

    let mut session = monitor
        .register(WatchSpec::new(SourceConfig::default(), 0))
        .await;

    let overflow =
        wait_for_kind(&mut bus, EventKind::SessionOverflow, Duration::from_secs(2)).await;
    let overflow = overflow.expect("slow consumer must overflow the queue");
    assert_eq!(overflow.session, Some(session.id()));
    assert_eq!(overflow.bit, Some(0));

    // Dropped events are gone, but draining resumes delivery.
    let change = timeout(Duration::from_secs(1), session.recv()).await.unwrap();
    assert!(change.is_some());
    let change = timeout(Duration::from_secs(1), session.recv()).await.unwrap();
    assert!(change.is_some());

    session.close().await;
}

#[tokio::test]
async fn shutdown_stops_all_readers_within_grace() {
    let script = fixture("shutdown.sh", "printf '1\\n'; sleep 60");
    let monitor = Monitor::new(test_config(script));
    let mut bus = monitor.bus().subscribe();

    let _a = monitor
        .register(WatchSpec::new(SourceConfig::default(), 0))
        .await;
    let other = SourceConfig {
        serial_out: 12,
        ..SourceConfig::default()
    };
    let _b = monitor.register(WatchSpec::new(other, 0)).await;

    monitor.shutdown().await.unwrap();

    let stopped =
        wait_for_kind(&mut bus, EventKind::AllStoppedWithin, Duration::from_secs(1)).await;
    assert!(stopped.is_some());
}

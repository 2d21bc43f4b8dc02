//! # Fan-out of runtime events to user subscribers.
//!
//! The monitor forwards every bus event here. [`SubscriberSet`] gives each
//! subscriber its own bounded queue and worker task, so a change logger that
//! blocks on I/O cannot stall the reader actors, the pollers, or another
//! subscriber's metrics hook.
//!
//! ```text
//! Bus ──► SubscriberSet::emit(&Event)
//!           ├─► queue ─► worker ─► LogWriter::on_event    (feature `logging`)
//!           └─► queue ─► worker ─► <your Subscribe impl>
//! ```
//!
//! Delivery is FIFO per subscriber; there is no ordering across subscribers
//! (reorder by `Event::seq` if it matters). A full or closed queue drops that
//! subscriber's event with a warning, and a panic inside `on_event` is caught
//! so one broken subscriber cannot take the fan-out down.

use std::sync::Arc;

use futures::FutureExt;
use tokio::{sync::mpsc, task::JoinHandle};

use crate::events::Event;

use super::Subscribe;

/// One subscriber's queue plus the name used in drop warnings.
struct Lane {
    name: &'static str,
    queue: mpsc::Sender<Arc<Event>>,
}

/// Composite fan-out with per-subscriber bounded queues and worker tasks.
pub struct SubscriberSet {
    lanes: Vec<Lane>,
    workers: Vec<JoinHandle<()>>,
}

impl SubscriberSet {
    /// Creates the set, one queue and one worker per subscriber.
    #[must_use]
    pub fn new(subs: Vec<Arc<dyn Subscribe>>) -> Self {
        let mut lanes = Vec::with_capacity(subs.len());
        let mut workers = Vec::with_capacity(subs.len());

        for sub in subs {
            let (tx, rx) = mpsc::channel::<Arc<Event>>(sub.queue_capacity().max(1));
            lanes.push(Lane {
                name: sub.name(),
                queue: tx,
            });
            workers.push(tokio::spawn(Self::drive(sub, rx)));
        }

        Self { lanes, workers }
    }

    /// Worker loop: deliver queued events, isolating panics.
    async fn drive(sub: Arc<dyn Subscribe>, mut rx: mpsc::Receiver<Arc<Event>>) {
        while let Some(ev) = rx.recv().await {
            let delivery = std::panic::AssertUnwindSafe(sub.on_event(ev.as_ref()));
            if let Err(panic_err) = delivery.catch_unwind().await {
                eprintln!(
                    "[pinwatch] subscriber '{}' panicked: {:?}",
                    sub.name(),
                    panic_err
                );
            }
        }
    }

    /// Fans one event out to every subscriber without awaiting any of them.
    ///
    /// A subscriber whose queue is full or whose worker is gone loses this
    /// event; the others are unaffected.
    pub fn emit(&self, event: &Event) {
        let ev = Arc::new(event.clone());
        for lane in &self.lanes {
            if let Err(err) = lane.queue.try_send(Arc::clone(&ev)) {
                let why = match err {
                    mpsc::error::TrySendError::Full(_) => "queue full",
                    mpsc::error::TrySendError::Closed(_) => "worker closed",
                };
                eprintln!("[pinwatch] subscriber '{}' dropped event: {why}", lane.name);
            }
        }
    }

    /// Closes every queue and waits for the workers to drain.
    pub async fn shutdown(self) {
        drop(self.lanes);
        for worker in self.workers {
            let _ = worker.await;
        }
    }

    /// True if there are no subscribers.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lanes.is_empty()
    }

    /// Number of subscribers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lanes.len()
    }
}

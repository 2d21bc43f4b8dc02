//! Builder wiring for the monitor runtime.

use std::sync::Arc;

use tokio_util::sync::CancellationToken;

use crate::config::MonitorConfig;
use crate::events::Bus;
use crate::monitor::core::{Monitor, Shared};
use crate::store::{MemoryStore, StateStore};
use crate::subscribers::{Subscribe, SubscriberSet};

/// Builder for constructing a [`Monitor`] with optional features.
///
/// ## Example
/// ```no_run
/// use std::sync::Arc;
/// use pinwatch::{Monitor, MonitorConfig, Subscribe};
///
/// # fn subscribers() -> Vec<Arc<dyn Subscribe>> { Vec::new() }
/// let monitor = Monitor::builder(MonitorConfig::new("/opt/ichipy/74HC165.py"))
///     .with_subscribers(subscribers())
///     .build();
/// ```
pub struct MonitorBuilder {
    cfg: MonitorConfig,
    subscribers: Vec<Arc<dyn Subscribe>>,
    store: Option<Arc<dyn StateStore>>,
}

impl MonitorBuilder {
    /// Creates a new builder with the given configuration.
    pub fn new(cfg: MonitorConfig) -> Self {
        Self {
            cfg,
            subscribers: Vec::new(),
            store: None,
        }
    }

    /// Sets event subscribers for observability.
    ///
    /// Subscribers receive runtime events (reader lifecycle, change
    /// emissions, failures) through dedicated workers with bounded queues.
    pub fn with_subscribers(mut self, subscribers: Vec<Arc<dyn Subscribe>>) -> Self {
        self.subscribers = subscribers;
        self
    }

    /// Adds one subscriber.
    pub fn with_subscriber(mut self, subscriber: Arc<dyn Subscribe>) -> Self {
        self.subscribers.push(subscriber);
        self
    }

    /// Replaces the default in-memory store with a custom implementation.
    pub fn with_store(mut self, store: Arc<dyn StateStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Builds the monitor: bus, store, subscriber fan-out and root token.
    pub fn build(self) -> Monitor {
        let bus = Bus::new(self.cfg.bus_capacity_clamped());
        let store = self
            .store
            .unwrap_or_else(|| Arc::new(MemoryStore::new()) as Arc<dyn StateStore>);
        let runtime_token = CancellationToken::new();

        let subs = Arc::new(SubscriberSet::new(self.subscribers));
        Monitor::spawn_subscriber_listener(&bus, subs);

        let shared = Arc::new(Shared::new(self.cfg, store, bus, runtime_token));
        Monitor::from_shared(shared)
    }
}

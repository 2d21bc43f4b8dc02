//! # pinwatch
//!
//! **pinwatch** lets many independent consumers observe bits of a shared
//! hardware register while guaranteeing that only one reader process exists
//! per unique wiring, transparently restarting that process on unexpected
//! termination, and notifying each consumer only when its observed bit
//! changes.
//!
//! The external reader (one per 74HC165-style shift register) is a separate
//! executable that prints the packed register value on stdout whenever it
//! changes; pinwatch supervises it and fans the readings out.
//!
//! ## Architecture
//! ### Overview
//! ```text
//!  ┌────────────┐   ┌────────────┐   ┌────────────┐
//!  │  Session A │   │  Session B │   │  Session C │     (consumers; each
//!  │  (bit 3)   │   │  (bit 0)   │   │  (bit 5)   │      watches one bit)
//!  └─────┬──────┘   └─────┬──────┘   └─────┬──────┘
//!        │ Poller (500ms) │ Poller         │ Poller      (one per session,
//!        ▼                ▼                ▼              independent diffing)
//! ┌───────────────────────────────────────────────────┐
//! │  StateStore   { fingerprint → owner + RawValue }  │
//! │  RawValue ∈ { NotPresent, Pending, Present(raw) } │
//! └───────────────────────────▲───────────────────────┘
//!                             │ put(line)
//!                      ┌──────┴───────┐
//!                      │  ReaderActor │  (at most one per fingerprint;
//!                      │ (supervision │   respawns on unexpected exit,
//!                      │    loop)     │   killed on owner close)
//!                      └──────┬───────┘
//!                             │ spawn / SIGKILL
//!                      ┌──────▼───────┐
//!                      │ reader proc  │  `<program> loop --serialOut ..
//!                      │  (external)  │   --loadData .. --clock .. --bits ..`
//!                      └──────────────┘
//!
//! Everything above also publishes to the Bus (broadcast channel), which the
//! Monitor fans out to user subscribers via SubscriberSet.
//! ```
//!
//! ### Lifecycle
//! ```text
//! Monitor::register(WatchSpec) ──► Fingerprint::of(source)   (bit excluded)
//!   ├─ store.claim(fp) == true  ──► spawn ReaderActor         (owner)
//!   ├─ store.claim(fp) == false ──► reuse running reader      (observer)
//!   └─ spawn Poller ──► Session { recv(), status(), close() }
//!
//! Session::close()
//!   ├─ cancel poller (status → Closing)
//!   └─ if owner: store.clear(fp) + SIGKILL reader             (terminal)
//! ```
//!
//! ## Features
//! | Area            | Description                                             | Key types / traits                     |
//! |-----------------|----------------------------------------------------------|----------------------------------------|
//! | **Sessions**    | Register observers, receive change events, close.        | [`Monitor`], [`Session`], [`WatchSpec`] |
//! | **Dedup**       | One reader process per wiring fingerprint.               | [`Fingerprint`], [`StateStore`]        |
//! | **Supervision** | Respawn on crash, SIGKILL on owner close.                | `ReaderActor` (internal)               |
//! | **Events**      | Observe the runtime (spawns, exits, changes, overflow).  | [`Bus`], [`Event`], [`Subscribe`]      |
//! | **Errors**      | Typed errors for the runtime layer.                      | [`MonitorError`], [`ReaderError`]      |
//!
//! ## Optional features
//! - `logging`: exports a simple built-in `LogWriter` _(demo/reference only)_.
//!
//! ## Example
//! ```no_run
//! use pinwatch::{Monitor, MonitorConfig, SourceConfig, WatchSpec};
//!
//! #[tokio::main(flavor = "current_thread")]
//! async fn main() {
//!     let monitor = Monitor::new(MonitorConfig::new("/opt/ichipy/74HC165.py"));
//!
//!     // Two sessions, same wiring: one reader process, two observed bits.
//!     let source = SourceConfig::default();
//!     let mut motion = monitor.register(WatchSpec::new(source, 3)).await;
//!     let door = monitor.register(WatchSpec::new(source, 0)).await;
//!     assert_eq!(motion.fingerprint(), door.fingerprint());
//!
//!     while let Some(change) = motion.recv().await {
//!         println!("bit {} is now {}", change.bit, change.payload);
//!     }
//! }
//! ```

mod config;
mod error;
mod events;
mod fingerprint;
mod monitor;
mod reader;
mod store;
mod subscribers;

// ---- Public re-exports ----

pub use config::{MonitorConfig, SourceConfig, WatchSpec};
pub use error::{MonitorError, ReaderError};
pub use events::{Bus, Event, EventKind};
pub use fingerprint::Fingerprint;
pub use monitor::{ChangeEvent, Monitor, MonitorBuilder, Session, SessionId, SessionStatus};
pub use store::{MemoryStore, RawValue, StateStore};
pub use subscribers::{Subscribe, SubscriberSet};

// Optional: expose a simple built-in logger subscriber (demo/reference).
// Enable with: `--features logging`
#[cfg(feature = "logging")]
pub use subscribers::LogWriter;

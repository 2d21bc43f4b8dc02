//! # Demo: watch_bits
//!
//! Watch two bits of one shift register through a single shared reader
//! process, printing change events until Ctrl-C.
//!
//! ## Flow
//! ```text
//! main()
//!   ├─► Monitor::builder(cfg).with_subscriber(LogWriter).build()
//!   ├─► register(bit 3)  ──► owns + spawns the reader
//!   ├─► register(bit 0)  ──► observer on the same fingerprint
//!   ├─► print change events from both sessions
//!   └─► Ctrl-C ──► close sessions ──► reader killed, runtime shut down
//! ```
//!
//! ## Run
//! ```bash
//! cargo run --example watch_bits --features logging -- /opt/ichipy/74HC165.py
//! ```

use std::sync::Arc;

use pinwatch::{LogWriter, Monitor, MonitorConfig, SourceConfig, WatchSpec};

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let program = std::env::args()
        .nth(1)
        .unwrap_or_else(|| "74HC165.py".to_string());

    let monitor = Monitor::builder(MonitorConfig::new(program))
        .with_subscriber(Arc::new(LogWriter::new()))
        .build();

    let source = SourceConfig::default();
    let mut motion = monitor.register(WatchSpec::new(source, 3)).await;
    let mut door = monitor.register(WatchSpec::new(source, 0)).await;

    println!(
        "watching bits 3 and 0 of {} (owner: session {})",
        motion.fingerprint(),
        motion.id()
    );

    let runner = monitor.clone();
    let watcher = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(change) = motion.recv() => {
                    println!("motion bit {} -> {}", change.bit, change.payload);
                }
                Some(change) = door.recv() => {
                    println!("door bit {} -> {}", change.bit, change.payload);
                }
                else => break,
            }
        }
        // Close the observer first; the owner teardown kills the reader.
        door.close().await;
        motion.close().await;
    });

    runner.run_until_signal().await?;
    watcher.abort();
    Ok(())
}

//! # loopbridge - run an embedded event loop on a host thread
//!
//! An embedded I/O loop (timers, sockets, file events) wants to run
//! continuously; a host loop owns the main thread and the scripting engine.
//! loopbridge lets the embedded loop's callbacks run *on the host thread*,
//! one bounded batch per wakeup, never concurrently with host work.
//!
//! ## Quick Start
//!
//! The `testing` feature provides the stand-in loop and engine used here.
//!
//! ```ignore
//! use loopbridge::{start, testing::{ManualLoop, RecordingEngine}, TaskQueueHost};
//! use std::sync::Arc;
//!
//! let embedded = Arc::new(ManualLoop::new());
//! let host = Arc::new(TaskQueueHost::new());
//! let engine = Arc::new(RecordingEngine::new());
//!
//! let mut bridge = start(embedded.clone(), embedded.clone(), host.clone(), engine)?;
//! embedded.post(|_| println!("runs on the host thread"));
//! host.run_for(std::time::Duration::from_millis(50));
//! bridge.shutdown();
//! ```
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────┐        ┌─────────────────────────────┐
//! │        Poller thread        │        │         Host thread         │
//! │                             │        │                             │
//! │  poll_events()  (blocks)    │        │  host loop tasks ...        │
//! │        │                    │  post  │                             │
//! │  post batch ────────────────┼───────▶│  batch: ≤ 1 + 16 iterations │
//! │        │                    │        │         or ≤ 8 ms           │
//! │  rendezvous.acquire() ◀─────┼────────┼── rendezvous.release()      │
//! └─────────────────────────────┘        └─────────────────────────────┘
//!          ▲
//!          └── wakeup / next-tick sends from any thread
//! ```

use std::sync::Arc;

// Re-export core types
pub use loopbridge_core::{
    AsyncCallback,
    AsyncHandle,
    BridgeError,
    BridgeResult,
    ContextScope,
    EmbeddedLoop,
    FnHost,
    HandleId,
    HostLoop,
    Notifier,
    PollEvents,
    PollerExit,
    PollerState,
    ScriptEngine,
    SourceTable,
    Task,
};
pub use loopbridge_core::constants;

// Re-export kprint macros for logging
pub use loopbridge_core::{kprint, kprintln, kerror, kwarn, kinfo, kdebug, ktrace};
pub use loopbridge_core::kprint::{LogLevel, init as init_logging, set_log_level, set_flush_enabled};

// Re-export env utilities
pub use loopbridge_core::{env_get, env_get_bool, env_get_opt, env_get_str};

// Re-export runtime types
pub use loopbridge_runtime::{
    process_batch,
    BatchPolicy,
    BatchReport,
    Bridge,
    BridgeConfig,
    BridgeStats,
    LatchNotifier,
    NextTickSender,
    PollerStats,
    TaskQueueHost,
};
#[cfg(feature = "testing")]
pub use loopbridge_runtime::testing;

#[cfg(unix)]
pub use loopbridge_runtime::FdPoller;

#[cfg(target_os = "linux")]
pub use loopbridge_runtime::EventFdNotifier;

/// Create and initialize a bridge configured from the environment.
///
/// Equivalent to `Bridge::new(.., BridgeConfig::from_env())` followed by `init()`.
pub fn start(
    embedded: Arc<dyn EmbeddedLoop>,
    poll: Arc<dyn PollEvents>,
    host: Arc<dyn HostLoop>,
    engine: Arc<dyn ScriptEngine>,
) -> BridgeResult<Bridge> {
    start_with_config(embedded, poll, host, engine, BridgeConfig::from_env())
}

/// Create and initialize a bridge with an explicit configuration.
pub fn start_with_config(
    embedded: Arc<dyn EmbeddedLoop>,
    poll: Arc<dyn PollEvents>,
    host: Arc<dyn HostLoop>,
    engine: Arc<dyn ScriptEngine>,
    config: BridgeConfig,
) -> BridgeResult<Bridge> {
    let mut bridge = Bridge::new(embedded, poll, host, engine, config)?;
    bridge.init()?;
    Ok(bridge)
}

//! # loopbridge-runtime
//!
//! Platform-specific runtime for loopbridge.
//!
//! This crate provides:
//! - The `Bridge` and its poller thread
//! - Host-side batch processing with count and time limits
//! - The rendezvous semaphore (futex on Linux, Condvar elsewhere)
//! - Notifiers (eventfd on Linux, portable latch)
//! - `FdPoller`, a `poll(2)`-based `PollEvents` strategy (unix)
//! - `TaskQueueHost`, a minimal host loop
//! - Test doubles in `testing` (the `testing` feature)

pub mod config;
pub mod rendezvous;
pub mod notifier;
pub mod host;
pub mod batch;
pub mod poller;
pub mod next_tick;
pub mod bridge;
#[cfg(any(test, feature = "testing"))]
pub mod testing;

#[cfg(unix)]
pub mod fd_poller;

// Re-exports
pub use config::BridgeConfig;
pub use bridge::{Bridge, BridgeStats};
pub use poller::PollerStats;
pub use next_tick::NextTickSender;
pub use batch::{process_batch, BatchPolicy, BatchReport};
pub use host::TaskQueueHost;
pub use notifier::LatchNotifier;
pub use rendezvous::{new_rendezvous, Rendezvous};

#[cfg(target_os = "linux")]
pub use notifier::EventFdNotifier;

#[cfg(unix)]
pub use fd_poller::FdPoller;

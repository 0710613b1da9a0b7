//! # loopbridge-core
//!
//! Core types and traits for running an embedded event loop's callbacks on
//! a host thread.
//!
//! This crate is platform-agnostic and contains no OS-specific code.
//! The poller thread, rendezvous and notifiers live in `loopbridge-runtime`.
//!
//! ## Modules
//!
//! - `traits` - Collaborator traits (embedded loop, poll strategy, host loop, engine, notifier)
//! - `source` - Async event sources bound to an embedded loop
//! - `context` - RAII engine context scope
//! - `state` - Poller state and exit reason enums
//! - `error` - Error types
//! - `kprint` - Kernel-style leveled logging macros
//! - `env` - Environment variable utilities

pub mod traits;
pub mod source;
pub mod context;
pub mod state;
pub mod error;
pub mod kprint;
pub mod env;

// Re-exports for convenience
pub use traits::{EmbeddedLoop, FnHost, HostLoop, Notifier, PollEvents, ScriptEngine, Task};
pub use source::{AsyncCallback, AsyncHandle, HandleId, SourceTable};
pub use context::ContextScope;
pub use state::{PollerExit, PollerState};
pub use error::{BridgeError, BridgeResult};
pub use env::{env_get, env_get_bool, env_get_opt, env_get_str};

/// Batching limits applied on the host thread per poller wakeup
pub mod constants {
    /// Extra non-blocking iterations after the leading one
    pub const EVENT_BATCH_SIZE: usize = 16;

    /// Stop batching once this much loop time has passed since the leading iteration
    pub const EVENT_BATCH_TIMEOUT_MS: u64 = 8;

    /// Default name of the poller thread
    pub const POLLER_THREAD_NAME: &str = "loopbridge-poller";
}

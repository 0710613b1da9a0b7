//! Collaborator traits
//!
//! The bridge owns none of the machinery it coordinates. Each collaborator is
//! injected as one of these traits:
//!
//! - `EmbeddedLoop` - the readiness-driven loop whose callbacks must run on the host thread
//! - `PollEvents` - the blocking "wait until the loop has work" call made by the poller
//! - `HostLoop` - the host thread's task queue
//! - `ScriptEngine` - the engine hooks the host-side work runs inside
//! - `Notifier` - interrupts the loop's blocking poll when an async handle is sent

use crate::error::BridgeResult;
use crate::source::SourceTable;

/// A unit of work executed once on the host thread
pub type Task = Box<dyn FnOnce() + Send + 'static>;

/// The embedded event loop.
///
/// **Contract:**
/// - `run_nowait()` is only ever called on the host thread. It processes
///   whatever is ready (including `sources().dispatch_pending()`) and
///   returns without waiting for more.
/// - The predicates (`stop_requested`, `has_active_handles`,
///   `has_active_requests`) are read from the poller thread while the host
///   is idle; they must be safe to call from any thread.
pub trait EmbeddedLoop: Send + Sync {
    /// Async event sources bound to this loop
    fn sources(&self) -> &SourceTable;

    /// Run one non-blocking iteration. Also refreshes `now_ms()`.
    fn run_nowait(&self);

    /// The loop's cached notion of "now" in milliseconds
    fn now_ms(&self) -> u64;

    /// The loop was asked to stop
    fn stop_requested(&self) -> bool;

    /// Outstanding requests (work queue, fs, dns, ...)
    fn has_active_requests(&self) -> bool;

    /// Referenced handles keep the loop alive
    fn has_active_handles(&self) -> bool {
        self.sources().has_active_refs()
    }
}

/// Blocks until the embedded loop has work or an async handle was sent
pub trait PollEvents: Send + Sync {
    /// May return spuriously; the caller re-evaluates and polls again.
    fn poll_events(&self);
}

/// The host thread's task sink.
///
/// **Contract:**
/// - `post_task()` must NEVER block and never run the task inline.
/// - Tasks posted from the same thread run in submission order.
pub trait HostLoop: Send + Sync {
    fn post_task(&self, task: Task);
}

/// Closure adapter for `HostLoop`
pub struct FnHost<F>(pub F);

impl<F> HostLoop for FnHost<F>
where
    F: Fn(Task) + Send + Sync,
{
    fn post_task(&self, task: Task) {
        (self.0)(task)
    }
}

/// Scripting engine hooks.
///
/// All methods are called on the host thread. Engines that are not
/// thread-safe look up their per-thread state (isolate, environment) inside
/// these calls rather than holding it in `self`.
pub trait ScriptEngine: Send + Sync {
    /// Enter the execution context bound to the calling thread.
    ///
    /// Returns `false` when no context is bound; callers treat that as fatal.
    fn enter_context(&self) -> bool;

    /// Leave the context entered by the matching `enter_context()`
    fn exit_context(&self);

    /// Flush pending microtasks
    fn checkpoint_microtasks(&self);

    /// Run callbacks queued through the engine's next-tick mechanism
    fn run_next_tick_callbacks(&self);
}

/// Wakes the embedded loop's blocking poll.
///
/// **Contract:**
/// - `notify()` must NEVER block.
/// - Multiple notifies before a `drain()` are coalesced.
/// - `drain()` is called by the loop on the host thread before dispatching.
pub trait Notifier: Send + Sync {
    fn notify(&self) -> BridgeResult<()>;

    fn drain(&self);
}

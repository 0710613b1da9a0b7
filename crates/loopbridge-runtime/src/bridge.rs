//! The bridge
//!
//! Owns the poller thread, the rendezvous and the two async handles, and
//! wires them to the injected collaborators.
//!
//! ```text
//!            poller thread                          host thread
//!            ─────────────                          ───────────
//!  ┌──▶ poll_events() ◀── wakeup / any send
//!  │         │
//!  │    closing? stopped? drained? ──yes──▶ exit
//!  │         │
//!  │    post_task(batch) ─────────────────────▶ process_batch()
//!  │         │                                       │
//!  └── rendezvous.acquire() ◀──────────────── rendezvous.release()
//! ```
//!
//! # Lifecycle
//!
//! - `new()` binds the embedded loop (one bridge per loop)
//! - `init()` installs the wakeup and next-tick handles and starts the poller
//! - `shutdown()` (or drop) sets `closing`, releases the rendezvous, sends
//!   the wakeup handle, joins the poller, and only then closes the handles.
//!   The poller may be blocked at either point, so both are woken.
//!
//! # Next ticks
//!
//! A next-tick send is normally observed by the loop during a batch. Once
//! the poller has exited because the loop stopped or drained, no batch
//! will run again, so sends are handed to the host as their own task.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicU8, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};
use std::thread::JoinHandle;

use loopbridge_core::error::{BridgeError, BridgeResult};
use loopbridge_core::source::AsyncHandle;
use loopbridge_core::state::{PollerExit, PollerState};
use loopbridge_core::traits::{EmbeddedLoop, HostLoop, PollEvents, ScriptEngine};
use loopbridge_core::{kdebug, kerror, kinfo, ktrace};

use crate::batch::{process_batch, BatchPolicy};
use crate::config::BridgeConfig;
use crate::next_tick::{run_next_tick, NextTickSender};
use crate::poller::{spawn_poller, PollerStats};
use crate::rendezvous::{new_rendezvous, Rendezvous};

/// Host-side counters
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BridgeStats {
    /// Batches that ran the embedded loop
    pub batches: u64,

    /// Loop iterations across all batches
    pub iterations: u64,

    /// Most iterations in a single batch
    pub max_batch_iterations: u64,

    /// Batches that arrived after shutdown began and only released the rendezvous
    pub skipped_batches: u64,

    /// Next-tick observations handled
    pub next_ticks: u64,
}

/// State shared by the bridge, the poller thread and posted batch tasks
pub(crate) struct BridgeShared {
    pub(crate) embedded: Arc<dyn EmbeddedLoop>,
    pub(crate) poll: Arc<dyn PollEvents>,
    pub(crate) host: Arc<dyn HostLoop>,
    pub(crate) engine: Arc<dyn ScriptEngine>,
    pub(crate) rendezvous: Box<dyn Rendezvous>,
    pub(crate) config: BridgeConfig,

    /// One-way shutdown flag
    pub(crate) closing: AtomicBool,
    state: AtomicU8,

    /// Set while the handles are installed
    next_tick: Mutex<Option<AsyncHandle>>,

    batches: AtomicU64,
    iterations: AtomicU64,
    max_batch_iterations: AtomicU64,
    skipped_batches: AtomicU64,
    next_ticks: AtomicU64,
}

impl BridgeShared {
    pub(crate) fn set_state(&self, state: PollerState) {
        // SeqCst: a next-tick sender reads the state after marking its
        // handle pending, the exiting poller reads pending after Closed
        let prev = PollerState::from(self.state.swap(state.into(), Ordering::SeqCst));
        if prev != state {
            ktrace!("poller: {} -> {}", prev, state);
        }
    }

    pub(crate) fn state(&self) -> PollerState {
        PollerState::from(self.state.load(Ordering::SeqCst))
    }

    /// The loop's own reason to stop polling, if any
    pub(crate) fn loop_exit(&self) -> Option<PollerExit> {
        if self.embedded.stop_requested() {
            return Some(PollerExit::LoopStopped);
        }
        if !self.embedded.has_active_handles() && !self.embedded.has_active_requests() {
            return Some(PollerExit::LoopDrained);
        }
        None
    }

    /// Ask the host thread to process one batch
    pub(crate) fn wakeup_main_thread(self: &Arc<Self>) {
        let shared = Arc::clone(self);
        self.host.post_task(Box::new(move || shared.run_batch()));
    }

    /// Body of the posted batch task. Host thread only.
    fn run_batch(&self) {
        if self.closing.load(Ordering::Acquire) {
            // The loop may already be torn down
            self.skipped_batches.fetch_add(1, Ordering::Relaxed);
            self.rendezvous.release();
            return;
        }

        let report = process_batch(
            &*self.embedded,
            &*self.engine,
            BatchPolicy::from_config(&self.config),
        );
        let iterations = report.iterations as u64;
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.iterations.fetch_add(iterations, Ordering::Relaxed);
        self.max_batch_iterations.fetch_max(iterations, Ordering::Relaxed);
        ktrace!(
            "batch: {} iterations in {}ms",
            report.iterations,
            report.elapsed_ms
        );

        // Tell the poller to continue polling
        self.rendezvous.release();
    }

    fn on_call_next_tick(&self) {
        run_next_tick(&*self.engine);
        self.next_ticks.fetch_add(1, Ordering::Relaxed);
    }

    fn next_tick_slot(&self) -> MutexGuard<'_, Option<AsyncHandle>> {
        self.next_tick.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Ring the next-tick doorbell. Any thread.
    pub(crate) fn send_next_tick(self: &Arc<Self>, handle: &AsyncHandle) {
        handle.send();
        if self.state() == PollerState::Closed {
            self.post_next_tick(handle);
        }
    }

    /// Poller exit path: hand over a send that no batch will observe
    pub(crate) fn flush_next_tick(self: &Arc<Self>) {
        let handle = self.next_tick_slot().clone();
        if let Some(handle) = handle {
            self.post_next_tick(&handle);
        }
    }

    /// Run a pending next tick as a host task of its own.
    ///
    /// Both the sender and the exiting poller may post for the same send;
    /// `take_pending` lets only one of the tasks run it.
    fn post_next_tick(self: &Arc<Self>, handle: &AsyncHandle) {
        if self.closing.load(Ordering::Acquire) || !handle.is_pending() {
            return;
        }
        ktrace!("next tick: poller closed, posting to host");
        let shared = Arc::clone(self);
        let handle = handle.clone();
        self.host.post_task(Box::new(move || {
            if !shared.closing.load(Ordering::Acquire) && handle.take_pending() {
                shared.on_call_next_tick();
            }
        }));
    }

    fn stats(&self) -> BridgeStats {
        BridgeStats {
            batches: self.batches.load(Ordering::Relaxed),
            iterations: self.iterations.load(Ordering::Relaxed),
            max_batch_iterations: self.max_batch_iterations.load(Ordering::Relaxed),
            skipped_batches: self.skipped_batches.load(Ordering::Relaxed),
            next_ticks: self.next_ticks.load(Ordering::Relaxed),
        }
    }
}

struct Handles {
    /// Referenced: keeps the loop reporting an active handle
    wakeup: AsyncHandle,
    /// Unreferenced
    next_tick: AsyncHandle,
}

/// Runs an embedded loop's callbacks on the host thread.
///
/// Exactly one bridge may drive a given embedded loop.
pub struct Bridge {
    shared: Arc<BridgeShared>,
    handles: Option<Handles>,
    poller: Option<JoinHandle<PollerStats>>,
}

impl Bridge {
    /// Bind `embedded` to a new bridge. Nothing runs until `init()`.
    pub fn new(
        embedded: Arc<dyn EmbeddedLoop>,
        poll: Arc<dyn PollEvents>,
        host: Arc<dyn HostLoop>,
        engine: Arc<dyn ScriptEngine>,
        config: BridgeConfig,
    ) -> BridgeResult<Self> {
        config.validate()?;
        if !embedded.sources().try_bind() {
            return Err(BridgeError::LoopAlreadyBound);
        }

        Ok(Self {
            shared: Arc::new(BridgeShared {
                embedded,
                poll,
                host,
                engine,
                rendezvous: new_rendezvous(),
                config,
                closing: AtomicBool::new(false),
                state: AtomicU8::new(PollerState::Closed.into()),
                next_tick: Mutex::new(None),
                batches: AtomicU64::new(0),
                iterations: AtomicU64::new(0),
                max_batch_iterations: AtomicU64::new(0),
                skipped_batches: AtomicU64::new(0),
                next_ticks: AtomicU64::new(0),
            }),
            handles: None,
            poller: None,
        })
    }

    /// Install the wakeup and next-tick handles and start the poller thread.
    pub fn init(&mut self) -> BridgeResult<()> {
        if self.is_closing() {
            return Err(BridgeError::ShuttingDown);
        }
        if self.handles.is_some() {
            return Err(BridgeError::AlreadyInitialized);
        }

        let sources = self.shared.embedded.sources();

        // Wakes the poller out of poll_events(). Left referenced so the
        // loop never looks drained purely from handle bookkeeping.
        let wakeup = sources.async_init(None);

        let weak: Weak<BridgeShared> = Arc::downgrade(&self.shared);
        let next_tick = sources.async_init(Some(Box::new(move || {
            if let Some(shared) = weak.upgrade() {
                shared.on_call_next_tick();
            }
        })));
        next_tick.unref();
        *self.shared.next_tick_slot() = Some(next_tick.clone());

        match spawn_poller(Arc::clone(&self.shared)) {
            Ok(handle) => {
                self.poller = Some(handle);
                self.handles = Some(Handles { wakeup, next_tick });
                kinfo!(
                    "bridge: poller '{}' started (batch {} / {}ms)",
                    self.shared.config.poller_thread_name,
                    self.shared.config.batch_size,
                    self.shared.config.batch_timeout_ms
                );
                Ok(())
            }
            Err(e) => {
                kerror!("bridge: {}", e);
                *self.shared.next_tick_slot() = None;
                sources.close(&wakeup);
                sources.close(&next_tick);
                Err(e)
            }
        }
    }

    /// Stop the poller and release everything.
    ///
    /// Blocks until the poller thread has exited. Returns its stats, or
    /// `None` if it never started, was already shut down, or panicked.
    pub fn shutdown(&mut self) -> Option<PollerStats> {
        if self.shared.closing.swap(true, Ordering::AcqRel) {
            return None;
        }
        kdebug!("bridge: shutting down (poller {})", self.shared.state());

        // Unblock a poller waiting after a batch
        self.shared.rendezvous.release();
        // Unblock a poller inside poll_events()
        if let Some(handles) = &self.handles {
            handles.wakeup.send();
        }

        let stats = self.poller.take().and_then(|handle| match handle.join() {
            Ok(stats) => Some(stats),
            Err(_) => {
                kerror!("bridge: poller thread panicked");
                None
            }
        });
        self.shared.set_state(PollerState::Closed);

        // Only now is nothing left that could touch the handles from the poller
        let sources = self.shared.embedded.sources();
        if let Some(handles) = self.handles.take() {
            sources.close(&handles.wakeup);
            sources.close(&handles.next_tick);
        }
        *self.shared.next_tick_slot() = None;
        sources.unbind();

        if let Some(stats) = &stats {
            kinfo!(
                "bridge: shut down, poller exit: {} ({} dispatches)",
                stats.exit,
                stats.dispatches
            );
        }
        stats
    }

    /// Ring the next-tick doorbell. Callable from any thread holding the bridge.
    ///
    /// The engine's next-tick queue runs once on the host thread, whether
    /// or not the poller is still running.
    ///
    /// # Panics
    ///
    /// Panics if the bridge is not initialized or is shutting down.
    pub fn call_next_tick(&self) {
        let handles = self.live_handles("call_next_tick");
        self.shared.send_next_tick(&handles.next_tick);
    }

    /// A sender producer threads can use to ring the next-tick doorbell.
    ///
    /// # Panics
    ///
    /// Panics if the bridge is not initialized or is shutting down.
    pub fn next_tick_sender(&self) -> NextTickSender {
        let handles = self.live_handles("next_tick_sender");
        NextTickSender::new(handles.next_tick.clone(), Arc::downgrade(&self.shared))
    }

    /// Stop the wakeup handle from keeping the embedded loop alive.
    ///
    /// Once released, a loop with no other handles and no requests is
    /// reported drained and the poller exits at its next wakeup.
    ///
    /// # Panics
    ///
    /// Panics if the bridge is not initialized or is shutting down.
    pub fn release_handle_ref(&self) {
        self.live_handles("release_handle_ref").wakeup.unref();
        kdebug!("bridge: wakeup handle unreferenced");
    }

    #[inline]
    pub fn is_initialized(&self) -> bool {
        self.handles.is_some()
    }

    #[inline]
    pub fn is_closing(&self) -> bool {
        self.shared.closing.load(Ordering::Acquire)
    }

    pub fn poller_state(&self) -> PollerState {
        self.shared.state()
    }

    pub fn stats(&self) -> BridgeStats {
        self.shared.stats()
    }

    pub fn config(&self) -> &BridgeConfig {
        &self.shared.config
    }

    fn live_handles(&self, op: &str) -> &Handles {
        assert!(!self.is_closing(), "{} on a bridge that is shutting down", op);
        match &self.handles {
            Some(handles) => handles,
            None => panic!("{} on a bridge that was never initialized", op),
        }
    }
}

impl Drop for Bridge {
    fn drop(&mut self) {
        self.shutdown();
    }
}

impl std::fmt::Debug for Bridge {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Bridge")
            .field("initialized", &self.is_initialized())
            .field("closing", &self.is_closing())
            .field("poller", &self.poller_state())
            .field("stats", &self.stats())
            .finish()
    }
}

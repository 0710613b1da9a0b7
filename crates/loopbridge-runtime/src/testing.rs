//! Test doubles for the bridge's collaborators
//!
//! - `ManualLoop` - queue-driven embedded loop; callbacks posted from any
//!   thread run on whichever thread calls `run_nowait()`
//! - `RecordingEngine` - script engine that records every hook call and
//!   only has a context on the thread that created it
//!
//! Both are used by the demo binary and by the runtime's own tests.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, ThreadId};
use std::time::{Duration, Instant};

use loopbridge_core::kerror;
use loopbridge_core::source::SourceTable;
use loopbridge_core::traits::{EmbeddedLoop, Notifier, PollEvents, ScriptEngine};

use crate::notifier::LatchNotifier;

/// Callback queued on a `ManualLoop`
pub type LoopCallback<N> = Box<dyn FnOnce(&ManualLoop<N>) + Send + 'static>;

/// Queue-driven embedded loop.
///
/// Each `run_nowait()` dispatches pending async sends, then runs the
/// callbacks that were queued when it started. Callbacks queued while it
/// runs (zero-delay chains) wait for the next iteration and keep the loop
/// reporting active requests.
pub struct ManualLoop<N: Notifier + 'static = LatchNotifier> {
    sources: SourceTable,
    notifier: Arc<N>,
    ready: Mutex<VecDeque<LoopCallback<N>>>,
    stopped: AtomicBool,
    epoch: Instant,
    now_ms: AtomicU64,
    iterations: AtomicU64,
    callbacks_run: AtomicU64,
    owner: ThreadId,
    foreign_runs: AtomicU64,
}

impl ManualLoop<LatchNotifier> {
    /// Loop whose `PollEvents` waits on a latch. The creating thread is
    /// treated as the host thread.
    pub fn new() -> Self {
        Self::with_notifier(Arc::new(LatchNotifier::new()))
    }
}

impl Default for ManualLoop<LatchNotifier> {
    fn default() -> Self {
        Self::new()
    }
}

impl<N: Notifier + 'static> ManualLoop<N> {
    pub fn with_notifier(notifier: Arc<N>) -> Self {
        let shared: Arc<dyn Notifier> = Arc::clone(&notifier) as Arc<dyn Notifier>;
        Self {
            sources: SourceTable::new(shared),
            notifier,
            ready: Mutex::new(VecDeque::new()),
            stopped: AtomicBool::new(false),
            epoch: Instant::now(),
            now_ms: AtomicU64::new(0),
            iterations: AtomicU64::new(0),
            callbacks_run: AtomicU64::new(0),
            owner: thread::current().id(),
            foreign_runs: AtomicU64::new(0),
        }
    }

    pub fn notifier(&self) -> &Arc<N> {
        &self.notifier
    }

    /// Queue a callback for the next iteration. Any thread.
    pub fn post<F>(&self, callback: F)
    where
        F: FnOnce(&Self) + Send + 'static,
    {
        self.lock().push_back(Box::new(callback));
        self.wake();
    }

    /// Set the stop flag and interrupt the poll
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::Release);
        self.wake();
    }

    /// Interrupt the poll without queuing work
    pub fn wake(&self) {
        if let Err(e) = self.notifier.notify() {
            kerror!("manual loop: notify failed: {}", e);
        }
    }

    /// Callbacks waiting for an iteration
    pub fn pending(&self) -> usize {
        self.lock().len()
    }

    pub fn iterations(&self) -> u64 {
        self.iterations.load(Ordering::Acquire)
    }

    pub fn callbacks_run(&self) -> u64 {
        self.callbacks_run.load(Ordering::Acquire)
    }

    /// Iterations run on a thread other than the one that created the loop
    pub fn foreign_runs(&self) -> u64 {
        self.foreign_runs.load(Ordering::Acquire)
    }

    /// How long a poll may block: 0 with work queued or a stop pending, else forever
    pub fn backend_timeout_ms(&self) -> i32 {
        if self.stopped.load(Ordering::Acquire) || !self.lock().is_empty() {
            0
        } else {
            -1
        }
    }

    fn update_time(&self) {
        let now = self.epoch.elapsed().as_millis() as u64;
        self.now_ms.store(now, Ordering::Release);
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<LoopCallback<N>>> {
        self.ready.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl<N: Notifier + 'static> EmbeddedLoop for ManualLoop<N> {
    fn sources(&self) -> &SourceTable {
        &self.sources
    }

    fn run_nowait(&self) {
        if thread::current().id() != self.owner {
            self.foreign_runs.fetch_add(1, Ordering::AcqRel);
        }
        self.update_time();
        self.sources.dispatch_pending();

        let queued = self.lock().len();
        for _ in 0..queued {
            // Pop outside the callback so it may post
            let next = self.lock().pop_front();
            match next {
                Some(callback) => {
                    callback(self);
                    self.callbacks_run.fetch_add(1, Ordering::AcqRel);
                }
                None => break,
            }
        }
        self.iterations.fetch_add(1, Ordering::AcqRel);
    }

    fn now_ms(&self) -> u64 {
        self.now_ms.load(Ordering::Acquire)
    }

    fn stop_requested(&self) -> bool {
        self.stopped.load(Ordering::Acquire)
    }

    fn has_active_requests(&self) -> bool {
        !self.lock().is_empty()
    }
}

impl PollEvents for ManualLoop<LatchNotifier> {
    fn poll_events(&self) {
        self.notifier.wait();
    }
}

/// Hook calls seen by a `RecordingEngine`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngineEvent {
    Enter,
    Exit,
    Checkpoint,
    NextTick,
}

impl EngineEvent {
    fn name(&self) -> &'static str {
        match self {
            EngineEvent::Enter => "enter",
            EngineEvent::Exit => "exit",
            EngineEvent::Checkpoint => "checkpoint",
            EngineEvent::NextTick => "next_tick",
        }
    }
}

/// Engine whose context is bound to one thread
pub struct RecordingEngine {
    host: Option<ThreadId>,
    events: Mutex<Vec<EngineEvent>>,
    depth: AtomicUsize,
    outside_context: AtomicUsize,
    log: Option<Arc<Mutex<Vec<&'static str>>>>,
}

impl RecordingEngine {
    /// Context bound to the calling thread
    pub fn new() -> Self {
        Self::bound_to(Some(thread::current().id()))
    }

    /// No context on any thread
    pub fn unbound() -> Self {
        Self::bound_to(None)
    }

    fn bound_to(host: Option<ThreadId>) -> Self {
        Self {
            host,
            events: Mutex::new(Vec::new()),
            depth: AtomicUsize::new(0),
            outside_context: AtomicUsize::new(0),
            log: None,
        }
    }

    /// Also append event names to a log shared with other doubles
    pub fn with_log(mut self, log: Arc<Mutex<Vec<&'static str>>>) -> Self {
        self.log = Some(log);
        self
    }

    pub fn events(&self) -> Vec<EngineEvent> {
        self.events.lock().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn count(&self, event: EngineEvent) -> usize {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .filter(|e| **e == event)
            .count()
    }

    /// Checkpoints or next-tick runs made without an entered context
    pub fn outside_context(&self) -> usize {
        self.outside_context.load(Ordering::Acquire)
    }

    fn record(&self, event: EngineEvent) {
        self.events
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(event);
        if let Some(log) = &self.log {
            log.lock().unwrap_or_else(PoisonError::into_inner).push(event.name());
        }
    }

    fn record_in_context(&self, event: EngineEvent) {
        if self.depth.load(Ordering::Acquire) == 0 {
            self.outside_context.fetch_add(1, Ordering::AcqRel);
        }
        self.record(event);
    }
}

impl Default for RecordingEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptEngine for RecordingEngine {
    fn enter_context(&self) -> bool {
        if self.host != Some(thread::current().id()) {
            return false;
        }
        self.depth.fetch_add(1, Ordering::AcqRel);
        self.record(EngineEvent::Enter);
        true
    }

    fn exit_context(&self) {
        self.depth.fetch_sub(1, Ordering::AcqRel);
        self.record(EngineEvent::Exit);
    }

    fn checkpoint_microtasks(&self) {
        self.record_in_context(EngineEvent::Checkpoint);
    }

    fn run_next_tick_callbacks(&self) {
        self.record_in_context(EngineEvent::NextTick);
    }
}

/// Poll `cond` until it holds or `timeout` passes
pub fn wait_for<F>(timeout: Duration, mut cond: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = Instant::now() + timeout;
    loop {
        if cond() {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        thread::sleep(Duration::from_millis(1));
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_manual_loop_runs_snapshot() {
        let l = ManualLoop::new();
        l.post(|l| l.post(|_| {}));
        assert!(l.has_active_requests());

        l.run_nowait();
        assert_eq!(l.callbacks_run(), 1);
        assert_eq!(l.pending(), 1);

        l.run_nowait();
        assert_eq!(l.callbacks_run(), 2);
        assert!(!l.has_active_requests());
        assert_eq!(l.iterations(), 2);
        assert_eq!(l.foreign_runs(), 0);
    }

    #[test]
    fn test_manual_loop_poll_returns_on_post() {
        let l = Arc::new(ManualLoop::new());
        let l2 = Arc::clone(&l);
        let poster = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            l2.post(|_| {});
        });

        l.poll_events();
        poster.join().unwrap();
        assert_eq!(l.pending(), 1);
        assert_eq!(l.backend_timeout_ms(), 0);
    }

    #[test]
    fn test_manual_loop_counts_foreign_runs() {
        let l = Arc::new(ManualLoop::new());
        let l2 = Arc::clone(&l);
        thread::spawn(move || l2.run_nowait()).join().unwrap();
        assert_eq!(l.foreign_runs(), 1);
    }

    #[test]
    fn test_manual_loop_stop() {
        let l = ManualLoop::new();
        assert!(!l.stop_requested());
        assert_eq!(l.backend_timeout_ms(), -1);
        l.stop();
        assert!(l.stop_requested());
        // The stop interrupts a poll
        l.poll_events();
    }

    #[test]
    fn test_engine_context_is_thread_bound() {
        let engine = Arc::new(RecordingEngine::new());
        assert!(engine.enter_context());
        engine.exit_context();

        let e2 = Arc::clone(&engine);
        let entered = thread::spawn(move || e2.enter_context()).join().unwrap();
        assert!(!entered);
        assert!(!RecordingEngine::unbound().enter_context());
    }

    #[test]
    fn test_engine_flags_calls_outside_context() {
        let engine = RecordingEngine::new();
        engine.checkpoint_microtasks();
        assert_eq!(engine.outside_context(), 1);

        assert!(engine.enter_context());
        engine.run_next_tick_callbacks();
        engine.exit_context();
        assert_eq!(engine.outside_context(), 1);
        assert_eq!(engine.count(EngineEvent::NextTick), 1);
    }
}

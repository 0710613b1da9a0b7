//! Async event sources
//!
//! An `AsyncHandle` is an edge-triggered doorbell bound to an embedded
//! loop's `SourceTable`. `send()` may be called from any thread; the loop
//! observes it on the host thread during `dispatch_pending()`.
//!
//! ```text
//!  any thread                         host thread (inside run_nowait)
//!  ──────────                         ───────────────────────────────
//!  send()                             dispatch_pending()
//!    pending: false → true              notifier.drain()
//!    first sender notifies ──────▶      for each handle:
//!    later senders coalesce               pending: true → false
//!                                         run callback
//! ```
//!
//! Referenced handles count towards the loop's "has active handles"
//! predicate. `unref()` demotes a handle so it no longer keeps the loop
//! alive; it still delivers sends.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use crate::traits::Notifier;

/// Callback run on the host thread when a sent handle is dispatched
pub type AsyncCallback = Box<dyn FnMut() + Send + 'static>;

/// Identifier of a handle within its table
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct HandleId(u32);

impl HandleId {
    #[inline]
    pub const fn as_u32(self) -> u32 {
        self.0
    }
}

struct HandleInner {
    id: HandleId,
    pending: AtomicBool,
    referenced: AtomicBool,
    closed: AtomicBool,
    /// Taken out while the callback runs so it may close its own handle
    callback: Mutex<Option<AsyncCallback>>,
    notifier: Arc<dyn Notifier>,
}

/// Cloneable, thread-safe handle to an async source
#[derive(Clone)]
pub struct AsyncHandle {
    inner: Arc<HandleInner>,
}

impl AsyncHandle {
    #[inline]
    pub fn id(&self) -> HandleId {
        self.inner.id
    }

    /// Ring the doorbell.
    ///
    /// Sends before the next dispatch coalesce into one. Sending a closed
    /// handle does nothing.
    pub fn send(&self) {
        let inner = &self.inner;
        if inner.closed.load(Ordering::Acquire) {
            crate::kdebug!("async handle {} sent after close, ignored", inner.id.0);
            return;
        }
        // SeqCst: pairs with the bridge's poller-state handshake
        if inner.pending.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Err(e) = inner.notifier.notify() {
            crate::kerror!("async handle {}: notify failed: {}", inner.id.0, e);
        }
    }

    /// Keep the loop alive while this handle is open
    pub fn ref_handle(&self) {
        self.inner.referenced.store(true, Ordering::Release);
    }

    /// Stop counting this handle as loop activity
    pub fn unref(&self) {
        self.inner.referenced.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_referenced(&self) -> bool {
        self.inner.referenced.load(Ordering::Acquire)
    }

    #[inline]
    pub fn is_pending(&self) -> bool {
        self.inner.pending.load(Ordering::SeqCst)
    }

    /// Consume a pending send without running the callback.
    ///
    /// Returns true if a send was pending. A later `dispatch_pending()`
    /// will not see the consumed send. Used to observe a send when the
    /// loop that owns the handle is no longer being run.
    pub fn take_pending(&self) -> bool {
        if self.inner.closed.load(Ordering::Acquire) {
            return false;
        }
        self.inner.pending.swap(false, Ordering::SeqCst)
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for AsyncHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AsyncHandle")
            .field("id", &self.inner.id)
            .field("pending", &self.is_pending())
            .field("referenced", &self.is_referenced())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// The loop's table of async sources
pub struct SourceTable {
    notifier: Arc<dyn Notifier>,
    handles: Mutex<Vec<Arc<HandleInner>>>,
    next_id: AtomicU32,
    /// Set while a bridge drives this loop
    bound: AtomicBool,
}

impl SourceTable {
    pub fn new(notifier: Arc<dyn Notifier>) -> Self {
        Self {
            notifier,
            handles: Mutex::new(Vec::new()),
            next_id: AtomicU32::new(0),
            bound: AtomicBool::new(false),
        }
    }

    /// The notifier shared by every handle in this table
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Register a new handle. It starts referenced.
    pub fn async_init(&self, callback: Option<AsyncCallback>) -> AsyncHandle {
        let id = HandleId(self.next_id.fetch_add(1, Ordering::Relaxed));
        let inner = Arc::new(HandleInner {
            id,
            pending: AtomicBool::new(false),
            referenced: AtomicBool::new(true),
            closed: AtomicBool::new(false),
            callback: Mutex::new(callback),
            notifier: Arc::clone(&self.notifier),
        });
        self.lock().push(Arc::clone(&inner));
        AsyncHandle { inner }
    }

    /// Close a handle: no further callbacks run and it stops counting as activity
    pub fn close(&self, handle: &AsyncHandle) {
        handle.inner.closed.store(true, Ordering::Release);
        let callback = handle
            .inner
            .callback
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        drop(callback);
        self.lock().retain(|h| h.id != handle.inner.id);
    }

    /// Any open handle is still referenced
    pub fn has_active_refs(&self) -> bool {
        self.lock().iter().any(|h| {
            !h.closed.load(Ordering::Acquire) && h.referenced.load(Ordering::Acquire)
        })
    }

    /// Number of open handles
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observe pending sends and run their callbacks. Host thread only.
    ///
    /// Returns the number of handles observed.
    pub fn dispatch_pending(&self) -> usize {
        self.notifier.drain();

        // Snapshot so callbacks may init/close handles without holding the table lock
        let snapshot: Vec<Arc<HandleInner>> = self.lock().clone();

        let mut observed = 0;
        for handle in snapshot {
            if handle.closed.load(Ordering::Acquire) {
                continue;
            }
            if !handle.pending.swap(false, Ordering::SeqCst) {
                continue;
            }
            observed += 1;

            let callback = handle
                .callback
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .take();
            if let Some(mut cb) = callback {
                cb();
                if !handle.closed.load(Ordering::Acquire) {
                    let mut slot = handle.callback.lock().unwrap_or_else(PoisonError::into_inner);
                    if slot.is_none() {
                        *slot = Some(cb);
                    }
                }
            }
        }
        observed
    }

    /// Claim the table for a bridge. Returns `false` if already claimed.
    pub fn try_bind(&self) -> bool {
        self.bound
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_ok()
    }

    pub fn unbind(&self) {
        self.bound.store(false, Ordering::Release);
    }

    #[inline]
    pub fn is_bound(&self) -> bool {
        self.bound.load(Ordering::Acquire)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<Arc<HandleInner>>> {
        self.handles.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::BridgeResult;
    use std::sync::atomic::AtomicUsize;
    use std::thread;

    #[derive(Default)]
    struct CountingNotifier {
        notifies: AtomicUsize,
        drains: AtomicUsize,
    }

    impl Notifier for CountingNotifier {
        fn notify(&self) -> BridgeResult<()> {
            self.notifies.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        fn drain(&self) {
            self.drains.fetch_add(1, Ordering::SeqCst);
        }
    }

    fn table() -> (Arc<CountingNotifier>, SourceTable) {
        let notifier = Arc::new(CountingNotifier::default());
        let table = SourceTable::new(notifier.clone());
        (notifier, table)
    }

    fn counting_callback() -> (Arc<AtomicUsize>, AsyncCallback) {
        let count = Arc::new(AtomicUsize::new(0));
        let c = count.clone();
        (count, Box::new(move || {
            c.fetch_add(1, Ordering::SeqCst);
        }))
    }

    #[test]
    fn test_sends_coalesce_until_dispatch() {
        let (notifier, table) = table();
        let (count, cb) = counting_callback();
        let handle = table.async_init(Some(cb));

        handle.send();
        handle.send();
        handle.send();
        assert_eq!(notifier.notifies.load(Ordering::SeqCst), 1);
        assert!(handle.is_pending());

        assert_eq!(table.dispatch_pending(), 1);
        assert_eq!(count.load(Ordering::SeqCst), 1);
        assert!(!handle.is_pending());

        // Nothing pending: nothing runs
        assert_eq!(table.dispatch_pending(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 1);

        // A send after dispatch notifies again
        handle.send();
        assert_eq!(notifier.notifies.load(Ordering::SeqCst), 2);
        table.dispatch_pending();
        assert_eq!(count.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_take_pending_consumes_send() {
        let (notifier, table) = table();
        let (count, cb) = counting_callback();
        let handle = table.async_init(Some(cb));

        assert!(!handle.take_pending());
        handle.send();
        handle.send();
        assert!(handle.take_pending());
        assert!(!handle.take_pending());

        // The consumed send is not dispatched again
        assert_eq!(table.dispatch_pending(), 0);
        assert_eq!(count.load(Ordering::SeqCst), 0);

        // Re-armed: the next send notifies
        handle.send();
        assert_eq!(notifier.notifies.load(Ordering::SeqCst), 2);

        table.close(&handle);
        assert!(!handle.take_pending());
    }

    #[test]
    fn test_send_from_many_threads_is_observed() {
        let (_notifier, table) = table();
        let (count, cb) = counting_callback();
        let handle = table.async_init(Some(cb));

        let senders: Vec<_> = (0..8)
            .map(|_| {
                let h = handle.clone();
                thread::spawn(move || {
                    for _ in 0..100 {
                        h.send();
                    }
                })
            })
            .collect();
        for s in senders {
            s.join().unwrap();
        }

        table.dispatch_pending();
        let observed = count.load(Ordering::SeqCst);
        assert!(observed >= 1);
        assert!(!handle.is_pending());
    }

    #[test]
    fn test_unref_clears_activity() {
        let (_notifier, table) = table();
        let wakeup = table.async_init(None);
        let tick = table.async_init(None);
        tick.unref();
        assert!(table.has_active_refs());

        wakeup.unref();
        assert!(!table.has_active_refs());

        wakeup.ref_handle();
        assert!(table.has_active_refs());
    }

    #[test]
    fn test_unref_handle_still_delivers() {
        let (_notifier, table) = table();
        let (count, cb) = counting_callback();
        let handle = table.async_init(Some(cb));
        handle.unref();

        handle.send();
        table.dispatch_pending();
        assert_eq!(count.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_close_removes_and_ignores_sends() {
        let (notifier, table) = table();
        let (count, cb) = counting_callback();
        let handle = table.async_init(Some(cb));
        assert_eq!(table.len(), 1);

        table.close(&handle);
        assert!(handle.is_closed());
        assert!(table.is_empty());
        assert!(!table.has_active_refs());

        handle.send();
        assert_eq!(notifier.notifies.load(Ordering::SeqCst), 0);
        table.dispatch_pending();
        assert_eq!(count.load(Ordering::SeqCst), 0);
    }

    #[test]
    fn test_callback_may_close_own_handle() {
        let (_notifier, table) = table();
        let table = Arc::new(table);
        let slot: Arc<Mutex<Option<AsyncHandle>>> = Arc::new(Mutex::new(None));

        let t = Arc::clone(&table);
        let s = Arc::clone(&slot);
        let handle = table.async_init(Some(Box::new(move || {
            if let Some(h) = s.lock().unwrap().take() {
                t.close(&h);
            }
        })));
        *slot.lock().unwrap() = Some(handle.clone());

        handle.send();
        assert_eq!(table.dispatch_pending(), 1);
        assert!(handle.is_closed());
        assert!(table.is_empty());
    }

    #[test]
    fn test_dispatch_drains_notifier() {
        let (notifier, table) = table();
        table.dispatch_pending();
        assert_eq!(notifier.drains.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_single_binding() {
        let (_notifier, table) = table();
        assert!(table.try_bind());
        assert!(!table.try_bind());
        table.unbind();
        assert!(!table.is_bound());
        assert!(table.try_bind());
    }
}

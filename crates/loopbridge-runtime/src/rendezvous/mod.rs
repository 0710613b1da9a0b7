//! Rendezvous semaphore
//!
//! Strict handoff between the poller thread and the host-side batch:
//! the poller `acquire()`s after posting a batch, the host `release()`s once
//! the batch is done. Shutdown releases once more so a waiting poller can
//! observe `closing`.
//!
//! Counting semantics: a `release()` with no waiter is remembered, so the
//! order of release and acquire never loses a handoff.

/// Counting semaphore used as the poller/host handoff
///
/// **Contract:**
/// - At most one thread calls `acquire()` at a time (the poller).
/// - `release()` never blocks and may be called from any thread.
pub trait Rendezvous: Send + Sync {
    /// Block until the count is positive, then decrement it
    fn acquire(&self);

    /// Decrement without blocking. Returns `false` if the count was zero.
    fn try_acquire(&self) -> bool;

    /// Increment the count and wake a waiter
    fn release(&self);

    /// Current count (hint, may be stale)
    fn count(&self) -> u32;
}

mod fallback;
pub use fallback::CondvarRendezvous;

// Platform-specific implementations
cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod futex_linux;
        pub use futex_linux::FutexRendezvous;
        pub use futex_linux::FutexRendezvous as PlatformRendezvous;
    } else {
        pub use fallback::CondvarRendezvous as PlatformRendezvous;
    }
}

/// Create a new platform-appropriate rendezvous with a count of zero
pub fn new_rendezvous() -> Box<dyn Rendezvous> {
    Box::new(PlatformRendezvous::new())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;
    use std::thread;
    use std::time::{Duration, Instant};

    #[test]
    fn test_release_before_acquire_is_kept() {
        let r = new_rendezvous();
        r.release();
        assert_eq!(r.count(), 1);

        let start = Instant::now();
        r.acquire();
        assert!(start.elapsed() < Duration::from_millis(100));
        assert_eq!(r.count(), 0);
    }

    #[test]
    fn test_try_acquire() {
        let r = new_rendezvous();
        assert!(!r.try_acquire());
        r.release();
        r.release();
        assert!(r.try_acquire());
        assert!(r.try_acquire());
        assert!(!r.try_acquire());
    }

    #[test]
    fn test_acquire_blocks_until_release() {
        let r: Arc<dyn Rendezvous> = Arc::new(PlatformRendezvous::new());
        let done = Arc::new(AtomicBool::new(false));

        let r2 = Arc::clone(&r);
        let d2 = Arc::clone(&done);
        let handle = thread::spawn(move || {
            r2.acquire();
            d2.store(true, Ordering::SeqCst);
        });

        // Give thread time to block
        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));

        r.release();
        handle.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(r.count(), 0);
    }

    #[test]
    fn test_ping_pong_handoff() {
        let r: Arc<dyn Rendezvous> = Arc::new(PlatformRendezvous::new());
        let r2 = Arc::clone(&r);

        let handle = thread::spawn(move || {
            for _ in 0..1000 {
                r2.acquire();
            }
        });
        for _ in 0..1000 {
            r.release();
        }
        handle.join().unwrap();
        assert_eq!(r.count(), 0);
    }
}

//! `FdPoller` - `PollEvents` over a pollable backend fd
//!
//! Blocks in `poll(2)` until the embedded loop's backend fd is readable or
//! the loop's own timeout (its next timer) expires. When the loop's async
//! sources use an `EventFdNotifier`, any `AsyncHandle::send()` makes the fd
//! readable and interrupts the wait.
//!
//! The poller shares ownership of the fd's source, so the fd stays open
//! for as long as the poller can use it.
//!
//! # Poll errors
//!
//! EINTR is retried. Any other error is logged and treated as a spurious
//! wakeup, after a back-off that doubles with each consecutive failure
//! (1ms up to 100ms). Without it the poller thread would post empty
//! batches back to back. Only the first failure of a run and every 100th
//! after it are logged. A successful poll resets the run.

use std::os::fd::AsFd;
use std::os::unix::io::{AsRawFd, RawFd};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use loopbridge_core::{kerror, kinfo};
use loopbridge_core::traits::PollEvents;
use nix::errno::Errno;
use nix::poll::{poll, PollFd, PollFlags, PollTimeout};

/// Returns the loop's backend timeout in milliseconds; negative waits forever
pub type TimeoutFn = Box<dyn Fn() -> i32 + Send + Sync>;

/// Anything that owns a pollable fd
pub type FdSource = Arc<dyn AsFd + Send + Sync>;

/// Longest sleep after a failed poll
const MAX_FAILURE_BACKOFF: Duration = Duration::from_millis(100);

/// Failures between repeated error logs
const FAILURE_LOG_EVERY: u32 = 100;

pub struct FdPoller {
    source: FdSource,
    timeout: TimeoutFn,
    failures: AtomicU32,
}

impl FdPoller {
    /// Poll the fd owned by `source`, with no timeout
    pub fn new<S>(source: Arc<S>) -> Self
    where
        S: AsFd + Send + Sync + 'static,
    {
        Self {
            source,
            timeout: Box::new(|| -1),
            failures: AtomicU32::new(0),
        }
    }

    /// Ask `timeout` for the wait bound before every poll
    pub fn with_timeout<F>(mut self, timeout: F) -> Self
    where
        F: Fn() -> i32 + Send + Sync + 'static,
    {
        self.timeout = Box::new(timeout);
        self
    }

    pub fn fd(&self) -> RawFd {
        self.source.as_fd().as_raw_fd()
    }

    /// Consecutive failed polls so far
    pub fn failures(&self) -> u32 {
        self.failures.load(Ordering::Relaxed)
    }

    fn poll_timeout(&self) -> PollTimeout {
        let ms = (self.timeout)();
        if ms < 0 {
            PollTimeout::NONE
        } else {
            // Longer waits are cut short; the caller treats that as spurious
            PollTimeout::from(u16::try_from(ms).unwrap_or(u16::MAX))
        }
    }

    fn on_success(&self) {
        let failures = self.failures.swap(0, Ordering::Relaxed);
        if failures > 0 {
            kinfo!("fd poller: poll({}) recovered after {} failures", self.fd(), failures);
        }
    }

    fn on_failure(&self, err: Errno) {
        let failures = self.failures.fetch_add(1, Ordering::Relaxed).saturating_add(1);
        if failures == 1 || failures % FAILURE_LOG_EVERY == 0 {
            kerror!(
                "fd poller: poll({}) failed: {} ({} in a row)",
                self.fd(),
                err,
                failures
            );
        }
        thread::sleep(failure_backoff(failures));
    }
}

/// Sleep after the `failures`-th consecutive failed poll
fn failure_backoff(failures: u32) -> Duration {
    let shift = failures.saturating_sub(1).min(16);
    Duration::from_millis(1u64 << shift).min(MAX_FAILURE_BACKOFF)
}

impl PollEvents for FdPoller {
    fn poll_events(&self) {
        let fd = self.source.as_fd();
        loop {
            let mut fds = [PollFd::new(fd, PollFlags::POLLIN)];
            match poll(&mut fds, self.poll_timeout()) {
                Ok(_) => {
                    self.on_success();
                    return;
                }
                Err(Errno::EINTR) => continue,
                Err(e) => {
                    self.on_failure(e);
                    return;
                }
            }
        }
    }
}

#[cfg(all(test, target_os = "linux"))]
mod tests {
    use super::*;
    use crate::notifier::EventFdNotifier;
    use loopbridge_core::traits::Notifier;
    use std::time::Instant;

    #[test]
    fn test_returns_when_notified() {
        let notifier = Arc::new(EventFdNotifier::create().unwrap());
        let poller = FdPoller::new(Arc::clone(&notifier));
        assert_eq!(poller.fd(), notifier.fd());

        let n2 = Arc::clone(&notifier);
        let sender = thread::spawn(move || {
            thread::sleep(Duration::from_millis(30));
            n2.notify().unwrap();
        });

        let start = Instant::now();
        poller.poll_events();
        assert!(start.elapsed() >= Duration::from_millis(20));
        sender.join().unwrap();
        assert_eq!(poller.failures(), 0);
    }

    #[test]
    fn test_honours_loop_timeout() {
        let notifier = Arc::new(EventFdNotifier::create().unwrap());
        let poller = FdPoller::new(notifier).with_timeout(|| 20);

        let start = Instant::now();
        poller.poll_events();
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_millis(15));
        assert!(elapsed < Duration::from_secs(2));
    }

    #[test]
    fn test_pending_notify_returns_immediately() {
        let notifier = Arc::new(EventFdNotifier::create().unwrap());
        notifier.notify().unwrap();
        let poller = FdPoller::new(Arc::clone(&notifier));

        let start = Instant::now();
        poller.poll_events();
        assert!(start.elapsed() < Duration::from_millis(500));
    }

    #[test]
    fn test_poller_keeps_fd_open() {
        let notifier = Arc::new(EventFdNotifier::create().unwrap());
        let poller = FdPoller::new(Arc::clone(&notifier)).with_timeout(|| 0);
        notifier.notify().unwrap();
        drop(notifier);

        // Still readable through the poller's own reference
        poller.poll_events();
        assert_eq!(poller.failures(), 0);
    }

    #[test]
    fn test_failure_backoff_is_capped() {
        assert_eq!(failure_backoff(1), Duration::from_millis(1));
        assert_eq!(failure_backoff(2), Duration::from_millis(2));
        assert_eq!(failure_backoff(5), Duration::from_millis(16));
        assert_eq!(failure_backoff(8), MAX_FAILURE_BACKOFF);
        assert_eq!(failure_backoff(u32::MAX), MAX_FAILURE_BACKOFF);
    }

    #[test]
    fn test_failures_back_off_and_reset() {
        let notifier = Arc::new(EventFdNotifier::create().unwrap());
        let poller = FdPoller::new(notifier).with_timeout(|| 0);

        let start = Instant::now();
        for _ in 0..4 {
            poller.on_failure(Errno::ENOMEM);
        }
        // 1 + 2 + 4 + 8 ms
        assert!(start.elapsed() >= Duration::from_millis(15));
        assert_eq!(poller.failures(), 4);

        poller.poll_events();
        assert_eq!(poller.failures(), 0);
    }
}

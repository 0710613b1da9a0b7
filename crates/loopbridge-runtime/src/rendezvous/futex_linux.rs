//! Linux futex-based rendezvous
//!
//! Futex word semantics: the word IS the semaphore count.
//!
//! Acquire:
//! 1. Load count; if > 0, CAS it down by one and return
//! 2. Otherwise FUTEX_WAIT while the word is still 0
//! 3. Retry (wakeups may be spurious)
//!
//! Release:
//! 1. Increment count
//! 2. FUTEX_WAKE one waiter

use super::Rendezvous;
use std::sync::atomic::{AtomicU32, Ordering};

/// Linux futex-based counting semaphore
pub struct FutexRendezvous {
    /// Futex word: current count
    count: AtomicU32,
}

impl FutexRendezvous {
    pub fn new() -> Self {
        Self {
            count: AtomicU32::new(0),
        }
    }

    fn futex_wait(&self) {
        // Returns on FUTEX_WAKE, EAGAIN (word changed) or EINTR; the caller retries either way
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.count.as_ptr(),
                libc::FUTEX_WAIT | libc::FUTEX_PRIVATE_FLAG,
                0u32,                                // Expected value (sleep if count == 0)
                std::ptr::null::<libc::timespec>(), // No timeout
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }

    fn futex_wake_one(&self) {
        unsafe {
            libc::syscall(
                libc::SYS_futex,
                self.count.as_ptr(),
                libc::FUTEX_WAKE | libc::FUTEX_PRIVATE_FLAG,
                1i32,
                std::ptr::null::<libc::timespec>(),
                std::ptr::null::<u32>(),
                0u32,
            );
        }
    }
}

impl Default for FutexRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl Rendezvous for FutexRendezvous {
    fn acquire(&self) {
        loop {
            if self.try_acquire() {
                return;
            }
            self.futex_wait();
        }
    }

    fn try_acquire(&self) -> bool {
        let mut current = self.count.load(Ordering::Acquire);
        while current > 0 {
            match self.count.compare_exchange_weak(
                current,
                current - 1,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return true,
                Err(actual) => current = actual,
            }
        }
        false
    }

    fn release(&self) {
        self.count.fetch_add(1, Ordering::Release);
        self.futex_wake_one();
    }

    fn count(&self) -> u32 {
        self.count.load(Ordering::Relaxed)
    }
}

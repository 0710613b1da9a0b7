//! Condvar latch notifier
//!
//! `notify()` sets the latch and wakes every waiter; `drain()` clears it.
//! The latch stays set until drained, so a notify that lands before the
//! waiter blocks is never lost.

use loopbridge_core::error::BridgeResult;
use loopbridge_core::traits::Notifier;
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::Duration;

pub struct LatchNotifier {
    set: Mutex<bool>,
    condvar: Condvar,
}

impl LatchNotifier {
    pub fn new() -> Self {
        Self {
            set: Mutex::new(false),
            condvar: Condvar::new(),
        }
    }

    /// Block until the latch is set. Does not clear it.
    pub fn wait(&self) {
        let guard = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        let _guard = self
            .condvar
            .wait_while(guard, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
    }

    /// Like `wait()`, giving up after `timeout`. Returns whether the latch is set.
    pub fn wait_timeout(&self, timeout: Duration) -> bool {
        let guard = self.set.lock().unwrap_or_else(PoisonError::into_inner);
        let (guard, _) = self
            .condvar
            .wait_timeout_while(guard, timeout, |set| !*set)
            .unwrap_or_else(PoisonError::into_inner);
        *guard
    }

    pub fn is_set(&self) -> bool {
        *self.set.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Default for LatchNotifier {
    fn default() -> Self {
        Self::new()
    }
}

impl Notifier for LatchNotifier {
    fn notify(&self) -> BridgeResult<()> {
        {
            let mut set = self.set.lock().unwrap_or_else(PoisonError::into_inner);
            *set = true;
        }
        self.condvar.notify_all();
        Ok(())
    }

    fn drain(&self) {
        *self.set.lock().unwrap_or_else(PoisonError::into_inner) = false;
    }
}

//! Fallback rendezvous using std::sync::Condvar
//!
//! Used on platforms without futex support, and selectable anywhere.

use super::Rendezvous;
use std::sync::{Condvar, Mutex, PoisonError};

/// Condvar-based counting semaphore (fallback)
pub struct CondvarRendezvous {
    count: Mutex<u32>,
    condvar: Condvar,
}

impl CondvarRendezvous {
    pub fn new() -> Self {
        Self {
            count: Mutex::new(0),
            condvar: Condvar::new(),
        }
    }
}

impl Default for CondvarRendezvous {
    fn default() -> Self {
        Self::new()
    }
}

impl Rendezvous for CondvarRendezvous {
    fn acquire(&self) {
        let guard = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        let mut guard = self
            .condvar
            .wait_while(guard, |count| *count == 0)
            .unwrap_or_else(PoisonError::into_inner);
        *guard -= 1;
    }

    fn try_acquire(&self) -> bool {
        let mut guard = self.count.lock().unwrap_or_else(PoisonError::into_inner);
        if *guard == 0 {
            return false;
        }
        *guard -= 1;
        true
    }

    fn release(&self) {
        {
            let mut guard = self.count.lock().unwrap_or_else(PoisonError::into_inner);
            *guard += 1;
        }
        self.condvar.notify_one();
    }

    fn count(&self) -> u32 {
        *self.count.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_condvar_handoff() {
        let r = Arc::new(CondvarRendezvous::new());
        let r2 = Arc::clone(&r);
        let handle = thread::spawn(move || r2.acquire());
        r.release();
        handle.join().unwrap();
        assert_eq!(r.count(), 0);
    }
}

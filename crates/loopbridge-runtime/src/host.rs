//! `TaskQueueHost` - a minimal host loop
//!
//! A FIFO task queue drained by whichever thread plays the host. Used by the
//! demo binary and tests, and usable by applications that have no event
//! loop of their own.
//!
//! ```text
//!  any thread               host thread
//!  ──────────               ───────────
//!  post_task(t) ──push──▶   SegQueue ──pop──▶ t()
//!           └──signal──▶    Condvar (wakes run_until / wait_for_task)
//! ```

use crossbeam_queue::SegQueue;
use loopbridge_core::traits::{HostLoop, Task};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Condvar, Mutex, PoisonError};
use std::time::{Duration, Instant};

pub struct TaskQueueHost {
    queue: SegQueue<Task>,
    /// Bumped on every post so waiters can tell they missed nothing
    posted: Mutex<u64>,
    condvar: Condvar,
    executed: AtomicU64,
}

impl TaskQueueHost {
    pub fn new() -> Self {
        Self {
            queue: SegQueue::new(),
            posted: Mutex::new(0),
            condvar: Condvar::new(),
            executed: AtomicU64::new(0),
        }
    }

    /// Run every task queued so far, in order. Tasks posted while running
    /// are left for the next call. Returns the number run.
    pub fn run_pending(&self) -> usize {
        let mut ran = 0;
        for _ in 0..self.queue.len() {
            match self.queue.pop() {
                Some(task) => {
                    task();
                    ran += 1;
                }
                None => break,
            }
        }
        self.executed.fetch_add(ran as u64, Ordering::Relaxed);
        ran
    }

    /// Block until a task is queued or `timeout` passes. Returns whether one is queued.
    pub fn wait_for_task(&self, timeout: Duration) -> bool {
        let guard = self.posted.lock().unwrap_or_else(PoisonError::into_inner);
        let _ = self
            .condvar
            .wait_timeout_while(guard, timeout, |_| self.queue.is_empty())
            .unwrap_or_else(PoisonError::into_inner);
        !self.queue.is_empty()
    }

    /// Drive the queue on the calling thread until `done()` holds or
    /// `timeout` passes. Returns the final value of `done()`.
    pub fn run_until<F>(&self, timeout: Duration, mut done: F) -> bool
    where
        F: FnMut() -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            self.run_pending();
            if done() {
                return true;
            }
            let now = Instant::now();
            if now >= deadline {
                return false;
            }
            // Short slices so `done()` is re-checked even without posts
            self.wait_for_task((deadline - now).min(Duration::from_millis(5)));
        }
    }

    /// Drive the queue for `duration`
    pub fn run_for(&self, duration: Duration) {
        self.run_until(duration, || false);
    }

    pub fn len(&self) -> usize {
        self.queue.len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.is_empty()
    }

    /// Total tasks posted
    pub fn posted(&self) -> u64 {
        *self.posted.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Total tasks run
    pub fn executed(&self) -> u64 {
        self.executed.load(Ordering::Relaxed)
    }
}

impl Default for TaskQueueHost {
    fn default() -> Self {
        Self::new()
    }
}

impl HostLoop for TaskQueueHost {
    fn post_task(&self, task: Task) {
        self.queue.push(task);
        {
            let mut posted = self.posted.lock().unwrap_or_else(PoisonError::into_inner);
            *posted += 1;
        }
        self.condvar.notify_all();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let host = TaskQueueHost::new();
        let order = Arc::new(Mutex::new(Vec::new()));
        for i in 0..5 {
            let o = Arc::clone(&order);
            host.post_task(Box::new(move || o.lock().unwrap().push(i)));
        }
        assert_eq!(host.len(), 5);
        assert_eq!(host.run_pending(), 5);
        assert_eq!(*order.lock().unwrap(), vec![0, 1, 2, 3, 4]);
        assert_eq!(host.executed(), 5);
    }

    #[test]
    fn test_task_posted_while_running_waits_for_next_round() {
        let host = Arc::new(TaskQueueHost::new());
        let h2 = Arc::clone(&host);
        host.post_task(Box::new(move || h2.post_task(Box::new(|| {}))));

        assert_eq!(host.run_pending(), 1);
        assert_eq!(host.len(), 1);
        assert_eq!(host.run_pending(), 1);
        assert_eq!(host.posted(), 2);
    }

    #[test]
    fn test_post_from_other_thread_wakes_runner() {
        let host = Arc::new(TaskQueueHost::new());
        let flag = Arc::new(Mutex::new(false));

        let h2 = Arc::clone(&host);
        let f2 = Arc::clone(&flag);
        let poster = thread::spawn(move || {
            thread::sleep(Duration::from_millis(20));
            h2.post_task(Box::new(move || *f2.lock().unwrap() = true));
        });

        let f3 = Arc::clone(&flag);
        assert!(host.run_until(Duration::from_secs(5), || *f3.lock().unwrap()));
        poster.join().unwrap();
    }

    #[test]
    fn test_run_until_times_out() {
        let host = TaskQueueHost::new();
        let start = Instant::now();
        assert!(!host.run_until(Duration::from_millis(20), || false));
        assert!(start.elapsed() >= Duration::from_millis(20));
    }
}

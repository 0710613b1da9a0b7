//! Host-side batch processing
//!
//! Runs on the host thread each time the poller hands over control:
//!
//! ```text
//!  run_once()                      leading iteration, refreshes now_ms()
//!  start = now_ms()
//!  while extra < batch_size && now_ms() - start < batch_timeout_ms:
//!      run_once()
//!  (caller releases the rendezvous)
//! ```
//!
//! The limits keep a loop that keeps producing ready work (zero-delay
//! timer chains) from monopolizing the host thread.

use loopbridge_core::context::ContextScope;
use loopbridge_core::traits::{EmbeddedLoop, ScriptEngine};

use crate::config::BridgeConfig;

/// Batch limits
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchPolicy {
    /// Extra iterations after the leading one
    pub size: usize,
    /// Time budget on the loop's clock, measured from after the leading iteration
    pub timeout_ms: u64,
}

impl BatchPolicy {
    pub fn from_config(config: &BridgeConfig) -> Self {
        Self {
            size: config.batch_size,
            timeout_ms: config.batch_timeout_ms,
        }
    }
}

impl Default for BatchPolicy {
    fn default() -> Self {
        Self::from_config(&BridgeConfig::new())
    }
}

/// What one batch did
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BatchReport {
    /// Iterations run, including the leading one
    pub iterations: usize,
    /// Loop time spent after the leading iteration
    pub elapsed_ms: u64,
}

impl BatchReport {
    /// Iterations run after the leading one
    #[inline]
    pub fn extra_iterations(&self) -> usize {
        self.iterations.saturating_sub(1)
    }
}

/// One non-blocking loop iteration inside the engine context.
///
/// Microtasks are flushed first so work queued by earlier script execution
/// is visible to the loop before it decides what is ready.
///
/// # Panics
///
/// Panics if the calling thread has no engine context.
pub fn run_once(embedded: &dyn EmbeddedLoop, engine: &dyn ScriptEngine) {
    let _scope = ContextScope::enter(engine);
    engine.checkpoint_microtasks();
    embedded.run_nowait();
}

/// Run a leading iteration plus up to `policy.size` more, stopping early
/// once `policy.timeout_ms` of loop time has passed.
pub fn process_batch(
    embedded: &dyn EmbeddedLoop,
    engine: &dyn ScriptEngine,
    policy: BatchPolicy,
) -> BatchReport {
    run_once(embedded, engine);
    let start_ms = embedded.now_ms();

    let mut report = BatchReport {
        iterations: 1,
        elapsed_ms: 0,
    };
    let mut remaining = policy.size;
    while remaining != 0 && report.elapsed_ms < policy.timeout_ms {
        remaining -= 1;
        run_once(embedded, engine);
        report.iterations += 1;
        report.elapsed_ms = embedded.now_ms().saturating_sub(start_ms);
    }
    report
}

//! Poller thread
//!
//! Single background thread that waits for the embedded loop to have work
//! and hands each wakeup to the host thread as one batch.
//!
//! # Design
//!
//! The poller:
//! 1. Blocks in `PollEvents::poll_events()` (interrupted by any async send)
//! 2. Exits if the bridge is closing, or the loop stopped or drained
//! 3. Posts one batch to the host loop
//! 4. Blocks on the rendezvous until that batch has run
//!
//! When the loop stopped or drained, the exit also hands any pending next
//! tick to the host, since no later batch would observe it.
//!
//! Step 4 means at most one batch is ever in flight: a busy host thread
//! sees one queued batch, never a backlog. The poller never runs loop
//! callbacks itself; it only reads the loop's predicates.

use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use loopbridge_core::error::{BridgeError, BridgeResult};
use loopbridge_core::state::{PollerExit, PollerState};
use loopbridge_core::{kdebug, ktrace};

use crate::bridge::BridgeShared;

/// Statistics from poller thread execution
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PollerStats {
    /// Returns from `poll_events()`
    pub polls: u64,

    /// Batches posted to the host loop
    pub dispatches: u64,

    /// Why the thread returned
    pub exit: PollerExit,
}

/// Spawn the poller thread
pub(crate) fn spawn_poller(shared: Arc<BridgeShared>) -> BridgeResult<JoinHandle<PollerStats>> {
    let config = &shared.config;
    let mut builder = thread::Builder::new().name(config.poller_thread_name.clone());
    if let Some(stack_size) = config.poller_stack_size {
        builder = builder.stack_size(stack_size);
    }

    // Visible as Polling before the thread is scheduled
    shared.set_state(PollerState::Polling);

    let thread_shared = Arc::clone(&shared);
    builder
        .spawn(move || {
            let stats = poller_loop(&thread_shared);
            thread_shared.set_state(PollerState::Closed);
            if stats.exit != PollerExit::Closing {
                // No batch will run again: a next tick sent during the
                // last poll would otherwise never be observed
                thread_shared.flush_next_tick();
            }
            kdebug!(
                "poller: exit ({}) after {} polls, {} dispatches",
                stats.exit,
                stats.polls,
                stats.dispatches
            );
            stats
        })
        .map_err(|e| {
            shared.set_state(PollerState::Closed);
            BridgeError::ThreadSpawn(e.to_string())
        })
}

/// Main poller loop
fn poller_loop(shared: &Arc<BridgeShared>) -> PollerStats {
    let mut polls = 0u64;
    let mut dispatches = 0u64;
    let finish = |exit: PollerExit, polls: u64, dispatches: u64| PollerStats {
        polls,
        dispatches,
        exit,
    };

    loop {
        if shared.closing.load(Ordering::Acquire) {
            return finish(PollerExit::Closing, polls, dispatches);
        }

        // Polling: the strategy may be mid-destruction once closing is set,
        // so it is only entered after the check above.
        shared.set_state(PollerState::Polling);
        shared.poll.poll_events();
        polls += 1;
        if shared.closing.load(Ordering::Acquire) {
            return finish(PollerExit::Closing, polls, dispatches);
        }

        // Dispatching
        shared.set_state(PollerState::Dispatching);
        if shared.closing.load(Ordering::Acquire) {
            return finish(PollerExit::Closing, polls, dispatches);
        }
        if let Some(exit) = shared.loop_exit() {
            return finish(exit, polls, dispatches);
        }
        shared.wakeup_main_thread();
        dispatches += 1;

        // Waiting
        shared.set_state(PollerState::Waiting);
        shared.rendezvous.acquire();
        ktrace!("poller: released after dispatch {}", dispatches);
    }
}

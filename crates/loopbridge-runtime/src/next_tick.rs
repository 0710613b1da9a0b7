//! Next-tick doorbell
//!
//! `CallNextTick` is independent of the poller/rendezvous cycle: a send
//! from any thread marks the bridge's next-tick handle pending, and the
//! embedded loop observes it on the host thread. If the poller has already
//! exited, the bridge posts the observation to the host itself. Either way
//! it opens an engine context and asks the engine to run its next-tick
//! queue.
//!
//! The handle is unreferenced, so it never keeps the loop alive on its own.

use std::sync::Weak;

use loopbridge_core::context::ContextScope;
use loopbridge_core::source::AsyncHandle;
use loopbridge_core::traits::ScriptEngine;

use crate::bridge::BridgeShared;

/// Cloneable sender for producer threads.
///
/// Sends after the bridge has shut down are ignored.
#[derive(Clone, Debug)]
pub struct NextTickSender {
    handle: AsyncHandle,
    shared: Weak<BridgeShared>,
}

impl NextTickSender {
    pub(crate) fn new(handle: AsyncHandle, shared: Weak<BridgeShared>) -> Self {
        Self { handle, shared }
    }

    /// Ring the next-tick doorbell. Never blocks; sends coalesce.
    #[inline]
    pub fn send(&self) {
        if let Some(shared) = self.shared.upgrade() {
            shared.send_next_tick(&self.handle);
        }
    }

    /// The bridge that issued this sender has shut down
    pub fn is_closed(&self) -> bool {
        self.handle.is_closed()
    }
}

/// Host-thread handler for an observed next-tick send.
///
/// # Panics
///
/// Panics if the calling thread has no engine context.
pub fn run_next_tick(engine: &dyn ScriptEngine) {
    let _scope = ContextScope::enter(engine);
    engine.run_next_tick_callbacks();
}

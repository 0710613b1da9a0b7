//! Engine context guard
//!
//! Host-side work (batch iterations, next-tick handling) must run with the
//! scripting engine's context entered. `ContextScope` enters on creation and
//! exits on drop, so an unwinding callback still leaves the engine balanced.

use crate::traits::ScriptEngine;

/// RAII bracket around `enter_context()` / `exit_context()`
pub struct ContextScope<'a> {
    engine: &'a dyn ScriptEngine,
}

impl<'a> ContextScope<'a> {
    /// Enter the engine context bound to the calling thread.
    ///
    /// # Panics
    ///
    /// Panics if no context is bound. Host-side work is only ever scheduled
    /// from inside an active engine context; reaching here without one is a
    /// contract violation.
    pub fn enter(engine: &'a dyn ScriptEngine) -> Self {
        assert!(
            engine.enter_context(),
            "no script engine context bound to thread {:?}",
            std::thread::current().id()
        );
        Self { engine }
    }

    #[inline]
    pub fn engine(&self) -> &'a dyn ScriptEngine {
        self.engine
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.engine.exit_context();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, AtomicI32, Ordering};

    struct DepthEngine {
        bound: AtomicBool,
        depth: AtomicI32,
    }

    impl DepthEngine {
        fn new(bound: bool) -> Self {
            Self {
                bound: AtomicBool::new(bound),
                depth: AtomicI32::new(0),
            }
        }
    }

    impl ScriptEngine for DepthEngine {
        fn enter_context(&self) -> bool {
            if !self.bound.load(Ordering::SeqCst) {
                return false;
            }
            self.depth.fetch_add(1, Ordering::SeqCst);
            true
        }

        fn exit_context(&self) {
            self.depth.fetch_sub(1, Ordering::SeqCst);
        }

        fn checkpoint_microtasks(&self) {}

        fn run_next_tick_callbacks(&self) {}
    }

    #[test]
    fn test_scope_is_balanced() {
        let engine = DepthEngine::new(true);
        {
            let _outer = ContextScope::enter(&engine);
            assert_eq!(engine.depth.load(Ordering::SeqCst), 1);
            {
                let _inner = ContextScope::enter(&engine);
                assert_eq!(engine.depth.load(Ordering::SeqCst), 2);
            }
            assert_eq!(engine.depth.load(Ordering::SeqCst), 1);
        }
        assert_eq!(engine.depth.load(Ordering::SeqCst), 0);
    }

    #[test]
    #[should_panic(expected = "no script engine context")]
    fn test_missing_context_panics() {
        let engine = DepthEngine::new(false);
        let _scope = ContextScope::enter(&engine);
    }

    #[test]
    fn test_scope_exits_on_unwind() {
        let engine = DepthEngine::new(true);
        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let _scope = ContextScope::enter(&engine);
            panic!("callback failed");
        }));
        assert!(result.is_err());
        assert_eq!(engine.depth.load(Ordering::SeqCst), 0);
    }
}

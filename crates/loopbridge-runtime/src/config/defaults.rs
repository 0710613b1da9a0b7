//! Library defaults for `BridgeConfig`
//!
//! Environment variables override these at runtime (see `BridgeConfig::from_env`).

use loopbridge_core::constants;

/// Extra non-blocking iterations per batch after the leading one
pub const BATCH_SIZE: usize = constants::EVENT_BATCH_SIZE;

/// Batch time budget, measured on the embedded loop's clock
pub const BATCH_TIMEOUT_MS: u64 = constants::EVENT_BATCH_TIMEOUT_MS;

pub const POLLER_THREAD_NAME: &str = constants::POLLER_THREAD_NAME;

/// 0 = system default
pub const POLLER_STACK_SIZE: usize = 0;

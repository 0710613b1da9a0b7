//! Error types for loopbridge
//!
//! Only startup can fail in a recoverable way. Misuse of a bridge that is
//! shutting down, or running host-side work without an engine context, is
//! a contract violation and panics instead.

use core::fmt;

/// Result type for bridge operations
pub type BridgeResult<T> = Result<T, BridgeError>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// `init()` was called on a bridge that is already running
    AlreadyInitialized,

    /// Another bridge is already bound to this embedded loop
    LoopAlreadyBound,

    /// `init()` was called after shutdown began
    ShuttingDown,

    /// The poller thread could not be spawned
    ThreadSpawn(String),

    /// A signal primitive failed (errno)
    Notifier(i32),

    /// Configuration rejected by `validate()`
    InvalidConfig(&'static str),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::AlreadyInitialized => write!(f, "bridge already initialized"),
            BridgeError::LoopAlreadyBound => write!(f, "embedded loop already bound to a bridge"),
            BridgeError::ShuttingDown => write!(f, "bridge is shutting down"),
            BridgeError::ThreadSpawn(msg) => write!(f, "failed to spawn poller thread: {}", msg),
            BridgeError::Notifier(errno) => write!(f, "notifier error: errno {}", errno),
            BridgeError::InvalidConfig(msg) => write!(f, "invalid config: {}", msg),
        }
    }
}

impl std::error::Error for BridgeError {}

impl From<std::io::Error> for BridgeError {
    fn from(e: std::io::Error) -> Self {
        match e.raw_os_error() {
            Some(errno) => BridgeError::Notifier(errno),
            None => BridgeError::ThreadSpawn(e.to_string()),
        }
    }
}

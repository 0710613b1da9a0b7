//! Poller state and exit reason types

use core::fmt;

/// State of the poller thread
///
/// ```text
///   ┌──────────┐ poll_events() returns ┌─────────────┐ post batch ┌─────────┐
///   │ Polling  │ ─────────────────────▶│ Dispatching │ ──────────▶│ Waiting │
///   └──────────┘                       └─────────────┘            └─────────┘
///        ▲  │ closing                        │ closing / stopped       │
///        │  ▼                                ▼ / drained               │
///        │ ┌────────┐                   ┌────────┐                     │
///        │ │ Closed │                   │ Closed │                     │
///        │ └────────┘                   └────────┘                     │
///        └──────────────────────── rendezvous released ───────────────┘
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum PollerState {
    /// Blocked in `poll_events()`, or about to be
    Polling = 0,

    /// Deciding whether to hand a batch to the host thread
    Dispatching = 1,

    /// Batch posted; blocked on the rendezvous until the host releases it
    Waiting = 2,

    /// Thread has returned (or was never started)
    Closed = 3,
}

impl PollerState {
    #[inline]
    pub const fn is_closed(&self) -> bool {
        matches!(self, PollerState::Closed)
    }

    /// The poller is parked in one of its two blocking points
    #[inline]
    pub const fn is_blocked(&self) -> bool {
        matches!(self, PollerState::Polling | PollerState::Waiting)
    }
}

impl From<u8> for PollerState {
    fn from(v: u8) -> Self {
        match v {
            0 => PollerState::Polling,
            1 => PollerState::Dispatching,
            2 => PollerState::Waiting,
            _ => PollerState::Closed,
        }
    }
}

impl From<PollerState> for u8 {
    fn from(state: PollerState) -> u8 {
        state as u8
    }
}

impl fmt::Display for PollerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollerState::Polling => "polling",
            PollerState::Dispatching => "dispatching",
            PollerState::Waiting => "waiting",
            PollerState::Closed => "closed",
        };
        f.write_str(name)
    }
}

/// Why the poller thread returned
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollerExit {
    /// The bridge began shutting down
    Closing,

    /// The embedded loop's stop flag was set
    LoopStopped,

    /// No active handles and no active requests remain
    LoopDrained,
}

impl PollerExit {
    /// The loop ended on its own rather than being torn down by the owner
    #[inline]
    pub const fn is_loop_exit(&self) -> bool {
        matches!(self, PollerExit::LoopStopped | PollerExit::LoopDrained)
    }
}

impl fmt::Display for PollerExit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            PollerExit::Closing => "closing",
            PollerExit::LoopStopped => "loop stopped",
            PollerExit::LoopDrained => "loop drained",
        };
        f.write_str(name)
    }
}

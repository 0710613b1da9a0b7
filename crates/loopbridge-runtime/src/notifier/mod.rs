//! `Notifier` implementations
//!
//! A notifier is what makes an async send interrupt the embedded loop's
//! blocking poll:
//!
//! - `LatchNotifier` - portable; the poll strategy waits on the latch itself
//! - `EventFdNotifier` - Linux; an eventfd that a `FdPoller` can poll

mod latch;
pub use latch::LatchNotifier;

cfg_if::cfg_if! {
    if #[cfg(target_os = "linux")] {
        mod eventfd_linux;
        pub use eventfd_linux::EventFdNotifier;
    }
}

//! `EventFdNotifier` - eventfd-backed `Notifier`.
//!
//! Writes to an eventfd to wake whoever polls it (see `FdPoller`).
//! Coalescing: multiple calls to `notify()` before the loop drains the
//! eventfd result in a single wakeup (eventfd counter semantics).

use loopbridge_core::error::{BridgeError, BridgeResult};
use loopbridge_core::kerror;
use loopbridge_core::traits::Notifier;

use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::io::RawFd;

pub struct EventFdNotifier {
    fd: RawFd,
}

impl EventFdNotifier {
    /// Create a new non-blocking eventfd. The notifier closes it on drop.
    pub fn create() -> BridgeResult<Self> {
        let fd = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
        if fd < 0 {
            return Err(BridgeError::Notifier(errno()));
        }
        Ok(Self { fd })
    }

    /// The raw eventfd, readable while a notify is pending
    pub fn fd(&self) -> RawFd {
        self.fd
    }
}

impl Notifier for EventFdNotifier {
    fn notify(&self) -> BridgeResult<()> {
        let val: u64 = 1;
        let ret = unsafe {
            libc::write(
                self.fd,
                &val as *const u64 as *const libc::c_void,
                std::mem::size_of::<u64>(),
            )
        };
        if ret < 0 {
            let errno = errno();
            // EAGAIN: counter would overflow, so a wakeup is already pending
            if errno == libc::EAGAIN {
                return Ok(());
            }
            return Err(BridgeError::Notifier(errno));
        }
        Ok(())
    }

    fn drain(&self) {
        let mut val: u64 = 0;
        loop {
            let ret = unsafe {
                libc::read(
                    self.fd,
                    &mut val as *mut u64 as *mut libc::c_void,
                    std::mem::size_of::<u64>(),
                )
            };
            if ret >= 0 {
                // One read resets the counter
                return;
            }
            match errno() {
                libc::EINTR => continue,
                libc::EAGAIN => return,
                e => {
                    kerror!("eventfd {}: drain failed: errno {}", self.fd, e);
                    return;
                }
            }
        }
    }
}

impl AsFd for EventFdNotifier {
    fn as_fd(&self) -> BorrowedFd<'_> {
        // Safety: the eventfd is owned by self and closed only on drop
        unsafe { BorrowedFd::borrow_raw(self.fd) }
    }
}

impl Drop for EventFdNotifier {
    fn drop(&mut self) {
        if self.fd >= 0 {
            unsafe {
                libc::close(self.fd);
            }
            self.fd = -1;
        }
    }
}

#[inline]
fn errno() -> i32 {
    unsafe { *libc::__errno_location() }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn readable(fd: RawFd) -> bool {
        let mut pfd = libc::pollfd {
            fd,
            events: libc::POLLIN,
            revents: 0,
        };
        unsafe { libc::poll(&mut pfd, 1, 0) == 1 }
    }

    #[test]
    fn test_notify_then_drain() {
        let n = EventFdNotifier::create().unwrap();
        assert!(!readable(n.fd()));

        n.notify().unwrap();
        n.notify().unwrap();
        assert!(readable(n.fd()));

        n.drain();
        assert!(!readable(n.fd()));

        // Draining an empty eventfd is harmless
        n.drain();
        assert!(!readable(n.fd()));
    }
}

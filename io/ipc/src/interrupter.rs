//! Cross-thread wakeup for threads blocked in an fd readiness primitive.
//!
//! Backed by a non-blocking eventfd so the read end can sit directly in
//! a poll set alongside socket fds.

use std::io;
use std::os::fd::{AsRawFd, FromRawFd, OwnedFd, RawFd};
use std::sync::Arc;

/// Write side: wakes whichever thread polls the read side.
#[derive(Clone)]
pub struct InterruptHandle {
    fd: Arc<OwnedFd>,
}

impl InterruptHandle {
    /// Post a wakeup. Best-effort: a full counter already guarantees a
    /// pending wakeup, so errors are ignored.
    pub fn interrupt(&self) {
        let one: u64 = 1;
        unsafe {
            libc::write(
                self.fd.as_raw_fd(),
                &one as *const u64 as *const libc::c_void,
                8,
            );
        }
    }
}

/// Read side: registered in the poller and drained on wakeup.
pub struct InterruptReader {
    fd: Arc<OwnedFd>,
}

impl InterruptReader {
    /// The fd to register for read readiness.
    pub fn raw_fd(&self) -> RawFd {
        self.fd.as_raw_fd()
    }

    /// Consume all pending wakeups.
    pub fn drain(&self) {
        let mut count: u64 = 0;
        unsafe {
            libc::read(
                self.fd.as_raw_fd(),
                &mut count as *mut u64 as *mut libc::c_void,
                8,
            );
        }
    }
}

/// Create a connected interrupter pair.
pub fn interrupter() -> io::Result<(InterruptHandle, InterruptReader)> {
    let raw = unsafe { libc::eventfd(0, libc::EFD_NONBLOCK | libc::EFD_CLOEXEC) };
    if raw < 0 {
        return Err(io::Error::last_os_error());
    }
    let fd = Arc::new(unsafe { OwnedFd::from_raw_fd(raw) });
    Ok((
        InterruptHandle { fd: fd.clone() },
        InterruptReader { fd },
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn interrupt_makes_fd_readable() {
        let (handle, reader) = interrupter().unwrap();

        let mut pfd = libc::pollfd {
            fd: reader.raw_fd(),
            events: libc::POLLIN,
            revents: 0,
        };
        let n = unsafe { libc::poll(&mut pfd, 1, 0) };
        assert_eq!(n, 0);

        handle.interrupt();
        handle.interrupt();
        let n = unsafe { libc::poll(&mut pfd, 1, 1000) };
        assert_eq!(n, 1);

        reader.drain();
        pfd.revents = 0;
        let n = unsafe { libc::poll(&mut pfd, 1, 0) };
        assert_eq!(n, 0);
    }
}

//! Bidirectional byte pipes with bounded buffering and half-close.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::cell::SignalCell;
use crate::signals::Signals;
use crate::waitset::SignalSource;

/// Default per-direction buffer capacity.
pub const DEFAULT_PIPE_CAPACITY: usize = 64 * 1024;

/// Why a pipe operation could not complete.
#[derive(Debug, PartialEq, Eq)]
pub enum PipeError {
    /// No data to read / no room to write; retry after the matching
    /// readiness signal.
    ShouldWait,
    /// The peer endpoint is gone, or its write direction is closed and
    /// the buffer has drained.
    PeerClosed,
    /// This endpoint already half-closed its write direction.
    BadState,
}

struct Ring {
    buf: VecDeque<u8>,
    capacity: usize,
    /// The endpoint writing into this ring is gone or half-closed.
    writer_closed: bool,
}

impl Ring {
    fn new(capacity: usize) -> Arc<Mutex<Ring>> {
        Arc::new(Mutex::new(Ring {
            buf: VecDeque::with_capacity(capacity.min(4096)),
            capacity,
            writer_closed: false,
        }))
    }
}

/// One endpoint of a bidirectional byte pipe.
pub struct Pipe {
    rx: Arc<Mutex<Ring>>,
    tx: Arc<Mutex<Ring>>,
    local: Arc<SignalCell>,
    remote: Arc<SignalCell>,
}

/// Create a connected pair of pipe endpoints with the given
/// per-direction capacity.
pub fn pipe(capacity: usize) -> (Pipe, Pipe) {
    let ab = Ring::new(capacity);
    let ba = Ring::new(capacity);
    let cell_a = SignalCell::new(Signals::WRITABLE);
    let cell_b = SignalCell::new(Signals::WRITABLE);
    (
        Pipe {
            rx: ba.clone(),
            tx: ab.clone(),
            local: cell_a.clone(),
            remote: cell_b.clone(),
        },
        Pipe {
            rx: ab,
            tx: ba,
            local: cell_b,
            remote: cell_a,
        },
    )
}

impl Pipe {
    /// Write as many bytes as fit. Short writes are normal; a full
    /// buffer reports [`PipeError::ShouldWait`] after clearing this
    /// endpoint's WRITABLE signal.
    pub fn write(&self, data: &[u8]) -> Result<usize, PipeError> {
        if data.is_empty() {
            return Ok(0);
        }
        if self.local.load().contains(Signals::PEER_CLOSED) {
            return Err(PipeError::PeerClosed);
        }
        let mut tx = self.tx.lock();
        if tx.writer_closed {
            return Err(PipeError::BadState);
        }
        let space = tx.capacity - tx.buf.len();
        if space == 0 {
            self.local.update(Signals::WRITABLE, Signals::empty());
            return Err(PipeError::ShouldWait);
        }
        let n = space.min(data.len());
        tx.buf.extend(&data[..n]);
        if tx.buf.len() == tx.capacity {
            self.local.update(Signals::WRITABLE, Signals::empty());
        }
        self.remote.update(Signals::empty(), Signals::READABLE);
        Ok(n)
    }

    /// Read up to `buf.len()` bytes. Once the peer's write direction is
    /// closed and the buffer has drained, reads report
    /// [`PipeError::PeerClosed`].
    pub fn read(&self, buf: &mut [u8]) -> Result<usize, PipeError> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut rx = self.rx.lock();
        if rx.buf.is_empty() {
            if rx.writer_closed {
                return Err(PipeError::PeerClosed);
            }
            return Err(PipeError::ShouldWait);
        }
        let n = rx.buf.len().min(buf.len());
        for (i, byte) in rx.buf.drain(..n).enumerate() {
            buf[i] = byte;
        }
        if rx.buf.is_empty() && !rx.writer_closed {
            self.local.update(Signals::READABLE, Signals::empty());
        }
        self.remote.update(Signals::empty(), Signals::WRITABLE);
        Ok(n)
    }

    /// Close this endpoint's write direction. The peer drains any
    /// buffered bytes, then its reads report
    /// [`PipeError::PeerClosed`]. Errors with `PeerClosed` if the peer
    /// is already fully gone.
    pub fn half_close(&self) -> Result<(), PipeError> {
        if self.local.load().contains(Signals::PEER_CLOSED) {
            return Err(PipeError::PeerClosed);
        }
        let mut tx = self.tx.lock();
        if tx.writer_closed {
            return Err(PipeError::BadState);
        }
        tx.writer_closed = true;
        // Wake blocked readers so they can observe end-of-stream.
        self.remote.update(Signals::empty(), Signals::READABLE);
        Ok(())
    }

    /// Set and clear user signal bits on the peer endpoint (user bits
    /// only; others are masked out).
    pub fn signal_peer(&self, clear: Signals, set: Signals) {
        self.remote
            .update(clear & Signals::USER_ALL, set & Signals::USER_ALL);
    }

    /// The currently asserted signals on this endpoint.
    pub fn signals(&self) -> Signals {
        self.local.load()
    }

    /// A registration reference for wait-sets.
    pub fn source(&self) -> SignalSource {
        SignalSource::new(self.local.clone())
    }

    /// Block until any bit in `mask` is asserted (see
    /// [`SignalSource::wait`]).
    pub fn wait_signals(
        &self,
        mask: Signals,
        timeout: Option<std::time::Duration>,
    ) -> Signals {
        self.source().wait(mask, timeout)
    }
}

impl std::fmt::Debug for Pipe {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipe")
            .field("signals", &self.signals())
            .finish()
    }
}

impl Drop for Pipe {
    fn drop(&mut self) {
        self.tx.lock().writer_closed = true;
        self.remote.update(
            Signals::WRITABLE,
            Signals::PEER_CLOSED | Signals::READABLE,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn write_then_read() {
        let (a, b) = pipe(DEFAULT_PIPE_CAPACITY);
        assert_eq!(a.write(b"hello").unwrap(), 5);
        let mut buf = [0u8; 16];
        assert_eq!(b.read(&mut buf).unwrap(), 5);
        assert_eq!(&buf[..5], b"hello");
        assert_eq!(b.read(&mut buf).unwrap_err(), PipeError::ShouldWait);
    }

    #[test]
    fn backpressure_short_write_then_should_wait() {
        let (a, b) = pipe(8);
        assert_eq!(a.write(b"0123456789").unwrap(), 8);
        assert_eq!(a.write(b"x").unwrap_err(), PipeError::ShouldWait);
        assert!(!a.signals().contains(Signals::WRITABLE));

        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert!(a.signals().contains(Signals::WRITABLE));
        assert_eq!(a.write(b"x").unwrap(), 1);
    }

    #[test]
    fn half_close_drains_then_peer_closed() {
        let (a, b) = pipe(DEFAULT_PIPE_CAPACITY);
        a.write(b"tail").unwrap();
        a.half_close().unwrap();
        assert!(b.signals().contains(Signals::READABLE));
        let mut buf = [0u8; 16];
        assert_eq!(b.read(&mut buf).unwrap(), 4);
        assert_eq!(b.read(&mut buf).unwrap_err(), PipeError::PeerClosed);
        // The write direction toward us is still open.
        assert_eq!(b.write(b"back").unwrap(), 4);
    }

    #[test]
    fn double_half_close_is_bad_state() {
        let (a, _b) = pipe(DEFAULT_PIPE_CAPACITY);
        a.half_close().unwrap();
        assert_eq!(a.half_close().unwrap_err(), PipeError::BadState);
        assert_eq!(a.write(b"x").unwrap_err(), PipeError::BadState);
    }

    #[test]
    fn full_drop_sets_peer_closed() {
        let (a, b) = pipe(DEFAULT_PIPE_CAPACITY);
        drop(a);
        assert!(b.signals().contains(Signals::PEER_CLOSED));
        assert_eq!(b.write(b"x").unwrap_err(), PipeError::PeerClosed);
        let mut buf = [0u8; 4];
        assert_eq!(b.read(&mut buf).unwrap_err(), PipeError::PeerClosed);
    }
}

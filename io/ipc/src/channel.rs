//! Bidirectional message channels.
//!
//! Channels are message-granular and never apply backpressure to
//! writers; each message can carry up to [`Channel::MAX_HANDLES`]
//! endpoint handles.

use std::collections::VecDeque;
use std::sync::Arc;

use parking_lot::Mutex;
use smallvec::SmallVec;

use crate::cell::SignalCell;
use crate::signals::Signals;
use crate::waitset::SignalSource;
use crate::Handle;

/// One message queued on a channel.
#[derive(Debug, Default)]
pub struct ChannelMessage {
    pub bytes: Vec<u8>,
    pub handles: SmallVec<[Handle; 2]>,
}

impl ChannelMessage {
    /// A message carrying only bytes.
    pub fn data(bytes: Vec<u8>) -> Self {
        ChannelMessage {
            bytes,
            handles: SmallVec::new(),
        }
    }
}

/// Why a write failed.
#[derive(Debug, PartialEq, Eq)]
pub enum SendError {
    /// The peer endpoint is gone.
    PeerClosed,
    /// More than [`Channel::MAX_HANDLES`] handles attached.
    TooManyHandles,
}

/// Why a read produced nothing.
#[derive(Debug, PartialEq, Eq)]
pub enum RecvError {
    /// No message queued; try again after READABLE.
    Empty,
    /// No message queued and the peer is gone.
    PeerClosed,
}

#[derive(Default)]
struct Side {
    messages: VecDeque<ChannelMessage>,
    writer_gone: bool,
}

/// One endpoint of a bidirectional message channel.
pub struct Channel {
    rx: Arc<Mutex<Side>>,
    tx: Arc<Mutex<Side>>,
    local: Arc<SignalCell>,
    remote: Arc<SignalCell>,
}

/// Create a connected pair of channel endpoints.
pub fn channel() -> (Channel, Channel) {
    let ab = Arc::new(Mutex::new(Side::default()));
    let ba = Arc::new(Mutex::new(Side::default()));
    let cell_a = SignalCell::new(Signals::WRITABLE);
    let cell_b = SignalCell::new(Signals::WRITABLE);
    (
        Channel {
            rx: ba.clone(),
            tx: ab.clone(),
            local: cell_a.clone(),
            remote: cell_b.clone(),
        },
        Channel {
            rx: ab,
            tx: ba,
            local: cell_b,
            remote: cell_a,
        },
    )
}

impl Channel {
    /// Handles a single message may carry.
    pub const MAX_HANDLES: usize = 2;

    /// Queue a message for the peer. Channels never block or apply
    /// backpressure; the only failure modes are a closed peer or an
    /// over-long handle list.
    pub fn write(&self, msg: ChannelMessage) -> Result<(), SendError> {
        if msg.handles.len() > Self::MAX_HANDLES {
            return Err(SendError::TooManyHandles);
        }
        if self.local.load().contains(Signals::PEER_CLOSED) {
            return Err(SendError::PeerClosed);
        }
        let mut tx = self.tx.lock();
        tx.messages.push_back(msg);
        self.remote.update(Signals::empty(), Signals::READABLE);
        Ok(())
    }

    /// Dequeue the next message, if any. Messages queued before the
    /// peer closed remain readable afterwards.
    pub fn try_read(&self) -> Result<ChannelMessage, RecvError> {
        let mut rx = self.rx.lock();
        if let Some(msg) = rx.messages.pop_front() {
            if rx.messages.is_empty() {
                self.local.update(Signals::READABLE, Signals::empty());
            }
            return Ok(msg);
        }
        if rx.writer_gone {
            Err(RecvError::PeerClosed)
        } else {
            Err(RecvError::Empty)
        }
    }

    /// Set and clear user signal bits on the peer endpoint.
    ///
    /// Only the user bits may be touched; anything else is ignored by
    /// masking, matching the restriction kernels place on peer signals.
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

impl std::fmt::Debug for Channel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Channel")
            .field("signals", &self.signals())
            .finish()
    }
}

impl Drop for Channel {
    fn drop(&mut self) {
        self.tx.lock().writer_gone = true;
        self.remote
            .update(Signals::WRITABLE, Signals::PEER_CLOSED);
    }
}

//! In-process IPC primitives.
//!
//! This crate provides the endpoint and readiness objects the socket
//! proxy couples together: message-granular channels (which can carry
//! endpoint handles), bounded byte pipes with a half-close write mode,
//! bare signalable events, wait-sets with per-entry cookies, and an
//! eventfd-based interrupter for waking a thread blocked in a readiness
//! primitive.
//!
//! Every endpoint exposes a signal word ([`Signals`]) that wait-sets
//! observe. Channels and pipes deliberately share one signal vocabulary
//! (READABLE / WRITABLE / PEER_CLOSED plus four user bits) so a watcher
//! can treat either kind of data endpoint uniformly.

mod cell;
pub mod channel;
pub mod event;
pub mod interrupter;
pub mod pipe;
pub mod signals;
pub mod waitset;

pub use channel::{channel, Channel, ChannelMessage, RecvError, SendError};
pub use event::Event;
pub use interrupter::{interrupter, InterruptHandle, InterruptReader};
pub use pipe::{pipe, Pipe, PipeError, DEFAULT_PIPE_CAPACITY};
pub use signals::Signals;
pub use waitset::{SignalSource, WaitItem, WaitSet};

/// A transferable endpoint, as carried inside a [`ChannelMessage`].
#[derive(Debug)]
pub enum Handle {
    Channel(Channel),
    Pipe(Pipe),
    Event(Event),
}

impl Handle {
    /// Consume the handle as a channel endpoint.
    pub fn into_channel(self) -> Option<Channel> {
        match self {
            Handle::Channel(c) => Some(c),
            _ => None,
        }
    }

    /// Consume the handle as a pipe endpoint.
    pub fn into_pipe(self) -> Option<Pipe> {
        match self {
            Handle::Pipe(p) => Some(p),
            _ => None,
        }
    }
}

//! Per-connection state.

use std::sync::atomic::{AtomicI32, AtomicU32, Ordering};
use std::sync::Arc;

use io_ipc::{channel, pipe, Channel, Handle, Pipe, SignalSource, Signals};
use parking_lot::Mutex;

use crate::backend::{NetBackend, RawSocket};
use crate::buffer::{BufferPool, RwBuf};

/// Client-visible user signals on the data endpoint.
pub const SIGNAL_INCOMING: Signals = Signals::USER_0;
pub const SIGNAL_OUTGOING: Signals = Signals::USER_1;
pub const SIGNAL_CONNECTED: Signals = Signals::USER_2;
pub const SIGNAL_HALFCLOSED: Signals = Signals::USER_3;

/// What kind of data endpoint a connection carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleType {
    /// Control-only handle, no socket and no data endpoint.
    None,
    /// Stream socket; bulk data over a byte pipe.
    Stream,
    /// Datagram socket; bulk data over a message channel.
    Dgram,
}

/// The server end of a connection's bulk data path.
#[derive(Debug)]
pub enum DataEndpoint {
    Pipe(Pipe),
    Channel(Channel),
}

impl DataEndpoint {
    pub fn source(&self) -> SignalSource {
        match self {
            DataEndpoint::Pipe(p) => p.source(),
            DataEndpoint::Channel(c) => c.source(),
        }
    }

    pub fn signal_peer(&self, clear: Signals, set: Signals) {
        match self {
            DataEndpoint::Pipe(p) => p.signal_peer(clear, set),
            DataEndpoint::Channel(c) => c.signal_peer(clear, set),
        }
    }
}

/// The read/write pipeline state. Mutated only on the request runner.
#[derive(Default)]
pub struct IoBody {
    /// Inbound: bytes pulled from the socket, not yet pushed to the
    /// client. `0 <= roff <= rlen <= RWBUF_SIZE`.
    pub rbuf: Option<RwBuf>,
    pub rlen: usize,
    pub roff: usize,
    /// Outbound: bytes pulled from the client, not yet pushed to the
    /// socket. Same invariants.
    pub wbuf: Option<RwBuf>,
    pub wlen: usize,
    pub woff: usize,
    /// Last errno observed from the backend; served to clients via
    /// `getsockopt(SO_ERROR)`.
    pub last_errno: i32,
}

/// One live connection.
///
/// Lifetime is reference-counted: the RIO dispatcher registration and
/// the data-endpoint registration each hold one strong reference, and
/// queued requests hold clones while suspended. The record (and its
/// pooled buffers) is released when the last reference drops.
pub struct IoState {
    pub id: u64,
    pub handle_type: HandleType,
    sockfd: AtomicI32,
    /// Server end of the control channel; the dispatcher reads requests
    /// from it and replies are written back to it.
    pub rio: Channel,
    /// Server end of the bulk data path. Absent for `HandleType::None`.
    pub data: Option<DataEndpoint>,
    pub body: Mutex<IoBody>,
    /// Mirror of the signals currently registered in the watcher's
    /// wait-set for `data`. Edited only through the watcher helpers.
    watching: AtomicU32,
    pool: Arc<BufferPool>,
    backend: Arc<dyn NetBackend>,
}

/// Everything `IoState::create` hands back: the installed record plus
/// the client ends of its endpoints.
pub struct CreatedHandles {
    pub ios: Arc<IoState>,
    pub peer_rio: Channel,
    pub peer_data: Option<Handle>,
}

impl IoState {
    /// Build a connection record and its endpoint pairs. The server
    /// ends are stored in the record; the client ends are returned for
    /// the OPEN reply.
    pub fn create(
        id: u64,
        handle_type: HandleType,
        sockfd: RawSocket,
        pool: Arc<BufferPool>,
        backend: Arc<dyn NetBackend>,
        pipe_capacity: usize,
    ) -> CreatedHandles {
        let (rio_server, rio_client) = channel();
        let (data, peer_data) = match handle_type {
            HandleType::Stream => {
                let (server, client) = pipe(pipe_capacity);
                (Some(DataEndpoint::Pipe(server)), Some(Handle::Pipe(client)))
            }
            HandleType::Dgram => {
                let (server, client) = channel();
                (
                    Some(DataEndpoint::Channel(server)),
                    Some(Handle::Channel(client)),
                )
            }
            HandleType::None => (None, None),
        };
        let ios = Arc::new(IoState {
            id,
            handle_type,
            sockfd: AtomicI32::new(sockfd),
            rio: rio_server,
            data,
            body: Mutex::new(IoBody::default()),
            watching: AtomicU32::new(0),
            pool,
            backend,
        });
        CreatedHandles {
            ios,
            peer_rio: rio_client,
            peer_data,
        }
    }

    pub fn sockfd(&self) -> RawSocket {
        self.sockfd.load(Ordering::Acquire)
    }

    pub fn set_sockfd(&self, fd: RawSocket) {
        self.sockfd.store(fd, Ordering::Release);
    }

    pub fn watching(&self) -> Signals {
        Signals::from_bits_truncate(self.watching.load(Ordering::Acquire))
    }

    pub(crate) fn store_watching(&self, signals: Signals) {
        self.watching.store(signals.bits(), Ordering::Release);
    }

    pub fn data_source(&self) -> Option<SignalSource> {
        self.data.as_ref().map(DataEndpoint::source)
    }

    /// Set/clear user signals on the client end of the data endpoint.
    pub fn signal_data_peer(&self, clear: Signals, set: Signals) {
        if let Some(data) = &self.data {
            data.signal_peer(clear, set);
        }
    }

    pub fn stream_pipe(&self) -> Option<&Pipe> {
        match &self.data {
            Some(DataEndpoint::Pipe(p)) => Some(p),
            _ => None,
        }
    }

    pub fn dgram_channel(&self) -> Option<&Channel> {
        match &self.data {
            Some(DataEndpoint::Channel(c)) => Some(c),
            _ => None,
        }
    }
}

impl Drop for IoState {
    fn drop(&mut self) {
        let fd = *self.sockfd.get_mut();
        if fd >= 0 {
            let _ = self.backend.close(fd);
        }
        let body = self.body.get_mut();
        if let Some(buf) = body.rbuf.take() {
            self.pool.put(buf);
        }
        if let Some(buf) = body.wbuf.take() {
            self.pool.put(buf);
        }
    }
}

impl std::fmt::Debug for IoState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IoState")
            .field("id", &self.id)
            .field("handle_type", &self.handle_type)
            .field("sockfd", &self.sockfd())
            .field("watching", &self.watching())
            .finish()
    }
}

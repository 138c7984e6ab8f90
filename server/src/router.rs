//! The core aggregate and the operation router.
//!
//! [`Core`] owns everything the original kept in module-level state:
//! the buffer pool, the wait queues, the per-fd event table, the handle
//! watcher, the connection registries, and the doorbell the readiness
//! threads use to hand work to the request runner.
//!
//! [`handle_request`] is the router: it runs the op's handler and acts
//! on the returned [`Disposition`]: requeue on the named readiness
//! source, or complete and (for externally visible ops) send the
//! `Status` reply.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

use crossbeam_channel::Sender;
use io_ipc::{ChannelMessage, Event, InterruptHandle, Signals, WaitSet};
use parking_lot::Mutex;
use tracing::{error, trace};

use crate::backend::{NetBackend, RawSocket};
use crate::buffer::BufferPool;
use crate::handlers;
use crate::iostate::{CreatedHandles, HandleType, IoState};
use crate::metrics::{REQUESTS_SUSPENDED_CLIENT, REQUESTS_SUSPENDED_NET};
use crate::multiplexer::{EventTable, FdEvents};
use crate::queue::{WaitKind, WaitQueues};
use crate::request::Request;
use crate::watcher::SignalWatcher;
use protocol_rio::{Op, Status};

/// What a handler wants done with its request.
///
/// The pending variants carry the readiness the handler needs; the
/// router parks the request first and only then arms the source, so a
/// wakeup can never race past an empty queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Operation complete with this status.
    Done(Status),
    /// Suspend until the socket fd reports these events.
    PendingNet(FdEvents),
    /// Suspend until the data endpoint asserts one of these signals.
    PendingClient(Signals),
}

/// Work posted to the request runner by the readiness threads.
pub struct Posted {
    pub rq: Request,
    pub events: FdEvents,
    pub signals: Signals,
}

/// Process-wide proxy state.
pub struct Core {
    pub backend: Arc<dyn NetBackend>,
    pub pool: Arc<BufferPool>,
    pub queues: WaitQueues,
    pub events: EventTable,
    pub watcher: SignalWatcher,
    /// Wait-set the request runner blocks in: every registered control
    /// channel plus the doorbell.
    pub rio_waitset: WaitSet,
    pub doorbell: Event,
    pub pipe_capacity: usize,
    mux_interrupt: InterruptHandle,
    posted_tx: Sender<Posted>,
    /// Control-channel registrations (the dispatcher's reference).
    registry: Mutex<HashMap<u64, Arc<IoState>>>,
    /// Data-endpoint registrations (the second reference).
    data_refs: Mutex<HashMap<u64, Arc<IoState>>>,
    next_id: AtomicU64,
    shutdown: AtomicBool,
}

impl Core {
    #[allow(clippy::too_many_arguments)]
    pub(crate) fn new(
        backend: Arc<dyn NetBackend>,
        pool: Arc<BufferPool>,
        watcher: SignalWatcher,
        mux_interrupt: InterruptHandle,
        posted_tx: Sender<Posted>,
        pipe_capacity: usize,
    ) -> Core {
        Core {
            backend,
            pool,
            queues: WaitQueues::new(),
            events: EventTable::new(),
            watcher,
            rio_waitset: WaitSet::new(),
            doorbell: Event::new(),
            pipe_capacity,
            mux_interrupt,
            posted_tx,
            registry: Mutex::new(HashMap::new()),
            data_refs: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
            shutdown: AtomicBool::new(false),
        }
    }

    /// Allocate a connection record, register its control channel with
    /// the request runner, and take the data-endpoint reference.
    pub fn create_iostate(&self, handle_type: HandleType, sockfd: RawSocket) -> CreatedHandles {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let created = IoState::create(
            id,
            handle_type,
            sockfd,
            self.pool.clone(),
            self.backend.clone(),
            self.pipe_capacity,
        );
        self.registry.lock().insert(id, created.ios.clone());
        self.rio_waitset.add(
            id,
            &created.ios.rio.source(),
            Signals::READABLE | Signals::PEER_CLOSED,
        );
        if created.ios.data.is_some() {
            self.data_refs.lock().insert(id, created.ios.clone());
        }
        trace!(id, ?handle_type, sockfd, "iostate created");
        created
    }

    /// Look up a connection whose control channel is still registered.
    pub fn lookup_rio(&self, id: u64) -> Option<Arc<IoState>> {
        self.registry.lock().get(&id).cloned()
    }

    /// Look up a connection by either remaining reference.
    pub fn lookup_any(&self, id: u64) -> Option<Arc<IoState>> {
        self.registry
            .lock()
            .get(&id)
            .cloned()
            .or_else(|| self.data_refs.lock().get(&id).cloned())
    }

    /// Drop the control-channel reference (peer closed or explicit
    /// CLOSE handled).
    pub fn release_rio(&self, id: u64) {
        self.rio_waitset.remove(id);
        self.registry.lock().remove(&id);
    }

    /// Drop the data-endpoint reference. Returns whether it was held.
    pub fn release_data(&self, id: u64) -> bool {
        self.data_refs.lock().remove(&id).is_some()
    }

    /// How many registry references the core holds for `id` (test
    /// support for the refcount discipline).
    pub fn held_refs(&self, id: u64) -> usize {
        let mut refs = 0;
        if self.registry.lock().contains_key(&id) {
            refs += 1;
        }
        if self.data_refs.lock().contains_key(&id) {
            refs += 1;
        }
        refs
    }

    /// Arm fd events and wake the multiplexer to pick them up.
    pub fn arm_net(&self, fd: RawSocket, events: FdEvents) {
        self.events.set(fd, events);
        self.mux_interrupt.interrupt();
    }

    /// Drop all events for a closed fd and wake the multiplexer.
    pub fn drop_net(&self, fd: RawSocket) {
        self.events.remove(fd);
        self.mux_interrupt.interrupt();
    }

    /// Hand a request to the request runner.
    pub fn post(&self, rq: Request, events: FdEvents, signals: Signals) {
        if self
            .posted_tx
            .send(Posted {
                rq,
                events,
                signals,
            })
            .is_err()
        {
            error!("request runner is gone; dropping posted request");
            return;
        }
        self.doorbell.signal(Signals::empty(), Signals::SIGNALED);
    }

    pub fn begin_shutdown(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        self.doorbell.signal(Signals::empty(), Signals::SIGNALED);
        self.mux_interrupt.interrupt();
    }

    pub fn is_shutdown(&self) -> bool {
        self.shutdown.load(Ordering::SeqCst)
    }
}

/// Run one request to its next suspension point or completion.
pub fn handle_request(core: &Core, rq: Request, events: FdEvents, signals: Signals) {
    let mut rq = rq;
    trace!(op = rq.op.name(), ios = rq.ios.id, ?events, ?signals, "handle request");
    let disposition = handlers::dispatch(core, &mut rq, events, signals);
    match disposition {
        Disposition::PendingNet(wanted) => {
            let ios = rq.ios.clone();
            let fd = ios.sockfd();
            if fd < 0 {
                // Raced a CLOSE; the connection is gone.
                trace!(ios = ios.id, "dropping stale suspended request");
                return;
            }
            REQUESTS_SUSPENDED_NET.increment();
            core.queues.put(WaitKind::Net, fd, rq);
            core.arm_net(fd, wanted);
        }
        Disposition::PendingClient(wanted) => {
            let ios = rq.ios.clone();
            let fd = ios.sockfd();
            if fd < 0 {
                trace!(ios = ios.id, "dropping stale suspended request");
                return;
            }
            REQUESTS_SUSPENDED_CLIENT.increment();
            core.queues.put(WaitKind::Client, fd, rq);
            core.watcher.set(&ios, wanted);
        }
        Disposition::Done(status) => {
            if rq.op.has_reply() && rq.op != Op::Open {
                send_status(&rq, status);
            }
            // OPEN replies on the channel carried in the message; the
            // internal pseudo-ops never reply at all.
        }
    }
}

/// Write the `Status` reply back on the originating control channel. A
/// failed write is logged; any handles still in the reply are dropped
/// (closed) rather than leaked.
fn send_status(rq: &Request, status: Status) {
    let mut reply = rq.msg.clone().into_status(status);
    if !status.is_ok() {
        // Error replies carry no payload.
        reply.data.clear();
    }
    let bytes = match reply.encode() {
        Ok(bytes) => bytes,
        Err(e) => {
            error!(op = rq.op.name(), "failed to encode reply: {e}");
            return;
        }
    };
    if let Err(e) = rq.ios.rio.write(ChannelMessage::data(bytes)) {
        error!(op = rq.op.name(), ios = rq.ios.id, "reply write failed: {e:?}");
    }
}

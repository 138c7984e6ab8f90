//! The request runner.
//!
//! One thread owns every operation handler. It blocks in a wait-set
//! over all registered control channels plus a doorbell; the readiness
//! threads ring the doorbell after posting detached requests. Control
//! messages are decoded into requests and routed; a peer-closed control
//! channel synthesizes a CLOSE and releases the registration.

use std::sync::Arc;

use crossbeam_channel::Receiver;
use io_ipc::{ChannelMessage, RecvError, Signals};
use tracing::{debug, trace};

use crate::iostate::IoState;
use crate::multiplexer::FdEvents;
use crate::request::Request;
use crate::router::{handle_request, Core, Posted};
use protocol_rio::{Message, Op};

/// Wait-set cookie of the doorbell entry. Connection ids start at one.
pub const DOORBELL_COOKIE: u64 = u64::MAX;

/// The runner thread body.
pub fn run(core: Arc<Core>, posted_rx: Receiver<Posted>) {
    let waitset = core.rio_waitset.clone();
    waitset.add(
        DOORBELL_COOKIE,
        &core.doorbell.source(),
        Signals::SIGNALED,
    );

    loop {
        for item in waitset.wait(None) {
            if item.cookie == DOORBELL_COOKIE {
                core.doorbell.signal(Signals::SIGNALED, Signals::empty());
                while let Ok(posted) = posted_rx.try_recv() {
                    handle_request(&core, posted.rq, posted.events, posted.signals);
                }
                continue;
            }

            let Some(ios) = core.lookup_rio(item.cookie) else {
                core.rio_waitset.remove(item.cookie);
                continue;
            };

            if item.observed.contains(Signals::READABLE) {
                // One message per wakeup; the signal stays asserted
                // while more are queued.
                match ios.rio.try_read() {
                    Ok(raw) => serve_message(&core, item.cookie, &ios, raw),
                    Err(RecvError::Empty) => {}
                    Err(RecvError::PeerClosed) => peer_closed(&core, item.cookie, &ios),
                }
            } else if item.observed.contains(Signals::PEER_CLOSED) {
                peer_closed(&core, item.cookie, &ios);
            }
        }

        if core.is_shutdown() {
            return;
        }
    }
}

fn serve_message(core: &Arc<Core>, id: u64, ios: &Arc<IoState>, raw: ChannelMessage) {
    match Message::decode(&raw.bytes) {
        Ok(msg) => {
            let op = msg.op;
            trace!(id, op = op.name(), "request");
            let rq = Request::from_wire(msg, raw.handles, ios.clone());
            handle_request(core, rq, FdEvents::empty(), Signals::empty());
            if op == Op::Close {
                // Explicit CLOSE also ends the control registration.
                core.release_rio(id);
            }
        }
        Err(status) => {
            debug!(id, "malformed request: {status}");
            let mut reply = Message::new(Op::Status);
            reply.arg = status.into_raw();
            if let Ok(bytes) = reply.encode() {
                let _ = ios.rio.write(ChannelMessage::data(bytes));
            }
        }
    }
}

/// The client dropped its control channel: synthesize a CLOSE and drop
/// the dispatcher's reference.
fn peer_closed(core: &Arc<Core>, id: u64, ios: &Arc<IoState>) {
    debug!(id, "control channel peer closed");
    handle_request(
        core,
        Request::internal(Op::Close, ios.clone()),
        FdEvents::empty(),
        Signals::empty(),
    );
    core.release_rio(id);
}

//! Suspended and in-flight requests.

use std::sync::Arc;

use io_ipc::Handle;
use protocol_rio::{Message, Op};
use smallvec::SmallVec;

use crate::iostate::IoState;

/// One unit of work for the operation router: an op, its message, any
/// handles that arrived with it, and the connection it targets.
///
/// A request lives on at most one wait queue at a time; ownership moves
/// to the handler when dispatched.
pub struct Request {
    pub op: Op,
    pub msg: Message,
    pub handles: SmallVec<[Handle; 2]>,
    pub ios: Arc<IoState>,
}

impl Request {
    /// A request decoded off a control channel.
    pub fn from_wire(msg: Message, handles: SmallVec<[Handle; 2]>, ios: Arc<IoState>) -> Request {
        Request {
            op: msg.op,
            msg,
            handles,
            ios,
        }
    }

    /// An internally synthesized request (pseudo-ops, scheduled
    /// reads/writes). Carries an empty message and no handles.
    pub fn internal(op: Op, ios: Arc<IoState>) -> Request {
        Request {
            op,
            msg: Message::new(op),
            handles: SmallVec::new(),
            ios,
        }
    }
}

impl std::fmt::Debug for Request {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Request")
            .field("op", &self.op)
            .field("ios", &self.ios.id)
            .finish()
    }
}

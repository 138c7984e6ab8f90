//! The two keyed wait queues.
//!
//! Suspended requests park here until the matching readiness source
//! fires: net-wait for socket readiness, client-wait for data-endpoint
//! readiness. Both are keyed by the connection's socket fd and FIFO
//! within a key.

use std::collections::{HashMap, VecDeque};

use parking_lot::Mutex;

use crate::backend::RawSocket;
use crate::request::Request;

/// Which readiness source a request is parked on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitKind {
    Net,
    Client,
}

pub struct WaitQueues {
    net: Mutex<HashMap<RawSocket, VecDeque<Request>>>,
    client: Mutex<HashMap<RawSocket, VecDeque<Request>>>,
}

impl WaitQueues {
    pub fn new() -> WaitQueues {
        WaitQueues {
            net: Mutex::new(HashMap::new()),
            client: Mutex::new(HashMap::new()),
        }
    }

    fn map(&self, kind: WaitKind) -> &Mutex<HashMap<RawSocket, VecDeque<Request>>> {
        match kind {
            WaitKind::Net => &self.net,
            WaitKind::Client => &self.client,
        }
    }

    /// Park a request at the tail of its fd's queue.
    pub fn put(&self, kind: WaitKind, fd: RawSocket, rq: Request) {
        self.map(kind)
            .lock()
            .entry(fd)
            .or_default()
            .push_back(rq);
    }

    /// Detach the whole queue for `fd`, preserving FIFO order.
    pub fn take(&self, kind: WaitKind, fd: RawSocket) -> VecDeque<Request> {
        self.map(kind).lock().remove(&fd).unwrap_or_default()
    }

    /// Drop every request parked for `fd`. Returns how many were
    /// discarded.
    pub fn discard(&self, kind: WaitKind, fd: RawSocket) -> usize {
        self.map(kind)
            .lock()
            .remove(&fd)
            .map(|q| q.len())
            .unwrap_or(0)
    }

    /// How many requests are parked for `fd`.
    pub fn pending(&self, kind: WaitKind, fd: RawSocket) -> usize {
        self.map(kind).lock().get(&fd).map_or(0, VecDeque::len)
    }
}

impl Default for WaitQueues {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffer::BufferPool;
    use crate::iostate::{HandleType, IoState};
    use protocol_rio::Op;
    use std::sync::Arc;

    fn dummy_request(op: Op) -> Request {
        let created = IoState::create(
            0,
            HandleType::None,
            -1,
            Arc::new(BufferPool::new()),
            Arc::new(crate::test_backend::InertBackend),
            io_ipc::DEFAULT_PIPE_CAPACITY,
        );
        Request::internal(op, created.ios)
    }

    #[test]
    fn fifo_order_within_key() {
        let queues = WaitQueues::new();
        queues.put(WaitKind::Net, 5, dummy_request(Op::Read));
        queues.put(WaitKind::Net, 5, dummy_request(Op::SigConnR));
        let q = queues.take(WaitKind::Net, 5);
        let ops: Vec<_> = q.iter().map(|rq| rq.op).collect();
        assert_eq!(ops, vec![Op::Read, Op::SigConnR]);
        assert_eq!(queues.pending(WaitKind::Net, 5), 0);
    }

    #[test]
    fn queues_are_independent() {
        let queues = WaitQueues::new();
        queues.put(WaitKind::Net, 5, dummy_request(Op::Read));
        queues.put(WaitKind::Client, 5, dummy_request(Op::Write));
        assert_eq!(queues.pending(WaitKind::Net, 5), 1);
        assert_eq!(queues.pending(WaitKind::Client, 5), 1);
        assert_eq!(queues.take(WaitKind::Net, 5).len(), 1);
        assert_eq!(queues.pending(WaitKind::Client, 5), 1);
    }

    #[test]
    fn discard_empties_only_that_key() {
        let queues = WaitQueues::new();
        queues.put(WaitKind::Client, 3, dummy_request(Op::Write));
        queues.put(WaitKind::Client, 4, dummy_request(Op::Write));
        assert_eq!(queues.discard(WaitKind::Client, 3), 1);
        assert_eq!(queues.pending(WaitKind::Client, 3), 0);
        assert_eq!(queues.pending(WaitKind::Client, 4), 1);
    }
}

//! Signal bits observable on IPC endpoints.

use bitflags::bitflags;

bitflags! {
    /// The signal word of an endpoint.
    ///
    /// The low bits are maintained by the endpoint implementation; the
    /// user bits are only ever set or cleared through
    /// [`signal_peer`](crate::Channel::signal_peer) and carry
    /// application-defined meaning.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
    pub struct Signals: u32 {
        /// Data (or a message) is available to read.
        const READABLE = 1 << 0;
        /// The endpoint accepts more data.
        const WRITABLE = 1 << 1;
        /// The peer endpoint has been closed.
        const PEER_CLOSED = 1 << 2;
        /// An event object has been signaled.
        const SIGNALED = 1 << 3;

        const USER_0 = 1 << 24;
        const USER_1 = 1 << 25;
        const USER_2 = 1 << 26;
        const USER_3 = 1 << 27;
    }
}

impl Signals {
    /// All four user signal bits.
    pub const USER_ALL: Signals = Signals::USER_0
        .union(Signals::USER_1)
        .union(Signals::USER_2)
        .union(Signals::USER_3);
}

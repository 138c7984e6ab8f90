//! sockgate: a user-space socket-proxy server.
//!
//! Clients open the server root and receive a pair of IPC endpoints: a
//! RIO control channel and a bulk data endpoint (a byte pipe for stream
//! sockets, a message channel for datagram sockets). The server owns a
//! real non-blocking socket on the client's behalf and shuttles bytes
//! and control messages between the two sides.
//!
//! Three threads cooperate: the request runner executes every operation
//! handler, the net multiplexer blocks in the fd readiness primitive,
//! and the handle watcher blocks in a wait-set over the client-facing
//! data endpoints. The readiness threads never run handlers; they
//! detach suspended requests and post them back to the runner.

pub mod backend;
pub mod buffer;
pub mod config;
pub mod dispatcher;
pub mod handlers;
pub mod ioctl;
pub mod iostate;
pub mod logging;
pub mod metrics;
pub mod multiplexer;
pub mod queue;
pub mod request;
pub mod router;
pub mod server;
pub mod watcher;

#[cfg(test)]
pub(crate) mod test_backend;

pub use backend::{errno_to_status, NetBackend, OsBackend};
pub use config::Config;
pub use server::Server;

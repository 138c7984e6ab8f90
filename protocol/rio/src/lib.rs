//! The remote-I/O (RIO) wire protocol.
//!
//! Clients drive the socket proxy with fixed-header messages on a
//! control channel. This crate defines the op-codes and status codes,
//! the message framing, the OPEN path grammar, and the fixed binary
//! layouts for datagram envelopes, getaddrinfo, sockaddr/sockopt
//! payloads, and the network-configuration ioctls.

pub mod gai;
pub mod message;
pub mod netconfig;
pub mod ops;
pub mod path;
pub mod sockio;
pub mod sockmsg;

mod wire;

pub use gai::{AddrInfoHints, GaiEntry, GaiReply, GaiRequest, GAI_ADDR_SENTINEL};
pub use message::{Message, ObjectReply, CHUNK_SIZE, HDR_SIZE, MAX_HANDLES, PROTOCOL_SOCKET};
pub use ops::{Op, Status};
pub use path::{parse_open_path, OpenPath};
pub use sockio::{SockAddrReply, SockOptReq};
pub use sockmsg::SocketMsg;

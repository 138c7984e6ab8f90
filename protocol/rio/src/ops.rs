//! Op-codes and status codes.

use std::fmt;

/// RIO operation codes.
///
/// `Read`, `Write`, `Close`, and the three pseudo-ops past them never
/// produce a `Status` reply; everything else does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum Op {
    Status = 0,
    Close = 1,
    Open = 2,
    Read = 3,
    Write = 4,
    Connect = 5,
    Bind = 6,
    Listen = 7,
    Ioctl = 8,
    GetAddrInfo = 9,
    GetSockName = 10,
    GetPeerName = 11,
    GetSockOpt = 12,
    SetSockOpt = 13,
    /// Internal: the client half-closed its data endpoint.
    HalfClose = 14,
    /// Internal: listening socket readable (incoming connection).
    SigConnR = 15,
    /// Internal: connecting socket writable (connect completed).
    SigConnW = 16,
}

impl Op {
    pub fn from_u32(raw: u32) -> Option<Op> {
        Some(match raw {
            0 => Op::Status,
            1 => Op::Close,
            2 => Op::Open,
            3 => Op::Read,
            4 => Op::Write,
            5 => Op::Connect,
            6 => Op::Bind,
            7 => Op::Listen,
            8 => Op::Ioctl,
            9 => Op::GetAddrInfo,
            10 => Op::GetSockName,
            11 => Op::GetPeerName,
            12 => Op::GetSockOpt,
            13 => Op::SetSockOpt,
            14 => Op::HalfClose,
            15 => Op::SigConnR,
            16 => Op::SigConnW,
            _ => return None,
        })
    }

    /// Whether completing this op sends a `Status` reply on the
    /// control channel.
    pub fn has_reply(self) -> bool {
        !matches!(
            self,
            Op::Read | Op::Write | Op::Close | Op::HalfClose | Op::SigConnR | Op::SigConnW
        )
    }

    pub fn name(self) -> &'static str {
        match self {
            Op::Status => "status",
            Op::Close => "close",
            Op::Open => "open",
            Op::Read => "read",
            Op::Write => "write",
            Op::Connect => "connect",
            Op::Bind => "bind",
            Op::Listen => "listen",
            Op::Ioctl => "ioctl",
            Op::GetAddrInfo => "getaddrinfo",
            Op::GetSockName => "getsockname",
            Op::GetPeerName => "getpeername",
            Op::GetSockOpt => "getsockopt",
            Op::SetSockOpt => "setsockopt",
            Op::HalfClose => "halfclose",
            Op::SigConnR => "sigconn_r",
            Op::SigConnW => "sigconn_w",
        }
    }
}

/// Wire status codes. Zero is success; everything else is negative.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(i32)]
pub enum Status {
    Ok = 0,
    Internal = -1,
    NotSupported = -2,
    NoResources = -3,
    NoMemory = -4,
    InvalidArgs = -10,
    BadHandle = -11,
    BadState = -12,
    TimedOut = -13,
    ShouldWait = -14,
    PeerClosed = -15,
    AccessDenied = -16,
    Io = -17,
}

impl Status {
    pub fn from_raw(raw: i32) -> Status {
        match raw {
            0 => Status::Ok,
            -2 => Status::NotSupported,
            -3 => Status::NoResources,
            -4 => Status::NoMemory,
            -10 => Status::InvalidArgs,
            -11 => Status::BadHandle,
            -12 => Status::BadState,
            -13 => Status::TimedOut,
            -14 => Status::ShouldWait,
            -15 => Status::PeerClosed,
            -16 => Status::AccessDenied,
            -17 => Status::Io,
            _ => Status::Internal,
        }
    }

    pub fn into_raw(self) -> i32 {
        self as i32
    }

    pub fn is_ok(self) -> bool {
        self == Status::Ok
    }
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Status::Ok => "ok",
            Status::Internal => "internal error",
            Status::NotSupported => "not supported",
            Status::NoResources => "no resources",
            Status::NoMemory => "no memory",
            Status::InvalidArgs => "invalid arguments",
            Status::BadHandle => "bad handle",
            Status::BadState => "bad state",
            Status::TimedOut => "timed out",
            Status::ShouldWait => "should wait",
            Status::PeerClosed => "peer closed",
            Status::AccessDenied => "access denied",
            Status::Io => "I/O error",
        };
        write!(f, "{name}")
    }
}

//! sockaddr and sockopt payload layouts.

use crate::ops::Status;
use crate::wire::{get_i32, get_slice, get_u32, put_i32, put_padded, put_u32};

/// Fixed sockaddr slot size.
pub const SOCKADDR_MAX: usize = 128;

/// Fixed option-value slot size.
pub const OPTVAL_MAX: usize = 128;

/// getsockname / getpeername reply: `{len, addr[128]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SockAddrReply {
    pub addr: Vec<u8>,
}

impl SockAddrReply {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        if self.addr.len() > SOCKADDR_MAX {
            return Err(Status::InvalidArgs);
        }
        let mut out = Vec::with_capacity(4 + SOCKADDR_MAX);
        put_u32(&mut out, self.addr.len() as u32);
        put_padded(&mut out, &self.addr, SOCKADDR_MAX)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<SockAddrReply, Status> {
        let len = get_u32(bytes, 0)? as usize;
        if len > SOCKADDR_MAX {
            return Err(Status::InvalidArgs);
        }
        Ok(SockAddrReply {
            addr: get_slice(bytes, 4, len)?.to_vec(),
        })
    }
}

/// getsockopt / setsockopt request and reply:
/// `{level, optname, optlen, optval[128]}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SockOptReq {
    pub level: i32,
    pub optname: i32,
    pub optval: Vec<u8>,
}

impl SockOptReq {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        if self.optval.len() > OPTVAL_MAX {
            return Err(Status::InvalidArgs);
        }
        let mut out = Vec::with_capacity(12 + OPTVAL_MAX);
        put_i32(&mut out, self.level);
        put_i32(&mut out, self.optname);
        put_u32(&mut out, self.optval.len() as u32);
        put_padded(&mut out, &self.optval, OPTVAL_MAX)?;
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<SockOptReq, Status> {
        let optlen = get_u32(bytes, 8)? as usize;
        if optlen > OPTVAL_MAX {
            return Err(Status::InvalidArgs);
        }
        Ok(SockOptReq {
            level: get_i32(bytes, 0)?,
            optname: get_i32(bytes, 4)?,
            optval: get_slice(bytes, 12, optlen)?.to_vec(),
        })
    }
}

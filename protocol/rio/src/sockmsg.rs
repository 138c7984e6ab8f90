//! The datagram message envelope: `{addr, addrlen, flags, payload}`.

use crate::ops::Status;
use crate::wire::{get_slice, get_u32, put_padded, put_u32};

/// Fixed sockaddr slot size in the envelope.
pub const ADDR_MAX: usize = 128;

/// Envelope header size (`addr` slot + `addrlen` + `flags`).
pub const HEADER_SIZE: usize = ADDR_MAX + 8;

/// One datagram as carried over the data channel. An empty `addr`
/// means "no address": sends go to the connected peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SocketMsg {
    pub addr: Vec<u8>,
    pub flags: u32,
    pub payload: Vec<u8>,
}

impl SocketMsg {
    pub fn new(addr: Vec<u8>, payload: Vec<u8>) -> SocketMsg {
        SocketMsg {
            addr,
            flags: 0,
            payload,
        }
    }

    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        if self.addr.len() > ADDR_MAX {
            return Err(Status::InvalidArgs);
        }
        let mut out = Vec::with_capacity(HEADER_SIZE + self.payload.len());
        put_padded(&mut out, &self.addr, ADDR_MAX)?;
        put_u32(&mut out, self.addr.len() as u32);
        put_u32(&mut out, self.flags);
        out.extend_from_slice(&self.payload);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<SocketMsg, Status> {
        if bytes.len() < HEADER_SIZE {
            return Err(Status::InvalidArgs);
        }
        let addrlen = get_u32(bytes, ADDR_MAX)? as usize;
        if addrlen > ADDR_MAX {
            return Err(Status::InvalidArgs);
        }
        let flags = get_u32(bytes, ADDR_MAX + 4)?;
        Ok(SocketMsg {
            addr: get_slice(bytes, 0, addrlen)?.to_vec(),
            flags,
            payload: bytes[HEADER_SIZE..].to_vec(),
        })
    }
}

//! getaddrinfo request/reply payloads.

use crate::ops::Status;
use crate::wire::{get_i32, get_slice, get_u32, put_i32, put_padded, put_u32};

/// Marker stored in an entry's `ai_addr` slot when the embedded
/// address is valid; the receiver rewrites the pointer to its own
/// storage when it sees this value.
pub const GAI_ADDR_SENTINEL: u32 = 0xDEAD_BEEF;

/// Fixed string field widths.
pub const NODE_MAX: usize = 256;
pub const SERVICE_MAX: usize = 256;

/// Fixed sockaddr slot per reply entry.
pub const ADDR_MAX: usize = 128;

const REQUEST_SIZE: usize = 4 + NODE_MAX + SERVICE_MAX + 16;
const ENTRY_SIZE: usize = 16 + 4 + 4 + ADDR_MAX;

/// The `hints` block of a lookup request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct AddrInfoHints {
    pub flags: i32,
    pub family: i32,
    pub socktype: i32,
    pub protocol: i32,
}

/// A name-resolution request.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GaiRequest {
    pub node: Option<String>,
    pub service: Option<String>,
    pub hints: Option<AddrInfoHints>,
}

impl GaiRequest {
    /// Layout: three is-null bytes + pad, then the fixed-width node
    /// and service strings, then the hints block.
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        let node = self.node.as_deref().unwrap_or("");
        let service = self.service.as_deref().unwrap_or("");
        if node.len() >= NODE_MAX || service.len() >= SERVICE_MAX {
            return Err(Status::InvalidArgs);
        }
        let mut out = Vec::with_capacity(REQUEST_SIZE);
        out.push(self.node.is_none() as u8);
        out.push(self.service.is_none() as u8);
        out.push(self.hints.is_none() as u8);
        out.push(0);
        put_padded(&mut out, node.as_bytes(), NODE_MAX)?;
        put_padded(&mut out, service.as_bytes(), SERVICE_MAX)?;
        let hints = self.hints.unwrap_or_default();
        put_i32(&mut out, hints.flags);
        put_i32(&mut out, hints.family);
        put_i32(&mut out, hints.socktype);
        put_i32(&mut out, hints.protocol);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<GaiRequest, Status> {
        if bytes.len() < REQUEST_SIZE {
            return Err(Status::InvalidArgs);
        }
        let node_is_null = bytes[0] != 0;
        let service_is_null = bytes[1] != 0;
        let hints_is_null = bytes[2] != 0;
        let node = crate::wire::get_name(bytes, 4, NODE_MAX)?;
        let service = crate::wire::get_name(bytes, 4 + NODE_MAX, SERVICE_MAX)?;
        let hints_off = 4 + NODE_MAX + SERVICE_MAX;
        let hints = AddrInfoHints {
            flags: get_i32(bytes, hints_off)?,
            family: get_i32(bytes, hints_off + 4)?,
            socktype: get_i32(bytes, hints_off + 8)?,
            protocol: get_i32(bytes, hints_off + 12)?,
        };
        Ok(GaiRequest {
            node: (!node_is_null).then_some(node),
            service: (!service_is_null).then_some(service),
            hints: (!hints_is_null).then_some(hints),
        })
    }
}

/// One resolved address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaiEntry {
    pub flags: i32,
    pub family: i32,
    pub socktype: i32,
    pub protocol: i32,
    /// Raw sockaddr bytes; may be empty.
    pub addr: Vec<u8>,
}

/// The lookup reply. At most one entry is ever emitted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GaiReply {
    pub retval: i32,
    pub entries: Vec<GaiEntry>,
}

impl GaiReply {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        let mut out = Vec::with_capacity(8 + self.entries.len() * ENTRY_SIZE);
        put_i32(&mut out, self.retval);
        put_u32(&mut out, self.entries.len() as u32);
        for entry in &self.entries {
            if entry.addr.len() > ADDR_MAX {
                return Err(Status::InvalidArgs);
            }
            put_i32(&mut out, entry.flags);
            put_i32(&mut out, entry.family);
            put_i32(&mut out, entry.socktype);
            put_i32(&mut out, entry.protocol);
            put_u32(&mut out, entry.addr.len() as u32);
            put_u32(
                &mut out,
                if entry.addr.is_empty() {
                    0
                } else {
                    GAI_ADDR_SENTINEL
                },
            );
            put_padded(&mut out, &entry.addr, ADDR_MAX)?;
        }
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<GaiReply, Status> {
        let retval = get_i32(bytes, 0)?;
        let nres = get_u32(bytes, 4)? as usize;
        let mut entries = Vec::with_capacity(nres);
        let mut off = 8;
        for _ in 0..nres {
            let addrlen = get_u32(bytes, off + 16)? as usize;
            let tag = get_u32(bytes, off + 20)?;
            if addrlen > ADDR_MAX || (addrlen > 0 && tag != GAI_ADDR_SENTINEL) {
                return Err(Status::InvalidArgs);
            }
            entries.push(GaiEntry {
                flags: get_i32(bytes, off)?,
                family: get_i32(bytes, off + 4)?,
                socktype: get_i32(bytes, off + 8)?,
                protocol: get_i32(bytes, off + 12)?,
                addr: get_slice(bytes, off + 24, addrlen)?.to_vec(),
            });
            off += ENTRY_SIZE;
        }
        Ok(GaiReply { retval, entries })
    }
}

//! Network-configuration ioctl ops and their fixed binary layouts.

use crate::ops::Status;
use crate::wire::{get_name, get_slice, get_u32, put_padded, put_u32};

/// Fixed interface-name field width (including the NUL).
pub const IFNAME_SIZE: usize = 16;

/// Maximum interfaces reported by `GET_IF_INFO`.
pub const IF_INFO_MAX: usize = 16;

/// Fixed sockaddr slot in the interface records.
pub const SOCKADDR_SIZE: usize = 16;

/// Maximum hardware-address bytes per interface.
pub const HWADDR_MAX: usize = 8;

pub const IOCTL_GET_IF_INFO: u32 = 1;
pub const IOCTL_SET_IF_ADDR: u32 = 2;
pub const IOCTL_GET_IF_GATEWAY: u32 = 3;
pub const IOCTL_SET_IF_GATEWAY: u32 = 4;
pub const IOCTL_GET_DHCP_STATUS: u32 = 5;
pub const IOCTL_SET_DHCP_STATUS: u32 = 6;
pub const IOCTL_GET_DNS_SERVER: u32 = 7;
pub const IOCTL_SET_DNS_SERVER: u32 = 8;

const IF_INFO_ENTRY_SIZE: usize = IFNAME_SIZE + 3 * SOCKADDR_SIZE + 12 + HWADDR_MAX;

/// One interface record.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct IfInfo {
    pub name: String,
    pub addr: [u8; SOCKADDR_SIZE],
    pub netmask: [u8; SOCKADDR_SIZE],
    pub broadaddr: [u8; SOCKADDR_SIZE],
    pub flags: u32,
    pub index: u32,
    pub hwaddr: Vec<u8>,
}

/// The `GET_IF_INFO` reply: a count plus a fixed-size record array.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct GetIfInfoReply {
    pub interfaces: Vec<IfInfo>,
}

impl GetIfInfoReply {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        if self.interfaces.len() > IF_INFO_MAX {
            return Err(Status::InvalidArgs);
        }
        let mut out = Vec::with_capacity(4 + IF_INFO_MAX * IF_INFO_ENTRY_SIZE);
        put_u32(&mut out, self.interfaces.len() as u32);
        for info in &self.interfaces {
            if info.hwaddr.len() > HWADDR_MAX {
                return Err(Status::InvalidArgs);
            }
            put_padded(&mut out, info.name.as_bytes(), IFNAME_SIZE)?;
            out.extend_from_slice(&info.addr);
            out.extend_from_slice(&info.netmask);
            out.extend_from_slice(&info.broadaddr);
            put_u32(&mut out, info.flags);
            put_u32(&mut out, info.index);
            put_u32(&mut out, info.hwaddr.len() as u32);
            put_padded(&mut out, &info.hwaddr, HWADDR_MAX)?;
        }
        // The record array is fixed-size on the wire.
        out.resize(4 + IF_INFO_MAX * IF_INFO_ENTRY_SIZE, 0);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<GetIfInfoReply, Status> {
        let count = get_u32(bytes, 0)? as usize;
        if count > IF_INFO_MAX {
            return Err(Status::InvalidArgs);
        }
        let mut interfaces = Vec::with_capacity(count);
        for i in 0..count {
            let off = 4 + i * IF_INFO_ENTRY_SIZE;
            let hwaddr_len =
                get_u32(bytes, off + IFNAME_SIZE + 3 * SOCKADDR_SIZE + 8)? as usize;
            if hwaddr_len > HWADDR_MAX {
                return Err(Status::InvalidArgs);
            }
            let mut info = IfInfo {
                name: get_name(bytes, off, IFNAME_SIZE)?,
                flags: get_u32(bytes, off + IFNAME_SIZE + 3 * SOCKADDR_SIZE)?,
                index: get_u32(bytes, off + IFNAME_SIZE + 3 * SOCKADDR_SIZE + 4)?,
                hwaddr: get_slice(bytes, off + IFNAME_SIZE + 3 * SOCKADDR_SIZE + 12, hwaddr_len)?
                    .to_vec(),
                ..Default::default()
            };
            info.addr
                .copy_from_slice(get_slice(bytes, off + IFNAME_SIZE, SOCKADDR_SIZE)?);
            info.netmask.copy_from_slice(get_slice(
                bytes,
                off + IFNAME_SIZE + SOCKADDR_SIZE,
                SOCKADDR_SIZE,
            )?);
            info.broadaddr.copy_from_slice(get_slice(
                bytes,
                off + IFNAME_SIZE + 2 * SOCKADDR_SIZE,
                SOCKADDR_SIZE,
            )?);
            interfaces.push(info);
        }
        Ok(GetIfInfoReply { interfaces })
    }
}

/// `SET_IF_ADDR` request: `{name, addr, netmask}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetIfAddr {
    pub name: String,
    pub addr: [u8; SOCKADDR_SIZE],
    pub netmask: [u8; SOCKADDR_SIZE],
}

impl SetIfAddr {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        let mut out = Vec::with_capacity(IFNAME_SIZE + 2 * SOCKADDR_SIZE);
        put_padded(&mut out, self.name.as_bytes(), IFNAME_SIZE)?;
        out.extend_from_slice(&self.addr);
        out.extend_from_slice(&self.netmask);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<SetIfAddr, Status> {
        let mut addr = [0u8; SOCKADDR_SIZE];
        let mut netmask = [0u8; SOCKADDR_SIZE];
        addr.copy_from_slice(get_slice(bytes, IFNAME_SIZE, SOCKADDR_SIZE)?);
        netmask.copy_from_slice(get_slice(bytes, IFNAME_SIZE + SOCKADDR_SIZE, SOCKADDR_SIZE)?);
        Ok(SetIfAddr {
            name: get_name(bytes, 0, IFNAME_SIZE)?,
            addr,
            netmask,
        })
    }
}

/// `SET_IF_GATEWAY` request: `{name, gateway}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetIfGateway {
    pub name: String,
    pub gateway: [u8; SOCKADDR_SIZE],
}

impl SetIfGateway {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        let mut out = Vec::with_capacity(IFNAME_SIZE + SOCKADDR_SIZE);
        put_padded(&mut out, self.name.as_bytes(), IFNAME_SIZE)?;
        out.extend_from_slice(&self.gateway);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<SetIfGateway, Status> {
        let mut gateway = [0u8; SOCKADDR_SIZE];
        gateway.copy_from_slice(get_slice(bytes, IFNAME_SIZE, SOCKADDR_SIZE)?);
        Ok(SetIfGateway {
            name: get_name(bytes, 0, IFNAME_SIZE)?,
            gateway,
        })
    }
}

/// `SET_DHCP_STATUS` request: `{name, status}`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetDhcpStatus {
    pub name: String,
    pub enabled: bool,
}

impl SetDhcpStatus {
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        let mut out = Vec::with_capacity(IFNAME_SIZE + 4);
        put_padded(&mut out, self.name.as_bytes(), IFNAME_SIZE)?;
        put_u32(&mut out, self.enabled as u32);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<SetDhcpStatus, Status> {
        Ok(SetDhcpStatus {
            name: get_name(bytes, 0, IFNAME_SIZE)?,
            enabled: get_u32(bytes, IFNAME_SIZE)? != 0,
        })
    }
}

/// Encode a bare interface name (the GET_* request payloads).
pub fn encode_ifname(name: &str) -> Result<Vec<u8>, Status> {
    let mut out = Vec::with_capacity(IFNAME_SIZE);
    put_padded(&mut out, name.as_bytes(), IFNAME_SIZE)?;
    Ok(out)
}

/// Decode a bare interface name.
pub fn decode_ifname(bytes: &[u8]) -> Result<String, Status> {
    get_name(bytes, 0, IFNAME_SIZE)
}

//! Little-endian field helpers for the fixed-layout structs.

use crate::ops::Status;

pub(crate) fn put_u32(out: &mut Vec<u8>, v: u32) {
    out.extend_from_slice(&v.to_le_bytes());
}

pub(crate) fn put_i32(out: &mut Vec<u8>, v: i32) {
    out.extend_from_slice(&v.to_le_bytes());
}

/// Append `bytes` zero-padded to exactly `len`.
pub(crate) fn put_padded(out: &mut Vec<u8>, bytes: &[u8], len: usize) -> Result<(), Status> {
    if bytes.len() > len {
        return Err(Status::InvalidArgs);
    }
    out.extend_from_slice(bytes);
    out.resize(out.len() + (len - bytes.len()), 0);
    Ok(())
}

pub(crate) fn get_u32(buf: &[u8], off: usize) -> Result<u32, Status> {
    let end = off.checked_add(4).ok_or(Status::InvalidArgs)?;
    let bytes = buf.get(off..end).ok_or(Status::InvalidArgs)?;
    Ok(u32::from_le_bytes(bytes.try_into().unwrap()))
}

pub(crate) fn get_i32(buf: &[u8], off: usize) -> Result<i32, Status> {
    Ok(get_u32(buf, off)? as i32)
}

pub(crate) fn get_slice<'a>(buf: &'a [u8], off: usize, len: usize) -> Result<&'a [u8], Status> {
    let end = off.checked_add(len).ok_or(Status::InvalidArgs)?;
    buf.get(off..end).ok_or(Status::InvalidArgs)
}

/// Read a NUL-padded fixed-width string field.
pub(crate) fn get_name(buf: &[u8], off: usize, len: usize) -> Result<String, Status> {
    let raw = get_slice(buf, off, len)?;
    let end = raw.iter().position(|&b| b == 0).unwrap_or(len);
    std::str::from_utf8(&raw[..end])
        .map(str::to_owned)
        .map_err(|_| Status::InvalidArgs)
}

//! Message framing: fixed header plus a bounded payload.

use crate::ops::{Op, Status};
use crate::wire::{get_u32, put_i32, put_u32};

/// Maximum payload bytes per message.
pub const CHUNK_SIZE: usize = 8192;

/// Maximum handles transferable alongside a message.
pub const MAX_HANDLES: usize = 2;

/// Encoded header size in bytes.
pub const HDR_SIZE: usize = 20;

/// Protocol tag carried in OPEN object replies.
pub const PROTOCOL_SOCKET: u32 = 3;

/// One RIO message: `op`, two argument words, and a payload.
///
/// `arg` carries the status on replies and op-specific values on
/// requests (e.g. the ioctl sub-op travels in `arg2`).
#[derive(Debug, Clone)]
pub struct Message {
    pub op: Op,
    pub arg: i32,
    pub arg2: u32,
    pub data: Vec<u8>,
}

impl Message {
    pub fn new(op: Op) -> Message {
        Message {
            op,
            arg: 0,
            arg2: 0,
            data: Vec::new(),
        }
    }

    pub fn with_data(op: Op, data: Vec<u8>) -> Message {
        Message {
            op,
            arg: 0,
            arg2: 0,
            data,
        }
    }

    /// Turn a request into its `Status` reply, keeping whatever the
    /// handler wrote into the payload area.
    pub fn into_status(mut self, status: Status) -> Message {
        self.op = Op::Status;
        self.arg = status.into_raw();
        self
    }

    /// Header layout: `op:u32 | arg:i32 | arg2:u32 | reserved:u32 |
    /// datalen:u32`, little-endian, followed by the payload.
    pub fn encode(&self) -> Result<Vec<u8>, Status> {
        if self.data.len() > CHUNK_SIZE {
            return Err(Status::InvalidArgs);
        }
        let mut out = Vec::with_capacity(HDR_SIZE + self.data.len());
        put_u32(&mut out, self.op as u32);
        put_i32(&mut out, self.arg);
        put_u32(&mut out, self.arg2);
        put_u32(&mut out, 0);
        put_u32(&mut out, self.data.len() as u32);
        out.extend_from_slice(&self.data);
        Ok(out)
    }

    pub fn decode(bytes: &[u8]) -> Result<Message, Status> {
        if bytes.len() < HDR_SIZE {
            return Err(Status::InvalidArgs);
        }
        let op = Op::from_u32(get_u32(bytes, 0)?).ok_or(Status::InvalidArgs)?;
        let arg = get_u32(bytes, 4)? as i32;
        let arg2 = get_u32(bytes, 8)?;
        let datalen = get_u32(bytes, 16)? as usize;
        if datalen > CHUNK_SIZE || bytes.len() - HDR_SIZE != datalen {
            return Err(Status::InvalidArgs);
        }
        Ok(Message {
            op,
            arg,
            arg2,
            data: bytes[HDR_SIZE..].to_vec(),
        })
    }
}

/// The OPEN reply envelope: `{status, protocol}` followed by up to two
/// handles on the carrying channel message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ObjectReply {
    pub status: Status,
    pub protocol: u32,
}

impl ObjectReply {
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(8);
        put_i32(&mut out, self.status.into_raw());
        put_u32(&mut out, self.protocol);
        out
    }

    pub fn decode(bytes: &[u8]) -> Result<ObjectReply, Status> {
        if bytes.len() < 8 {
            return Err(Status::InvalidArgs);
        }
        Ok(ObjectReply {
            status: Status::from_raw(get_u32(bytes, 0)? as i32),
            protocol: get_u32(bytes, 4)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn encode_decode_roundtrip() {
        let mut msg = Message::with_data(Op::Connect, b"addr-bytes".to_vec());
        msg.arg = 7;
        msg.arg2 = 42;
        let decoded = Message::decode(&msg.encode().unwrap()).unwrap();
        assert_eq!(decoded.op, Op::Connect);
        assert_eq!(decoded.arg, 7);
        assert_eq!(decoded.arg2, 42);
        assert_eq!(decoded.data, b"addr-bytes");
    }

    #[test]
    fn oversize_payload_rejected() {
        let msg = Message::with_data(Op::Write, vec![0u8; CHUNK_SIZE + 1]);
        assert_eq!(msg.encode().unwrap_err(), Status::InvalidArgs);
    }

    #[test]
    fn short_or_inconsistent_frames_rejected() {
        assert_eq!(
            Message::decode(&[0u8; HDR_SIZE - 1]).unwrap_err(),
            Status::InvalidArgs
        );
        // datalen disagrees with the frame length
        let mut bytes = Message::new(Op::Close).encode().unwrap();
        bytes.push(0);
        assert_eq!(Message::decode(&bytes).unwrap_err(), Status::InvalidArgs);
    }

    #[test]
    fn unknown_op_rejected() {
        let mut bytes = Message::new(Op::Close).encode().unwrap();
        bytes[0..4].copy_from_slice(&99u32.to_le_bytes());
        assert_eq!(Message::decode(&bytes).unwrap_err(), Status::InvalidArgs);
    }

    #[test]
    fn status_reply_keeps_payload() {
        let msg = Message::with_data(Op::GetSockName, b"reply".to_vec());
        let reply = msg.into_status(Status::ShouldWait);
        assert_eq!(reply.op, Op::Status);
        assert_eq!(reply.arg, Status::ShouldWait.into_raw());
        assert_eq!(reply.data, b"reply");
    }

    #[test]
    fn object_reply_roundtrip() {
        let reply = ObjectReply {
            status: Status::Ok,
            protocol: PROTOCOL_SOCKET,
        };
        assert_eq!(ObjectReply::decode(&reply.encode()).unwrap(), reply);
    }
}

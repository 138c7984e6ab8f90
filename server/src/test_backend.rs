//! A do-nothing backend for unit tests.

use crate::backend::{GaiOutcome, NetBackend, RawSocket};
use protocol_rio::gai::AddrInfoHints;
use protocol_rio::netconfig::IfInfo;

/// Every data-path operation would block, every query returns empty,
/// and socket creation is unsupported. Unit tests that never reach the
/// backend use this.
pub(crate) struct InertBackend;

impl NetBackend for InertBackend {
    fn socket(&self, _: i32, _: i32, _: i32) -> Result<RawSocket, i32> {
        Err(libc::EOPNOTSUPP)
    }
    fn close(&self, _: RawSocket) -> Result<(), i32> {
        Ok(())
    }
    fn set_nonblocking(&self, _: RawSocket) -> Result<(), i32> {
        Ok(())
    }
    fn connect(&self, _: RawSocket, _: &[u8]) -> Result<(), i32> {
        Ok(())
    }
    fn bind(&self, _: RawSocket, _: &[u8]) -> Result<(), i32> {
        Ok(())
    }
    fn listen(&self, _: RawSocket, _: i32) -> Result<(), i32> {
        Ok(())
    }
    fn accept(&self, _: RawSocket) -> Result<RawSocket, i32> {
        Err(libc::EWOULDBLOCK)
    }
    fn read(&self, _: RawSocket, _: &mut [u8]) -> Result<usize, i32> {
        Err(libc::EWOULDBLOCK)
    }
    fn write(&self, _: RawSocket, _: &[u8]) -> Result<usize, i32> {
        Err(libc::EWOULDBLOCK)
    }
    fn recvfrom(&self, _: RawSocket, _: &mut [u8]) -> Result<(usize, Vec<u8>), i32> {
        Err(libc::EWOULDBLOCK)
    }
    fn sendto(&self, _: RawSocket, _: &[u8], _: Option<&[u8]>) -> Result<usize, i32> {
        Err(libc::EWOULDBLOCK)
    }
    fn shutdown_write(&self, _: RawSocket) -> Result<(), i32> {
        Ok(())
    }
    fn getsockname(&self, _: RawSocket) -> Result<Vec<u8>, i32> {
        Ok(Vec::new())
    }
    fn getpeername(&self, _: RawSocket) -> Result<Vec<u8>, i32> {
        Ok(Vec::new())
    }
    fn getsockopt(&self, _: RawSocket, _: i32, _: i32) -> Result<Vec<u8>, i32> {
        Ok(Vec::new())
    }
    fn setsockopt(&self, _: RawSocket, _: i32, _: i32, _: &[u8]) -> Result<(), i32> {
        Ok(())
    }
    fn getaddrinfo(
        &self,
        _: Option<&str>,
        _: Option<&str>,
        _: Option<&AddrInfoHints>,
    ) -> Result<GaiOutcome, i32> {
        Err(libc::EOPNOTSUPP)
    }
    fn if_info(&self, _: u32) -> Result<Option<IfInfo>, i32> {
        Ok(None)
    }
    fn set_if_addr_v4(&self, _: &str, _: &[u8], _: &[u8]) -> Result<(), i32> {
        Ok(())
    }
    fn if_gateway_v4(&self, _: &str) -> Result<Vec<u8>, i32> {
        Ok(Vec::new())
    }
    fn set_if_gateway_v4(&self, _: &str, _: &[u8]) -> Result<(), i32> {
        Ok(())
    }
    fn dhcp_status_v4(&self, _: &str) -> Result<bool, i32> {
        Ok(false)
    }
    fn set_dhcp_status_v4(&self, _: &str, _: bool) -> Result<(), i32> {
        Ok(())
    }
    fn dns_server_v4(&self) -> Result<Vec<u8>, i32> {
        Ok(Vec::new())
    }
    fn set_dns_server_v4(&self, _: &[u8]) -> Result<(), i32> {
        Ok(())
    }
}

//! The network backend: an opaque BSD-socket-like interface.
//!
//! The proxy core never calls the host network stack directly; every
//! socket operation and every network-configuration query goes through
//! [`NetBackend`]. Addresses cross the boundary as raw sockaddr bytes
//! and errors as raw errno values, keeping the trait implementable over
//! any stack. [`OsBackend`] is the host-kernel implementation.

use std::ffi::CString;

use protocol_rio::gai::{AddrInfoHints, GaiEntry};
use protocol_rio::netconfig::{IfInfo, SOCKADDR_SIZE};
use protocol_rio::Status;

/// A raw socket descriptor as handed out by the backend.
pub type RawSocket = i32;

/// Map a backend errno to a wire status.
pub fn errno_to_status(errno: i32) -> Status {
    match errno {
        libc::EACCES => Status::AccessDenied,
        libc::EBADF => Status::BadHandle,
        libc::EINPROGRESS | libc::EWOULDBLOCK => Status::ShouldWait,
        libc::EINVAL => Status::InvalidArgs,
        libc::EIO => Status::Io,
        libc::ENOBUFS => Status::NoResources,
        libc::ENOMEM => Status::NoMemory,
        _ => Status::Io,
    }
}

/// Whether an errno means "retry after readiness".
pub fn is_would_block(errno: i32) -> bool {
    errno == libc::EWOULDBLOCK || errno == libc::EAGAIN
}

/// Outcome of a name lookup: `retval` is the getaddrinfo return code
/// (zero on success), entries are the resolved addresses.
#[derive(Debug, Default)]
pub struct GaiOutcome {
    pub retval: i32,
    pub entries: Vec<GaiEntry>,
}

/// The socket operations the proxy needs, plus the v4 management
/// surface behind the netconfig ioctls. Errors are raw errno values.
pub trait NetBackend: Send + Sync {
    fn socket(&self, domain: i32, ty: i32, protocol: i32) -> Result<RawSocket, i32>;
    fn close(&self, fd: RawSocket) -> Result<(), i32>;
    fn set_nonblocking(&self, fd: RawSocket) -> Result<(), i32>;
    fn connect(&self, fd: RawSocket, addr: &[u8]) -> Result<(), i32>;
    fn bind(&self, fd: RawSocket, addr: &[u8]) -> Result<(), i32>;
    fn listen(&self, fd: RawSocket, backlog: i32) -> Result<(), i32>;
    fn accept(&self, fd: RawSocket) -> Result<RawSocket, i32>;
    fn read(&self, fd: RawSocket, buf: &mut [u8]) -> Result<usize, i32>;
    fn write(&self, fd: RawSocket, buf: &[u8]) -> Result<usize, i32>;
    /// Returns the byte count and the datagram's source address.
    fn recvfrom(&self, fd: RawSocket, buf: &mut [u8]) -> Result<(usize, Vec<u8>), i32>;
    fn sendto(&self, fd: RawSocket, buf: &[u8], addr: Option<&[u8]>) -> Result<usize, i32>;
    fn shutdown_write(&self, fd: RawSocket) -> Result<(), i32>;
    fn getsockname(&self, fd: RawSocket) -> Result<Vec<u8>, i32>;
    fn getpeername(&self, fd: RawSocket) -> Result<Vec<u8>, i32>;
    fn getsockopt(&self, fd: RawSocket, level: i32, optname: i32) -> Result<Vec<u8>, i32>;
    fn setsockopt(
        &self,
        fd: RawSocket,
        level: i32,
        optname: i32,
        optval: &[u8],
    ) -> Result<(), i32>;
    fn getaddrinfo(
        &self,
        node: Option<&str>,
        service: Option<&str>,
        hints: Option<&AddrInfoHints>,
    ) -> Result<GaiOutcome, i32>;

    /// Interface record at `index`, or `None` past the last interface.
    fn if_info(&self, index: u32) -> Result<Option<IfInfo>, i32>;
    fn set_if_addr_v4(&self, name: &str, addr: &[u8], netmask: &[u8]) -> Result<(), i32>;
    fn if_gateway_v4(&self, name: &str) -> Result<Vec<u8>, i32>;
    fn set_if_gateway_v4(&self, name: &str, gateway: &[u8]) -> Result<(), i32>;
    fn dhcp_status_v4(&self, name: &str) -> Result<bool, i32>;
    fn set_dhcp_status_v4(&self, name: &str, enabled: bool) -> Result<(), i32>;
    fn dns_server_v4(&self) -> Result<Vec<u8>, i32>;
    fn set_dns_server_v4(&self, addr: &[u8]) -> Result<(), i32>;
}

/// Host-kernel backend over libc.
///
/// The v4 management setters need privileges an ordinary process does
/// not have, so they report `EOPNOTSUPP`; interface enumeration works
/// everywhere via `getifaddrs`.
pub struct OsBackend;

fn last_errno() -> i32 {
    std::io::Error::last_os_error().raw_os_error().unwrap_or(libc::EIO)
}

fn cvt(ret: libc::c_int) -> Result<libc::c_int, i32> {
    if ret < 0 {
        Err(last_errno())
    } else {
        Ok(ret)
    }
}

fn cvt_len(ret: isize) -> Result<usize, i32> {
    if ret < 0 {
        Err(last_errno())
    } else {
        Ok(ret as usize)
    }
}

fn sockaddr_bytes(storage: &libc::sockaddr_storage, len: libc::socklen_t) -> Vec<u8> {
    let len = (len as usize).min(std::mem::size_of::<libc::sockaddr_storage>());
    let bytes =
        unsafe { std::slice::from_raw_parts(storage as *const _ as *const u8, len) };
    bytes.to_vec()
}

impl NetBackend for OsBackend {
    fn socket(&self, domain: i32, ty: i32, protocol: i32) -> Result<RawSocket, i32> {
        cvt(unsafe { libc::socket(domain, ty | libc::SOCK_CLOEXEC, protocol) })
    }

    fn close(&self, fd: RawSocket) -> Result<(), i32> {
        cvt(unsafe { libc::close(fd) }).map(|_| ())
    }

    fn set_nonblocking(&self, fd: RawSocket) -> Result<(), i32> {
        let mut nonblocking: libc::c_int = 1;
        cvt(unsafe { libc::ioctl(fd, libc::FIONBIO, &mut nonblocking) }).map(|_| ())
    }

    fn connect(&self, fd: RawSocket, addr: &[u8]) -> Result<(), i32> {
        cvt(unsafe {
            libc::connect(
                fd,
                addr.as_ptr() as *const libc::sockaddr,
                addr.len() as libc::socklen_t,
            )
        })
        .map(|_| ())
    }

    fn bind(&self, fd: RawSocket, addr: &[u8]) -> Result<(), i32> {
        cvt(unsafe {
            libc::bind(
                fd,
                addr.as_ptr() as *const libc::sockaddr,
                addr.len() as libc::socklen_t,
            )
        })
        .map(|_| ())
    }

    fn listen(&self, fd: RawSocket, backlog: i32) -> Result<(), i32> {
        cvt(unsafe { libc::listen(fd, backlog) }).map(|_| ())
    }

    fn accept(&self, fd: RawSocket) -> Result<RawSocket, i32> {
        cvt(unsafe { libc::accept(fd, std::ptr::null_mut(), std::ptr::null_mut()) })
    }

    fn read(&self, fd: RawSocket, buf: &mut [u8]) -> Result<usize, i32> {
        cvt_len(unsafe {
            libc::read(fd, buf.as_mut_ptr() as *mut libc::c_void, buf.len())
        })
    }

    fn write(&self, fd: RawSocket, buf: &[u8]) -> Result<usize, i32> {
        cvt_len(unsafe {
            libc::write(fd, buf.as_ptr() as *const libc::c_void, buf.len())
        })
    }

    fn recvfrom(&self, fd: RawSocket, buf: &mut [u8]) -> Result<(usize, Vec<u8>), i32> {
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let mut addrlen = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        let n = cvt_len(unsafe {
            libc::recvfrom(
                fd,
                buf.as_mut_ptr() as *mut libc::c_void,
                buf.len(),
                0,
                &mut storage as *mut _ as *mut libc::sockaddr,
                &mut addrlen,
            )
        })?;
        Ok((n, sockaddr_bytes(&storage, addrlen)))
    }

    fn sendto(&self, fd: RawSocket, buf: &[u8], addr: Option<&[u8]>) -> Result<usize, i32> {
        let (addr_ptr, addrlen) = match addr {
            Some(bytes) => (
                bytes.as_ptr() as *const libc::sockaddr,
                bytes.len() as libc::socklen_t,
            ),
            None => (std::ptr::null(), 0),
        };
        cvt_len(unsafe {
            libc::sendto(
                fd,
                buf.as_ptr() as *const libc::c_void,
                buf.len(),
                0,
                addr_ptr,
                addrlen,
            )
        })
    }

    fn shutdown_write(&self, fd: RawSocket) -> Result<(), i32> {
        cvt(unsafe { libc::shutdown(fd, libc::SHUT_WR) }).map(|_| ())
    }

    fn getsockname(&self, fd: RawSocket) -> Result<Vec<u8>, i32> {
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let mut addrlen = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        cvt(unsafe {
            libc::getsockname(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut addrlen)
        })?;
        Ok(sockaddr_bytes(&storage, addrlen))
    }

    fn getpeername(&self, fd: RawSocket) -> Result<Vec<u8>, i32> {
        let mut storage: libc::sockaddr_storage = unsafe { std::mem::zeroed() };
        let mut addrlen = std::mem::size_of::<libc::sockaddr_storage>() as libc::socklen_t;
        cvt(unsafe {
            libc::getpeername(fd, &mut storage as *mut _ as *mut libc::sockaddr, &mut addrlen)
        })?;
        Ok(sockaddr_bytes(&storage, addrlen))
    }

    fn getsockopt(&self, fd: RawSocket, level: i32, optname: i32) -> Result<Vec<u8>, i32> {
        let mut optval = [0u8; protocol_rio::sockio::OPTVAL_MAX];
        let mut optlen = optval.len() as libc::socklen_t;
        cvt(unsafe {
            libc::getsockopt(
                fd,
                level,
                optname,
                optval.as_mut_ptr() as *mut libc::c_void,
                &mut optlen,
            )
        })?;
        Ok(optval[..optlen as usize].to_vec())
    }

    fn setsockopt(
        &self,
        fd: RawSocket,
        level: i32,
        optname: i32,
        optval: &[u8],
    ) -> Result<(), i32> {
        cvt(unsafe {
            libc::setsockopt(
                fd,
                level,
                optname,
                optval.as_ptr() as *const libc::c_void,
                optval.len() as libc::socklen_t,
            )
        })
        .map(|_| ())
    }

    fn getaddrinfo(
        &self,
        node: Option<&str>,
        service: Option<&str>,
        hints: Option<&AddrInfoHints>,
    ) -> Result<GaiOutcome, i32> {
        let node_c = node.and_then(|s| CString::new(s).ok());
        let service_c = service.and_then(|s| CString::new(s).ok());

        let mut hints_raw: libc::addrinfo = unsafe { std::mem::zeroed() };
        let hints_ptr = match hints {
            Some(h) => {
                hints_raw.ai_flags = h.flags;
                hints_raw.ai_family = h.family;
                hints_raw.ai_socktype = h.socktype;
                hints_raw.ai_protocol = h.protocol;
                &hints_raw as *const libc::addrinfo
            }
            None => std::ptr::null(),
        };

        let mut res: *mut libc::addrinfo = std::ptr::null_mut();
        let ret = unsafe {
            libc::getaddrinfo(
                node_c.as_ref().map_or(std::ptr::null(), |c| c.as_ptr()),
                service_c.as_ref().map_or(std::ptr::null(), |c| c.as_ptr()),
                hints_ptr,
                &mut res,
            )
        };
        if ret != 0 {
            if ret == libc::EAI_SYSTEM {
                return Err(last_errno());
            }
            return Ok(GaiOutcome {
                retval: ret,
                entries: Vec::new(),
            });
        }

        let mut entries = Vec::new();
        let mut cursor = res;
        while !cursor.is_null() {
            let ai = unsafe { &*cursor };
            let addr = if ai.ai_addr.is_null() {
                Vec::new()
            } else {
                unsafe {
                    std::slice::from_raw_parts(
                        ai.ai_addr as *const u8,
                        ai.ai_addrlen as usize,
                    )
                }
                .to_vec()
            };
            entries.push(GaiEntry {
                flags: ai.ai_flags,
                family: ai.ai_family,
                socktype: ai.ai_socktype,
                protocol: ai.ai_protocol,
                addr,
            });
            cursor = ai.ai_next;
        }
        unsafe { libc::freeaddrinfo(res) };
        Ok(GaiOutcome {
            retval: 0,
            entries,
        })
    }

    fn if_info(&self, index: u32) -> Result<Option<IfInfo>, i32> {
        let mut ifaddrs: *mut libc::ifaddrs = std::ptr::null_mut();
        if unsafe { libc::getifaddrs(&mut ifaddrs) } < 0 {
            return Err(last_errno());
        }

        let mut found = None;
        let mut position = 0u32;
        let mut cursor = ifaddrs;
        while !cursor.is_null() {
            let ifa = unsafe { &*cursor };
            cursor = ifa.ifa_next;
            if ifa.ifa_addr.is_null()
                || unsafe { (*ifa.ifa_addr).sa_family } != libc::AF_INET as libc::sa_family_t
            {
                continue;
            }
            if position < index {
                position += 1;
                continue;
            }

            let name = unsafe { std::ffi::CStr::from_ptr(ifa.ifa_name) }
                .to_string_lossy()
                .into_owned();
            let mut info = IfInfo {
                name,
                flags: ifa.ifa_flags,
                index: unsafe { libc::if_nametoindex(ifa.ifa_name) },
                ..Default::default()
            };
            copy_sockaddr_in(ifa.ifa_addr, &mut info.addr);
            copy_sockaddr_in(ifa.ifa_netmask, &mut info.netmask);
            // On Linux the broadcast address shares the ifa_ifu slot.
            copy_sockaddr_in(ifa.ifa_ifu, &mut info.broadaddr);
            found = Some(info);
            break;
        }
        unsafe { libc::freeifaddrs(ifaddrs) };
        Ok(found)
    }

    fn set_if_addr_v4(&self, _name: &str, _addr: &[u8], _netmask: &[u8]) -> Result<(), i32> {
        Err(libc::EOPNOTSUPP)
    }

    fn if_gateway_v4(&self, _name: &str) -> Result<Vec<u8>, i32> {
        Err(libc::EOPNOTSUPP)
    }

    fn set_if_gateway_v4(&self, _name: &str, _gateway: &[u8]) -> Result<(), i32> {
        Err(libc::EOPNOTSUPP)
    }

    fn dhcp_status_v4(&self, _name: &str) -> Result<bool, i32> {
        Err(libc::EOPNOTSUPP)
    }

    fn set_dhcp_status_v4(&self, _name: &str, _enabled: bool) -> Result<(), i32> {
        Err(libc::EOPNOTSUPP)
    }

    fn dns_server_v4(&self) -> Result<Vec<u8>, i32> {
        Err(libc::EOPNOTSUPP)
    }

    fn set_dns_server_v4(&self, _addr: &[u8]) -> Result<(), i32> {
        Err(libc::EOPNOTSUPP)
    }
}

fn copy_sockaddr_in(addr: *const libc::sockaddr, out: &mut [u8; SOCKADDR_SIZE]) {
    if addr.is_null() {
        return;
    }
    let bytes = unsafe { std::slice::from_raw_parts(addr as *const u8, SOCKADDR_SIZE) };
    out.copy_from_slice(bytes);
}

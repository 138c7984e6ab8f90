//! Shared test support: a RIO client shim and a scriptable backend.

#![allow(dead_code)]

use std::collections::HashMap;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use io_ipc::{channel, Channel, ChannelMessage, Handle, Signals};
use protocol_rio::{Message, ObjectReply, Op, Status};
use server::backend::{GaiOutcome, NetBackend, RawSocket};

pub const TIMEOUT: Duration = Duration::from_secs(5);

/// Issue an OPEN on a control channel and collect the object reply.
pub fn open(ctrl: &Channel, path: &str) -> (Status, Option<Channel>, Option<Handle>) {
    let (reply_server, reply_client) = channel();
    let msg = Message::with_data(Op::Open, path.as_bytes().to_vec());
    let mut carried = ChannelMessage::data(msg.encode().expect("encode open"));
    carried.handles.push(Handle::Channel(reply_server));
    ctrl.write(carried).expect("send open");

    let observed = reply_client.wait_signals(
        Signals::READABLE | Signals::PEER_CLOSED,
        Some(TIMEOUT),
    );
    assert!(
        observed.contains(Signals::READABLE),
        "no open reply (observed {observed:?})"
    );
    let reply = reply_client.try_read().expect("read open reply");
    let obj = ObjectReply::decode(&reply.bytes).expect("decode open reply");
    let mut handles = reply.handles.into_iter();
    let rio = handles.next().and_then(Handle::into_channel);
    let data = handles.next();
    (obj.status, rio, data)
}

/// Issue an op that replies with STATUS and wait for the reply.
pub fn call(ctrl: &Channel, msg: Message) -> Message {
    ctrl.write(ChannelMessage::data(msg.encode().expect("encode request")))
        .expect("send request");
    let observed =
        ctrl.wait_signals(Signals::READABLE | Signals::PEER_CLOSED, Some(TIMEOUT));
    assert!(
        observed.contains(Signals::READABLE),
        "no reply (observed {observed:?})"
    );
    let reply = ctrl.try_read().expect("read reply");
    Message::decode(&reply.bytes).expect("decode reply")
}

/// Fire-and-forget op (CLOSE and friends produce no reply).
pub fn send(ctrl: &Channel, msg: Message) {
    ctrl.write(ChannelMessage::data(msg.encode().expect("encode request")))
        .expect("send request");
}

/// Encode an IPv4 `sockaddr_in`.
pub fn sockaddr_in(ip: [u8; 4], port: u16) -> Vec<u8> {
    let mut out = vec![0u8; 16];
    out[0..2].copy_from_slice(&(libc::AF_INET as u16).to_ne_bytes());
    out[2..4].copy_from_slice(&port.to_be_bytes());
    out[4..8].copy_from_slice(&ip);
    out
}

/// Decode the port out of a `sockaddr_in`.
pub fn port_of(addr: &[u8]) -> u16 {
    u16::from_be_bytes([addr[2], addr[3]])
}

/// Poll `predicate` until it holds or the timeout expires.
pub fn wait_until(what: &str, predicate: impl Fn() -> bool) {
    let deadline = Instant::now() + TIMEOUT;
    while Instant::now() < deadline {
        if predicate() {
            return;
        }
        std::thread::sleep(Duration::from_millis(5));
    }
    panic!("timed out waiting for {what}");
}

// --- scripted backend -----------------------------------------------------

/// One step of a scripted socket's read-side behavior.
pub enum ReadStep {
    /// Bytes the next reads will drain.
    Data(Vec<u8>),
    /// One would-block result (consumes the readiness trigger).
    WouldBlock,
    /// Orderly end of stream, reported forever after.
    Eof,
}

struct ScriptedSock {
    /// Real pipe read end; registered with the proxy's poller.
    fd: RawSocket,
    trigger: RawSocket,
    script: VecDeque<ReadStep>,
    cursor: usize,
}

impl ScriptedSock {
    fn drain_trigger(&self) {
        let mut byte = [0u8; 16];
        unsafe {
            while libc::read(self.fd, byte.as_mut_ptr() as *mut libc::c_void, byte.len()) > 0 {}
        }
    }
}

/// A [`NetBackend`] whose sockets are real non-blocking pipes (so the
/// proxy's poller sees genuine readiness) but whose data flow follows
/// a per-socket script.
pub struct ScriptedBackend {
    socks: Mutex<HashMap<RawSocket, ScriptedSock>>,
    pub written: Mutex<Vec<u8>>,
    pub sent_dgrams: Mutex<Vec<(Option<Vec<u8>>, Vec<u8>)>>,
    pub sendto_called: AtomicBool,
    pub interfaces: Mutex<Vec<protocol_rio::netconfig::IfInfo>>,
    pub gai_entries: Mutex<Vec<protocol_rio::gai::GaiEntry>>,
    pub connect_errno: Mutex<Option<i32>>,
    /// Hand out the pipe's write end as the socket fd, so the poller
    /// sees it writable immediately (connect-completion tests).
    pub use_writable_fds: AtomicBool,
}

impl ScriptedBackend {
    pub fn new() -> ScriptedBackend {
        ScriptedBackend {
            socks: Mutex::new(HashMap::new()),
            written: Mutex::new(Vec::new()),
            sent_dgrams: Mutex::new(Vec::new()),
            sendto_called: AtomicBool::new(false),
            interfaces: Mutex::new(Vec::new()),
            gai_entries: Mutex::new(Vec::new()),
            connect_errno: Mutex::new(None),
            use_writable_fds: AtomicBool::new(false),
        }
    }

    /// Queue read-side behavior for the socket with descriptor `fd`.
    pub fn script(&self, fd: RawSocket, steps: Vec<ReadStep>) {
        let mut socks = self.socks.lock().unwrap();
        let sock = socks.get_mut(&fd).expect("unknown scripted fd");
        sock.script.extend(steps);
    }

    /// Make `fd` readable to the poller.
    pub fn trigger(&self, fd: RawSocket) {
        let socks = self.socks.lock().unwrap();
        let sock = socks.get(&fd).expect("unknown scripted fd");
        let byte = 1u8;
        unsafe {
            libc::write(sock.trigger, &byte as *const u8 as *const libc::c_void, 1);
        }
    }

    /// The most recently created scripted fd.
    pub fn last_fd(&self) -> RawSocket {
        *self.socks.lock().unwrap().keys().max().expect("no sockets")
    }

    /// How many scripted read steps remain for `fd`.
    pub fn script_len(&self, fd: RawSocket) -> usize {
        self.socks
            .lock()
            .unwrap()
            .get(&fd)
            .map(|sock| sock.script.len())
            .unwrap_or(0)
    }
}

impl Default for ScriptedBackend {
    fn default() -> Self {
        Self::new()
    }
}

fn read_script(sock: &mut ScriptedSock, buf: &mut [u8]) -> Result<usize, i32> {
    enum Act {
        Skip,
        Read { n: usize, done: bool },
        WouldBlock,
        Empty,
    }
    loop {
        let act = match sock.script.front() {
            Some(ReadStep::Data(data)) => {
                let remaining = &data[sock.cursor..];
                if remaining.is_empty() {
                    Act::Skip
                } else {
                    let n = remaining.len().min(buf.len());
                    buf[..n].copy_from_slice(&remaining[..n]);
                    Act::Read {
                        n,
                        done: sock.cursor + n == data.len(),
                    }
                }
            }
            Some(ReadStep::WouldBlock) => Act::WouldBlock,
            Some(ReadStep::Eof) => return Ok(0),
            None => Act::Empty,
        };
        match act {
            Act::Skip => {
                sock.script.pop_front();
                sock.cursor = 0;
            }
            Act::Read { n, done } => {
                sock.cursor += n;
                if done {
                    sock.script.pop_front();
                    sock.cursor = 0;
                }
                return Ok(n);
            }
            Act::WouldBlock => {
                sock.script.pop_front();
                sock.drain_trigger();
                return Err(libc::EWOULDBLOCK);
            }
            Act::Empty => {
                sock.drain_trigger();
                return Err(libc::EWOULDBLOCK);
            }
        }
    }
}

impl NetBackend for ScriptedBackend {
    fn socket(&self, _domain: i32, _ty: i32, _protocol: i32) -> Result<RawSocket, i32> {
        let mut fds = [0i32; 2];
        let rc = unsafe { libc::pipe2(fds.as_mut_ptr(), libc::O_NONBLOCK | libc::O_CLOEXEC) };
        if rc < 0 {
            return Err(libc::EMFILE);
        }
        let (fd, trigger) = if self.use_writable_fds.load(Ordering::SeqCst) {
            (fds[1], fds[0])
        } else {
            (fds[0], fds[1])
        };
        let sock = ScriptedSock {
            fd,
            trigger,
            script: VecDeque::new(),
            cursor: 0,
        };
        self.socks.lock().unwrap().insert(fd, sock);
        Ok(fd)
    }

    fn close(&self, fd: RawSocket) -> Result<(), i32> {
        match self.socks.lock().unwrap().remove(&fd) {
            Some(sock) => {
                unsafe {
                    libc::close(sock.fd);
                    libc::close(sock.trigger);
                }
                Ok(())
            }
            None => Err(libc::EBADF),
        }
    }

    fn set_nonblocking(&self, _fd: RawSocket) -> Result<(), i32> {
        Ok(())
    }

    fn connect(&self, _fd: RawSocket, _addr: &[u8]) -> Result<(), i32> {
        match *self.connect_errno.lock().unwrap() {
            Some(errno) => Err(errno),
            None => Ok(()),
        }
    }

    fn bind(&self, _fd: RawSocket, _addr: &[u8]) -> Result<(), i32> {
        Ok(())
    }

    fn listen(&self, _fd: RawSocket, _backlog: i32) -> Result<(), i32> {
        Ok(())
    }

    fn accept(&self, _fd: RawSocket) -> Result<RawSocket, i32> {
        Err(libc::EWOULDBLOCK)
    }

    fn read(&self, fd: RawSocket, buf: &mut [u8]) -> Result<usize, i32> {
        let mut socks = self.socks.lock().unwrap();
        match socks.get_mut(&fd) {
            Some(sock) => read_script(sock, buf),
            None => Err(libc::EBADF),
        }
    }

    fn write(&self, _fd: RawSocket, buf: &[u8]) -> Result<usize, i32> {
        self.written.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn recvfrom(&self, fd: RawSocket, buf: &mut [u8]) -> Result<(usize, Vec<u8>), i32> {
        let mut socks = self.socks.lock().unwrap();
        let n = match socks.get_mut(&fd) {
            Some(sock) => read_script(sock, buf)?,
            None => return Err(libc::EBADF),
        };
        Ok((n, sockaddr_in([127, 0, 0, 1], 4242)))
    }

    fn sendto(&self, _fd: RawSocket, buf: &[u8], addr: Option<&[u8]>) -> Result<usize, i32> {
        self.sendto_called.store(true, Ordering::SeqCst);
        self.sent_dgrams
            .lock()
            .unwrap()
            .push((addr.map(<[u8]>::to_vec), buf.to_vec()));
        Ok(buf.len())
    }

    fn shutdown_write(&self, _fd: RawSocket) -> Result<(), i32> {
        Ok(())
    }

    fn getsockname(&self, _fd: RawSocket) -> Result<Vec<u8>, i32> {
        Ok(sockaddr_in([127, 0, 0, 1], 8080))
    }

    fn getpeername(&self, _fd: RawSocket) -> Result<Vec<u8>, i32> {
        Ok(sockaddr_in([127, 0, 0, 1], 9090))
    }

    fn getsockopt(&self, _fd: RawSocket, _level: i32, _optname: i32) -> Result<Vec<u8>, i32> {
        Ok(0i32.to_le_bytes().to_vec())
    }

    fn setsockopt(
        &self,
        _fd: RawSocket,
        _level: i32,
        _optname: i32,
        _optval: &[u8],
    ) -> Result<(), i32> {
        Ok(())
    }

    fn getaddrinfo(
        &self,
        _node: Option<&str>,
        _service: Option<&str>,
        _hints: Option<&protocol_rio::gai::AddrInfoHints>,
    ) -> Result<GaiOutcome, i32> {
        Ok(GaiOutcome {
            retval: 0,
            entries: self.gai_entries.lock().unwrap().clone(),
        })
    }

    fn if_info(
        &self,
        index: u32,
    ) -> Result<Option<protocol_rio::netconfig::IfInfo>, i32> {
        Ok(self.interfaces.lock().unwrap().get(index as usize).cloned())
    }

    fn set_if_addr_v4(&self, _name: &str, _addr: &[u8], _netmask: &[u8]) -> Result<(), i32> {
        Ok(())
    }

    fn if_gateway_v4(&self, _name: &str) -> Result<Vec<u8>, i32> {
        Ok(sockaddr_in([192, 168, 1, 1], 0))
    }

    fn set_if_gateway_v4(&self, _name: &str, _gateway: &[u8]) -> Result<(), i32> {
        Ok(())
    }

    fn dhcp_status_v4(&self, _name: &str) -> Result<bool, i32> {
        Ok(true)
    }

    fn set_dhcp_status_v4(&self, _name: &str, _enabled: bool) -> Result<(), i32> {
        Ok(())
    }

    fn dns_server_v4(&self) -> Result<Vec<u8>, i32> {
        Ok(sockaddr_in([8, 8, 8, 8], 0))
    }

    fn set_dns_server_v4(&self, _addr: &[u8]) -> Result<(), i32> {
        Ok(())
    }
}

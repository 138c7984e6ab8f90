//! The operation handlers.
//!
//! Each handler runs on the request runner, drives the connection as
//! far as it can without blocking, and either completes or names the
//! readiness it needs next. The stream pipelines alternate between
//! pulling from one side and pushing to the other, suspending on
//! whichever side would block.

use std::sync::Arc;

use io_ipc::{ChannelMessage, Handle, Pipe, PipeError, RecvError, Signals};
use smallvec::SmallVec;
use tracing::{debug, error, trace};

use crate::backend::{errno_to_status, is_would_block};
use crate::ioctl;
use crate::iostate::{
    CreatedHandles, HandleType, IoState, SIGNAL_CONNECTED, SIGNAL_HALFCLOSED, SIGNAL_INCOMING,
    SIGNAL_OUTGOING,
};
use crate::metrics::{
    CONNECTIONS_ACCEPTED, CONNECTIONS_ACTIVE, DGRAMS_IN, DGRAMS_OUT, SOCKETS_OPENED,
    STREAM_BYTES_IN, STREAM_BYTES_OUT,
};
use crate::multiplexer::FdEvents;
use crate::queue::WaitKind;
use crate::request::Request;
use crate::router::{handle_request, Core, Disposition};
use protocol_rio::gai::GaiRequest;
use protocol_rio::sockio::{SockAddrReply, SockOptReq};
use protocol_rio::{
    parse_open_path, GaiReply, ObjectReply, Op, OpenPath, SocketMsg, Status, PROTOCOL_SOCKET,
};

/// Route one request to its handler.
pub(crate) fn dispatch(
    core: &Core,
    rq: &mut Request,
    _events: FdEvents,
    signals: Signals,
) -> Disposition {
    match rq.op {
        Op::Open => do_open(core, rq),
        Op::Close => do_close(core, rq),
        Op::Connect => do_connect(core, rq),
        Op::Bind => do_bind(core, rq),
        Op::Listen => do_listen(core, rq),
        Op::Ioctl => ioctl::do_ioctl(core, rq),
        Op::GetAddrInfo => do_getaddrinfo(core, rq),
        Op::GetSockName => do_getsockname(core, rq),
        Op::GetPeerName => do_getpeername(core, rq),
        Op::GetSockOpt => do_getsockopt(core, rq),
        Op::SetSockOpt => do_setsockopt(core, rq),
        Op::Read => do_read(core, rq),
        Op::Write => do_write(core, rq, signals),
        Op::HalfClose => do_halfclose(core, rq),
        Op::SigConnR => do_sigconn_r(core, rq),
        Op::SigConnW => do_sigconn_w(core, rq),
        Op::Status => Disposition::Done(Status::InvalidArgs),
    }
}

// --- scheduling -----------------------------------------------------------

/// Park an internal READ and arm socket readability.
fn schedule_r(core: &Core, ios: &Arc<IoState>) {
    let fd = ios.sockfd();
    core.queues
        .put(WaitKind::Net, fd, Request::internal(Op::Read, ios.clone()));
    core.arm_net(fd, FdEvents::READ);
}

/// Park an internal WRITE and watch the data endpoint for input.
fn schedule_w(core: &Core, ios: &Arc<IoState>) {
    core.queues.put(
        WaitKind::Client,
        ios.sockfd(),
        Request::internal(Op::Write, ios.clone()),
    );
    core.watcher.set(ios, Signals::READABLE);
}

fn schedule_sigconn_r(core: &Core, ios: &Arc<IoState>) {
    let fd = ios.sockfd();
    core.queues.put(
        WaitKind::Net,
        fd,
        Request::internal(Op::SigConnR, ios.clone()),
    );
    core.arm_net(fd, FdEvents::READ);
}

fn schedule_sigconn_w(core: &Core, ios: &Arc<IoState>) {
    let fd = ios.sockfd();
    core.queues.put(
        WaitKind::Net,
        fd,
        Request::internal(Op::SigConnW, ios.clone()),
    );
    core.arm_net(fd, FdEvents::WRITE);
}

/// Start both pipelines on a freshly connected socket.
fn schedule_rw(core: &Core, ios: &Arc<IoState>) {
    if ios.handle_type == HandleType::Stream {
        ios.signal_data_peer(Signals::empty(), SIGNAL_CONNECTED);
    }
    schedule_r(core, ios);
    schedule_w(core, ios);
}

/// Run a CLOSE for this connection right now.
fn synthesize_close(core: &Core, ios: &Arc<IoState>) {
    handle_request(
        core,
        Request::internal(Op::Close, ios.clone()),
        FdEvents::empty(),
        Signals::empty(),
    );
}

fn pipe_status(e: PipeError) -> Status {
    match e {
        PipeError::ShouldWait => Status::ShouldWait,
        PipeError::PeerClosed => Status::PeerClosed,
        PipeError::BadState => Status::BadState,
    }
}

/// Signal end-of-stream to the client by half-closing the data pipe.
/// A peer that is already gone is tolerated.
fn stream_eof(pipe: &Pipe) -> Status {
    match pipe.half_close() {
        Ok(()) | Err(PipeError::PeerClosed) => Status::Ok,
        Err(e) => {
            error!("half-close marker failed: {e:?}");
            pipe_status(e)
        }
    }
}

// --- open -----------------------------------------------------------------

fn do_open(core: &Core, rq: &mut Request) -> Disposition {
    let reply_to = rq.handles.drain(..).next().and_then(Handle::into_channel);
    let Some(reply_to) = reply_to else {
        debug!("open request carried no reply channel");
        return Disposition::Done(Status::Ok);
    };

    let mut handles: SmallVec<[Handle; 2]> = SmallVec::new();
    let status = match open_path(core, rq) {
        Ok(created) => {
            handles.push(Handle::Channel(created.peer_rio));
            if let Some(data) = created.peer_data {
                handles.push(data);
            }
            Status::Ok
        }
        Err(status) => status,
    };

    let reply = ObjectReply {
        status,
        protocol: PROTOCOL_SOCKET,
    };
    let msg = ChannelMessage {
        bytes: reply.encode(),
        handles,
    };
    if let Err(e) = reply_to.write(msg) {
        // The handles in the unsent reply are closed with it.
        error!("open reply write failed: {e:?}");
    }
    // The object reply is the whole answer; no STATUS follows.
    Disposition::Done(Status::Ok)
}

fn open_path(core: &Core, rq: &mut Request) -> Result<CreatedHandles, Status> {
    let len = rq.msg.data.len();
    if !(1..=1024).contains(&len) {
        return Err(Status::InvalidArgs);
    }
    let path = std::str::from_utf8(&rq.msg.data).map_err(|_| Status::InvalidArgs)?;
    trace!(path, "open");
    match parse_open_path(path)? {
        OpenPath::None => Ok(core.create_iostate(HandleType::None, -1)),
        OpenPath::Socket {
            domain,
            ty,
            protocol,
        } => do_socket(core, domain, ty, protocol),
        OpenPath::Accept => do_accept(core, &rq.ios),
    }
}

fn do_socket(core: &Core, domain: i32, ty: i32, protocol: i32) -> Result<CreatedHandles, Status> {
    let handle_type = match ty {
        libc::SOCK_STREAM => HandleType::Stream,
        libc::SOCK_DGRAM => HandleType::Dgram,
        _ => return Err(Status::NotSupported),
    };

    let fd = core
        .backend
        .socket(domain, ty, protocol)
        .map_err(errno_to_status)?;
    if let Err(errno) = core.backend.set_nonblocking(fd) {
        let _ = core.backend.close(fd);
        return Err(errno_to_status(errno));
    }
    debug!(fd, domain, ty, protocol, "socket opened");

    let created = core.create_iostate(handle_type, fd);
    core.events.set(fd, FdEvents::EXCEPT);
    core.watcher
        .set(&created.ios, Signals::PEER_CLOSED | SIGNAL_HALFCLOSED);
    if handle_type == HandleType::Dgram {
        // Datagram clients may send before bind or connect.
        schedule_w(core, &created.ios);
    }
    SOCKETS_OPENED.increment();
    CONNECTIONS_ACTIVE.increment();
    Ok(created)
}

fn do_accept(core: &Core, parent: &Arc<IoState>) -> Result<CreatedHandles, Status> {
    let newfd = match core.backend.accept(parent.sockfd()) {
        Ok(fd) => fd,
        Err(errno) => {
            parent.body.lock().last_errno = errno;
            if is_would_block(errno) {
                // Not ready after all; watch for the next incoming
                // connection before signaling again.
                schedule_sigconn_r(core, parent);
            }
            return Err(errno_to_status(errno));
        }
    };
    parent.body.lock().last_errno = 0;

    if parent.handle_type == HandleType::Stream {
        parent.signal_data_peer(SIGNAL_INCOMING, Signals::empty());
    }
    schedule_sigconn_r(core, parent);

    if let Err(errno) = core.backend.set_nonblocking(newfd) {
        let _ = core.backend.close(newfd);
        return Err(errno_to_status(errno));
    }

    let created = core.create_iostate(parent.handle_type, newfd);
    core.events.set(newfd, FdEvents::EXCEPT);
    core.watcher
        .set(&created.ios, Signals::PEER_CLOSED | SIGNAL_HALFCLOSED);
    schedule_rw(core, &created.ios);
    debug!(newfd, parent = parent.id, child = created.ios.id, "accepted");
    CONNECTIONS_ACCEPTED.increment();
    CONNECTIONS_ACTIVE.increment();
    Ok(created)
}

// --- lifecycle ------------------------------------------------------------

fn do_close(core: &Core, rq: &mut Request) -> Disposition {
    let ios = &rq.ios;
    let fd = ios.sockfd();
    if fd >= 0 {
        debug!(fd, ios = ios.id, "close");
        if let Err(errno) = core.backend.close(fd) {
            debug!(fd, errno, "backend close failed");
        }
        ios.set_sockfd(-1);
        core.drop_net(fd);
        let discarded =
            core.queues.discard(WaitKind::Net, fd) + core.queues.discard(WaitKind::Client, fd);
        if discarded > 0 {
            trace!(fd, discarded, "dropped pending requests");
        }
        CONNECTIONS_ACTIVE.decrement();
    }
    core.watcher.clear_all(ios);
    core.release_data(ios.id);
    Disposition::Done(Status::Ok)
}

fn do_halfclose(core: &Core, rq: &mut Request) -> Disposition {
    let ios = &rq.ios;
    let fd = ios.sockfd();
    if fd >= 0 {
        if let Err(errno) = core.backend.shutdown_write(fd) {
            ios.body.lock().last_errno = errno;
            debug!(fd, errno, "shutdown failed");
        }
    }
    core.watcher.set(ios, Signals::PEER_CLOSED);
    Disposition::Done(Status::Ok)
}

// --- connection setup -----------------------------------------------------

fn do_connect(core: &Core, rq: &mut Request) -> Disposition {
    let ios = rq.ios.clone();
    match core.backend.connect(ios.sockfd(), &rq.msg.data) {
        Ok(()) => {
            ios.body.lock().last_errno = 0;
            if ios.handle_type == HandleType::Stream {
                schedule_rw(core, &ios);
            }
            rq.msg.data.clear();
            Disposition::Done(Status::Ok)
        }
        Err(errno) => {
            ios.body.lock().last_errno = errno;
            debug!(errno, "connect");
            if errno == libc::EINPROGRESS {
                schedule_sigconn_w(core, &ios);
            }
            Disposition::Done(errno_to_status(errno))
        }
    }
}

fn do_bind(core: &Core, rq: &mut Request) -> Disposition {
    let ios = rq.ios.clone();
    match core.backend.bind(ios.sockfd(), &rq.msg.data) {
        Ok(()) => {
            ios.body.lock().last_errno = 0;
            if ios.handle_type == HandleType::Dgram {
                schedule_r(core, &ios);
            }
            rq.msg.data.clear();
            Disposition::Done(Status::Ok)
        }
        Err(errno) => {
            ios.body.lock().last_errno = errno;
            Disposition::Done(errno_to_status(errno))
        }
    }
}

fn do_listen(core: &Core, rq: &mut Request) -> Disposition {
    let ios = rq.ios.clone();
    let Some(backlog_bytes) = rq.msg.data.get(..4) else {
        return Disposition::Done(Status::InvalidArgs);
    };
    let mut backlog_raw = [0u8; 4];
    backlog_raw.copy_from_slice(backlog_bytes);
    let backlog = i32::from_le_bytes(backlog_raw);

    match core.backend.listen(ios.sockfd(), backlog) {
        Ok(()) => {
            debug!(fd = ios.sockfd(), backlog, "listening");
            schedule_sigconn_r(core, &ios);
            rq.msg.data.clear();
            Disposition::Done(Status::Ok)
        }
        Err(errno) => Disposition::Done(errno_to_status(errno)),
    }
}

/// The listening socket became readable: tell the client a connection
/// is waiting. `accept` clears the signal and re-arms us.
fn do_sigconn_r(_core: &Core, rq: &mut Request) -> Disposition {
    if rq.ios.handle_type == HandleType::Stream {
        rq.ios.signal_data_peer(Signals::empty(), SIGNAL_INCOMING);
    }
    Disposition::Done(Status::Ok)
}

/// The connecting socket became writable: read out SO_ERROR and, on
/// success, light up the data path.
fn do_sigconn_w(core: &Core, rq: &mut Request) -> Disposition {
    let ios = rq.ios.clone();
    if ios.handle_type == HandleType::Stream {
        ios.signal_data_peer(Signals::empty(), SIGNAL_OUTGOING);
    }
    match core
        .backend
        .getsockopt(ios.sockfd(), libc::SOL_SOCKET, libc::SO_ERROR)
    {
        Ok(bytes) => {
            let mut raw = [0u8; 4];
            if bytes.len() >= 4 {
                raw.copy_from_slice(&bytes[..4]);
            }
            let so_error = i32::from_le_bytes(raw);
            ios.body.lock().last_errno = so_error;
            trace!(so_error, "connect completion");
            if so_error == 0 {
                schedule_rw(core, &ios);
            }
        }
        Err(errno) => debug!(errno, "SO_ERROR probe failed"),
    }
    Disposition::Done(Status::Ok)
}

// --- stream pipelines -----------------------------------------------------

fn do_read(core: &Core, rq: &mut Request) -> Disposition {
    match rq.ios.handle_type {
        HandleType::Stream => do_read_stream(core, rq),
        HandleType::Dgram => do_read_dgram(core, rq),
        HandleType::None => Disposition::Done(Status::NotSupported),
    }
}

fn do_write(core: &Core, rq: &mut Request, signals: Signals) -> Disposition {
    match rq.ios.handle_type {
        HandleType::Stream => do_write_stream(core, rq, signals),
        HandleType::Dgram => do_write_dgram(core, rq, signals),
        HandleType::None => Disposition::Done(Status::NotSupported),
    }
}

/// Pull from the socket, push into the client pipe.
fn do_read_stream(core: &Core, rq: &mut Request) -> Disposition {
    let ios = rq.ios.clone();
    let Some(pipe) = ios.stream_pipe() else {
        return Disposition::Done(Status::NotSupported);
    };
    let fd = ios.sockfd();
    let mut body = ios.body.lock();

    // Work on the buffer outside the record so borrows stay simple;
    // it is restored before every return.
    let mut buf = match body.rbuf.take() {
        Some(buf) => buf,
        None => core.pool.get(),
    };

    if body.rlen == 0 {
        match core.backend.read(fd, &mut buf[..]) {
            Ok(0) => {
                // Orderly end of stream.
                body.last_errno = 0;
                body.rbuf = Some(buf);
                return Disposition::Done(stream_eof(pipe));
            }
            Ok(n) => {
                body.last_errno = 0;
                body.rlen = n;
                body.roff = 0;
                STREAM_BYTES_IN.add(n as u64);
            }
            Err(errno) if is_would_block(errno) => {
                body.last_errno = errno;
                body.rbuf = Some(buf);
                return Disposition::PendingNet(FdEvents::READ);
            }
            Err(errno) => {
                // Hard read errors end the stream the same way EOF
                // does; the errno stays readable via SO_ERROR.
                body.last_errno = errno;
                body.rbuf = Some(buf);
                error!(fd, errno, "socket read failed");
                return Disposition::Done(stream_eof(pipe));
            }
        }
    }

    while body.roff < body.rlen {
        match pipe.write(&buf[body.roff..body.rlen]) {
            Ok(n) => body.roff += n,
            Err(PipeError::ShouldWait) => {
                body.rbuf = Some(buf);
                return Disposition::PendingClient(Signals::WRITABLE);
            }
            Err(e) => {
                body.rbuf = Some(buf);
                error!(fd, "client pipe write failed: {e:?}");
                return Disposition::Done(pipe_status(e));
            }
        }
    }

    body.rlen = 0;
    body.roff = 0;
    body.rbuf = Some(buf);
    Disposition::PendingNet(FdEvents::READ)
}

/// Pull from the client pipe, push into the socket.
fn do_write_stream(core: &Core, rq: &mut Request, signals: Signals) -> Disposition {
    let ios = rq.ios.clone();
    let Some(pipe) = ios.stream_pipe() else {
        return Disposition::Done(Status::NotSupported);
    };
    let fd = ios.sockfd();
    let mut body = ios.body.lock();

    let mut buf = match body.wbuf.take() {
        Some(buf) => buf,
        None => core.pool.get(),
    };

    if body.wlen == 0 {
        match pipe.read(&mut buf[..]) {
            Ok(n) => {
                body.wlen = n;
                body.woff = 0;
            }
            Err(PipeError::ShouldWait) => {
                body.wbuf = Some(buf);
                if signals.contains(Signals::PEER_CLOSED) {
                    drop(body);
                    synthesize_close(core, &ios);
                    return Disposition::Done(Status::Ok);
                }
                return Disposition::PendingClient(
                    Signals::READABLE | Signals::PEER_CLOSED | SIGNAL_HALFCLOSED,
                );
            }
            Err(PipeError::PeerClosed) => {
                body.wbuf = Some(buf);
                drop(body);
                synthesize_close(core, &ios);
                return Disposition::Done(Status::Ok);
            }
            Err(e) => {
                body.wbuf = Some(buf);
                error!(fd, "client pipe read failed: {e:?}");
                return Disposition::Done(stream_eof(pipe));
            }
        }
    }

    while body.woff < body.wlen {
        match core.backend.write(fd, &buf[body.woff..body.wlen]) {
            Ok(n) => {
                body.woff += n;
                STREAM_BYTES_OUT.add(n as u64);
            }
            Err(errno) if is_would_block(errno) => {
                body.last_errno = errno;
                body.wbuf = Some(buf);
                return Disposition::PendingNet(FdEvents::WRITE);
            }
            Err(errno) => {
                body.last_errno = errno;
                body.wbuf = Some(buf);
                error!(fd, errno, "socket write failed");
                return Disposition::Done(Status::Ok);
            }
        }
    }

    body.wlen = 0;
    body.woff = 0;
    body.wbuf = Some(buf);
    Disposition::PendingClient(Signals::READABLE | Signals::PEER_CLOSED | SIGNAL_HALFCLOSED)
}

// --- datagram pipelines ---------------------------------------------------

/// One `recvfrom`, one whole message to the client.
fn do_read_dgram(core: &Core, rq: &mut Request) -> Disposition {
    let ios = rq.ios.clone();
    let Some(ch) = ios.dgram_channel() else {
        return Disposition::Done(Status::NotSupported);
    };
    let fd = ios.sockfd();
    let mut body = ios.body.lock();

    let mut buf = match body.rbuf.take() {
        Some(buf) => buf,
        None => core.pool.get(),
    };

    // A zero-length datagram is data, not end-of-stream.
    let (n, addr) = match core.backend.recvfrom(fd, &mut buf[..]) {
        Ok(result) => result,
        Err(errno) if is_would_block(errno) => {
            body.last_errno = errno;
            body.rbuf = Some(buf);
            return Disposition::PendingNet(FdEvents::READ);
        }
        Err(errno) => {
            body.last_errno = errno;
            body.rbuf = Some(buf);
            error!(fd, errno, "recvfrom failed");
            return Disposition::Done(Status::Ok);
        }
    };
    body.last_errno = 0;

    let envelope = SocketMsg::new(addr, buf[..n].to_vec());
    body.rbuf = Some(buf);
    let bytes = match envelope.encode() {
        Ok(bytes) => bytes,
        Err(status) => {
            error!(fd, "datagram envelope encode failed: {status}");
            return Disposition::Done(status);
        }
    };
    if let Err(e) = ch.write(ChannelMessage::data(bytes)) {
        error!(fd, "datagram channel write failed: {e:?}");
        return Disposition::Done(Status::PeerClosed);
    }
    DGRAMS_IN.increment();

    body.rlen = 0;
    body.roff = 0;
    Disposition::PendingNet(FdEvents::READ)
}

/// One whole message from the client, one `sendto`.
fn do_write_dgram(core: &Core, rq: &mut Request, signals: Signals) -> Disposition {
    let ios = rq.ios.clone();
    let Some(ch) = ios.dgram_channel() else {
        return Disposition::Done(Status::NotSupported);
    };
    let fd = ios.sockfd();

    let msg = match ch.try_read() {
        Ok(msg) => msg,
        Err(RecvError::Empty) => {
            if signals.contains(Signals::PEER_CLOSED) {
                synthesize_close(core, &ios);
                return Disposition::Done(Status::Ok);
            }
            return Disposition::PendingClient(Signals::READABLE | Signals::PEER_CLOSED);
        }
        Err(RecvError::PeerClosed) => {
            synthesize_close(core, &ios);
            return Disposition::Done(Status::Ok);
        }
    };

    match SocketMsg::decode(&msg.bytes) {
        Ok(envelope) => {
            let addr = (!envelope.addr.is_empty()).then_some(envelope.addr.as_slice());
            match core.backend.sendto(fd, &envelope.payload, addr) {
                Ok(_) => {
                    ios.body.lock().last_errno = 0;
                    DGRAMS_OUT.increment();
                }
                Err(errno) => {
                    ios.body.lock().last_errno = errno;
                    debug!(fd, errno, "sendto failed");
                }
            }
        }
        Err(status) => error!(fd, "bad socket message: {status}"),
    }

    Disposition::PendingClient(Signals::READABLE | Signals::PEER_CLOSED)
}

// --- queries --------------------------------------------------------------

fn do_getaddrinfo(core: &Core, rq: &mut Request) -> Disposition {
    let req = match GaiRequest::decode(&rq.msg.data) {
        Ok(req) => req,
        Err(status) => return Disposition::Done(status),
    };
    let outcome = match core.backend.getaddrinfo(
        req.node.as_deref(),
        req.service.as_deref(),
        req.hints.as_ref(),
    ) {
        Ok(outcome) => outcome,
        Err(errno) => {
            rq.ios.body.lock().last_errno = errno;
            return Disposition::Done(errno_to_status(errno));
        }
    };
    // Only the first result crosses the wire.
    let reply = GaiReply {
        retval: outcome.retval,
        entries: outcome.entries.into_iter().take(1).collect(),
    };
    match reply.encode() {
        Ok(bytes) => {
            rq.msg.data = bytes;
            Disposition::Done(Status::Ok)
        }
        Err(status) => Disposition::Done(status),
    }
}

fn do_getsockname(core: &Core, rq: &mut Request) -> Disposition {
    sockaddr_query(rq, core.backend.getsockname(rq.ios.sockfd()))
}

fn do_getpeername(core: &Core, rq: &mut Request) -> Disposition {
    sockaddr_query(rq, core.backend.getpeername(rq.ios.sockfd()))
}

fn sockaddr_query(rq: &mut Request, result: Result<Vec<u8>, i32>) -> Disposition {
    match result {
        Ok(addr) => match (SockAddrReply { addr }).encode() {
            Ok(bytes) => {
                rq.msg.data = bytes;
                Disposition::Done(Status::Ok)
            }
            Err(status) => Disposition::Done(status),
        },
        Err(errno) => {
            rq.ios.body.lock().last_errno = errno;
            Disposition::Done(errno_to_status(errno))
        }
    }
}

fn do_getsockopt(core: &Core, rq: &mut Request) -> Disposition {
    let req = match SockOptReq::decode(&rq.msg.data) {
        Ok(req) => req,
        Err(status) => return Disposition::Done(status),
    };

    // SO_ERROR is answered from the connection record, not the socket.
    let optval = if req.level == libc::SOL_SOCKET && req.optname == libc::SO_ERROR {
        rq.ios.body.lock().last_errno.to_le_bytes().to_vec()
    } else {
        match core
            .backend
            .getsockopt(rq.ios.sockfd(), req.level, req.optname)
        {
            Ok(optval) => optval,
            Err(errno) => {
                rq.ios.body.lock().last_errno = errno;
                return Disposition::Done(errno_to_status(errno));
            }
        }
    };

    let reply = SockOptReq {
        level: req.level,
        optname: req.optname,
        optval,
    };
    match reply.encode() {
        Ok(bytes) => {
            rq.msg.data = bytes;
            Disposition::Done(Status::Ok)
        }
        Err(status) => Disposition::Done(status),
    }
}

fn do_setsockopt(core: &Core, rq: &mut Request) -> Disposition {
    let req = match SockOptReq::decode(&rq.msg.data) {
        Ok(req) => req,
        Err(status) => return Disposition::Done(status),
    };
    match core
        .backend
        .setsockopt(rq.ios.sockfd(), req.level, req.optname, &req.optval)
    {
        Ok(()) => {
            rq.ios.body.lock().last_errno = 0;
            rq.msg.data.clear();
            Disposition::Done(Status::Ok)
        }
        Err(errno) => {
            rq.ios.body.lock().last_errno = errno;
            Disposition::Done(errno_to_status(errno))
        }
    }
}

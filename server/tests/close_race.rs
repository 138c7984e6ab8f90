//! Lifecycle invariants: suspended-request discarding, refcounts, and
//! would-block resumption.

mod common;

use common::*;
use io_ipc::{ChannelMessage, PipeError, Signals};
use protocol_rio::{Message, Op, SocketMsg, Status};
use server::config::Config;
use server::iostate::SIGNAL_CONNECTED;
use server::queue::WaitKind;
use server::Server;
use std::sync::atomic::Ordering;
use std::sync::Arc;

#[test]
fn close_discards_suspended_requests() {
    let backend = Arc::new(ScriptedBackend::new());
    let server = Server::start(&Config::default(), backend.clone()).expect("start server");
    let root = server.connect(); // id 1

    // A datagram socket parks a WRITE on client-wait immediately.
    let (status, ctrl, data) = open(&root, "socket/2/2/0"); // id 2
    assert_eq!(status, Status::Ok);
    let ctrl = ctrl.expect("control channel");
    let data = data
        .expect("data endpoint")
        .into_channel()
        .expect("dgram channel");
    let fd = backend.last_fd();
    let core = server.core();

    wait_until("write suspended on client-wait", || {
        core.queues.pending(WaitKind::Client, fd) == 1
    });
    // Watched signals and wait-set entry exist together, and both
    // registry references are held.
    assert!(core.watcher.has_entry(2));
    assert_eq!(core.held_refs(2), 2);

    send(&ctrl, Message::new(Op::Close));
    wait_until("close processed", || core.held_refs(2) == 0);

    // Both queues are empty for the fd, the wait-set entry is gone,
    // and the parked request never reached the backend.
    assert_eq!(core.queues.pending(WaitKind::Client, fd), 0);
    assert_eq!(core.queues.pending(WaitKind::Net, fd), 0);
    assert!(!core.watcher.has_entry(2));
    assert!(!backend.sendto_called.load(Ordering::SeqCst));

    // The queued request must stay dead even if the client pokes the
    // endpoint afterwards.
    let late = SocketMsg::new(Vec::new(), b"late".to_vec());
    let _ = data.write(ChannelMessage::data(late.encode().expect("encode")));
    std::thread::sleep(std::time::Duration::from_millis(50));
    assert!(!backend.sendto_called.load(Ordering::SeqCst));

    drop((ctrl, data, root));
    server.shutdown();
}

#[test]
fn would_block_read_resumes_when_fd_turns_readable() {
    let backend = Arc::new(ScriptedBackend::new());
    let server = Server::start(&Config::default(), backend.clone()).expect("start server");
    let root = server.connect();

    let (status, ctrl, data) = open(&root, "socket/2/1/0");
    assert_eq!(status, Status::Ok);
    let ctrl = ctrl.expect("control channel");
    let pipe = data.expect("data endpoint").into_pipe().expect("stream pipe");
    let fd = backend.last_fd();

    // First readiness hands the pipeline a would-block; only the next
    // one produces bytes.
    backend.script(
        fd,
        vec![
            ReadStep::WouldBlock,
            ReadStep::Data(b"after-block".to_vec()),
        ],
    );

    let reply = call(
        &ctrl,
        Message::with_data(Op::Connect, sockaddr_in([127, 0, 0, 1], 80)),
    );
    assert_eq!(Status::from_raw(reply.arg), Status::Ok);
    assert!(pipe
        .wait_signals(SIGNAL_CONNECTED, Some(TIMEOUT))
        .contains(SIGNAL_CONNECTED));

    // Readable once: the pipeline eats the would-block and goes back
    // to net-wait.
    backend.trigger(fd);
    wait_until("would-block step consumed", || backend.script_len(fd) == 1);
    // Readable again: now the bytes flow through to the client.
    backend.trigger(fd);

    let mut received = Vec::new();
    let mut buf = [0u8; 64];
    while received.len() < b"after-block".len() {
        match pipe.read(&mut buf) {
            Ok(n) => received.extend_from_slice(&buf[..n]),
            Err(PipeError::ShouldWait) => {
                let observed =
                    pipe.wait_signals(Signals::READABLE | Signals::PEER_CLOSED, Some(TIMEOUT));
                assert!(
                    observed.intersects(Signals::READABLE | Signals::PEER_CLOSED),
                    "resumed read never produced data"
                );
            }
            Err(e) => panic!("pipe read failed: {e:?}"),
        }
    }
    assert_eq!(received, b"after-block");

    // The write direction flows into the backend.
    let mut payload: &[u8] = b"uplink-bytes";
    while !payload.is_empty() {
        match pipe.write(payload) {
            Ok(n) => payload = &payload[n..],
            Err(PipeError::ShouldWait) => {
                pipe.wait_signals(Signals::WRITABLE, Some(TIMEOUT));
            }
            Err(e) => panic!("pipe write failed: {e:?}"),
        }
    }
    wait_until("uplink drained into backend", || {
        backend.written.lock().unwrap().as_slice() == b"uplink-bytes"
    });

    send(&ctrl, Message::new(Op::Close));
    drop((ctrl, pipe, root));
    server.shutdown();
}

//! The query surface: netconfig ioctls, getaddrinfo, sockopts, and
//! OPEN path boundaries.

mod common;

use common::*;
use protocol_rio::gai::{GaiEntry, GaiReply, GaiRequest};
use protocol_rio::netconfig::{
    GetIfInfoReply, IfInfo, IF_INFO_MAX, IOCTL_GET_DHCP_STATUS, IOCTL_GET_IF_INFO,
    SOCKADDR_SIZE,
};
use protocol_rio::sockio::SockOptReq;
use protocol_rio::{Message, Op, Status};
use server::config::Config;
use server::Server;
use std::sync::Arc;

fn ioctl_msg(op: u32, data: Vec<u8>) -> Message {
    let mut msg = Message::with_data(Op::Ioctl, data);
    msg.arg2 = op;
    msg
}

fn sample_if(index: u32) -> IfInfo {
    let mut addr = [0u8; SOCKADDR_SIZE];
    addr[4..8].copy_from_slice(&[10, 0, 0, index as u8]);
    IfInfo {
        name: format!("en{index}"),
        addr,
        netmask: [255; SOCKADDR_SIZE],
        broadaddr: [0; SOCKADDR_SIZE],
        flags: 1,
        index,
        hwaddr: vec![0, 1, 2, 3, 4, index as u8],
    }
}

#[test]
fn get_if_info_reports_up_to_max_interfaces() {
    let backend = Arc::new(ScriptedBackend::new());
    *backend.interfaces.lock().unwrap() = (0..IF_INFO_MAX as u32).map(sample_if).collect();
    let server = Server::start(&Config::default(), backend.clone()).expect("start server");
    let root = server.connect();

    let reply = call(&root, ioctl_msg(IOCTL_GET_IF_INFO, Vec::new()));
    assert_eq!(Status::from_raw(reply.arg), Status::Ok);
    let decoded = GetIfInfoReply::decode(&reply.data).expect("decode if-info");
    assert_eq!(decoded.interfaces.len(), IF_INFO_MAX);
    assert_eq!(decoded.interfaces[3].name, "en3");

    drop(root);
    server.shutdown();
}

#[test]
fn unknown_ioctl_is_invalid_args() {
    let backend = Arc::new(ScriptedBackend::new());
    let server = Server::start(&Config::default(), backend).expect("start server");
    let root = server.connect();

    let reply = call(&root, ioctl_msg(0xdead, Vec::new()));
    assert_eq!(Status::from_raw(reply.arg), Status::InvalidArgs);
    assert!(reply.data.is_empty());

    // A known op still works on the same channel afterwards.
    let name = protocol_rio::netconfig::encode_ifname("en0").expect("name");
    let reply = call(&root, ioctl_msg(IOCTL_GET_DHCP_STATUS, name));
    assert_eq!(Status::from_raw(reply.arg), Status::Ok);
    assert_eq!(reply.data, 1u32.to_le_bytes());

    drop(root);
    server.shutdown();
}

#[test]
fn getaddrinfo_returns_first_entry_only() {
    let backend = Arc::new(ScriptedBackend::new());
    *backend.gai_entries.lock().unwrap() = vec![
        GaiEntry {
            flags: 0,
            family: libc::AF_INET,
            socktype: libc::SOCK_STREAM,
            protocol: 6,
            addr: sockaddr_in([93, 184, 216, 34], 80),
        },
        GaiEntry {
            flags: 0,
            family: libc::AF_INET,
            socktype: libc::SOCK_STREAM,
            protocol: 6,
            addr: sockaddr_in([93, 184, 216, 35], 80),
        },
    ];
    let server = Server::start(&Config::default(), backend).expect("start server");
    let root = server.connect();

    let request = GaiRequest {
        node: Some("example.com".into()),
        service: Some("80".into()),
        hints: None,
    };
    let reply = call(
        &root,
        Message::with_data(Op::GetAddrInfo, request.encode().expect("encode")),
    );
    assert_eq!(Status::from_raw(reply.arg), Status::Ok);
    let decoded = GaiReply::decode(&reply.data).expect("decode gai reply");
    assert_eq!(decoded.retval, 0);
    assert_eq!(decoded.entries.len(), 1);
    assert_eq!(decoded.entries[0].addr, sockaddr_in([93, 184, 216, 34], 80));

    drop(root);
    server.shutdown();
}

#[test]
fn so_error_is_served_from_last_errno() {
    let backend = Arc::new(ScriptedBackend::new());
    *backend.connect_errno.lock().unwrap() = Some(libc::ECONNREFUSED);
    let server = Server::start(&Config::default(), backend).expect("start server");
    let root = server.connect();

    let (status, ctrl, _data) = open(&root, "socket/2/1/0");
    assert_eq!(status, Status::Ok);
    let ctrl = ctrl.expect("control channel");

    let reply = call(
        &ctrl,
        Message::with_data(Op::Connect, sockaddr_in([127, 0, 0, 1], 81)),
    );
    // ECONNREFUSED is not in the errno table; it surfaces as IO.
    assert_eq!(Status::from_raw(reply.arg), Status::Io);

    let request = SockOptReq {
        level: libc::SOL_SOCKET,
        optname: libc::SO_ERROR,
        optval: Vec::new(),
    };
    let reply = call(
        &ctrl,
        Message::with_data(Op::GetSockOpt, request.encode().expect("encode")),
    );
    assert_eq!(Status::from_raw(reply.arg), Status::Ok);
    let decoded = SockOptReq::decode(&reply.data).expect("decode sockopt");
    assert_eq!(decoded.optval, libc::ECONNREFUSED.to_le_bytes());

    drop((ctrl, root));
    server.shutdown();
}

#[test]
fn open_path_boundaries() {
    let backend = Arc::new(ScriptedBackend::new());
    let server = Server::start(&Config::default(), backend).expect("start server");
    let root = server.connect();

    // Empty payload and oversize payload are both rejected before any
    // parsing happens.
    let (status, rio, data) = open(&root, "");
    assert_eq!(status, Status::InvalidArgs);
    assert!(rio.is_none() && data.is_none());

    let long = "a".repeat(1025);
    let (status, _, _) = open(&root, &long);
    assert_eq!(status, Status::InvalidArgs);

    // Unknown directory and unsupported socket type.
    let (status, _, _) = open(&root, "bogus");
    assert_eq!(status, Status::InvalidArgs);
    let (status, _, _) = open(&root, "socket/2/3/0");
    assert_eq!(status, Status::NotSupported);

    // A well-formed path still succeeds on the same channel.
    let (status, ctrl, data) = open(&root, "socket/2/1/0");
    assert_eq!(status, Status::Ok);
    assert!(ctrl.is_some() && data.is_some());

    drop(root);
    server.shutdown();
}

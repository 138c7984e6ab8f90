//! The network-configuration ioctl surface.
//!
//! Each op is a thin call into the backend with a fixed-layout request
//! or reply struct. The reply payload is written into the request
//! message's data area; error replies carry none.

use tracing::debug;

use crate::backend::errno_to_status;
use crate::request::Request;
use crate::router::{Core, Disposition};
use protocol_rio::netconfig::{
    decode_ifname, GetIfInfoReply, SetDhcpStatus, SetIfAddr, SetIfGateway, IF_INFO_MAX,
    IOCTL_GET_DHCP_STATUS, IOCTL_GET_DNS_SERVER, IOCTL_GET_IF_GATEWAY, IOCTL_GET_IF_INFO,
    IOCTL_SET_DHCP_STATUS, IOCTL_SET_DNS_SERVER, IOCTL_SET_IF_ADDR, IOCTL_SET_IF_GATEWAY,
    SOCKADDR_SIZE,
};
use protocol_rio::Status;

pub(crate) fn do_ioctl(core: &Core, rq: &mut Request) -> Disposition {
    let op = rq.msg.arg2;
    let status = match op {
        IOCTL_GET_IF_INFO => get_if_info(core, rq),
        IOCTL_SET_IF_ADDR => set_if_addr(core, rq),
        IOCTL_GET_IF_GATEWAY => get_if_gateway(core, rq),
        IOCTL_SET_IF_GATEWAY => set_if_gateway(core, rq),
        IOCTL_GET_DHCP_STATUS => get_dhcp_status(core, rq),
        IOCTL_SET_DHCP_STATUS => set_dhcp_status(core, rq),
        IOCTL_GET_DNS_SERVER => get_dns_server(core, rq),
        IOCTL_SET_DNS_SERVER => set_dns_server(core, rq),
        _ => {
            debug!(op, "unknown ioctl");
            Status::InvalidArgs
        }
    };
    if !status.is_ok() {
        rq.msg.data.clear();
    }
    Disposition::Done(status)
}

fn get_if_info(core: &Core, rq: &mut Request) -> Status {
    let mut interfaces = Vec::new();
    for index in 0..IF_INFO_MAX as u32 {
        match core.backend.if_info(index) {
            Ok(Some(info)) => interfaces.push(info),
            Ok(None) => break,
            Err(errno) => return errno_to_status(errno),
        }
    }
    match (GetIfInfoReply { interfaces }).encode() {
        Ok(bytes) => {
            rq.msg.data = bytes;
            Status::Ok
        }
        Err(status) => status,
    }
}

fn set_if_addr(core: &Core, rq: &mut Request) -> Status {
    let req = match SetIfAddr::decode(&rq.msg.data) {
        Ok(req) => req,
        Err(status) => return status,
    };
    rq.msg.data.clear();
    match core
        .backend
        .set_if_addr_v4(&req.name, &req.addr, &req.netmask)
    {
        Ok(()) => Status::Ok,
        Err(errno) => errno_to_status(errno),
    }
}

fn get_if_gateway(core: &Core, rq: &mut Request) -> Status {
    let name = match decode_ifname(&rq.msg.data) {
        Ok(name) => name,
        Err(status) => return status,
    };
    match core.backend.if_gateway_v4(&name) {
        Ok(mut gateway) => {
            gateway.resize(SOCKADDR_SIZE, 0);
            rq.msg.data = gateway;
            Status::Ok
        }
        Err(errno) => errno_to_status(errno),
    }
}

fn set_if_gateway(core: &Core, rq: &mut Request) -> Status {
    let req = match SetIfGateway::decode(&rq.msg.data) {
        Ok(req) => req,
        Err(status) => return status,
    };
    rq.msg.data.clear();
    match core.backend.set_if_gateway_v4(&req.name, &req.gateway) {
        Ok(()) => Status::Ok,
        Err(errno) => errno_to_status(errno),
    }
}

fn get_dhcp_status(core: &Core, rq: &mut Request) -> Status {
    let name = match decode_ifname(&rq.msg.data) {
        Ok(name) => name,
        Err(status) => return status,
    };
    match core.backend.dhcp_status_v4(&name) {
        Ok(enabled) => {
            rq.msg.data = (enabled as u32).to_le_bytes().to_vec();
            Status::Ok
        }
        Err(errno) => errno_to_status(errno),
    }
}

fn set_dhcp_status(core: &Core, rq: &mut Request) -> Status {
    let req = match SetDhcpStatus::decode(&rq.msg.data) {
        Ok(req) => req,
        Err(status) => return status,
    };
    rq.msg.data.clear();
    match core.backend.set_dhcp_status_v4(&req.name, req.enabled) {
        Ok(()) => Status::Ok,
        Err(errno) => errno_to_status(errno),
    }
}

fn get_dns_server(core: &Core, rq: &mut Request) -> Status {
    match core.backend.dns_server_v4() {
        Ok(mut server) => {
            server.resize(SOCKADDR_SIZE, 0);
            rq.msg.data = server;
            Status::Ok
        }
        Err(errno) => errno_to_status(errno),
    }
}

fn set_dns_server(core: &Core, rq: &mut Request) -> Status {
    if rq.msg.data.len() < SOCKADDR_SIZE {
        return Status::InvalidArgs;
    }
    let addr = rq.msg.data[..SOCKADDR_SIZE].to_vec();
    rq.msg.data.clear();
    match core.backend.set_dns_server_v4(&addr) {
        Ok(()) => Status::Ok,
        Err(errno) => errno_to_status(errno),
    }
}

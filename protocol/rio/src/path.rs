//! The OPEN path grammar: `none | socket/<d>/<t>/<p> | accept`.

use crate::ops::Status;

/// A parsed OPEN path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenPath {
    /// A control handle with no socket behind it.
    None,
    /// Create a socket with the given raw domain/type/protocol.
    Socket {
        domain: i32,
        ty: i32,
        protocol: i32,
    },
    /// Accept a connection on the parent's listening socket.
    Accept,
}

/// Parse an OPEN path. The socket arguments are strict decimal: every
/// segment must be non-empty, all digits, and the path must end after
/// the protocol segment.
pub fn parse_open_path(path: &str) -> Result<OpenPath, Status> {
    if path.is_empty() || path.contains('\0') {
        return Err(Status::InvalidArgs);
    }
    let (first, rest) = match path.split_once('/') {
        Some((first, rest)) => (first, Some(rest)),
        None => (path, None),
    };
    match first {
        // Trailing segments after none/accept are ignored, as the
        // original directory matcher did.
        "none" => Ok(OpenPath::None),
        "accept" => Ok(OpenPath::Accept),
        "socket" => parse_socket_args(rest.ok_or(Status::InvalidArgs)?),
        _ => Err(Status::InvalidArgs),
    }
}

fn parse_socket_args(args: &str) -> Result<OpenPath, Status> {
    let mut segments = args.split('/');
    let domain = parse_decimal(segments.next())?;
    let ty = parse_decimal(segments.next())?;
    let protocol = parse_decimal(segments.next())?;
    if segments.next().is_some() {
        return Err(Status::InvalidArgs);
    }
    Ok(OpenPath::Socket {
        domain,
        ty,
        protocol,
    })
}

fn parse_decimal(segment: Option<&str>) -> Result<i32, Status> {
    let segment = segment.ok_or(Status::InvalidArgs)?;
    if segment.is_empty() || !segment.bytes().all(|b| b.is_ascii_digit()) {
        return Err(Status::InvalidArgs);
    }
    segment.parse::<i32>().map_err(|_| Status::InvalidArgs)
}

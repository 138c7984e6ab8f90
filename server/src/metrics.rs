//! Proxy metrics.

use metriken::{metric, Counter, Gauge};

#[metric(
    name = "sockets_opened",
    description = "Total sockets created on behalf of clients"
)]
pub static SOCKETS_OPENED: Counter = Counter::new();

#[metric(
    name = "connections_accepted",
    description = "Total connections accepted on listening sockets"
)]
pub static CONNECTIONS_ACCEPTED: Counter = Counter::new();

#[metric(
    name = "connections_active",
    description = "Connections with a live socket fd"
)]
pub static CONNECTIONS_ACTIVE: Gauge = Gauge::new();

#[metric(
    name = "stream_bytes_in",
    description = "Stream bytes pulled from sockets toward clients"
)]
pub static STREAM_BYTES_IN: Counter = Counter::new();

#[metric(
    name = "stream_bytes_out",
    description = "Stream bytes pushed from clients into sockets"
)]
pub static STREAM_BYTES_OUT: Counter = Counter::new();

#[metric(name = "dgrams_in", description = "Datagrams received from sockets")]
pub static DGRAMS_IN: Counter = Counter::new();

#[metric(name = "dgrams_out", description = "Datagrams sent into sockets")]
pub static DGRAMS_OUT: Counter = Counter::new();

#[metric(
    name = "requests_suspended_net",
    description = "Handler suspensions awaiting socket readiness"
)]
pub static REQUESTS_SUSPENDED_NET: Counter = Counter::new();

#[metric(
    name = "requests_suspended_client",
    description = "Handler suspensions awaiting client-endpoint readiness"
)]
pub static REQUESTS_SUSPENDED_CLIENT: Counter = Counter::new();

//! Socket helpers.

use std::net::SocketAddr;

use socket2::{Domain, Protocol, Socket, Type};
use tokio::net::UdpSocket;

use crate::error::{Error, Result};

/// Parse a listen address such as `0.0.0.0:161` or `[::]:1161`.
pub(crate) fn parse_bind_addr(addr: &str) -> Result<SocketAddr> {
    addr.parse().map_err(|_| Error::Io {
        target: None,
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("invalid bind address: {}", addr),
        ),
    })
}

/// Bind the agent's UDP socket.
///
/// An IPv6 address is bound dual-stack (`IPV6_V6ONLY = false`), so `[::]:161`
/// also answers IPv4 managers. `recv_buffer_size` is a request; the kernel
/// may cap it at `net.core.rmem_max`.
pub(crate) fn bind_udp_socket(
    addr: SocketAddr,
    recv_buffer_size: Option<usize>,
) -> Result<UdpSocket> {
    let io = |source| Error::Io {
        target: Some(addr),
        source,
    };

    let domain = if addr.is_ipv6() {
        Domain::IPV6
    } else {
        Domain::IPV4
    };
    let socket = Socket::new(domain, Type::DGRAM, Some(Protocol::UDP)).map_err(io)?;

    if addr.is_ipv6() {
        socket.set_only_v6(false).map_err(io)?;
    }
    // Quick restarts on a well-known port.
    socket.set_reuse_address(true).map_err(io)?;

    if let Some(size) = recv_buffer_size
        && let Err(e) = socket.set_recv_buffer_size(size)
    {
        tracing::debug!(error = %e, size, "could not set receive buffer size");
    }

    socket.set_nonblocking(true).map_err(io)?;
    socket.bind(&addr.into()).map_err(io)?;

    UdpSocket::from_std(socket.into()).map_err(io)
}

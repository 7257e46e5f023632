//! UDP listener transport.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::net::UdpSocket;
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;

use super::{AgentTransport, ReplySink};
use crate::error::{Error, Result};
use crate::util::{bind_udp_socket, parse_bind_addr};

/// Default bind address: all interfaces, standard SNMP port, dual-stack.
pub const DEFAULT_BIND_ADDR: &str = "[::]:161";

/// Largest datagram accepted by default.
pub const DEFAULT_MAX_DATAGRAM_SIZE: usize = 65535;

/// A bound UDP socket serving agent requests.
///
/// Clones share the socket. Calling [`close`](AgentTransport::close) on any
/// clone makes pending and future [`recv`](AgentTransport::recv) calls return
/// [`Error::TransportClosed`].
///
/// ```rust,no_run
/// use async_snmp_agent::transport::UdpTransport;
///
/// # async fn example() -> async_snmp_agent::Result<()> {
/// let transport = UdpTransport::builder()
///     .bind("0.0.0.0:1161")
///     .recv_buffer_size(4 * 1024 * 1024)
///     .build()
///     .await?;
/// println!("listening on {}", transport.local_addr());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct UdpTransport {
    inner: Arc<UdpInner>,
}

struct UdpInner {
    socket: UdpSocket,
    local_addr: SocketAddr,
    /// Shared receive buffer; each datagram is copied out of it.
    recv_buf: Mutex<Vec<u8>>,
    closed: CancellationToken,
}

impl UdpTransport {
    pub fn builder() -> UdpTransportBuilder {
        UdpTransportBuilder::new()
    }

    /// Bind with default settings.
    pub async fn bind(addr: impl Into<String>) -> Result<Self> {
        Self::builder().bind(addr).build().await
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}

impl AgentTransport for UdpTransport {
    type Reply = UdpReply;

    async fn recv(&self) -> Result<(Bytes, UdpReply)> {
        let mut buf = tokio::select! {
            _ = self.inner.closed.cancelled() => return Err(Error::TransportClosed),
            buf = self.inner.recv_buf.lock() => buf,
        };
        let (len, source) = tokio::select! {
            _ = self.inner.closed.cancelled() => return Err(Error::TransportClosed),
            received = self.inner.socket.recv_from(&mut buf[..]) => {
                received.map_err(|e| Error::Io { target: None, source: e })?
            }
        };
        tracing::trace!(snmp.source = %source, snmp.bytes = len, "received datagram");
        Ok((
            Bytes::copy_from_slice(&buf[..len]),
            UdpReply {
                inner: self.inner.clone(),
                target: source,
            },
        ))
    }

    fn close(&self) {
        tracing::debug!(snmp.local_addr = %self.inner.local_addr, "closing UDP transport");
        self.inner.closed.cancel();
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}

/// Sends one reply to the source of a datagram.
pub struct UdpReply {
    inner: Arc<UdpInner>,
    target: SocketAddr,
}

impl ReplySink for UdpReply {
    fn source(&self) -> SocketAddr {
        self.target
    }

    async fn send(self, data: Bytes) -> Result<()> {
        self.inner
            .socket
            .send_to(&data, self.target)
            .await
            .map_err(|e| Error::Io {
                target: Some(self.target),
                source: e,
            })?;
        tracing::trace!(snmp.target = %self.target, snmp.bytes = data.len(), "sent reply");
        Ok(())
    }
}

/// Builder for [`UdpTransport`].
#[must_use]
pub struct UdpTransportBuilder {
    bind_addr: String,
    max_datagram_size: usize,
    recv_buffer_size: Option<usize>,
}

impl UdpTransportBuilder {
    pub fn new() -> Self {
        Self {
            bind_addr: DEFAULT_BIND_ADDR.into(),
            max_datagram_size: DEFAULT_MAX_DATAGRAM_SIZE,
            recv_buffer_size: None,
        }
    }

    /// Set the local bind address (default: `[::]:161`).
    pub fn bind(mut self, addr: impl Into<String>) -> Self {
        self.bind_addr = addr.into();
        self
    }

    /// Largest datagram accepted (default: 65535). Longer ones are truncated
    /// and will fail to decode.
    pub fn max_datagram_size(mut self, size: usize) -> Self {
        self.max_datagram_size = size;
        self
    }

    /// Request a socket receive buffer size. Larger buffers prevent packet
    /// loss during bursts.
    pub fn recv_buffer_size(mut self, size: usize) -> Self {
        self.recv_buffer_size = Some(size);
        self
    }

    pub async fn build(self) -> Result<UdpTransport> {
        let bind_addr = parse_bind_addr(&self.bind_addr)?;
        let socket = bind_udp_socket(bind_addr, self.recv_buffer_size)?;
        let local_addr = socket.local_addr().map_err(|e| Error::Io {
            target: Some(bind_addr),
            source: e,
        })?;

        tracing::debug!(
            snmp.local_addr = %local_addr,
            snmp.max_datagram_size = self.max_datagram_size,
            "UDP transport bound"
        );

        Ok(UdpTransport {
            inner: Arc::new(UdpInner {
                socket,
                local_addr,
                recv_buf: Mutex::new(vec![0u8; self.max_datagram_size]),
                closed: CancellationToken::new(),
            }),
        })
    }
}

impl Default for UdpTransportBuilder {
    fn default() -> Self {
        Self::new()
    }
}

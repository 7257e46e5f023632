//! Transport layer abstraction.
//!
//! The server pulls datagrams from an [`AgentTransport`]; each datagram comes
//! with a [`ReplySink`] that sends the answer back to its source. Provides
//! [`UdpTransport`] for real sockets and, for tests, `MockTransport`.

mod udp;

#[cfg(any(test, feature = "testing"))]
mod mock;

pub use udp::*;

#[cfg(any(test, feature = "testing"))]
pub use mock::*;

use std::future::Future;
use std::net::SocketAddr;

use bytes::Bytes;

use crate::error::Result;

/// Where the reply to one datagram goes.
pub trait ReplySink: Send + 'static {
    /// Address the datagram came from.
    fn source(&self) -> SocketAddr;

    /// Send the reply. Consumes the sink: one datagram, at most one reply.
    fn send(self, data: Bytes) -> impl Future<Output = Result<()>> + Send;
}

/// Agent-side transport (listener mode).
pub trait AgentTransport: Send + Sync + 'static {
    type Reply: ReplySink;

    /// Wait for the next datagram.
    ///
    /// Returns [`Error::TransportClosed`](crate::Error::TransportClosed) once
    /// [`close`](Self::close) has been called.
    fn recv(&self) -> impl Future<Output = Result<(Bytes, Self::Reply)>> + Send;

    /// Stop receiving. Replies already in flight may still be sent.
    fn close(&self);

    /// Local bind address.
    fn local_addr(&self) -> SocketAddr;
}

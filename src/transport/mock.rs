//! In-memory transport for tests.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;

use super::{AgentTransport, ReplySink};
use crate::error::{Error, Result};

/// Transport fed by [`inject`](Self::inject) whose replies are read back
/// with [`next_reply`](Self::next_reply).
#[derive(Clone)]
pub struct MockTransport {
    inner: Arc<MockInner>,
}

struct MockInner {
    local_addr: SocketAddr,
    incoming_tx: mpsc::UnboundedSender<(Bytes, SocketAddr)>,
    incoming_rx: Mutex<mpsc::UnboundedReceiver<(Bytes, SocketAddr)>>,
    replies_tx: mpsc::UnboundedSender<(SocketAddr, Bytes)>,
    replies_rx: Mutex<mpsc::UnboundedReceiver<(SocketAddr, Bytes)>>,
    closed: CancellationToken,
}

impl MockTransport {
    pub fn new() -> Self {
        let (incoming_tx, incoming_rx) = mpsc::unbounded_channel();
        let (replies_tx, replies_rx) = mpsc::unbounded_channel();
        Self {
            inner: Arc::new(MockInner {
                local_addr: SocketAddr::from(([127, 0, 0, 1], 161)),
                incoming_tx,
                incoming_rx: Mutex::new(incoming_rx),
                replies_tx,
                replies_rx: Mutex::new(replies_rx),
                closed: CancellationToken::new(),
            }),
        }
    }

    /// Queue a datagram as if it arrived from `source`.
    pub fn inject(&self, data: impl Into<Bytes>, source: SocketAddr) {
        // The receiver lives as long as `inner`, so this cannot fail.
        let _ = self.inner.incoming_tx.send((data.into(), source));
    }

    /// Next reply sent through this transport, with its destination.
    pub async fn next_reply(&self) -> Option<(SocketAddr, Bytes)> {
        self.inner.replies_rx.lock().await.recv().await
    }

    /// A reply that has already been sent, without waiting.
    pub fn try_reply(&self) -> Option<(SocketAddr, Bytes)> {
        self.inner.replies_rx.try_lock().ok()?.try_recv().ok()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentTransport for MockTransport {
    type Reply = MockReply;

    async fn recv(&self) -> Result<(Bytes, MockReply)> {
        let mut incoming = tokio::select! {
            _ = self.inner.closed.cancelled() => return Err(Error::TransportClosed),
            guard = self.inner.incoming_rx.lock() => guard,
        };
        let received = tokio::select! {
            _ = self.inner.closed.cancelled() => None,
            received = incoming.recv() => received,
        };
        let (data, source) = received.ok_or(Error::TransportClosed)?;
        Ok((
            data,
            MockReply {
                source,
                replies: self.inner.replies_tx.clone(),
            },
        ))
    }

    fn close(&self) {
        self.inner.closed.cancel();
    }

    fn local_addr(&self) -> SocketAddr {
        self.inner.local_addr
    }
}

/// Reply sink of [`MockTransport`].
pub struct MockReply {
    source: SocketAddr,
    replies: mpsc::UnboundedSender<(SocketAddr, Bytes)>,
}

impl ReplySink for MockReply {
    fn source(&self) -> SocketAddr {
        self.source
    }

    async fn send(self, data: Bytes) -> Result<()> {
        self.replies
            .send((self.source, data))
            .map_err(|_| Error::TransportClosed)
    }
}

//! Serving loop.
//!
//! [`Server::serve`] receives datagrams from an [`AgentTransport`] and queues
//! them for a pool of workers. Each worker answers one datagram at a time
//! through [`Agent::respond`] and sends the reply back through the datagram's
//! [`ReplySink`](crate::transport::ReplySink).
//!
//! ```rust,no_run
//! use async_snmp_agent::agent::{Agent, Scope};
//! use async_snmp_agent::server::Server;
//! use async_snmp_agent::transport::UdpTransport;
//!
//! # async fn example() -> async_snmp_agent::Result<()> {
//! let agent = Agent::builder()
//!     .scope(Scope::builder().routing_key("public"))
//!     .prepare()?;
//! let transport = UdpTransport::bind("[::]:1161").await?;
//!
//! let server = Server::builder()
//!     .workers(4)
//!     .on_fault(|fault| eprintln!("{}", fault))
//!     .build(agent, transport)?;
//! server.serve().await?;
//! # Ok(())
//! # }
//! ```

mod pool;

pub use pool::WorkerFault;

use std::sync::Arc;

use tokio::sync::mpsc;

use crate::agent::Agent;
use crate::error::{ConfigErrorKind, Error, Result};
use crate::transport::AgentTransport;

use pool::{Job, WorkerPool};

/// Default depth of the job queue.
pub const DEFAULT_QUEUE_DEPTH: usize = 1024;

type FaultCallback = Arc<dyn Fn(&WorkerFault) + Send + Sync>;

/// An agent bound to a transport.
pub struct Server<T> {
    agent: Agent,
    transport: T,
    workers: usize,
    queue_depth: usize,
    on_fault: Option<FaultCallback>,
}

impl Server<()> {
    pub fn builder() -> ServerBuilder {
        ServerBuilder::new()
    }
}

impl<T: AgentTransport> Server<T> {
    pub fn agent(&self) -> &Agent {
        &self.agent
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Serve until the transport is closed.
    ///
    /// Datagrams already queued when the transport closes are still
    /// answered; returns once every worker has finished.
    pub async fn serve(self) -> Result<()> {
        let (jobs_tx, jobs_rx) = mpsc::channel(self.queue_depth);
        let (faults_tx, mut faults_rx) = mpsc::unbounded_channel();
        let pool = WorkerPool::spawn(self.workers, self.agent.clone(), jobs_rx, faults_tx);

        tracing::info!(
            snmp.local_addr = %self.transport.local_addr(),
            snmp.workers = self.workers,
            snmp.queue_depth = self.queue_depth,
            "agent serving"
        );

        loop {
            tokio::select! {
                Some(fault) = faults_rx.recv() => self.report(&fault),
                received = self.transport.recv() => match received {
                    Ok((data, reply)) => {
                        if jobs_tx.send(Job { data, reply }).await.is_err() {
                            tracing::error!("all workers have exited");
                            break;
                        }
                    }
                    Err(Error::TransportClosed) => break,
                    Err(e) => tracing::error!(error = %e, "transport receive error"),
                },
            }
        }

        drop(jobs_tx);
        while let Some(fault) = faults_rx.recv().await {
            self.report(&fault);
        }
        pool.join().await;
        tracing::info!(snmp.local_addr = %self.transport.local_addr(), "agent stopped");
        Ok(())
    }

    fn report(&self, fault: &WorkerFault) {
        tracing::error!(
            snmp.worker = fault.worker,
            snmp.source = %fault.source,
            snmp.error = %fault.message,
            "worker fault"
        );
        if let Some(callback) = &self.on_fault {
            callback(fault);
        }
    }
}

/// Builder for [`Server`].
#[must_use]
pub struct ServerBuilder {
    workers: Option<usize>,
    queue_depth: usize,
    on_fault: Option<FaultCallback>,
}

impl ServerBuilder {
    pub fn new() -> Self {
        Self {
            workers: None,
            queue_depth: DEFAULT_QUEUE_DEPTH,
            on_fault: None,
        }
    }

    /// Number of worker tasks (default: available parallelism).
    pub fn workers(mut self, count: usize) -> Self {
        self.workers = Some(count);
        self
    }

    /// Datagrams that may wait for a worker before receiving pauses
    /// (default: 1024).
    pub fn queue_depth(mut self, depth: usize) -> Self {
        self.queue_depth = depth;
        self
    }

    /// Called for every worker fault, after it is logged.
    pub fn on_fault<F>(mut self, callback: F) -> Self
    where
        F: Fn(&WorkerFault) + Send + Sync + 'static,
    {
        self.on_fault = Some(Arc::new(callback));
        self
    }

    pub fn build<T: AgentTransport>(self, agent: Agent, transport: T) -> Result<Server<T>> {
        let workers = self.workers.unwrap_or_else(default_workers);
        if workers == 0 {
            return Err(Error::config(ConfigErrorKind::ZeroCapacity("worker count")));
        }
        if self.queue_depth == 0 {
            return Err(Error::config(ConfigErrorKind::ZeroCapacity("queue depth")));
        }
        Ok(Server {
            agent,
            transport,
            workers,
            queue_depth: self.queue_depth,
            on_fault: self.on_fault,
        })
    }
}

impl Default for ServerBuilder {
    fn default() -> Self {
        Self::new()
    }
}

fn default_workers() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4)
}

#[cfg(test)]
mod tests {
    use std::net::SocketAddr;
    use std::sync::Mutex;

    use bytes::Bytes;

    use super::*;
    use crate::agent::Scope;
    use crate::codec::{BerCodec, Codec};
    use crate::handler::VariableControl;
    use crate::message::Message;
    use crate::oid;
    use crate::pdu::{Pdu, PduType};
    use crate::transport::MockTransport;
    use crate::value::{Value, ValueType};
    use crate::varbind::VarBind;
    use crate::version::Version;

    fn agent() -> Agent {
        Agent::builder()
            .scope(
                Scope::builder().variable(
                    VariableControl::builder(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0), ValueType::OctetString)
                        .constant(Value::OctetString("mock".into()))
                        .build(),
                ),
            )
            .prepare()
            .unwrap()
    }

    fn get_request(request_id: i32) -> Bytes {
        let msg = Message::community(
            Version::V2c,
            "public",
            Pdu::new(
                PduType::GetRequest,
                request_id,
                vec![VarBind::null(oid!(1, 3, 6, 1, 2, 1, 1, 5, 0))],
            ),
        );
        BerCodec.encode(&msg, None).unwrap()
    }

    #[test]
    fn test_zero_capacity_rejected() {
        let err = Server::builder()
            .workers(0)
            .build(agent(), MockTransport::new())
            .err()
            .unwrap();
        assert!(matches!(
            err,
            Error::Config {
                kind: ConfigErrorKind::ZeroCapacity(_)
            }
        ));
        assert!(
            Server::builder()
                .queue_depth(0)
                .build(agent(), MockTransport::new())
                .is_err()
        );
    }

    #[tokio::test]
    async fn test_serve_answers_and_stops_on_close() {
        let transport = MockTransport::new();
        let server = Server::builder()
            .workers(2)
            .build(agent(), transport.clone())
            .unwrap();
        let task = tokio::spawn(server.serve());

        let manager: SocketAddr = "198.51.100.4:40001".parse().unwrap();
        for id in 1..=3 {
            transport.inject(get_request(id), manager);
        }
        transport.inject(Bytes::from_static(b"not snmp"), manager);

        let mut ids = Vec::new();
        for _ in 0..3 {
            let (to, data) = transport.next_reply().await.unwrap();
            assert_eq!(to, manager);
            ids.push(BerCodec.decode(&data, None).unwrap().pdu.request_id);
        }
        ids.sort();
        assert_eq!(ids, [1, 2, 3]);

        transport.close();
        task.await.unwrap().unwrap();
        assert!(transport.try_reply().is_none());
    }

    struct Exploding;

    impl Codec for Exploding {
        fn decode(
            &self,
            _data: &Bytes,
            _user: Option<&crate::v3::UsmUser>,
        ) -> crate::codec::DecodeResult {
            panic!("codec blew up")
        }

        fn encode(&self, _message: &Message, _user: Option<&crate::v3::UsmUser>) -> Result<Bytes> {
            unreachable!()
        }
    }

    #[tokio::test]
    async fn test_worker_fault_is_reported() {
        let agent = Agent::builder()
            .scope(Scope::builder())
            .codec(Exploding)
            .prepare()
            .unwrap();
        let transport = MockTransport::new();
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = seen.clone();
        let server = Server::builder()
            .workers(1)
            .on_fault(move |fault| sink.lock().unwrap().push(fault.message.clone()))
            .build(agent, transport.clone())
            .unwrap();
        let task = tokio::spawn(server.serve());

        let manager: SocketAddr = "198.51.100.4:40002".parse().unwrap();
        transport.inject(get_request(9), manager);
        transport.inject(get_request(10), manager);

        // Both faults must arrive; the worker survives the first.
        for _ in 0..200 {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        transport.close();
        task.await.unwrap().unwrap();
        assert_eq!(*seen.lock().unwrap(), vec!["codec blew up"; 2]);
    }
}

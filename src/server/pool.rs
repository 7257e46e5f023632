//! Worker pool: a bounded job queue drained by a fixed number of tasks.

use std::net::SocketAddr;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinSet;

use crate::agent::Agent;
use crate::handler::panic_message;
use crate::transport::ReplySink;

/// A datagram waiting for a worker.
pub(super) struct Job<R> {
    pub(super) data: Bytes,
    pub(super) reply: R,
}

/// A request whose processing panicked outside the variable callbacks.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerFault {
    /// Worker that caught the fault.
    pub worker: usize,
    /// Source of the datagram being processed.
    pub source: SocketAddr,
    /// Panic message.
    pub message: String,
}

impl std::fmt::Display for WorkerFault {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "worker {} failed on request from {}: {}",
            self.worker, self.source, self.message
        )
    }
}

pub(super) struct WorkerPool {
    workers: JoinSet<()>,
}

impl WorkerPool {
    /// Start `count` workers sharing `jobs`. Each fault is sent on `faults`.
    pub(super) fn spawn<R: ReplySink>(
        count: usize,
        agent: Agent,
        jobs: mpsc::Receiver<Job<R>>,
        faults: mpsc::UnboundedSender<WorkerFault>,
    ) -> Self {
        let jobs = Arc::new(Mutex::new(jobs));
        let mut workers = JoinSet::new();
        for id in 0..count {
            workers.spawn(run_worker(id, agent.clone(), jobs.clone(), faults.clone()));
        }
        Self { workers }
    }

    /// Wait for every worker to finish its last job.
    pub(super) async fn join(mut self) {
        while let Some(result) = self.workers.join_next().await {
            if let Err(e) = result {
                tracing::error!(error = %e, "worker task ended abnormally");
            }
        }
    }
}

async fn run_worker<R: ReplySink>(
    id: usize,
    agent: Agent,
    jobs: Arc<Mutex<mpsc::Receiver<Job<R>>>>,
    faults: mpsc::UnboundedSender<WorkerFault>,
) {
    loop {
        let job = jobs.lock().await.recv().await;
        let Some(Job { data, reply }) = job else {
            tracing::trace!(snmp.worker = id, "job queue closed, worker exiting");
            return;
        };
        let source = reply.source();

        // Callbacks are synchronous and may block.
        let responder = agent.clone();
        let outcome =
            tokio::task::spawn_blocking(move || responder.respond(&data, source)).await;

        match outcome {
            Ok(Ok(Some(bytes))) => {
                if let Err(e) = reply.send(bytes).await {
                    tracing::warn!(snmp.source = %source, error = %e, "failed to send reply");
                }
            }
            Ok(Ok(None)) => {}
            Ok(Err(e)) => {
                tracing::debug!(snmp.source = %source, snmp.error = %e, "request dropped");
            }
            Err(join_error) => {
                let message = if join_error.is_panic() {
                    panic_message(join_error.into_panic().as_ref())
                } else {
                    join_error.to_string()
                };
                // The receiver outlives every worker.
                let _ = faults.send(WorkerFault {
                    worker: id,
                    source,
                    message,
                });
            }
        }
    }
}

//! Queue-driven composition root.

#![allow(clippy::disallowed_types, reason = "Locks are never held across await points")]

use std::sync::{Arc, Mutex};

use sealpost_core::{DirectoryCache, DirectoryStore, Environment, MessageError};
use tokio::{
    sync::{Semaphore, mpsc, oneshot},
    task::JoinHandle,
};
use tracing::{debug, info, warn};

use crate::{
    collaborators::Collaborators,
    config::OrchestratorConfig,
    error::EnqueueError,
    job::{IncomingJob, IncomingMessage, OutgoingJob, ReceiveOutcome, SendResult},
    sync::{DirectoryRefresher, SyncReport},
    worker::Worker,
};

struct JobSenders {
    outgoing: mpsc::Sender<OutgoingJob>,
    incoming: mpsc::Sender<IncomingJob>,
}

/// Transport orchestrator.
///
/// Owns two bounded queues and a pool of `max_workers` permits shared by
/// both. A dispatcher per queue takes a permit, then spawns the job, so at
/// most `max_workers` jobs run at once and a job holds its permit until it
/// completes. Jobs for different peers run in parallel. Jobs for the same
/// peer are serialized only around session transitions.
///
/// Jobs are never retried or cancelled once dequeued.
pub struct Orchestrator<S: DirectoryStore, E: Environment> {
    senders: Mutex<Option<JobSenders>>,
    dispatchers: Mutex<Vec<JoinHandle<()>>>,
    permits: Arc<Semaphore>,
    max_workers: usize,
    cache: DirectoryCache<S, E>,
    refresher: DirectoryRefresher<S, E>,
}

impl<S: DirectoryStore, E: Environment> Orchestrator<S, E> {
    /// Start the dispatchers on the current tokio runtime.
    ///
    /// # Panics
    ///
    /// Panics if called outside a tokio runtime.
    pub fn start(
        config: OrchestratorConfig,
        cache: DirectoryCache<S, E>,
        collaborators: Collaborators,
        env: E,
    ) -> Self {
        let (outgoing, outgoing_rx) = mpsc::channel(config.queue_capacity);
        let (incoming, incoming_rx) = mpsc::channel(config.queue_capacity);
        let permits = Arc::new(Semaphore::new(config.max_workers));

        let refresher = DirectoryRefresher::new(
            config.local_address.clone(),
            cache.clone(),
            Arc::clone(&collaborators.directory),
        );
        let worker = Arc::new(Worker {
            local: config.local_address,
            cache: cache.clone(),
            collaborators,
            env,
        });

        let dispatchers = vec![
            tokio::spawn(dispatch_outgoing(outgoing_rx, Arc::clone(&worker), Arc::clone(&permits))),
            tokio::spawn(dispatch_incoming(incoming_rx, worker, Arc::clone(&permits))),
        ];

        info!(
            max_workers = config.max_workers,
            queue_capacity = config.queue_capacity,
            "orchestrator started"
        );

        Self {
            senders: Mutex::new(Some(JobSenders { outgoing, incoming })),
            dispatchers: Mutex::new(dispatchers),
            permits,
            max_workers: config.max_workers,
            cache,
            refresher,
        }
    }

    /// Queue a send of `parts` (concatenated in order) to `destination`.
    ///
    /// The receiver resolves exactly once with the job's result. Waits if
    /// the queue is full.
    pub async fn enqueue_outgoing(
        &self,
        destination: impl Into<String>,
        parts: Vec<String>,
    ) -> Result<oneshot::Receiver<SendResult>, EnqueueError> {
        let sender = self.sender(|senders| senders.outgoing.clone())?;
        let (completion, receiver) = oneshot::channel();

        sender
            .send(OutgoingJob { destination: destination.into(), parts, completion })
            .await
            .map_err(|_| EnqueueError::Closed)?;
        Ok(receiver)
    }

    /// Queue an inbound message. The receiver may be dropped.
    pub async fn enqueue_incoming(
        &self,
        message: IncomingMessage,
    ) -> Result<oneshot::Receiver<ReceiveOutcome>, EnqueueError> {
        let sender = self.sender(|senders| senders.incoming.clone())?;
        let (completion, receiver) = oneshot::channel();

        sender.send(IncomingJob { message, completion }).await.map_err(|_| EnqueueError::Closed)?;
        Ok(receiver)
    }

    /// Refresh the directory from the remote service for `contacts`. Runs on
    /// the caller's task, not the pool.
    pub async fn refresh_directory(
        &self,
        contacts: Vec<String>,
    ) -> Result<SyncReport, MessageError> {
        self.refresher.refresh(contacts).await
    }

    /// The directory cache shared by every job.
    pub fn directory(&self) -> &DirectoryCache<S, E> {
        &self.cache
    }

    /// Stop accepting jobs, let queued jobs dispatch, and wait for every
    /// in-flight job to finish.
    pub async fn shutdown(&self) {
        #[allow(clippy::expect_used)]
        drop(self.senders.lock().expect("Mutex poisoned").take());

        #[allow(clippy::expect_used)]
        let dispatchers = std::mem::take(&mut *self.dispatchers.lock().expect("Mutex poisoned"));
        for handle in dispatchers {
            if let Err(error) = handle.await {
                warn!(%error, "dispatcher task failed");
            }
        }

        // Every job has been spawned and holds a permit until it finishes.
        let _drained = self.permits.acquire_many(self.max_workers as u32).await;
        info!("orchestrator shut down");
    }

    fn sender<T>(&self, pick: impl FnOnce(&JobSenders) -> T) -> Result<T, EnqueueError> {
        #[allow(clippy::expect_used)]
        let senders = self.senders.lock().expect("Mutex poisoned");
        senders.as_ref().map(pick).ok_or(EnqueueError::Closed)
    }
}

async fn dispatch_outgoing<S: DirectoryStore, E: Environment>(
    mut jobs: mpsc::Receiver<OutgoingJob>,
    worker: Arc<Worker<S, E>>,
    permits: Arc<Semaphore>,
) {
    while let Some(job) = jobs.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else { break };
        let worker = Arc::clone(&worker);

        tokio::spawn(async move {
            let result = worker.send(&job.destination, job.parts).await;
            match &result {
                Ok(receipt) => info!(
                    destination = %receipt.destination,
                    wire_type = ?receipt.wire_type,
                    "message sent"
                ),
                Err(error) => warn!(destination = %job.destination, %error, "send aborted"),
            }
            if job.completion.send(result).is_err() {
                debug!("send completion dropped by caller");
            }
            drop(permit);
        });
    }
}

async fn dispatch_incoming<S: DirectoryStore, E: Environment>(
    mut jobs: mpsc::Receiver<IncomingJob>,
    worker: Arc<Worker<S, E>>,
    permits: Arc<Semaphore>,
) {
    while let Some(job) = jobs.recv().await {
        let Ok(permit) = Arc::clone(&permits).acquire_owned().await else { break };
        let worker = Arc::clone(&worker);

        tokio::spawn(async move {
            let outcome = worker.receive(job.message).await;
            let _ = job.completion.send(outcome);
            drop(permit);
        });
    }
}

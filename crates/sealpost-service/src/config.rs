//! Orchestrator configuration.

use sealpost_core::Address;

/// Default size of the shared worker pool.
pub const DEFAULT_MAX_WORKERS: usize = 8;

/// Default capacity of each job queue.
pub const DEFAULT_QUEUE_CAPACITY: usize = 64;

/// Orchestrator configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrchestratorConfig {
    /// This device's own number. National destinations are resolved against
    /// its country code.
    pub local_address: Address,
    /// Jobs running at once, across both queues
    pub max_workers: usize,
    /// Capacity of each queue. Enqueue waits when a queue is full.
    pub queue_capacity: usize,
}

impl OrchestratorConfig {
    /// Defaults for `local_address`.
    pub fn new(local_address: Address) -> Self {
        Self {
            local_address,
            max_workers: DEFAULT_MAX_WORKERS,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
        }
    }

    /// Set the worker pool size. Clamped to at least one.
    #[must_use]
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Set the per-queue capacity. Clamped to at least one.
    #[must_use]
    pub fn with_queue_capacity(mut self, queue_capacity: usize) -> Self {
        self.queue_capacity = queue_capacity.max(1);
        self
    }
}

use thiserror::Error;

/// Errors returned by the orchestrator's enqueue entry points.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnqueueError {
    /// The orchestrator has been shut down and accepts no further jobs.
    #[error("orchestrator is shut down")]
    Closed,
}

//! Sealpost transport orchestrator.
//!
//! Drains two job queues (outbound sends, inbound receives) on a bounded
//! worker pool. Each job consults the [`DirectoryCache`] for routing, asks the
//! [`SessionTrustResolver`] for the wire message or plaintext, and talks to
//! the network through the collaborator traits in [`collaborators`].
//!
//! # Components
//!
//! - [`Orchestrator`]: composition root owning the queues and the pool
//! - [`DirectoryRefresher`]: contact discovery against the remote directory
//! - [`SystemEnv`]: production clock
//!
//! [`DirectoryCache`]: sealpost_core::DirectoryCache
//! [`SessionTrustResolver`]: sealpost_core::SessionTrustResolver

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod collaborators;
mod config;
mod error;
pub mod job;
mod orchestrator;
mod sync;
mod system_env;
mod worker;

pub use collaborators::{
    AttachmentStore, Collaborators, DeliverySink, DirectoryService, Network, QuarantineStore,
    TokenLookup,
};
pub use config::{DEFAULT_MAX_WORKERS, DEFAULT_QUEUE_CAPACITY, OrchestratorConfig};
pub use error::EnqueueError;
pub use job::{
    DeliveredMessage, IncomingMessage, ReceiveOutcome, SendReceipt, SendResult, StoredAttachment,
};
pub use orchestrator::Orchestrator;
pub use sync::{DirectoryRefresher, SyncReport};
pub use system_env::SystemEnv;

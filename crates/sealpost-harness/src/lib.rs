//! Deterministic simulation harness for Sealpost.
//!
//! In-process implementations of every external collaborator the
//! orchestrator drives. A [`SimNetwork`] is the shared world: accounts,
//! published prekeys, attachment blobs and a log of every message sent. Each
//! [`SimDevice`] is one phone wired to that world with its own directory,
//! identity, session cipher and sinks.
//!
//! Everything is seeded, so a scenario replays identically.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod attachments;
pub mod cipher;
pub mod device;
pub mod network;
pub mod sim_env;
pub mod sinks;

pub use attachments::{SimAttachmentStore, seal_attachment};
pub use cipher::SimCipher;
pub use device::{SimDevice, identity_from_seed};
pub use network::{SentMessage, SimEndpoint, SimNetwork};
pub use sim_env::SimEnv;
pub use sinks::{MemoryQuarantine, RecordingSink};

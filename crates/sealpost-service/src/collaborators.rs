//! External boundaries the orchestrator drives.
//!
//! Everything that performs I/O or owns durable state outside the directory
//! lives behind one of these traits. Implementations are shared between
//! concurrently running jobs, so every trait is `Send + Sync` and takes
//! `&self`.

use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use sealpost_core::{
    Address, CipherError, NetworkError, SessionTrustResolver, StorageError, TokenResult,
};
use sealpost_proto::{RelayId, WireMessage};

use crate::job::{DeliveredMessage, IncomingMessage};

/// Result of a bulk directory lookup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TokenLookup {
    /// Addresses registered on the secure channel
    pub active: Vec<TokenResult>,
    /// Addresses known not to be registered
    pub inactive: Vec<Address>,
}

/// Remote directory lookup service.
#[async_trait]
pub trait DirectoryService: Send + Sync {
    /// Look up one address. `None` means the address is not registered.
    async fn fetch_token(&self, address: &Address) -> Result<Option<TokenResult>, NetworkError>;

    /// Classify many addresses at once.
    async fn bulk_fetch_tokens(&self, addresses: &[Address]) -> Result<TokenLookup, NetworkError>;
}

/// Push network.
#[async_trait]
pub trait Network: Send + Sync {
    /// Deliver `message` to `destination`, through `message.relay` if set.
    async fn send(&self, destination: &Address, message: &WireMessage) -> Result<(), NetworkError>;

    /// Download attachment ciphertext into a transient file and return its
    /// path. The caller removes the file.
    async fn retrieve_attachment(
        &self,
        id: u64,
        relay: Option<&RelayId>,
    ) -> Result<PathBuf, NetworkError>;
}

/// Attachment decryption and plaintext storage.
pub trait AttachmentStore: Send + Sync {
    /// Decrypt attachment ciphertext with its per-attachment key.
    fn decrypt(&self, ciphertext: &[u8], key: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Persist plaintext and return a reference the host can resolve.
    fn store(&self, plaintext: &[u8], content_type: &str) -> Result<String, StorageError>;
}

/// Receives successfully decrypted messages.
#[async_trait]
pub trait DeliverySink: Send + Sync {
    /// Hand a decrypted message to the host.
    async fn deliver(&self, message: DeliveredMessage);
}

/// Pending-approval store for messages whose sender identity changed.
pub trait QuarantineStore: Send + Sync {
    /// Persist the raw message until the user approves or discards it.
    fn quarantine(&self, message: &IncomingMessage) -> Result<(), StorageError>;

    /// Alert the user that a message awaits approval.
    fn notify(&self);
}

/// Everything a job needs besides the directory.
#[derive(Clone)]
pub struct Collaborators {
    /// Session and trust decisions
    pub resolver: SessionTrustResolver,
    /// Remote directory lookups
    pub directory: Arc<dyn DirectoryService>,
    /// Push network
    pub network: Arc<dyn Network>,
    /// Attachment decryption and storage
    pub attachments: Arc<dyn AttachmentStore>,
    /// Delivery sink
    pub sink: Arc<dyn DeliverySink>,
    /// Quarantine store
    pub quarantine: Arc<dyn QuarantineStore>,
}

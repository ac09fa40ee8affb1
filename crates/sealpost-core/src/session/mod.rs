//! Session trust decisions.
//!
//! Session key material, the ratchet and identity storage belong to external
//! collaborators. The resolver only sees the per-peer [`SessionState`] and a
//! trust verdict, and decides which wire message to produce or which decrypt
//! path to take.

mod locks;
mod resolver;
mod trust;

use async_trait::async_trait;
pub use locks::PeerLocks;
pub use resolver::SessionTrustResolver;
use sealpost_proto::{IdentityKey, PreKeyBundle, PreKeyBundleEnvelope};
use thiserror::Error;
pub use trust::TofuTrustStore;

use crate::{address::Address, error::NetworkError};

/// Observable session state for one peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionState {
    /// No session material at all
    None,
    /// Session established locally from the peer's prekey bundle, not yet
    /// confirmed by a reply
    Bundle,
    /// Confirmed session
    Standard,
}

/// Failures reported by the session cipher.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CipherError {
    /// No session exists for the peer
    #[error("no session for {0}")]
    NoSession(Address),

    /// Encryption failed
    #[error("encrypt failed: {0}")]
    Encrypt(String),

    /// Decryption failed (bad MAC, replay, truncated input)
    #[error("decrypt failed: {0}")]
    Decrypt(String),

    /// Prekey bundle or envelope could not be turned into a session
    #[error("invalid bundle: {0}")]
    InvalidBundle(String),
}

/// Cipher primitives over per-peer sessions.
///
/// Implementations own session storage and use interior mutability. Calls
/// for one peer are serialized by the resolver.
pub trait SessionCipher: Send + Sync {
    /// This device's identity public key.
    fn local_identity(&self) -> IdentityKey;

    /// Current session state for `peer`.
    fn session_state(&self, peer: &Address) -> SessionState;

    /// Start a session from a fetched prekey bundle.
    ///
    /// Post: `session_state(peer) == SessionState::Bundle`
    fn establish_outbound(&self, peer: &Address, bundle: &PreKeyBundle) -> Result<(), CipherError>;

    /// Accept a session the peer started.
    ///
    /// Post: `session_state(peer) == SessionState::Standard`
    fn establish_inbound(
        &self,
        peer: &Address,
        envelope: &PreKeyBundleEnvelope,
    ) -> Result<(), CipherError>;

    /// Encrypt with the existing session.
    fn encrypt(&self, peer: &Address, plaintext: &[u8]) -> Result<Vec<u8>, CipherError>;

    /// Decrypt with the existing session.
    fn decrypt(&self, peer: &Address, ciphertext: &[u8]) -> Result<Vec<u8>, CipherError>;
}

/// Persistent peer identity pins.
pub trait IdentityTrustStore: Send + Sync {
    /// Whether `key` is acceptable for `peer`.
    fn is_trusted(&self, peer: &Address, key: &IdentityKey) -> bool;

    /// Record `key` as seen for `peer` after a session was committed.
    fn save_identity(&self, peer: &Address, key: &IdentityKey);
}

/// Remote prekey retrieval.
#[async_trait]
pub trait PreKeyService: Send + Sync {
    /// Fetch the published prekey bundle for `peer`.
    async fn fetch_prekey_bundle(&self, peer: &Address) -> Result<PreKeyBundle, NetworkError>;
}

//! Sealpost core.
//!
//! Decides whether a message to a given address can travel over the secure
//! push channel, and if so, which wire message to produce.
//!
//! # Components
//!
//! - [`DirectoryCache`]: which addresses are registered on the secure channel,
//!   through which relay, and whether they accept SMS fallback. Backed by a
//!   transactional [`DirectoryStore`].
//! - [`SessionTrustResolver`]: picks the outbound wire type from the peer's
//!   session state and enforces trust-on-first-use on inbound identity claims.
//! - [`Address`]: canonical E.164 recipient identifier.
//!
//! Cryptography, key storage and the network are external collaborators
//! reached through the traits in [`session`]. This crate never performs
//! network I/O itself except through [`PreKeyService`].

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod address;
pub mod directory;
pub mod env;
pub mod error;
pub mod session;
pub mod storage;

pub use address::{Address, AddressError};
pub use directory::{DirectoryCache, DirectoryEntry, TokenResult};
pub use env::Environment;
pub use error::{MessageError, NetworkError};
pub use session::{
    CipherError, IdentityTrustStore, PeerLocks, PreKeyService, SessionCipher, SessionState,
    SessionTrustResolver, TofuTrustStore,
};
pub use storage::{
    ChaoticDirectoryStore, DirectoryStore, DirectoryTxn, MemoryDirectoryStore, RedbDirectoryStore,
    StorageError,
};

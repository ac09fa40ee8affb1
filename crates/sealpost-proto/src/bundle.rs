//! Prekey material published by a peer.

use serde::{Deserialize, Serialize};

use crate::identity::IdentityKey;

/// One-time key-exchange material fetched from the key server.
///
/// Lets a sender establish a session with a peer that has never contacted
/// us. The trust layer only looks at `identity_key`; the remaining fields are
/// handed to the session cipher unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyBundle {
    /// Peer's long-term identity key.
    pub identity_key: IdentityKey,
    /// Peer's registration ID.
    pub registration_id: u32,
    /// ID of the one-time prekey below.
    pub prekey_id: u32,
    /// One-time prekey public bytes.
    pub prekey: Vec<u8>,
}

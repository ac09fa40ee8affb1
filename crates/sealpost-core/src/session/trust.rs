#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use sealpost_proto::IdentityKey;
use tracing::info;

use super::IdentityTrustStore;
use crate::address::Address;

/// Trust-on-first-use identity store.
///
/// The first key seen for a peer is pinned. A different key is rejected
/// until the user approves it with [`TofuTrustStore::approve_identity`].
#[derive(Clone, Default)]
pub struct TofuTrustStore {
    pins: Arc<Mutex<HashMap<Address, IdentityKey>>>,
}

impl TofuTrustStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Pinned key for `peer`, if any.
    pub fn pinned(&self, peer: &Address) -> Option<IdentityKey> {
        #[allow(clippy::expect_used)]
        self.pins.lock().expect("Mutex poisoned").get(peer).copied()
    }

    /// Replace the pin for `peer`. Explicit user action.
    pub fn approve_identity(&self, peer: &Address, key: IdentityKey) {
        #[allow(clippy::expect_used)]
        let previous = self.pins.lock().expect("Mutex poisoned").insert(peer.clone(), key);
        info!(
            %peer,
            fingerprint = %key.fingerprint(),
            repinned = previous.is_some(),
            "identity approved"
        );
    }
}

impl IdentityTrustStore for TofuTrustStore {
    fn is_trusted(&self, peer: &Address, key: &IdentityKey) -> bool {
        self.pinned(peer).is_none_or(|pinned| pinned == *key)
    }

    fn save_identity(&self, peer: &Address, key: &IdentityKey) {
        #[allow(clippy::expect_used)]
        self.pins.lock().expect("Mutex poisoned").entry(peer.clone()).or_insert(*key);
    }
}

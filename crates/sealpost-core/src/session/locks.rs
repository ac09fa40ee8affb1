#![allow(clippy::disallowed_types, reason = "Short critical section over the lock table")]

use std::{
    collections::HashMap,
    sync::{Arc, Mutex},
};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

use crate::address::Address;

/// Keyed exclusion over peers.
///
/// Holding the guard for a peer serializes session transitions for that peer
/// only. Unrelated peers never contend. Idle slots are pruned on the next
/// acquisition.
#[derive(Clone, Default)]
pub struct PeerLocks {
    slots: Arc<Mutex<HashMap<Address, Arc<AsyncMutex<()>>>>>,
}

impl PeerLocks {
    /// Create an empty lock table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `peer`.
    pub async fn lock(&self, peer: &Address) -> OwnedMutexGuard<()> {
        let slot = {
            #[allow(clippy::expect_used)]
            let mut slots = self.slots.lock().expect("Mutex poisoned");
            slots.retain(|_, slot| Arc::strong_count(slot) > 1);
            Arc::clone(slots.entry(peer.clone()).or_default())
        };
        slot.lock_owned().await
    }

    /// Number of peers with a held or awaited lock.
    pub fn active(&self) -> usize {
        #[allow(clippy::expect_used)]
        let slots = self.slots.lock().expect("Mutex poisoned");
        slots.values().filter(|slot| Arc::strong_count(slot) > 1).count()
    }
}

//! Directory cache: who is reachable over the secure channel.

mod cache;

pub use cache::DirectoryCache;
use sealpost_proto::RelayId;
use serde::{Deserialize, Serialize};

use crate::address::Address;

/// One directory row.
///
/// # Invariants
///
/// - `registered == false` implies `relay.is_none()` after a sync
/// - Rows are always replaced whole, never field-by-field
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DirectoryEntry {
    /// Canonical address this row describes
    pub address: Address,
    /// Whether the address is registered on the secure channel
    pub registered: bool,
    /// Federation relay to route through, `None` for the home server
    pub relay: Option<RelayId>,
    /// Whether the peer accepts plain SMS as a fallback
    pub supports_sms: bool,
    /// Wall clock time of the write, in milliseconds since the Unix epoch
    pub last_synced_ms: u64,
}

/// Result of a remote directory lookup for one registered address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenResult {
    /// Address the token resolved to
    pub address: Address,
    /// Relay hosting the account
    pub relay: Option<RelayId>,
    /// Whether the account accepts SMS fallback
    pub supports_sms: bool,
}

impl TokenResult {
    /// Token for an account on the home server.
    pub fn new(address: Address, relay: Option<RelayId>, supports_sms: bool) -> Self {
        Self { address, relay, supports_sms }
    }
}

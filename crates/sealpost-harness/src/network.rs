//! Simulated push network, directory service and prekey server.

#![allow(clippy::disallowed_types, reason = "Synchronous in-memory operations only")]

use std::{
    collections::HashMap,
    io::Write,
    path::PathBuf,
    sync::{Arc, Mutex, MutexGuard},
};

use async_trait::async_trait;
use sealpost_core::{Address, NetworkError, PreKeyService, TokenResult};
use sealpost_proto::{IdentityKey, PreKeyBundle, RelayId, WireMessage};
use sealpost_service::{DirectoryService, IncomingMessage, Network, TokenLookup};
use tracing::trace;

/// A message recorded by the network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    /// Sending device
    pub source: Address,
    /// Destination device
    pub destination: Address,
    /// Message as sent
    pub message: WireMessage,
}

impl SentMessage {
    /// The message as its destination receives it.
    pub fn into_incoming(self) -> IncomingMessage {
        IncomingMessage {
            source: self.source,
            destinations: vec![self.destination],
            message: self.message,
        }
    }
}

struct Account {
    identity: IdentityKey,
    relay: Option<RelayId>,
    supports_sms: bool,
    registration_id: u32,
}

#[derive(Default)]
struct NetworkState {
    accounts: HashMap<Address, Account>,
    sent: Vec<SentMessage>,
    attachments: HashMap<u64, Vec<u8>>,
    retrieved_paths: Vec<PathBuf>,
    next_attachment_id: u64,
    next_registration_id: u32,
    fail_sends: bool,
    fail_lookups: bool,
    prekey_fetches: usize,
    token_lookups: usize,
}

/// The shared simulated world. Clones share state.
#[derive(Clone, Default)]
pub struct SimNetwork {
    state: Arc<Mutex<NetworkState>>,
}

impl SimNetwork {
    /// Empty network.
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, NetworkState> {
        #[allow(clippy::expect_used)]
        self.state.lock().expect("Mutex poisoned")
    }

    /// Register (or re-register) an account.
    pub fn register(
        &self,
        address: &Address,
        identity: IdentityKey,
        relay: Option<RelayId>,
        supports_sms: bool,
    ) {
        let mut state = self.state();
        state.next_registration_id += 1;
        let registration_id = state.next_registration_id;
        let account = Account { identity, relay, supports_sms, registration_id };
        state.accounts.insert(address.clone(), account);
    }

    /// Remove an account.
    pub fn unregister(&self, address: &Address) {
        self.state().accounts.remove(address);
    }

    /// Publish a new identity for an existing account, as after a reinstall.
    pub fn rotate_identity(&self, address: &Address, identity: IdentityKey) {
        if let Some(account) = self.state().accounts.get_mut(address) {
            account.identity = identity;
        }
    }

    /// Connection for the device at `local`.
    pub fn endpoint(&self, local: Address) -> SimEndpoint {
        SimEndpoint { network: self.clone(), local }
    }

    /// Every message sent so far.
    pub fn sent(&self) -> Vec<SentMessage> {
        self.state().sent.clone()
    }

    /// Remove and return messages addressed to `destination`.
    pub fn take_sent_to(&self, destination: &Address) -> Vec<SentMessage> {
        let mut state = self.state();
        let (taken, kept): (Vec<_>, Vec<_>) = std::mem::take(&mut state.sent)
            .into_iter()
            .partition(|sent| &sent.destination == destination);
        state.sent = kept;
        taken
    }

    /// Upload attachment ciphertext and return its id.
    pub fn publish_attachment(&self, ciphertext: Vec<u8>) -> u64 {
        let mut state = self.state();
        state.next_attachment_id += 1;
        let id = state.next_attachment_id;
        state.attachments.insert(id, ciphertext);
        id
    }

    /// Every transient file handed out by `retrieve_attachment`, in order.
    pub fn retrieved_attachment_paths(&self) -> Vec<PathBuf> {
        self.state().retrieved_paths.clone()
    }

    /// Make every send fail with a network error.
    pub fn set_fail_sends(&self, fail: bool) {
        self.state().fail_sends = fail;
    }

    /// Make every directory lookup fail with a network error.
    pub fn set_fail_lookups(&self, fail: bool) {
        self.state().fail_lookups = fail;
    }

    /// Number of prekey bundles served.
    pub fn prekey_fetches(&self) -> usize {
        self.state().prekey_fetches
    }

    /// Number of directory lookups served (single and bulk).
    pub fn token_lookups(&self) -> usize {
        self.state().token_lookups
    }

    fn token(address: &Address, account: &Account) -> TokenResult {
        TokenResult::new(address.clone(), account.relay.clone(), account.supports_sms)
    }
}

/// One device's view of the [`SimNetwork`].
#[derive(Clone)]
pub struct SimEndpoint {
    network: SimNetwork,
    local: Address,
}

#[async_trait]
impl DirectoryService for SimEndpoint {
    async fn fetch_token(&self, address: &Address) -> Result<Option<TokenResult>, NetworkError> {
        let mut state = self.network.state();
        state.token_lookups += 1;
        if state.fail_lookups {
            return Err(NetworkError::new("simulated directory outage"));
        }
        Ok(state.accounts.get(address).map(|account| SimNetwork::token(address, account)))
    }

    async fn bulk_fetch_tokens(&self, addresses: &[Address]) -> Result<TokenLookup, NetworkError> {
        let mut state = self.network.state();
        state.token_lookups += 1;
        if state.fail_lookups {
            return Err(NetworkError::new("simulated directory outage"));
        }

        let mut lookup = TokenLookup::default();
        for address in addresses {
            match state.accounts.get(address) {
                Some(account) => lookup.active.push(SimNetwork::token(address, account)),
                None => lookup.inactive.push(address.clone()),
            }
        }
        Ok(lookup)
    }
}

#[async_trait]
impl PreKeyService for SimEndpoint {
    async fn fetch_prekey_bundle(&self, peer: &Address) -> Result<PreKeyBundle, NetworkError> {
        // Give concurrent jobs a chance to interleave.
        tokio::task::yield_now().await;

        let mut state = self.network.state();
        state.prekey_fetches += 1;
        let account = state
            .accounts
            .get(peer)
            .ok_or_else(|| NetworkError::new(format!("no prekeys published for {peer}")))?;

        Ok(PreKeyBundle {
            identity_key: account.identity,
            registration_id: account.registration_id,
            prekey_id: state.prekey_fetches as u32,
            prekey: account.identity.as_bytes().to_vec(),
        })
    }
}

#[async_trait]
impl Network for SimEndpoint {
    async fn send(&self, destination: &Address, message: &WireMessage) -> Result<(), NetworkError> {
        let mut state = self.network.state();
        if state.fail_sends {
            return Err(NetworkError::new("simulated send failure"));
        }
        if !state.accounts.contains_key(destination) {
            return Err(NetworkError::new(format!("{destination} is not registered")));
        }

        trace!(source = %self.local, %destination, kind = message.kind, "sim send");
        state.sent.push(SentMessage {
            source: self.local.clone(),
            destination: destination.clone(),
            message: message.clone(),
        });
        Ok(())
    }

    async fn retrieve_attachment(
        &self,
        id: u64,
        _relay: Option<&RelayId>,
    ) -> Result<PathBuf, NetworkError> {
        let blob = self
            .network
            .state()
            .attachments
            .get(&id)
            .cloned()
            .ok_or_else(|| NetworkError::new(format!("attachment {id} not found")))?;

        let mut file =
            tempfile::NamedTempFile::new().map_err(|e| NetworkError::new(e.to_string()))?;
        file.write_all(&blob).map_err(|e| NetworkError::new(e.to_string()))?;
        let (_, path) = file.keep().map_err(|e| NetworkError::new(e.to_string()))?;
        self.network.state().retrieved_paths.push(path.clone());
        Ok(path)
    }
}

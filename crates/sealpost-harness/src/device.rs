//! One simulated phone.

use std::sync::Arc;

use rand::{RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use sealpost_core::{
    Address, DirectoryCache, MemoryDirectoryStore, SessionTrustResolver, TofuTrustStore,
};
use sealpost_proto::IdentityKey;
use sealpost_service::{
    Collaborators, EnqueueError, Orchestrator, OrchestratorConfig, ReceiveOutcome, SendResult,
};
use tracing::warn;

use crate::{
    attachments::SimAttachmentStore,
    cipher::SimCipher,
    network::SimNetwork,
    sim_env::SimEnv,
    sinks::{MemoryQuarantine, RecordingSink},
};

/// A device wired to a [`SimNetwork`], with every collaborator exposed for
/// inspection.
pub struct SimDevice {
    /// This device's number
    pub address: Address,
    /// Identity derived from the seed
    pub identity: IdentityKey,
    /// Shared world
    pub network: SimNetwork,
    /// Shared clock
    pub env: SimEnv,
    /// Identity pins
    pub trust: TofuTrustStore,
    /// Session cipher
    pub cipher: Arc<SimCipher>,
    /// Delivered messages
    pub sink: RecordingSink,
    /// Quarantined messages
    pub quarantine: MemoryQuarantine,
    /// Stored attachments
    pub attachments: SimAttachmentStore,
    /// Directory rows
    pub store: MemoryDirectoryStore,
    /// The orchestrator under test
    pub orchestrator: Orchestrator<MemoryDirectoryStore, SimEnv>,
}

/// Identity key for `seed`.
pub fn identity_from_seed(seed: u64) -> IdentityKey {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut bytes = [0u8; 32];
    rng.fill_bytes(&mut bytes);
    IdentityKey::new(bytes)
}

impl SimDevice {
    /// Register `address` on `network` and start its orchestrator with
    /// default configuration.
    ///
    /// Must be called inside a tokio runtime.
    pub fn start(network: &SimNetwork, address: Address, seed: u64, env: SimEnv) -> Self {
        Self::start_with(network, OrchestratorConfig::new(address), seed, env)
    }

    /// As [`SimDevice::start`] with an explicit configuration.
    pub fn start_with(
        network: &SimNetwork,
        config: OrchestratorConfig,
        seed: u64,
        env: SimEnv,
    ) -> Self {
        let address = config.local_address.clone();
        let identity = identity_from_seed(seed);
        network.register(&address, identity, None, true);

        let endpoint = Arc::new(network.endpoint(address.clone()));
        let trust = TofuTrustStore::new();
        let cipher = Arc::new(SimCipher::new(identity));
        let sink = RecordingSink::new();
        let quarantine = MemoryQuarantine::new();
        let attachments = SimAttachmentStore::new();
        let store = MemoryDirectoryStore::new();

        let resolver =
            SessionTrustResolver::new(cipher.clone(), Arc::new(trust.clone()), endpoint.clone());
        let collaborators = Collaborators {
            resolver,
            directory: endpoint.clone(),
            network: endpoint,
            attachments: Arc::new(attachments.clone()),
            sink: Arc::new(sink.clone()),
            quarantine: Arc::new(quarantine.clone()),
        };

        let cache = DirectoryCache::new(store.clone(), env.clone());
        let orchestrator = Orchestrator::start(config, cache, collaborators, env.clone());

        Self {
            address,
            identity,
            network: network.clone(),
            env,
            trust,
            cipher,
            sink,
            quarantine,
            attachments,
            store,
            orchestrator,
        }
    }

    /// Send `text` to `destination` and wait for the job to finish.
    pub async fn send_text(
        &self,
        destination: &str,
        text: &str,
    ) -> Result<SendResult, EnqueueError> {
        let receiver =
            self.orchestrator.enqueue_outgoing(destination, vec![text.to_string()]).await?;
        receiver.await.map_err(|_| EnqueueError::Closed)
    }

    /// Pull every message addressed to this device off the network, run
    /// each through the inbound queue and wait for the outcomes.
    pub async fn receive_all(&self) -> Result<Vec<ReceiveOutcome>, EnqueueError> {
        let mut receivers = Vec::new();
        for sent in self.network.take_sent_to(&self.address) {
            receivers.push(self.orchestrator.enqueue_incoming(sent.into_incoming()).await?);
        }

        let mut outcomes = Vec::with_capacity(receivers.len());
        for receiver in receivers {
            match receiver.await {
                Ok(outcome) => outcomes.push(outcome),
                Err(_) => warn!(device = %self.address, "receive job ended without an outcome"),
            }
        }
        Ok(outcomes)
    }
}

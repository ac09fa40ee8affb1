//! Concurrency properties of the worker pool.
//!
//! - Concurrent first sends to one peer establish exactly one session
//! - Unrelated peers proceed in parallel on a small pool
//! - Shutdown waits for every in-flight job

use sealpost_core::{Address, SessionCipher, SessionState};
use sealpost_harness::{SimDevice, SimEnv, SimNetwork};
use sealpost_proto::WireType;
use sealpost_service::{OrchestratorConfig, ReceiveOutcome};
use tokio::sync::oneshot;

fn addr(raw: &str) -> Address {
    Address::new(raw).unwrap()
}

const ALICE: &str = "+15550000001";
const BOB: &str = "+15550000002";

async fn join_all<T>(receivers: Vec<oneshot::Receiver<T>>) -> Vec<T> {
    let mut results = Vec::with_capacity(receivers.len());
    for receiver in receivers {
        results.push(receiver.await.unwrap());
    }
    results
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_first_sends_fetch_one_prekey_bundle() {
    let network = SimNetwork::new();
    let alice = SimDevice::start(&network, addr(ALICE), 1, SimEnv::default());
    let bob = SimDevice::start(&network, addr(BOB), 2, SimEnv::default());

    let mut receivers = Vec::new();
    for i in 0..16 {
        let receiver =
            alice.orchestrator.enqueue_outgoing(BOB, vec![format!("burst {i}")]).await.unwrap();
        receivers.push(receiver);
    }
    let results = join_all(receivers).await;

    assert!(
        results
            .iter()
            .all(|r| matches!(r, Ok(receipt) if receipt.wire_type == WireType::PreKeyBundle))
    );
    assert_eq!(network.prekey_fetches(), 1);
    assert_eq!(alice.cipher.session_state(&bob.address), SessionState::Bundle);

    let outcomes = bob.receive_all().await.unwrap();
    assert_eq!(outcomes.len(), 16);
    assert!(outcomes.iter().all(|o| matches!(o, ReceiveOutcome::Delivered { .. })));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_peers_complete_on_a_small_pool() {
    let network = SimNetwork::new();
    let config = OrchestratorConfig::new(addr(ALICE)).with_max_workers(2).with_queue_capacity(4);
    let alice = SimDevice::start_with(&network, config, 1, SimEnv::default());

    let peers: Vec<SimDevice> = (0..8)
        .map(|i| {
            SimDevice::start(&network, addr(&format!("+1555100{i:04}")), 100 + i, SimEnv::default())
        })
        .collect();

    let mut receivers = Vec::new();
    for peer in &peers {
        let receiver = alice
            .orchestrator
            .enqueue_outgoing(peer.address.to_string(), vec!["hi".into()])
            .await
            .unwrap();
        receivers.push(receiver);
    }
    let results = join_all(receivers).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(network.prekey_fetches(), peers.len());
    for peer in &peers {
        assert_eq!(peer.receive_all().await.unwrap().len(), 1);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn shutdown_waits_for_in_flight_jobs() {
    let network = SimNetwork::new();
    let alice = SimDevice::start(&network, addr(ALICE), 1, SimEnv::default());
    let _bob = SimDevice::start(&network, addr(BOB), 2, SimEnv::default());

    let mut receivers = Vec::new();
    for i in 0..10 {
        let receiver =
            alice.orchestrator.enqueue_outgoing(BOB, vec![format!("{i}")]).await.unwrap();
        receivers.push(receiver);
    }
    alice.orchestrator.shutdown().await;

    assert_eq!(network.sent().len(), 10);
    let results = join_all(receivers).await;
    assert!(results.iter().all(Result::is_ok));
}

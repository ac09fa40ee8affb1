//! Directory refresh against the simulated directory service.

use sealpost_core::{Address, MessageError, TokenResult};
use sealpost_harness::{SimDevice, SimEnv, SimNetwork};
use sealpost_proto::RelayId;
use sealpost_service::SyncReport;

fn addr(raw: &str) -> Address {
    Address::new(raw).unwrap()
}

const ALICE: &str = "+15550000001";
const BOB: &str = "+15550000002";

#[tokio::test]
async fn refresh_classifies_contacts() {
    let network = SimNetwork::new();
    let alice = SimDevice::start(&network, addr(ALICE), 1, SimEnv::at(3_000));
    let bob = SimDevice::start(&network, addr(BOB), 2, SimEnv::at(3_000));

    let report = alice
        .orchestrator
        .refresh_directory(vec![
            "(555) 000-0002".into(),
            "+44 7700 900123".into(),
            "call me".into(),
        ])
        .await
        .unwrap();

    assert_eq!(report, SyncReport { active: 1, inactive: 1 });
    let directory = alice.orchestrator.directory();
    assert_eq!(directory.is_active(&bob.address), Ok(true));
    assert_eq!(directory.is_active(&addr("+447700900123")), Ok(false));
    assert!(directory.supports_sms_fallback(&bob.address).unwrap());
    assert_eq!(directory.entry(&bob.address).unwrap().unwrap().last_synced_ms, 3_000);
    assert_eq!(network.token_lookups(), 1);
}

#[tokio::test]
async fn refresh_rechecks_cached_addresses() {
    let network = SimNetwork::new();
    let alice = SimDevice::start(&network, addr(ALICE), 1, SimEnv::default());
    let bob = SimDevice::start(&network, addr(BOB), 2, SimEnv::default());
    alice.orchestrator.refresh_directory(vec![BOB.into()]).await.unwrap();

    network.unregister(&bob.address);
    let report = alice.orchestrator.refresh_directory(Vec::new()).await.unwrap();

    assert_eq!(report, SyncReport { active: 0, inactive: 1 });
    assert_eq!(alice.orchestrator.directory().is_active(&bob.address), Ok(false));
    assert_eq!(alice.orchestrator.directory().relay_for(&bob.address).unwrap(), None);
}

#[tokio::test]
async fn refresh_failure_leaves_directory_unchanged() {
    let network = SimNetwork::new();
    let alice = SimDevice::start(&network, addr(ALICE), 1, SimEnv::default());
    let bob = SimDevice::start(&network, addr(BOB), 2, SimEnv::default());
    alice.orchestrator.refresh_directory(vec![BOB.into()]).await.unwrap();
    let before = alice.orchestrator.directory().entry(&bob.address).unwrap();

    network.set_fail_lookups(true);
    let result = alice.orchestrator.refresh_directory(vec!["+15550000003".into()]).await;

    assert!(matches!(result, Err(MessageError::TransportFailure(_))));
    assert_eq!(alice.orchestrator.directory().entry(&bob.address).unwrap(), before);
    assert_eq!(alice.orchestrator.directory().entry(&addr("+15550000003")).unwrap(), None);
}

#[tokio::test]
async fn synced_relay_routes_later_sends() {
    let network = SimNetwork::new();
    let alice = SimDevice::start(&network, addr(ALICE), 1, SimEnv::default());
    let bob = SimDevice::start(&network, addr(BOB), 2, SimEnv::default());
    network.register(&bob.address, bob.identity, Some(RelayId::new("relay-b")), true);

    alice.orchestrator.refresh_directory(vec![BOB.into()]).await.unwrap();
    let lookups = network.token_lookups();
    let receipt = alice.send_text(BOB, "routed").await.unwrap().unwrap();

    assert_eq!(receipt.relay, Some(RelayId::new("relay-b")));
    assert_eq!(network.token_lookups(), lookups);
}

#[test]
fn bulk_sync_scenario() {
    let store = sealpost_core::MemoryDirectoryStore::new();
    let cache = sealpost_core::DirectoryCache::new(store, SimEnv::at(9));
    let active = addr("+15551234567");
    let inactive = addr("+17771234567");

    cache.bulk_sync(&[TokenResult::new(active.clone(), None, true)], &[inactive.clone()]).unwrap();

    assert_eq!(cache.is_active(&active), Ok(true));
    assert_eq!(cache.is_active(&inactive), Ok(false));
}

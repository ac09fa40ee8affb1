//! Fuzz target for the directory cache under storage failures
//!
//! # Strategy
//!
//! - Random failure rates (0% to 90%) with a fuzzer-chosen seed
//! - Interleaved single-row updates and bulk syncs
//!
//! # Invariants
//!
//! - Storage errors propagate as `Err`, never panics
//! - A failed operation leaves the underlying rows exactly as they were
//! - A successful bulk sync leaves every listed address in its requested state

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealpost_core::{
    Address, ChaoticDirectoryStore, DirectoryCache, DirectoryStore, MemoryDirectoryStore,
    TokenResult,
};
use sealpost_harness::SimEnv;

#[derive(Debug, Arbitrary)]
struct Scenario {
    chaos_seed: u64,
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Arbitrary)]
enum Operation {
    SetRegistration { peer: u8, registered: bool },
    BulkSync { active: Vec<u8>, inactive: Vec<u8> },
}

fn address(peer: u8) -> Address {
    Address::new(&format!("+1555000{:04}", peer % 16)).expect("valid test number")
}

fuzz_target!(|scenario: Scenario| {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let inner = MemoryDirectoryStore::new();
    let store = ChaoticDirectoryStore::with_seed(inner.clone(), failure_rate, scenario.chaos_seed);
    let cache = DirectoryCache::new(store, SimEnv::default());

    for operation in scenario.operations.into_iter().take(64) {
        let before = inner.list().expect("memory store never fails");

        let result = match &operation {
            Operation::SetRegistration { peer, registered } => {
                cache.set_registration(&address(*peer), None, *registered).map_err(|_| ())
            }
            Operation::BulkSync { active, inactive } => {
                let tokens: Vec<TokenResult> = active
                    .iter()
                    .map(|peer| TokenResult::new(address(*peer), None, true))
                    .collect();
                let inactive: Vec<Address> = inactive.iter().map(|peer| address(*peer)).collect();
                cache.bulk_sync(&tokens, &inactive).map_err(|_| ())
            }
        };

        if result.is_err() {
            assert_eq!(inner.list().expect("memory store never fails"), before);
            continue;
        }

        if let Operation::BulkSync { active, inactive } = &operation {
            for peer in inactive {
                let entry = inner.load(&address(*peer)).expect("memory store never fails");
                assert_eq!(entry.map(|e| e.registered), Some(false));
            }
            let survivors =
                active.iter().filter(|peer| !inactive.iter().any(|i| i % 16 == *peer % 16));
            for peer in survivors {
                let entry = inner.load(&address(*peer)).expect("memory store never fails");
                assert_eq!(entry.map(|e| e.registered), Some(true));
            }
        }
    }
});

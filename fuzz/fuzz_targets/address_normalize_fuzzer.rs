//! Fuzz target for contact number canonicalization
//!
//! # Invariants
//!
//! - NEVER panic on arbitrary user-entered text
//! - Output is `+` followed by 7 to 15 ASCII digits
//! - Canonical output is a fixed point: normalizing it again is a no-op

#![no_main]

use libfuzzer_sys::fuzz_target;
use sealpost_core::Address;

fuzz_target!(|raw: &str| {
    let local = Address::new("+15550000001").expect("valid local number");

    if let Ok(address) = Address::normalize(raw, &local) {
        let digits = address.digits();
        assert!((7..=15).contains(&digits.len()));
        assert!(digits.chars().all(|c| c.is_ascii_digit()));

        let again =
            Address::normalize(address.as_str(), &local).expect("canonical form must normalize");
        assert_eq!(address, again);
    }
});

//! Fuzz target for inbound decoding
//!
//! Every byte string a peer controls passes through one of these decoders
//! before any session state is touched.
//!
//! # Invariants
//!
//! - NEVER panic on malformed input
//! - A decoded wire message re-encodes to bytes that decode to the same value
//! - Unknown wire kinds surface as errors from `wire_type`, not from decode

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use sealpost_proto::{MessageContent, PreKeyBundleEnvelope, WireMessage};

#[derive(Debug, Arbitrary)]
enum Input {
    Wire(Vec<u8>),
    Envelope(Vec<u8>),
    Content(Vec<u8>),
}

fuzz_target!(|input: Input| {
    match input {
        Input::Wire(bytes) => {
            if let Ok(message) = WireMessage::decode(&bytes) {
                let _ = message.wire_type();
                let encoded = message.encode().expect("decoded message must re-encode");
                let again = WireMessage::decode(&encoded).expect("re-encoded message must decode");
                assert_eq!(message, again);
            }
        }
        Input::Envelope(bytes) => {
            let _ = PreKeyBundleEnvelope::decode(&bytes);
        }
        Input::Content(bytes) => {
            let _ = MessageContent::decode(&bytes);
        }
    }
});

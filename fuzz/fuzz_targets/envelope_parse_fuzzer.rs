//! Fuzz target for envelope JSON parsing
//!
//! Feeds arbitrary bytes to `Envelope::from_json` and exercises every
//! operation on whatever parses.
//!
//! # Invariants
//!
//! - Parsing NEVER panics; invalid input is an `Err`
//! - A parsed envelope re-serializes to JSON that parses to the same envelope
//! - Opening with an unrelated key never succeeds
//! - Removing a listed recipient succeeds and drops all of its entries

#![no_main]

use friendseal_envelope::{Algorithm, Envelope, SecretKey};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(json) = std::str::from_utf8(data) else {
        return;
    };
    let Ok(envelope) = Envelope::from_json(json) else {
        return;
    };

    // INVARIANT 1: stable re-serialization
    let encoded = envelope.to_json().expect("parsed envelope must serialize");
    let reparsed = Envelope::from_json(&encoded).expect("serialized envelope must parse");
    assert_eq!(envelope, reparsed, "re-serialization must be lossless");

    // INVARIANT 2: unrelated key opens nothing
    let outsider = SecretKey::from_seed(envelope.algorithm, [0x42; 32]);
    for address in envelope.recipients() {
        assert!(envelope.open(address, &outsider).is_err(), "unrelated key must not open");
    }

    // INVARIANT 3: wrong-family key rejected
    let other = match envelope.algorithm {
        Algorithm::Classical => Algorithm::Hybrid,
        Algorithm::Hybrid => Algorithm::Classical,
    };
    if let Some(address) = envelope.recipients().next() {
        let wrong = SecretKey::from_seed(other, [0x42; 32]);
        assert!(envelope.open(address, &wrong).is_err(), "wrong family must not open");
    }

    // INVARIANT 4: remove drops every entry for the address
    if let Some(address) = envelope.recipients().next().map(str::to_string) {
        let mut trimmed = envelope.clone();
        if trimmed.remove_recipient(&address).is_ok() {
            assert!(!trimmed.has_recipient(&address), "removed address must be gone");
        }
    }
});

//! Fuzz target for persisted session records
//!
//! Session records are read back from storage that may have been truncated or
//! tampered with. Decoding is plain CBOR, so this target feeds arbitrary
//! bytes straight into `SessionRecord::decode`.
//!
//! # Invariants
//!
//! - Decoding NEVER panics; invalid input is an `Err`
//! - A decoded record re-encodes, and the re-encoding decodes again
//! - Every decoded group snapshot can be restored into a session

#![no_main]

use friendseal_crypto::{GroupSession, RatchetConfig, RatchetSession, SenderKeyConfig};
use friendseal_session::record::SessionRecord;
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    let Ok(record) = SessionRecord::decode(data) else {
        return;
    };

    let encoded = record.encode().expect("decoded record must encode");
    let again = SessionRecord::decode(&encoded).expect("encoded record must decode");
    assert_eq!(record.pairwise.len(), again.pairwise.len());
    assert_eq!(record.groups.len(), again.groups.len());

    for pairwise in record.pairwise.values() {
        let _ = RatchetSession::restore(&pairwise.state, RatchetConfig::default());
    }
    for group in record.groups.values() {
        let _ = GroupSession::restore(group, SenderKeyConfig::default());
    }
});

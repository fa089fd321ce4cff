//! Fuzz target for Sender Keys group sessions
//!
//! One member sends to another over a lossy, reordering network while
//! rotating its key and while the receiver snapshots and restores its state.
//!
//! # Strategy
//!
//! - Arbitrary interleaving of send, deliver, corrupt, rotate and restart
//! - Delivery in any order, with drops and replays
//! - Corruption of any byte of ciphertext, nonce or MAC
//!
//! # Invariants
//!
//! - No operation panics
//! - A message that decrypts yields exactly the plaintext that was sent
//! - A message of the current key at or past the receiver's chain position,
//!   within the skip window, always decrypts
//! - Replays and corrupted messages are rejected
//! - Snapshot and restore preserve the receiver's ability to decrypt

#![no_main]

use arbitrary::Arbitrary;
use friendseal_crypto::{GroupSession, SenderKeyConfig, SenderKeyMessage};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const GROUP: &str = "fuzz-market";

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Send { len: u8 },
    Deliver { index: u8 },
    Corrupt { index: u8, position: u16 },
    Rotate,
    Restart,
}

struct InFlight {
    message: SenderKeyMessage,
    plaintext: Vec<u8>,
    generation: u32,
    delivered: bool,
}

fn corrupt(message: &SenderKeyMessage, position: u16) -> SenderKeyMessage {
    let mut corrupted = message.clone();
    let total = corrupted.ciphertext.len() + corrupted.nonce.len() + corrupted.mac.len();
    let mut index = position as usize % total;

    if index < corrupted.ciphertext.len() {
        corrupted.ciphertext[index] ^= 0x01;
        return corrupted;
    }
    index -= corrupted.ciphertext.len();
    if index < corrupted.nonce.len() {
        corrupted.nonce[index] ^= 0x01;
        return corrupted;
    }
    index -= corrupted.nonce.len();
    corrupted.mac[index] ^= 0x01;
    corrupted
}

fuzz_target!(|scenario: Scenario| {
    let mut rng = ChaCha20Rng::seed_from_u64(scenario.seed);
    let config = SenderKeyConfig { max_skip: 64, max_skipped_keys: 64 };

    let mut alice = GroupSession::initialize(GROUP, "0xa", config, &mut rng);
    let mut bob = GroupSession::initialize(GROUP, "0xb", config, &mut rng);
    bob.process_member_key(&alice.distribution()).expect("fresh distribution must be accepted");

    let mut inbox: Vec<InFlight> = Vec::new();
    let mut generation = 0u32;
    // Next iteration bob's chain for alice's current key will produce
    let mut bob_position = 0u32;

    for (step, operation) in scenario.operations.into_iter().enumerate().take(256) {
        match operation {
            Operation::Send { len } => {
                let plaintext = vec![step as u8; len as usize];
                let message = alice.encrypt(&plaintext, &mut rng).expect("encrypt must succeed");
                inbox.push(InFlight { message, plaintext, generation, delivered: false });
            },

            Operation::Deliver { index } => {
                if inbox.is_empty() {
                    continue;
                }
                let index = index as usize % inbox.len();
                let entry = &mut inbox[index];
                let result = bob.decrypt(&entry.message);

                if entry.delivered {
                    // INVARIANT: replay rejected
                    assert!(result.is_err(), "replayed group message must be rejected");
                    continue;
                }

                let iteration = entry.message.metadata.iteration;
                match result {
                    Ok(plaintext) => {
                        assert_eq!(plaintext, entry.plaintext, "plaintext must round-trip");
                        assert_eq!(entry.generation, generation, "old key must not decrypt");
                        entry.delivered = true;
                        bob_position = bob_position.max(iteration + 1);
                    },
                    Err(e) => {
                        // INVARIANT: current key within the window always decrypts
                        let current = entry.generation == generation;
                        let within_window = iteration >= bob_position
                            && iteration - bob_position <= config.max_skip;
                        assert!(!(current && within_window), "current key rejected: {e}");
                    },
                }
            },

            Operation::Corrupt { index, position } => {
                if inbox.is_empty() {
                    continue;
                }
                let index = index as usize % inbox.len();
                let corrupted = corrupt(&inbox[index].message, position);
                // INVARIANT: corruption rejected
                assert!(bob.decrypt(&corrupted).is_err(), "corrupted message must be rejected");
            },

            Operation::Rotate => {
                let distribution = alice.rotate_key(&mut rng);
                bob.process_member_key(&distribution).expect("rotated key must be accepted");
                generation += 1;
                bob_position = 0;
            },

            Operation::Restart => {
                bob = GroupSession::restore(&bob.snapshot(), config);
            },
        }
    }
});

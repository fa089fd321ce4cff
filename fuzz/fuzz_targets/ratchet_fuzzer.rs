//! Fuzz target for the Double Ratchet under adversarial delivery
//!
//! Two sessions exchange messages while the network drops, reorders,
//! replays and corrupts them.
//!
//! # Strategy
//!
//! - Arbitrary interleaving of sends in both directions
//! - Delivery in any order, with drops (never delivered)
//! - Replays of delivered messages
//! - Single-byte corruption of header, nonce or ciphertext
//!
//! # Invariants
//!
//! - No operation panics
//! - A message that decrypts yields exactly the plaintext that was sent
//! - A message from the current receiving chain always decrypts within the
//!   skip window
//! - Replays and corrupted messages are rejected
//! - A rejected message leaves the receiver's state untouched

#![no_main]

use arbitrary::Arbitrary;
use friendseal_crypto::{KeyPair, RatchetConfig, RatchetError, RatchetMessage, RatchetSession};
use libfuzzer_sys::fuzz_target;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

const AD: &[u8] = b"fuzz associated data";

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    seed: u64,
    shared_secret: [u8; 32],
    responder_secret: [u8; 32],
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Copy, Arbitrary)]
enum Side {
    Initiator,
    Responder,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    Send { from: Side, len: u8 },
    Deliver { to: Side, index: u8 },
    Corrupt { to: Side, index: u8, position: u16 },
}

struct InFlight {
    message: RatchetMessage,
    plaintext: Vec<u8>,
    delivered: bool,
}

struct Peer {
    session: RatchetSession,
    inbox: Vec<InFlight>,
}

fn fingerprint(session: &RatchetSession) -> (u32, u32, usize, bool) {
    (
        session.sending_counter(),
        session.receiving_counter(),
        session.skipped_key_count(),
        session.can_send(),
    )
}

fn corrupt(message: &RatchetMessage, position: u16) -> RatchetMessage {
    let mut bytes = message.to_bytes();
    let index = position as usize % bytes.len();
    bytes[index] ^= 0x01;
    match RatchetMessage::from_bytes(&bytes) {
        Ok(parsed) => parsed,
        Err(_) => message.clone(),
    }
}

fuzz_target!(|scenario: Scenario| {
    let mut rng = ChaCha20Rng::seed_from_u64(scenario.seed);
    let config = RatchetConfig { max_skip: 64, max_skipped_keys: 64 };

    let responder_key = KeyPair::from_secret_bytes(scenario.responder_secret);
    let Ok(initiator) = RatchetSession::init_as_initiator(
        &scenario.shared_secret,
        responder_key.public_key(),
        config,
        &mut rng,
    ) else {
        return;
    };
    let responder =
        RatchetSession::init_as_recipient(&scenario.shared_secret, responder_key, config);

    let mut initiator = Peer { session: initiator, inbox: Vec::new() };
    let mut responder = Peer { session: responder, inbox: Vec::new() };

    for (step, operation) in scenario.operations.into_iter().enumerate().take(256) {
        match operation {
            Operation::Send { from, len } => {
                let (sender, receiver) = match from {
                    Side::Initiator => (&mut initiator, &mut responder),
                    Side::Responder => (&mut responder, &mut initiator),
                };
                let plaintext = vec![step as u8; len as usize];

                match sender.session.encrypt(&plaintext, AD, &mut rng) {
                    Ok(message) => {
                        receiver.inbox.push(InFlight { message, plaintext, delivered: false });
                    },
                    // INVARIANT: only a responder that has heard nothing cannot send
                    Err(RatchetError::NoSendingChain) => assert!(!sender.session.can_send()),
                    Err(e) => panic!("unexpected encrypt error: {e}"),
                }
            },

            Operation::Deliver { to, index } => {
                let receiver = match to {
                    Side::Initiator => &mut initiator,
                    Side::Responder => &mut responder,
                };
                if receiver.inbox.is_empty() {
                    continue;
                }
                let index = index as usize % receiver.inbox.len();
                let before = fingerprint(&receiver.session);
                let entry = &mut receiver.inbox[index];

                let result = receiver.session.decrypt(&entry.message, AD, &mut rng);
                if entry.delivered {
                    // INVARIANT: replay rejected without state change
                    assert!(result.is_err(), "replayed message must be rejected");
                    assert_eq!(before, fingerprint(&receiver.session));
                    continue;
                }

                match result {
                    Ok(plaintext) => {
                        assert_eq!(plaintext, entry.plaintext, "plaintext must round-trip");
                        entry.delivered = true;
                    },
                    Err(e) => {
                        // INVARIANT: current chain within the window always decrypts
                        let header = entry.message.header;
                        let remote = receiver.session.remote_ratchet_key();
                        let current_chain = remote == Some(header.ratchet_public_key);
                        let within_window = header.counter >= before.1
                            && header.counter - before.1 <= config.max_skip;
                        assert!(!(current_chain && within_window), "current chain rejected: {e}");
                        assert_eq!(before, fingerprint(&receiver.session));
                    },
                }
            },

            Operation::Corrupt { to, index, position } => {
                let receiver = match to {
                    Side::Initiator => &mut initiator,
                    Side::Responder => &mut responder,
                };
                if receiver.inbox.is_empty() {
                    continue;
                }
                let index = index as usize % receiver.inbox.len();
                let corrupted = corrupt(&receiver.inbox[index].message, position);
                if corrupted == receiver.inbox[index].message {
                    continue;
                }

                let before = fingerprint(&receiver.session);
                // INVARIANT: corruption rejected without state change
                assert!(receiver.session.decrypt(&corrupted, AD, &mut rng).is_err());
                assert_eq!(before, fingerprint(&receiver.session));
            },
        }
    }
});

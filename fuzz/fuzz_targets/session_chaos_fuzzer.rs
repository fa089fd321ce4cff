//! Fuzz target for `SessionManager` under storage failures
//!
//! Alice's manager writes through a `ChaoticStore` that fails writes at a
//! fuzzer-chosen rate; Bob's store is reliable. Alice may restart at any
//! point, reloading whatever she managed to persist.
//!
//! # Strategy
//!
//! - Variable failure rates (0% to 90%)
//! - Pairwise and group traffic in both directions
//! - Restarts between operations
//!
//! # Invariants
//!
//! - The manager NEVER panics on storage errors
//! - Storage errors surface as `SessionError::Storage`
//! - A restart always loads a readable record
//! - Whatever decrypts yields the plaintext that was sent

#![no_main]

use arbitrary::Arbitrary;
use async_trait::async_trait;
use friendseal_envelope::{Signer, SignerError};
use friendseal_session::{
    ChaoticStore, MemoryStore, SessionConfig, SessionError, SessionManager, X3dhHandshake,
};
use libfuzzer_sys::fuzz_target;

const GROUP: &str = "fuzz-market";

#[derive(Debug, Clone, Arbitrary)]
struct Scenario {
    chaos_seed: u64,
    /// 0-9 maps to 0%-90%
    failure_rate_tenth: u8,
    operations: Vec<Operation>,
}

#[derive(Debug, Clone, Arbitrary)]
enum Operation {
    AliceSend { len: u8 },
    BobSend { len: u8 },
    DeliverToBob { index: u8 },
    DeliverToAlice { index: u8 },
    AliceGroupSend { len: u8 },
    DeliverGroupToBob { index: u8 },
    AliceRotate,
    RestartAlice,
}

struct FixedWallet(&'static str);

#[async_trait]
impl Signer for FixedWallet {
    async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        Ok(format!("{}:{message}", self.0))
    }
}

type ChaoticManager = SessionManager<ChaoticStore<MemoryStore>, X3dhHandshake>;

fn check(result: &Result<impl Sized, SessionError>) {
    if let Err(e) = result {
        assert!(!matches!(e, SessionError::NotInitialized), "manager lost its identity: {e}");
    }
}

async fn start_alice(store: ChaoticStore<MemoryStore>) -> ChaoticManager {
    let alice = SessionManager::new("0xa", store, X3dhHandshake, SessionConfig::default());
    // INVARIANT: restart always loads
    alice.initialize(&FixedWallet("alice")).await.expect("initialize must load the record");
    alice
}

async fn run(scenario: Scenario) {
    let failure_rate = f64::from(scenario.failure_rate_tenth % 10) / 10.0;
    let store = ChaoticStore::with_seed(MemoryStore::new(), failure_rate, scenario.chaos_seed);

    let bob =
        SessionManager::new("0xb", MemoryStore::new(), X3dhHandshake, SessionConfig::default());
    let bob_bundle = bob.initialize(&FixedWallet("bob")).await.expect("bob initializes");
    let mut alice = start_alice(store.clone()).await;

    let mut to_bob = Vec::new();
    let mut to_alice = Vec::new();
    let mut group_to_bob = Vec::new();

    for (step, operation) in scenario.operations.into_iter().enumerate().take(128) {
        let plaintext = |len: u8| vec![step as u8; len as usize];

        match operation {
            Operation::AliceSend { len } => {
                if !alice.has_session("0xb").await {
                    let initial = alice.establish_session("0xb", &bob_bundle).await;
                    check(&initial);
                    let Ok(initial) = initial else { continue };
                    bob.receive_session_establishment("0xa", &initial)
                        .await
                        .expect("bob accepts a fresh session");
                }
                let sent = plaintext(len);
                let result = alice.encrypt_message("0xb", &sent).await;
                check(&result);
                if let Ok(message) = result {
                    to_bob.push((message, sent));
                }
            },

            Operation::BobSend { len } => {
                let sent = plaintext(len);
                if let Ok(message) = bob.encrypt_message("0xa", &sent).await {
                    to_alice.push((message, sent));
                }
            },

            Operation::DeliverToBob { index } => {
                if to_bob.is_empty() {
                    continue;
                }
                let (message, sent) = &to_bob[index as usize % to_bob.len()];
                if let Ok(received) = bob.decrypt_message("0xa", message).await {
                    assert_eq!(&received, sent, "plaintext must round-trip");
                }
            },

            Operation::DeliverToAlice { index } => {
                if to_alice.is_empty() {
                    continue;
                }
                let (message, sent) = &to_alice[index as usize % to_alice.len()];
                let result = alice.decrypt_message("0xb", message).await;
                check(&result);
                if let Ok(received) = result {
                    assert_eq!(&received, sent, "plaintext must round-trip");
                }
            },

            Operation::AliceGroupSend { len } => {
                let joined = alice.join_group(GROUP).await;
                check(&joined);
                let Ok(distribution) = joined else { continue };
                if bob.join_group(GROUP).await.is_ok() {
                    let _ = bob.process_member_key(GROUP, &distribution).await;
                }

                let sent = plaintext(len);
                let result = alice.encrypt_group_message(GROUP, &sent).await;
                check(&result);
                if let Ok(message) = result {
                    group_to_bob.push((message, sent));
                }
            },

            Operation::DeliverGroupToBob { index } => {
                if group_to_bob.is_empty() {
                    continue;
                }
                let (message, sent) = &group_to_bob[index as usize % group_to_bob.len()];
                if let Ok(received) = bob.decrypt_group_message(GROUP, message).await {
                    assert_eq!(&received, sent, "plaintext must round-trip");
                }
            },

            Operation::AliceRotate => {
                let result = alice.rotate_group_key(GROUP).await;
                check(&result);
                if let Ok(distribution) = result {
                    let _ = bob.process_member_key(GROUP, &distribution).await;
                }
            },

            Operation::RestartAlice => {
                alice = start_alice(store.clone()).await;
            },
        }
    }
}

fuzz_target!(|scenario: Scenario| {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .expect("runtime must build");
    runtime.block_on(run(scenario));
});

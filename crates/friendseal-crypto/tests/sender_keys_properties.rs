//! Property-based tests for Sender Keys
//!
//! 1. **Round-trip**: every member decrypts every other member's messages
//! 2. **Ordering**: any delivery order within the skip bound decrypts
//! 3. **Authenticity**: any single-bit change to a message is rejected

use friendseal_crypto::{
    SenderKeyConfig, SenderKeyError, SenderKeyState,
    sender_keys::{MessageKey, SenderChain},
};
use proptest::prelude::*;
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;

fn pair(seed: u64) -> (SenderKeyState, SenderKeyState, ChaCha20Rng) {
    let mut rng = ChaCha20Rng::seed_from_u64(seed);
    let config = SenderKeyConfig::default();
    let sender = SenderKeyState::generate("market-7", "0xalice", config, &mut rng);
    let receiver = SenderKeyState::from_distribution(&sender.create_distribution(), config);
    (sender, receiver, rng)
}

fn key_at(chain_key: [u8; 32], iteration: u32) -> MessageKey {
    let mut chain = SenderChain::new(chain_key, 0);
    let mut key = chain.advance().unwrap();
    while key.iteration() < iteration {
        key = chain.advance().unwrap();
    }
    key
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(50))]

    #[test]
    fn prop_roundtrip(
        seed in any::<u64>(),
        payloads in prop::collection::vec(prop::collection::vec(any::<u8>(), 0..256), 1..10),
    ) {
        let (mut sender, mut receiver, mut rng) = pair(seed);

        for payload in payloads {
            let message = sender.encrypt(&payload, &mut rng).unwrap();
            prop_assert_eq!(receiver.decrypt(&message).unwrap(), payload);
        }
    }

    #[test]
    fn prop_any_order_decrypts(
        seed in any::<u64>(),
        order in Just((0..10usize).collect::<Vec<_>>()).prop_shuffle(),
    ) {
        let (mut sender, mut receiver, mut rng) = pair(seed);

        let messages: Vec<_> = (0..10u8).map(|i| sender.encrypt(&[i], &mut rng).unwrap()).collect();

        for index in order {
            prop_assert_eq!(receiver.decrypt(&messages[index]).unwrap(), vec![index as u8]);
        }
    }

    #[test]
    fn prop_bit_flip_rejected(
        seed in any::<u64>(),
        flip in any::<prop::sample::Index>(),
        bit in 0u8..8,
    ) {
        let (mut sender, mut receiver, mut rng) = pair(seed);

        let mut message = sender.encrypt(b"market terms", &mut rng).unwrap();
        let position = flip.index(message.ciphertext.len());
        message.ciphertext[position] ^= 1 << bit;

        prop_assert_eq!(receiver.decrypt(&message), Err(SenderKeyError::AuthenticationFailed));
        prop_assert_eq!(receiver.iteration(), 0);
    }

    #[test]
    fn prop_keys_unique_across_iterations(
        chain_key in any::<[u8; 32]>(),
        a in 0u32..50,
        b in 0u32..50,
    ) {
        prop_assume!(a != b);
        let key_a = key_at(chain_key, a);
        let key_b = key_at(chain_key, b);
        prop_assert_ne!(key_a.key(), key_b.key());
    }
}

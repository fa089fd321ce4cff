//! Per-sender key state and distribution

use std::collections::VecDeque;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use subtle::ConstantTimeEq;
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    SenderKeyConfig,
    encryption::{self, SenderKeyMessage, SenderKeyMetadata},
    error::SenderKeyError,
    ratchet::{MessageKey, SenderChain},
};
use crate::primitives::aead;

/// What a member sends to the group so others can read its messages.
///
/// Delivered over a pairwise session. Anyone holding it can decrypt the
/// sender's messages from `iteration` onward.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SenderKeyDistribution {
    /// Group the key belongs to
    pub group_id: String,
    /// Member the key belongs to
    pub sender_id: String,
    /// Iteration of the chain key below
    pub iteration: u32,
    /// Chain key at `iteration`
    pub chain_key: [u8; 32],
    /// Key for the per-message sender MAC
    pub signature_key: [u8; 32],
}

impl std::fmt::Debug for SenderKeyDistribution {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderKeyDistribution")
            .field("group_id", &self.group_id)
            .field("sender_id", &self.sender_id)
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}

/// A cached key for an iteration that was ratcheted past.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct SkippedSenderKey {
    /// Iteration the key decrypts
    pub iteration: u32,
    /// The message key
    pub message_key: [u8; 32],
}

/// Serializable snapshot of a [`SenderKeyState`].
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct SenderKeyRecord {
    /// Group id
    pub group_id: String,
    /// Sender id
    pub sender_id: String,
    /// Chain key at `iteration`
    pub chain_key: [u8; 32],
    /// Next iteration
    pub iteration: u32,
    /// Sender MAC key
    pub signature_key: [u8; 32],
    /// Cached skipped keys, oldest first
    pub skipped: Vec<SkippedSenderKey>,
}

impl std::fmt::Debug for SenderKeyRecord {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderKeyRecord")
            .field("group_id", &self.group_id)
            .field("sender_id", &self.sender_id)
            .field("iteration", &self.iteration)
            .finish_non_exhaustive()
    }
}

/// Sender key of one member of one group.
///
/// The local member's own state only encrypts; states built from a
/// [`SenderKeyDistribution`] only decrypt.
#[derive(Clone)]
pub struct SenderKeyState {
    group_id: String,
    sender_id: String,
    chain: SenderChain,
    signature_key: [u8; 32],
    skipped: VecDeque<SkippedSenderKey>,
    config: SenderKeyConfig,
}

impl SenderKeyState {
    /// Fresh random sender key at iteration 0.
    pub fn generate<R: CryptoRng + RngCore>(
        group_id: impl Into<String>,
        sender_id: impl Into<String>,
        config: SenderKeyConfig,
        rng: &mut R,
    ) -> Self {
        let chain_key = aead::random_key(rng);
        let signature_key = aead::random_key(rng);

        Self {
            group_id: group_id.into(),
            sender_id: sender_id.into(),
            chain: SenderChain::new(chain_key, 0),
            signature_key,
            skipped: VecDeque::new(),
            config,
        }
    }

    /// Receiving state for another member's key.
    pub fn from_distribution(
        distribution: &SenderKeyDistribution,
        config: SenderKeyConfig,
    ) -> Self {
        Self {
            group_id: distribution.group_id.clone(),
            sender_id: distribution.sender_id.clone(),
            chain: SenderChain::new(distribution.chain_key, distribution.iteration),
            signature_key: distribution.signature_key,
            skipped: VecDeque::new(),
            config,
        }
    }

    /// Distribution message for the current chain position.
    pub fn create_distribution(&self) -> SenderKeyDistribution {
        SenderKeyDistribution {
            group_id: self.group_id.clone(),
            sender_id: self.sender_id.clone(),
            iteration: self.chain.iteration(),
            chain_key: *self.chain.chain_key(),
            signature_key: self.signature_key,
        }
    }

    /// Group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Sender id.
    pub fn sender_id(&self) -> &str {
        &self.sender_id
    }

    /// Next iteration of the chain.
    pub fn iteration(&self) -> u32 {
        self.chain.iteration()
    }

    /// True if `distribution` describes this chain rather than a rotated one.
    ///
    /// Rotation always draws a fresh signature key, so a matching signature
    /// key identifies the chain.
    pub fn is_same_chain(&self, distribution: &SenderKeyDistribution) -> bool {
        self.signature_key.ct_eq(&distribution.signature_key).into()
    }

    /// Number of cached skipped keys.
    pub fn skipped_key_count(&self) -> usize {
        self.skipped.len()
    }

    /// Encrypt a message at the next iteration.
    ///
    /// # Errors
    ///
    /// - `IterationOverflow`: chain exhausted, rotate the key
    pub fn encrypt<R: CryptoRng + RngCore>(
        &mut self,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<SenderKeyMessage, SenderKeyError> {
        let message_key = self.chain.advance()?;
        let metadata = SenderKeyMetadata {
            sender_id: self.sender_id.clone(),
            group_id: self.group_id.clone(),
            iteration: message_key.iteration(),
        };

        Ok(encryption::encrypt_message(
            plaintext,
            &message_key,
            metadata,
            aead::random_nonce(rng),
            &self.signature_key,
        ))
    }

    /// Verify and decrypt a message from this sender.
    ///
    /// On any error the state is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - `SenderMismatch` / `GroupMismatch`: message routed to the wrong state
    /// - `AuthenticationFailed`: MAC or AEAD tag does not verify
    /// - `IterationTooOld`: key already used or evicted
    /// - `TooManySkipped`: message too far ahead
    pub fn decrypt(&mut self, message: &SenderKeyMessage) -> Result<Vec<u8>, SenderKeyError> {
        let metadata = &message.metadata;
        if metadata.sender_id != self.sender_id {
            return Err(SenderKeyError::SenderMismatch {
                expected: self.sender_id.clone(),
                actual: metadata.sender_id.clone(),
            });
        }
        if metadata.group_id != self.group_id {
            return Err(SenderKeyError::GroupMismatch {
                expected: self.group_id.clone(),
                actual: metadata.group_id.clone(),
            });
        }

        encryption::verify_mac(message, &self.signature_key)?;

        let mut working = self.clone();
        let message_key = working.message_key_for(metadata.iteration)?;
        let plaintext = encryption::decrypt_message(message, &message_key)?;
        *self = working;

        Ok(plaintext)
    }

    fn message_key_for(&mut self, iteration: u32) -> Result<MessageKey, SenderKeyError> {
        let current = self.chain.iteration();

        if iteration < current {
            let position = self
                .skipped
                .iter()
                .position(|s| s.iteration == iteration)
                .ok_or(SenderKeyError::IterationTooOld { iteration, current })?;
            let Some(mut entry) = self.skipped.remove(position) else {
                unreachable!("position was found in the same deque");
            };
            let key = MessageKey::from_parts(entry.message_key, iteration);
            entry.zeroize();
            return Ok(key);
        }

        let requested = iteration - current;
        if requested > self.config.max_skip {
            return Err(SenderKeyError::TooManySkipped { requested, limit: self.config.max_skip });
        }

        while self.chain.iteration() < iteration {
            let skipped = self.chain.advance()?;
            self.skipped.push_back(SkippedSenderKey {
                iteration: skipped.iteration(),
                message_key: *skipped.key(),
            });
            while self.skipped.len() > self.config.max_skipped_keys {
                if let Some(mut evicted) = self.skipped.pop_front() {
                    evicted.zeroize();
                }
            }
        }

        self.chain.advance()
    }

    /// Snapshot for persistence.
    pub fn to_record(&self) -> SenderKeyRecord {
        SenderKeyRecord {
            group_id: self.group_id.clone(),
            sender_id: self.sender_id.clone(),
            chain_key: *self.chain.chain_key(),
            iteration: self.chain.iteration(),
            signature_key: self.signature_key,
            skipped: self.skipped.iter().cloned().collect(),
        }
    }

    /// Rebuild from a snapshot.
    pub fn from_record(record: &SenderKeyRecord, config: SenderKeyConfig) -> Self {
        let mut skipped: VecDeque<SkippedSenderKey> = record.skipped.iter().cloned().collect();
        while skipped.len() > config.max_skipped_keys {
            if let Some(mut evicted) = skipped.pop_front() {
                evicted.zeroize();
            }
        }

        Self {
            group_id: record.group_id.clone(),
            sender_id: record.sender_id.clone(),
            chain: SenderChain::new(record.chain_key, record.iteration),
            signature_key: record.signature_key,
            skipped,
            config,
        }
    }
}

impl Drop for SenderKeyState {
    fn drop(&mut self) {
        self.signature_key.zeroize();
        for entry in &mut self.skipped {
            entry.zeroize();
        }
    }
}

impl std::fmt::Debug for SenderKeyState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SenderKeyState")
            .field("group_id", &self.group_id)
            .field("sender_id", &self.sender_id)
            .field("iteration", &self.chain.iteration())
            .field("skipped", &self.skipped.len())
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn sender_and_receiver(seed: u64) -> (SenderKeyState, SenderKeyState, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let config = SenderKeyConfig::default();
        let sender = SenderKeyState::generate("market-1", "0xalice", config, &mut rng);
        let receiver = SenderKeyState::from_distribution(&sender.create_distribution(), config);
        (sender, receiver, rng)
    }

    #[test]
    fn in_order_delivery() {
        let (mut sender, mut receiver, mut rng) = sender_and_receiver(1);

        for i in 0..5u8 {
            let message = sender.encrypt(&[i], &mut rng).unwrap();
            assert_eq!(message.metadata.iteration, u32::from(i));
            assert_eq!(receiver.decrypt(&message).unwrap(), vec![i]);
        }
        assert_eq!(receiver.skipped_key_count(), 0);
    }

    #[test]
    fn reordered_delivery_zero_two_one() {
        let (mut sender, mut receiver, mut rng) = sender_and_receiver(2);

        let m0 = sender.encrypt(b"zero", &mut rng).unwrap();
        let m1 = sender.encrypt(b"one", &mut rng).unwrap();
        let m2 = sender.encrypt(b"two", &mut rng).unwrap();

        assert_eq!(receiver.decrypt(&m0).unwrap(), b"zero");
        assert_eq!(receiver.decrypt(&m2).unwrap(), b"two");
        assert_eq!(receiver.skipped_key_count(), 1);
        assert_eq!(receiver.decrypt(&m1).unwrap(), b"one");
        assert_eq!(receiver.skipped_key_count(), 0);
    }

    #[test]
    fn replay_is_too_old() {
        let (mut sender, mut receiver, mut rng) = sender_and_receiver(3);

        let message = sender.encrypt(b"once", &mut rng).unwrap();
        receiver.decrypt(&message).unwrap();

        assert_eq!(
            receiver.decrypt(&message),
            Err(SenderKeyError::IterationTooOld { iteration: 0, current: 1 })
        );
    }

    #[test]
    fn wrong_mac_rejected_without_advancing() {
        let (mut sender, mut receiver, mut rng) = sender_and_receiver(4);

        let mut message = sender.encrypt(b"payload", &mut rng).unwrap();
        message.mac[0] ^= 0x01;

        assert_eq!(receiver.decrypt(&message), Err(SenderKeyError::AuthenticationFailed));
        assert_eq!(receiver.iteration(), 0);
    }

    #[test]
    fn forged_far_ahead_message_does_not_advance() {
        let (mut sender, mut receiver, mut rng) = sender_and_receiver(5);

        let mut message = sender.encrypt(b"payload", &mut rng).unwrap();
        message.ciphertext[0] ^= 0x01;

        assert!(receiver.decrypt(&message).is_err());
        assert_eq!(receiver.iteration(), 0);
        assert_eq!(receiver.skipped_key_count(), 0);
    }

    #[test]
    fn skip_bound_enforced() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let config = SenderKeyConfig { max_skip: 2, max_skipped_keys: 10 };
        let mut sender = SenderKeyState::generate("g", "s", config, &mut rng);
        let mut receiver = SenderKeyState::from_distribution(&sender.create_distribution(), config);

        let messages: Vec<_> = (0..4u8).map(|i| sender.encrypt(&[i], &mut rng).unwrap()).collect();

        assert_eq!(
            receiver.decrypt(&messages[3]),
            Err(SenderKeyError::TooManySkipped { requested: 3, limit: 2 })
        );
        assert_eq!(receiver.decrypt(&messages[2]).unwrap(), vec![2]);
    }

    #[test]
    fn skipped_cache_evicts_oldest() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let config = SenderKeyConfig { max_skip: 100, max_skipped_keys: 1 };
        let mut sender = SenderKeyState::generate("g", "s", config, &mut rng);
        let mut receiver = SenderKeyState::from_distribution(&sender.create_distribution(), config);

        let messages: Vec<_> = (0..3u8).map(|i| sender.encrypt(&[i], &mut rng).unwrap()).collect();
        receiver.decrypt(&messages[2]).unwrap();

        assert!(matches!(
            receiver.decrypt(&messages[0]),
            Err(SenderKeyError::IterationTooOld { iteration: 0, .. })
        ));
        assert_eq!(receiver.decrypt(&messages[1]).unwrap(), vec![1]);
    }

    #[test]
    fn late_joiner_cannot_read_history() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let mut sender = SenderKeyState::generate("g", "s", SenderKeyConfig::default(), &mut rng);

        let before = sender.encrypt(b"before", &mut rng).unwrap();
        let mut late = SenderKeyState::from_distribution(
            &sender.create_distribution(),
            SenderKeyConfig::default(),
        );
        let after = sender.encrypt(b"after", &mut rng).unwrap();

        assert!(matches!(late.decrypt(&before), Err(SenderKeyError::IterationTooOld { .. })));
        assert_eq!(late.decrypt(&after).unwrap(), b"after");
    }

    #[test]
    fn mismatched_routing_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(9);
        let config = SenderKeyConfig::default();
        let mut alice = SenderKeyState::generate("g", "alice", config, &mut rng);
        let bob = SenderKeyState::generate("g", "bob", SenderKeyConfig::default(), &mut rng);
        let mut bob_view =
            SenderKeyState::from_distribution(&bob.create_distribution(), config);

        let message = alice.encrypt(b"x", &mut rng).unwrap();
        assert!(matches!(
            bob_view.decrypt(&message),
            Err(SenderKeyError::SenderMismatch { .. })
        ));
    }

    #[test]
    fn record_roundtrip_keeps_skipped_keys() {
        let (mut sender, mut receiver, mut rng) = sender_and_receiver(10);

        let m0 = sender.encrypt(b"0", &mut rng).unwrap();
        let m1 = sender.encrypt(b"1", &mut rng).unwrap();
        receiver.decrypt(&m1).unwrap();

        let mut restored =
            SenderKeyState::from_record(&receiver.to_record(), SenderKeyConfig::default());
        assert_eq!(restored.decrypt(&m0).unwrap(), b"0");
    }
}

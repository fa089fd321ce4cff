//! Double Ratchet session state machine

use std::collections::VecDeque;

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::{
    error::RatchetError,
    header::{RatchetHeader, RatchetMessage},
};
use crate::primitives::{
    KeyPair,
    aead::{self, NONCE_SIZE},
    kdf,
};

/// Info label for the root KDF
const ROOT_INFO: &[u8] = b"RootRatchet";

/// HMAC input deriving a message key from a chain key
const MESSAGE_KEY_CONSTANT: u8 = 0x01;

/// HMAC input deriving the next chain key
const CHAIN_KEY_CONSTANT: u8 = 0x02;

/// Bounds for out-of-order delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RatchetConfig {
    /// Maximum keys a single incoming message may skip in one chain
    pub max_skip: u32,
    /// Maximum cached skipped keys; oldest are evicted first
    pub max_skipped_keys: usize,
}

impl Default for RatchetConfig {
    fn default() -> Self {
        Self { max_skip: 1000, max_skipped_keys: 1000 }
    }
}

/// One cached message key for a message that has not arrived yet.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Zeroize)]
pub struct SkippedKeyEntry {
    /// Ratchet public key of the chain the key belongs to
    pub ratchet_public_key: [u8; 32],
    /// Counter of the message within that chain
    pub counter: u32,
    /// The message key
    pub message_key: [u8; 32],
}

/// Symmetric chain step: `(next_chain_key, message_key)`.
pub fn chain_step(chain_key: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let message_key = kdf::hmac_sha256(chain_key, &[&[MESSAGE_KEY_CONSTANT]]);
    let next_chain_key = kdf::hmac_sha256(chain_key, &[&[CHAIN_KEY_CONSTANT]]);
    (next_chain_key, message_key)
}

/// Root KDF: `(new_root_key, chain_key)`.
///
/// HKDF-SHA256 without salt over `root_key || dh_output`, expanded to 64
/// bytes and split in half.
pub fn root_step(root_key: &[u8; 32], dh_output: &[u8; 32]) -> ([u8; 32], [u8; 32]) {
    let mut ikm = [0u8; 64];
    ikm[..32].copy_from_slice(root_key);
    ikm[32..].copy_from_slice(dh_output);
    let mut okm: [u8; 64] = kdf::hkdf_sha256(None, &ikm, ROOT_INFO);
    ikm.zeroize();

    let mut root = [0u8; 32];
    let mut chain = [0u8; 32];
    root.copy_from_slice(&okm[..32]);
    chain.copy_from_slice(&okm[32..]);
    okm.zeroize();

    (root, chain)
}

/// Serializable snapshot of a [`RatchetSession`].
///
/// Contains every secret of the session; wiped on drop.
#[derive(Clone, Serialize, Deserialize, Zeroize, ZeroizeOnDrop)]
pub struct RatchetState {
    /// Secret of our current ratchet key pair
    pub sending_secret: [u8; 32],
    /// Peer's current ratchet public key
    pub remote_public: Option<[u8; 32]>,
    /// Root key
    pub root_key: [u8; 32],
    /// Sending chain key
    pub sending_chain: Option<[u8; 32]>,
    /// Receiving chain key
    pub receiving_chain: Option<[u8; 32]>,
    /// Messages sent in the current sending chain
    pub sending_counter: u32,
    /// Messages received in the current receiving chain
    pub receiving_counter: u32,
    /// Length of our previous sending chain
    pub previous_chain_counter: u32,
    /// Cached keys for skipped messages, oldest first
    pub skipped: Vec<SkippedKeyEntry>,
}

impl std::fmt::Debug for RatchetState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatchetState")
            .field("sending_counter", &self.sending_counter)
            .field("receiving_counter", &self.receiving_counter)
            .field("skipped", &self.skipped.len())
            .finish_non_exhaustive()
    }
}

/// A pairwise Double Ratchet session.
///
/// `decrypt` is transactional: it operates on a copy of the state and only
/// commits it after the message authenticates.
#[derive(Clone)]
pub struct RatchetSession {
    config: RatchetConfig,
    sending_key: KeyPair,
    remote_public: Option<[u8; 32]>,
    root_key: [u8; 32],
    sending_chain: Option<[u8; 32]>,
    receiving_chain: Option<[u8; 32]>,
    sending_counter: u32,
    receiving_counter: u32,
    previous_chain_counter: u32,
    skipped: VecDeque<SkippedKeyEntry>,
}

impl RatchetSession {
    /// Start a session as the party that sends first.
    ///
    /// Performs the initial DH ratchet step against the responder's ratchet
    /// public key, so the sending chain is ready immediately.
    ///
    /// # Errors
    ///
    /// - `InvalidKey`: `remote_ratchet_public` is a low-order point
    pub fn init_as_initiator<R: CryptoRng + RngCore>(
        shared_secret: &[u8; 32],
        remote_ratchet_public: [u8; 32],
        config: RatchetConfig,
        rng: &mut R,
    ) -> Result<Self, RatchetError> {
        let sending_key = KeyPair::generate(rng);
        let dh_output = sending_key.diffie_hellman(&remote_ratchet_public)?;
        let (root_key, sending_chain) = root_step(shared_secret, &dh_output);

        Ok(Self {
            config,
            sending_key,
            remote_public: Some(remote_ratchet_public),
            root_key,
            sending_chain: Some(sending_chain),
            receiving_chain: None,
            sending_counter: 0,
            receiving_counter: 0,
            previous_chain_counter: 0,
            skipped: VecDeque::new(),
        })
    }

    /// Start a session as the responder.
    ///
    /// No chains exist until the initiator's first message arrives.
    pub fn init_as_recipient(
        shared_secret: &[u8; 32],
        own_ratchet_key: KeyPair,
        config: RatchetConfig,
    ) -> Self {
        Self {
            config,
            sending_key: own_ratchet_key,
            remote_public: None,
            root_key: *shared_secret,
            sending_chain: None,
            receiving_chain: None,
            sending_counter: 0,
            receiving_counter: 0,
            previous_chain_counter: 0,
            skipped: VecDeque::new(),
        }
    }

    /// Encrypt `plaintext`, binding `associated_data` and the header.
    ///
    /// # Errors
    ///
    /// - `NoSendingChain`: responder has not received a message yet
    /// - `CounterOverflow`: sending chain exhausted
    pub fn encrypt<R: CryptoRng + RngCore>(
        &mut self,
        plaintext: &[u8],
        associated_data: &[u8],
        rng: &mut R,
    ) -> Result<RatchetMessage, RatchetError> {
        let chain_key = self.sending_chain.ok_or(RatchetError::NoSendingChain)?;
        if self.sending_counter == u32::MAX {
            return Err(RatchetError::CounterOverflow);
        }

        let (next_chain, mut message_key) = chain_step(&chain_key);

        let header = RatchetHeader {
            ratchet_public_key: self.sending_key.public_key(),
            previous_chain_counter: self.previous_chain_counter,
            counter: self.sending_counter,
        };

        let nonce = aead::random_nonce(rng);
        let aad = build_aad(&header, associated_data);
        let ciphertext = aead::seal(&message_key, &nonce, plaintext, &aad);
        message_key.zeroize();

        self.sending_chain = Some(next_chain);
        self.sending_counter += 1;

        Ok(RatchetMessage { header, nonce, ciphertext })
    }

    /// Decrypt a message from the peer.
    ///
    /// On any error the session is left exactly as it was.
    ///
    /// # Errors
    ///
    /// - `AuthenticationFailed`: forged or corrupted message, or wrong `ad`
    /// - `TooManySkipped`: message is further ahead than `max_skip`
    /// - `MessageKeyUnavailable`: replay, or key already evicted
    pub fn decrypt<R: CryptoRng + RngCore>(
        &mut self,
        message: &RatchetMessage,
        associated_data: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>, RatchetError> {
        let mut working = self.clone();
        let plaintext = working.decrypt_uncommitted(message, associated_data, rng)?;
        *self = working;
        Ok(plaintext)
    }

    fn decrypt_uncommitted<R: CryptoRng + RngCore>(
        &mut self,
        message: &RatchetMessage,
        associated_data: &[u8],
        rng: &mut R,
    ) -> Result<Vec<u8>, RatchetError> {
        let header = &message.header;

        if let Some(mut message_key) =
            self.take_skipped(&header.ratchet_public_key, header.counter)
        {
            let result = open(&message_key, message, associated_data);
            message_key.zeroize();
            return result;
        }

        if self.remote_public != Some(header.ratchet_public_key) {
            self.skip_to(header.previous_chain_counter)?;
            self.dh_step(header.ratchet_public_key, rng)?;
        } else if header.counter < self.receiving_counter {
            return Err(RatchetError::MessageKeyUnavailable {
                counter: header.counter,
                current: self.receiving_counter,
            });
        }

        self.skip_to(header.counter)?;

        let Some(chain_key) = self.receiving_chain else {
            return Err(RatchetError::InvalidState {
                reason: "message uses a ratchet key with no receiving chain".to_string(),
            });
        };

        let (next_chain, mut message_key) = chain_step(&chain_key);
        self.receiving_chain = Some(next_chain);
        self.receiving_counter = header.counter.saturating_add(1);

        let result = open(&message_key, message, associated_data);
        message_key.zeroize();
        result
    }

    fn take_skipped(&mut self, ratchet_public_key: &[u8; 32], counter: u32) -> Option<[u8; 32]> {
        let position = self
            .skipped
            .iter()
            .position(|e| e.ratchet_public_key == *ratchet_public_key && e.counter == counter)?;
        let mut entry = self.skipped.remove(position)?;
        let key = entry.message_key;
        entry.zeroize();
        Some(key)
    }

    /// Cache keys of the current receiving chain up to (excluding) `until`.
    fn skip_to(&mut self, until: u32) -> Result<(), RatchetError> {
        let (Some(mut chain_key), Some(remote)) = (self.receiving_chain, self.remote_public)
        else {
            return Ok(());
        };
        if until <= self.receiving_counter {
            return Ok(());
        }

        let requested = until - self.receiving_counter;
        if requested > self.config.max_skip {
            return Err(RatchetError::TooManySkipped { requested, limit: self.config.max_skip });
        }

        for counter in self.receiving_counter..until {
            let (next_chain, message_key) = chain_step(&chain_key);
            self.skipped.push_back(SkippedKeyEntry {
                ratchet_public_key: remote,
                counter,
                message_key,
            });
            while self.skipped.len() > self.config.max_skipped_keys {
                if let Some(mut evicted) = self.skipped.pop_front() {
                    evicted.zeroize();
                }
            }
            chain_key.zeroize();
            chain_key = next_chain;
        }

        self.receiving_chain = Some(chain_key);
        self.receiving_counter = until;
        Ok(())
    }

    fn dh_step<R: CryptoRng + RngCore>(
        &mut self,
        remote: [u8; 32],
        rng: &mut R,
    ) -> Result<(), RatchetError> {
        tracing::debug!(
            previous_chain = self.sending_counter,
            "ratchet: DH step on new remote key"
        );

        self.previous_chain_counter = self.sending_counter;
        self.sending_counter = 0;
        self.receiving_counter = 0;
        self.remote_public = Some(remote);

        let dh_output = self.sending_key.diffie_hellman(&remote)?;
        let (root_key, receiving_chain) = root_step(&self.root_key, &dh_output);
        self.root_key = root_key;
        self.receiving_chain = Some(receiving_chain);

        self.sending_key = KeyPair::generate(rng);
        let dh_output = self.sending_key.diffie_hellman(&remote)?;
        let (root_key, sending_chain) = root_step(&self.root_key, &dh_output);
        self.root_key = root_key;
        self.sending_chain = Some(sending_chain);

        Ok(())
    }

    /// Our current ratchet public key.
    pub fn ratchet_public_key(&self) -> [u8; 32] {
        self.sending_key.public_key()
    }

    /// Peer's ratchet key of the current receiving chain.
    pub fn remote_ratchet_key(&self) -> Option<[u8; 32]> {
        self.remote_public
    }

    /// True once a sending chain exists.
    pub fn can_send(&self) -> bool {
        self.sending_chain.is_some()
    }

    /// Messages sent in the current sending chain.
    pub fn sending_counter(&self) -> u32 {
        self.sending_counter
    }

    /// Messages received in the current receiving chain.
    pub fn receiving_counter(&self) -> u32 {
        self.receiving_counter
    }

    /// Number of cached skipped keys.
    pub fn skipped_key_count(&self) -> usize {
        self.skipped.len()
    }

    /// Snapshot the full state for persistence.
    pub fn export_state(&self) -> RatchetState {
        RatchetState {
            sending_secret: *self.sending_key.secret_bytes(),
            remote_public: self.remote_public,
            root_key: self.root_key,
            sending_chain: self.sending_chain,
            receiving_chain: self.receiving_chain,
            sending_counter: self.sending_counter,
            receiving_counter: self.receiving_counter,
            previous_chain_counter: self.previous_chain_counter,
            skipped: self.skipped.iter().cloned().collect(),
        }
    }

    /// Rebuild a session from a snapshot.
    pub fn restore(state: &RatchetState, config: RatchetConfig) -> Self {
        let mut skipped: VecDeque<SkippedKeyEntry> = state.skipped.iter().cloned().collect();
        while skipped.len() > config.max_skipped_keys {
            if let Some(mut evicted) = skipped.pop_front() {
                evicted.zeroize();
            }
        }

        Self {
            config,
            sending_key: KeyPair::from_secret_bytes(state.sending_secret),
            remote_public: state.remote_public,
            root_key: state.root_key,
            sending_chain: state.sending_chain,
            receiving_chain: state.receiving_chain,
            sending_counter: state.sending_counter,
            receiving_counter: state.receiving_counter,
            previous_chain_counter: state.previous_chain_counter,
            skipped,
        }
    }
}

impl Drop for RatchetSession {
    fn drop(&mut self) {
        self.root_key.zeroize();
        self.sending_chain.zeroize();
        self.receiving_chain.zeroize();
        for entry in &mut self.skipped {
            entry.zeroize();
        }
    }
}

impl std::fmt::Debug for RatchetSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RatchetSession")
            .field("ratchet_public_key", &hex::encode(self.sending_key.public_key()))
            .field("sending_counter", &self.sending_counter)
            .field("receiving_counter", &self.receiving_counter)
            .field("skipped", &self.skipped.len())
            .finish_non_exhaustive()
    }
}

fn build_aad(header: &RatchetHeader, associated_data: &[u8]) -> Vec<u8> {
    let mut aad = Vec::with_capacity(super::HEADER_SIZE + associated_data.len());
    aad.extend_from_slice(&header.to_bytes());
    aad.extend_from_slice(associated_data);
    aad
}

fn open(
    message_key: &[u8; 32],
    message: &RatchetMessage,
    associated_data: &[u8],
) -> Result<Vec<u8>, RatchetError> {
    let nonce: &[u8; NONCE_SIZE] = &message.nonce;
    let aad = build_aad(&message.header, associated_data);
    Ok(aead::open(message_key, nonce, &message.ciphertext, &aad)?)
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    const AD: &[u8] = b"alice|bob";

    fn pair(seed: u64) -> (RatchetSession, RatchetSession, ChaCha20Rng) {
        pair_with(seed, RatchetConfig::default())
    }

    fn pair_with(
        seed: u64,
        config: RatchetConfig,
    ) -> (RatchetSession, RatchetSession, ChaCha20Rng) {
        let mut rng = ChaCha20Rng::seed_from_u64(seed);
        let shared = [42u8; 32];
        let bob_key = KeyPair::generate(&mut rng);
        let bob_public = bob_key.public_key();

        let alice =
            RatchetSession::init_as_initiator(&shared, bob_public, config, &mut rng).unwrap();
        let bob = RatchetSession::init_as_recipient(&shared, bob_key, config);
        (alice, bob, rng)
    }

    #[test]
    fn first_message_decrypts() {
        let (mut alice, mut bob, mut rng) = pair(1);

        let message = alice.encrypt(b"hello bob", AD, &mut rng).unwrap();
        assert_eq!(bob.decrypt(&message, AD, &mut rng).unwrap(), b"hello bob");
    }

    #[test]
    fn recipient_cannot_send_first() {
        let (_, mut bob, mut rng) = pair(2);
        assert_eq!(bob.encrypt(b"x", AD, &mut rng), Err(RatchetError::NoSendingChain));
    }

    #[test]
    fn conversation_alternates() {
        let (mut alice, mut bob, mut rng) = pair(3);

        for round in 0..5u8 {
            let to_bob = alice.encrypt(&[round], AD, &mut rng).unwrap();
            assert_eq!(bob.decrypt(&to_bob, AD, &mut rng).unwrap(), vec![round]);

            let to_alice = bob.encrypt(&[round, round], AD, &mut rng).unwrap();
            assert_eq!(alice.decrypt(&to_alice, AD, &mut rng).unwrap(), vec![round, round]);
        }
    }

    #[test]
    fn ratchet_key_changes_when_speaker_changes() {
        let (mut alice, mut bob, mut rng) = pair(4);

        let first = alice.encrypt(b"1", AD, &mut rng).unwrap();
        let second = alice.encrypt(b"2", AD, &mut rng).unwrap();
        assert_eq!(first.header.ratchet_public_key, second.header.ratchet_public_key);

        bob.decrypt(&first, AD, &mut rng).unwrap();
        bob.decrypt(&second, AD, &mut rng).unwrap();

        let reply = bob.encrypt(b"3", AD, &mut rng).unwrap();
        alice.decrypt(&reply, AD, &mut rng).unwrap();

        let third = alice.encrypt(b"4", AD, &mut rng).unwrap();
        assert_ne!(third.header.ratchet_public_key, first.header.ratchet_public_key);
        assert_eq!(third.header.previous_chain_counter, 2);
    }

    #[test]
    fn out_of_order_within_chain() {
        let (mut alice, mut bob, mut rng) = pair(5);

        let messages: Vec<_> =
            (0..4u8).map(|i| alice.encrypt(&[i], AD, &mut rng).unwrap()).collect();

        assert_eq!(bob.decrypt(&messages[3], AD, &mut rng).unwrap(), vec![3]);
        assert_eq!(bob.skipped_key_count(), 3);
        assert_eq!(bob.decrypt(&messages[1], AD, &mut rng).unwrap(), vec![1]);
        assert_eq!(bob.decrypt(&messages[0], AD, &mut rng).unwrap(), vec![0]);
        assert_eq!(bob.decrypt(&messages[2], AD, &mut rng).unwrap(), vec![2]);
        assert_eq!(bob.skipped_key_count(), 0);
    }

    #[test]
    fn late_message_from_previous_chain() {
        let (mut alice, mut bob, mut rng) = pair(6);

        let early = alice.encrypt(b"early", AD, &mut rng).unwrap();
        let delayed = alice.encrypt(b"delayed", AD, &mut rng).unwrap();
        bob.decrypt(&early, AD, &mut rng).unwrap();

        let reply = bob.encrypt(b"reply", AD, &mut rng).unwrap();
        alice.decrypt(&reply, AD, &mut rng).unwrap();
        let next = alice.encrypt(b"next chain", AD, &mut rng).unwrap();

        assert_eq!(bob.decrypt(&next, AD, &mut rng).unwrap(), b"next chain");
        assert_eq!(bob.decrypt(&delayed, AD, &mut rng).unwrap(), b"delayed");
    }

    #[test]
    fn replay_is_rejected() {
        let (mut alice, mut bob, mut rng) = pair(7);

        let message = alice.encrypt(b"once", AD, &mut rng).unwrap();
        bob.decrypt(&message, AD, &mut rng).unwrap();

        assert!(matches!(
            bob.decrypt(&message, AD, &mut rng),
            Err(RatchetError::MessageKeyUnavailable { counter: 0, current: 1 })
        ));
    }

    #[test]
    fn skip_bound_enforced() {
        let config = RatchetConfig { max_skip: 3, max_skipped_keys: 10 };
        let (mut alice, mut bob, mut rng) = pair_with(8, config);

        let messages: Vec<_> =
            (0..5u8).map(|i| alice.encrypt(&[i], AD, &mut rng).unwrap()).collect();

        assert_eq!(
            bob.decrypt(&messages[4], AD, &mut rng),
            Err(RatchetError::TooManySkipped { requested: 4, limit: 3 })
        );
        // Session is untouched and still decrypts in order
        assert_eq!(bob.decrypt(&messages[0], AD, &mut rng).unwrap(), vec![0]);
    }

    #[test]
    fn skipped_cache_evicts_oldest() {
        let config = RatchetConfig { max_skip: 100, max_skipped_keys: 2 };
        let (mut alice, mut bob, mut rng) = pair_with(9, config);

        let messages: Vec<_> =
            (0..5u8).map(|i| alice.encrypt(&[i], AD, &mut rng).unwrap()).collect();

        bob.decrypt(&messages[4], AD, &mut rng).unwrap();
        assert_eq!(bob.skipped_key_count(), 2);

        assert!(bob.decrypt(&messages[0], AD, &mut rng).is_err());
        assert_eq!(bob.decrypt(&messages[3], AD, &mut rng).unwrap(), vec![3]);
    }

    #[test]
    fn forged_message_leaves_state_unchanged() {
        let (mut alice, mut bob, mut rng) = pair(10);

        let mut forged = alice.encrypt(b"real", AD, &mut rng).unwrap();
        let genuine = forged.clone();
        forged.ciphertext[0] ^= 0xFF;

        assert_eq!(bob.decrypt(&forged, AD, &mut rng), Err(RatchetError::AuthenticationFailed));
        assert!(!bob.can_send());
        assert_eq!(bob.decrypt(&genuine, AD, &mut rng).unwrap(), b"real");
    }

    #[test]
    fn wrong_associated_data_fails() {
        let (mut alice, mut bob, mut rng) = pair(11);

        let message = alice.encrypt(b"bound", AD, &mut rng).unwrap();
        assert_eq!(
            bob.decrypt(&message, b"other", &mut rng),
            Err(RatchetError::AuthenticationFailed)
        );
    }

    #[test]
    fn tampered_header_fails() {
        let (mut alice, mut bob, mut rng) = pair(12);

        let _ = alice.encrypt(b"0", AD, &mut rng).unwrap();
        let mut message = alice.encrypt(b"1", AD, &mut rng).unwrap();
        message.header.counter = 0;

        assert_eq!(bob.decrypt(&message, AD, &mut rng), Err(RatchetError::AuthenticationFailed));
        assert_eq!(bob.receiving_counter(), 0);
    }

    #[test]
    fn state_survives_export_and_restore() {
        let (mut alice, mut bob, mut rng) = pair(13);

        let first = alice.encrypt(b"before", AD, &mut rng).unwrap();
        bob.decrypt(&first, AD, &mut rng).unwrap();

        let snapshot = bob.export_state();
        let mut restored = RatchetSession::restore(&snapshot, RatchetConfig::default());

        let second = alice.encrypt(b"after", AD, &mut rng).unwrap();
        assert_eq!(restored.decrypt(&second, AD, &mut rng).unwrap(), b"after");

        let reply = restored.encrypt(b"reply", AD, &mut rng).unwrap();
        assert_eq!(alice.decrypt(&reply, AD, &mut rng).unwrap(), b"reply");
    }

    #[test]
    fn debug_does_not_leak_root_key() {
        let (alice, _, _) = pair(14);
        let rendered = format!("{alice:?}");
        assert!(!rendered.contains(&hex::encode(alice.root_key)));
    }

    #[test]
    fn root_step_known_answer() {
        let (root, chain) = root_step(&[1u8; 32], &[2u8; 32]);
        assert_eq!(
            hex::encode(root),
            "e5ccaded154633fb61ef41261dbe449c553a382cfe7c177f42cd20401128f10e"
        );
        assert_eq!(
            hex::encode(chain),
            "734a4ba69aadab99be904e1dcab5b54bc9a8abc33041845a2b5c26e4d8316a43"
        );
    }

    #[test]
    fn root_step_hashes_concatenated_inputs() {
        let mut ikm = [1u8; 64];
        ikm[32..].fill(2);
        let expected: [u8; 64] = kdf::hkdf_sha256(None, &ikm, b"RootRatchet");

        let (root, chain) = root_step(&[1u8; 32], &[2u8; 32]);
        assert_eq!(root, expected[..32]);
        assert_eq!(chain, expected[32..]);
    }

    #[test]
    fn receiver_ratchets_only_on_new_remote_key() {
        let (mut alice, mut bob, mut rng) = pair(15);
        let initial = bob.ratchet_public_key();

        let first = alice.encrypt(b"1", AD, &mut rng).unwrap();
        bob.decrypt(&first, AD, &mut rng).unwrap();
        let after_first = bob.ratchet_public_key();
        assert_ne!(after_first, initial);

        for i in 2..5u8 {
            let message = alice.encrypt(&[i], AD, &mut rng).unwrap();
            assert_eq!(message.header.ratchet_public_key, first.header.ratchet_public_key);
            bob.decrypt(&message, AD, &mut rng).unwrap();
            assert_eq!(bob.ratchet_public_key(), after_first);
        }

        let reply = bob.encrypt(b"reply", AD, &mut rng).unwrap();
        alice.decrypt(&reply, AD, &mut rng).unwrap();
        assert_eq!(bob.ratchet_public_key(), after_first);

        let next = alice.encrypt(b"next chain", AD, &mut rng).unwrap();
        assert_ne!(next.header.ratchet_public_key, first.header.ratchet_public_key);
        bob.decrypt(&next, AD, &mut rng).unwrap();
        let after_next = bob.ratchet_public_key();
        assert_ne!(after_next, after_first);
        assert_eq!(bob.remote_ratchet_key(), Some(next.header.ratchet_public_key));

        let same_chain = alice.encrypt(b"same chain", AD, &mut rng).unwrap();
        bob.decrypt(&same_chain, AD, &mut rng).unwrap();
        assert_eq!(bob.ratchet_public_key(), after_next);
    }

    #[test]
    fn chain_step_outputs_differ() {
        let (next, message_key) = chain_step(&[1u8; 32]);
        assert_ne!(next, message_key);
        assert_ne!(next, [1u8; 32]);
    }
}

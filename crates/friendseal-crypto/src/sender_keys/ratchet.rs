//! Symmetric sender chain
//!
//! # Security Properties
//!
//! - Forward Secrecy: Old chain keys are overwritten when advancing
//! - Key Uniqueness: Each iteration produces a unique message key
//! - Determinism: Same chain key always produces same key sequence

use zeroize::Zeroize;

use super::error::SenderKeyError;
use crate::primitives::kdf;

/// Info prefix for message key derivation; the iteration is appended
const MESSAGE_INFO: &[u8] = b"SenderKeyMessage";

/// HMAC input deriving the next chain key
const CHAIN_CONSTANT: u8 = 0x01;

/// A message key derived from the chain.
///
/// Used for a single message and then discarded.
#[derive(Clone)]
pub struct MessageKey {
    key: [u8; 32],
    iteration: u32,
}

impl MessageKey {
    pub(crate) fn from_parts(key: [u8; 32], iteration: u32) -> Self {
        Self { key, iteration }
    }

    /// 32-byte symmetric key for XChaCha20-Poly1305 AEAD.
    pub fn key(&self) -> &[u8; 32] {
        &self.key
    }

    /// Chain iteration this key was derived at.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }
}

impl Drop for MessageKey {
    fn drop(&mut self) {
        self.key.zeroize();
    }
}

/// Forward-secure sender chain.
///
/// Each [`advance()`](Self::advance) call:
/// 1. Derives the message key for the current iteration with HKDF
/// 2. Replaces the chain key with `HMAC(chain_key, 0x01)`
/// 3. Increments the iteration
#[derive(Clone)]
pub struct SenderChain {
    chain_key: [u8; 32],
    iteration: u32,
}

impl SenderChain {
    /// Chain positioned at `iteration` with the given chain key.
    pub fn new(chain_key: [u8; 32], iteration: u32) -> Self {
        Self { chain_key, iteration }
    }

    /// Iteration of the next message key.
    pub fn iteration(&self) -> u32 {
        self.iteration
    }

    /// Current chain key, for distribution and persistence.
    pub fn chain_key(&self) -> &[u8; 32] {
        &self.chain_key
    }

    /// Derive the current message key and step the chain.
    pub fn advance(&mut self) -> Result<MessageKey, SenderKeyError> {
        if self.iteration == u32::MAX {
            return Err(SenderKeyError::IterationOverflow { current: self.iteration });
        }

        let key = derive_message_key(&self.chain_key, self.iteration);
        let next_chain_key = kdf::hmac_sha256(&self.chain_key, &[&[CHAIN_CONSTANT]]);

        self.chain_key.zeroize();
        self.chain_key = next_chain_key;

        let iteration = self.iteration;
        self.iteration += 1;

        Ok(MessageKey { key, iteration })
    }
}

impl Drop for SenderChain {
    fn drop(&mut self) {
        self.chain_key.zeroize();
    }
}

/// `HKDF(ikm = chain_key, info = "SenderKeyMessage" || iteration_be)`
fn derive_message_key(chain_key: &[u8; 32], iteration: u32) -> [u8; 32] {
    let mut info = Vec::with_capacity(MESSAGE_INFO.len() + 4);
    info.extend_from_slice(MESSAGE_INFO);
    info.extend_from_slice(&iteration.to_be_bytes());

    kdf::hkdf_sha256(None, chain_key, &info)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_chain_key() -> [u8; 32] {
        let mut seed = [0u8; 32];
        for (i, byte) in seed.iter_mut().enumerate() {
            *byte = i as u8;
        }
        seed
    }

    #[test]
    fn advance_increments_iteration() {
        let mut chain = SenderChain::new(test_chain_key(), 0);

        let key0 = chain.advance().unwrap();
        assert_eq!(key0.iteration(), 0);
        assert_eq!(chain.iteration(), 1);

        let key1 = chain.advance().unwrap();
        assert_eq!(key1.iteration(), 1);
        assert_ne!(key0.key(), key1.key(), "keys must be unique");
    }

    #[test]
    fn chain_is_deterministic() {
        let mut a = SenderChain::new(test_chain_key(), 0);
        let mut b = SenderChain::new(test_chain_key(), 0);

        for _ in 0..10 {
            assert_eq!(a.advance().unwrap().key(), b.advance().unwrap().key());
        }
    }

    #[test]
    fn distributed_chain_matches_sender() {
        let mut sender = SenderChain::new(test_chain_key(), 0);
        sender.advance().unwrap();
        sender.advance().unwrap();

        let mut receiver = SenderChain::new(*sender.chain_key(), sender.iteration());
        assert_eq!(sender.advance().unwrap().key(), receiver.advance().unwrap().key());
    }

    #[test]
    fn message_key_binds_iteration() {
        // Same chain key at a different iteration gives a different key
        let a = derive_message_key(&test_chain_key(), 0);
        let b = derive_message_key(&test_chain_key(), 1);
        assert_ne!(a, b);
    }

    #[test]
    fn overflow_rejected() {
        let mut chain = SenderChain::new(test_chain_key(), u32::MAX);
        assert_eq!(
            chain.advance().map(|k| k.iteration()),
            Err(SenderKeyError::IterationOverflow { current: u32::MAX })
        );
    }
}

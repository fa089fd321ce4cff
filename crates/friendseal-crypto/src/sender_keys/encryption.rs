//! Message encryption and sender authentication
//!
//! Content is sealed with `XChaCha20-Poly1305` under a random nonce, with
//! the encoded metadata as associated data. The sender then MACs
//! `metadata || ciphertext` with its signature key so receivers can
//! reject forgeries before attempting decryption.

use serde::{Deserialize, Serialize};

use super::{error::SenderKeyError, ratchet::MessageKey};
use crate::primitives::{
    aead::{self, NONCE_SIZE, TAG_SIZE},
    kdf::{self, MAC_SIZE},
};

/// Cleartext routing data of a group message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderKeyMetadata {
    /// Member that sent the message
    pub sender_id: String,
    /// Group the message belongs to
    pub group_id: String,
    /// Chain iteration the message key was derived at
    pub iteration: u32,
}

impl SenderKeyMetadata {
    /// Length-prefixed encoding used as AEAD associated data and MAC input.
    ///
    /// Layout: `len(sender_id) u32 BE || sender_id || len(group_id) u32 BE ||
    /// group_id || iteration u32 BE`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let sender = self.sender_id.as_bytes();
        let group = self.group_id.as_bytes();

        let mut out = Vec::with_capacity(12 + sender.len() + group.len());
        out.extend_from_slice(&length_prefix(sender.len()));
        out.extend_from_slice(sender);
        out.extend_from_slice(&length_prefix(group.len()));
        out.extend_from_slice(group);
        out.extend_from_slice(&self.iteration.to_be_bytes());
        out
    }
}

/// An encrypted group message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SenderKeyMessage {
    /// Routing data, authenticated but not encrypted
    pub metadata: SenderKeyMetadata,
    /// The 24-byte `XChaCha20` nonce
    pub nonce: [u8; NONCE_SIZE],
    /// The ciphertext including 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
    /// `HMAC-SHA256(signature_key, metadata || ciphertext)`
    pub mac: [u8; MAC_SIZE],
}

impl SenderKeyMessage {
    /// Plaintext length (ciphertext length minus authentication tag).
    pub fn plaintext_len(&self) -> usize {
        self.ciphertext.len().saturating_sub(TAG_SIZE)
    }
}

/// Encrypt and MAC a message.
///
/// The caller supplies the nonce so this stays a pure function.
pub fn encrypt_message(
    plaintext: &[u8],
    message_key: &MessageKey,
    metadata: SenderKeyMetadata,
    nonce: [u8; NONCE_SIZE],
    signature_key: &[u8; 32],
) -> SenderKeyMessage {
    let aad = metadata.to_bytes();
    let ciphertext = aead::seal(message_key.key(), &nonce, plaintext, &aad);
    let mac = kdf::hmac_sha256(signature_key, &[&aad, &ciphertext]);

    SenderKeyMessage { metadata, nonce, ciphertext, mac }
}

/// Check the sender MAC in constant time.
///
/// # Errors
///
/// - `AuthenticationFailed`: MAC does not match
pub fn verify_mac(
    message: &SenderKeyMessage,
    signature_key: &[u8; 32],
) -> Result<(), SenderKeyError> {
    let aad = message.metadata.to_bytes();
    if kdf::hmac_sha256_verify(signature_key, &[&aad, &message.ciphertext], &message.mac) {
        Ok(())
    } else {
        Err(SenderKeyError::AuthenticationFailed)
    }
}

/// Decrypt a message whose MAC has already been verified.
///
/// # Errors
///
/// - `AuthenticationFailed`: wrong key or tampered ciphertext
pub fn decrypt_message(
    message: &SenderKeyMessage,
    message_key: &MessageKey,
) -> Result<Vec<u8>, SenderKeyError> {
    if message_key.iteration() != message.metadata.iteration {
        return Err(SenderKeyError::AuthenticationFailed);
    }

    let aad = message.metadata.to_bytes();
    aead::open(message_key.key(), &message.nonce, &message.ciphertext, &aad)
        .map_err(|_| SenderKeyError::AuthenticationFailed)
}

fn length_prefix(len: usize) -> [u8; 4] {
    // Ids are addresses and group names; anything near 4 GiB is not an id
    u32::try_from(len).unwrap_or(u32::MAX).to_be_bytes()
}

#[cfg(test)]
mod tests {
    use super::{super::ratchet::SenderChain, *};

    const SIGNATURE_KEY: [u8; 32] = [0x5A; 32];

    fn test_message_key(iteration: u32) -> MessageKey {
        let mut chain = SenderChain::new([7u8; 32], iteration);
        chain.advance().unwrap()
    }

    fn metadata(iteration: u32) -> SenderKeyMetadata {
        SenderKeyMetadata {
            sender_id: "0xalice".to_string(),
            group_id: "market-1".to_string(),
            iteration,
        }
    }

    #[test]
    fn encrypt_decrypt_roundtrip() {
        let key = test_message_key(0);
        let message =
            encrypt_message(b"Hello, group!", &key, metadata(0), [0xAB; 24], &SIGNATURE_KEY);

        verify_mac(&message, &SIGNATURE_KEY).unwrap();
        assert_eq!(decrypt_message(&message, &key).unwrap(), b"Hello, group!");
    }

    #[test]
    fn ciphertext_is_larger_than_plaintext() {
        let key = test_message_key(0);
        let message = encrypt_message(b"test message", &key, metadata(0), [0; 24], &SIGNATURE_KEY);

        assert_eq!(message.ciphertext.len(), 12 + TAG_SIZE);
        assert_eq!(message.plaintext_len(), 12);
    }

    #[test]
    fn wrong_signature_key_rejected() {
        let key = test_message_key(0);
        let message = encrypt_message(b"x", &key, metadata(0), [0; 24], &SIGNATURE_KEY);

        assert_eq!(verify_mac(&message, &[0u8; 32]), Err(SenderKeyError::AuthenticationFailed));
    }

    #[test]
    fn altered_metadata_breaks_mac() {
        let key = test_message_key(3);
        let mut message = encrypt_message(b"x", &key, metadata(3), [0; 24], &SIGNATURE_KEY);
        message.metadata.group_id = "market-2".to_string();

        assert!(verify_mac(&message, &SIGNATURE_KEY).is_err());
    }

    #[test]
    fn tampered_ciphertext_fails_decryption() {
        let key = test_message_key(0);
        let mut message = encrypt_message(b"original", &key, metadata(0), [0; 24], &SIGNATURE_KEY);
        message.ciphertext[0] ^= 0xFF;

        assert!(verify_mac(&message, &SIGNATURE_KEY).is_err());
        assert_eq!(decrypt_message(&message, &key), Err(SenderKeyError::AuthenticationFailed));
    }

    #[test]
    fn mac_covers_metadata_and_ciphertext() {
        let key = test_message_key(2);
        let meta = metadata(2);
        let message = encrypt_message(b"bid: 40", &key, meta.clone(), [0x11; 24], &SIGNATURE_KEY);

        let mut input = meta.to_bytes();
        input.extend_from_slice(&message.ciphertext);
        let expected = kdf::hmac_sha256(&SIGNATURE_KEY, &[&input]);
        assert_eq!(message.mac, expected);
    }

    #[test]
    fn mac_is_independent_of_nonce() {
        let key = test_message_key(0);
        let mut message = encrypt_message(b"x", &key, metadata(0), [0; 24], &SIGNATURE_KEY);
        message.nonce[0] ^= 0xFF;

        verify_mac(&message, &SIGNATURE_KEY).unwrap();
        assert_eq!(decrypt_message(&message, &key), Err(SenderKeyError::AuthenticationFailed));
    }

    #[test]
    fn metadata_encoding_is_unambiguous() {
        let a = SenderKeyMetadata { sender_id: "ab".into(), group_id: "c".into(), iteration: 0 };
        let b = SenderKeyMetadata { sender_id: "a".into(), group_id: "bc".into(), iteration: 0 };
        assert_ne!(a.to_bytes(), b.to_bytes());
    }
}

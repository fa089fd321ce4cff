//! Ratchet message header and wire encoding

use serde::{Deserialize, Serialize};

use super::error::RatchetError;
use crate::primitives::aead::NONCE_SIZE;

/// Encoded header size: ratchet key (32) + previous counter (4) + counter (4)
pub const HEADER_SIZE: usize = 40;

/// Header sent in the clear with every ratchet message.
///
/// The encoded header is authenticated as associated data, so it cannot be
/// altered without failing decryption.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetHeader {
    /// Sender's current ratchet public key
    pub ratchet_public_key: [u8; 32],
    /// Number of messages sent in the sender's previous sending chain
    pub previous_chain_counter: u32,
    /// Index of this message in the current sending chain
    pub counter: u32,
}

impl RatchetHeader {
    /// Fixed-size big-endian encoding.
    ///
    /// Layout:
    /// - bytes 0-31: ratchet public key
    /// - bytes 32-35: previous chain counter
    /// - bytes 36-39: counter
    pub fn to_bytes(&self) -> [u8; HEADER_SIZE] {
        let mut out = [0u8; HEADER_SIZE];
        out[0..32].copy_from_slice(&self.ratchet_public_key);
        out[32..36].copy_from_slice(&self.previous_chain_counter.to_be_bytes());
        out[36..40].copy_from_slice(&self.counter.to_be_bytes());
        out
    }

    /// Decode a header produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RatchetError> {
        if bytes.len() != HEADER_SIZE {
            return Err(RatchetError::Malformed {
                reason: format!("header must be {HEADER_SIZE} bytes, got {}", bytes.len()),
            });
        }

        let mut ratchet_public_key = [0u8; 32];
        ratchet_public_key.copy_from_slice(&bytes[0..32]);

        let mut previous = [0u8; 4];
        previous.copy_from_slice(&bytes[32..36]);
        let mut counter = [0u8; 4];
        counter.copy_from_slice(&bytes[36..40]);

        Ok(Self {
            ratchet_public_key,
            previous_chain_counter: u32::from_be_bytes(previous),
            counter: u32::from_be_bytes(counter),
        })
    }
}

/// A message encrypted by a [`super::RatchetSession`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RatchetMessage {
    /// Cleartext header
    pub header: RatchetHeader,
    /// `XChaCha20` nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including the 16-byte Poly1305 tag
    pub ciphertext: Vec<u8>,
}

impl RatchetMessage {
    /// Encode as `header || nonce || ciphertext`.
    pub fn to_bytes(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_SIZE + NONCE_SIZE + self.ciphertext.len());
        out.extend_from_slice(&self.header.to_bytes());
        out.extend_from_slice(&self.nonce);
        out.extend_from_slice(&self.ciphertext);
        out
    }

    /// Decode bytes produced by [`Self::to_bytes`].
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, RatchetError> {
        if bytes.len() < HEADER_SIZE + NONCE_SIZE {
            return Err(RatchetError::Malformed {
                reason: format!("message too short: {} bytes", bytes.len()),
            });
        }

        let header = RatchetHeader::from_bytes(&bytes[..HEADER_SIZE])?;
        let mut nonce = [0u8; NONCE_SIZE];
        nonce.copy_from_slice(&bytes[HEADER_SIZE..HEADER_SIZE + NONCE_SIZE]);

        Ok(Self { header, nonce, ciphertext: bytes[HEADER_SIZE + NONCE_SIZE..].to_vec() })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn header_layout() {
        let header = RatchetHeader {
            ratchet_public_key: [0xAB; 32],
            previous_chain_counter: 0x0102_0304,
            counter: 0x0506_0708,
        };
        let bytes = header.to_bytes();

        assert_eq!(&bytes[0..32], &[0xAB; 32]);
        assert_eq!(&bytes[32..36], &[0x01, 0x02, 0x03, 0x04]);
        assert_eq!(&bytes[36..40], &[0x05, 0x06, 0x07, 0x08]);
        assert_eq!(RatchetHeader::from_bytes(&bytes).unwrap(), header);
    }

    #[test]
    fn short_header_rejected() {
        assert!(matches!(
            RatchetHeader::from_bytes(&[0u8; 39]),
            Err(RatchetError::Malformed { .. })
        ));
    }

    #[test]
    fn message_bytes_split_correctly() {
        let message = RatchetMessage {
            header: RatchetHeader {
                ratchet_public_key: [1; 32],
                previous_chain_counter: 2,
                counter: 3,
            },
            nonce: [4; NONCE_SIZE],
            ciphertext: vec![5; 20],
        };

        let decoded = RatchetMessage::from_bytes(&message.to_bytes()).unwrap();
        assert_eq!(decoded, message);
    }

    #[test]
    fn truncated_message_rejected() {
        assert!(RatchetMessage::from_bytes(&[0u8; HEADER_SIZE]).is_err());
    }
}

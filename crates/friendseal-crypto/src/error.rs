//! Error types for the shared primitives

use thiserror::Error;

/// Errors from primitive cryptographic operations.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CryptoError {
    /// AEAD tag did not verify (wrong key, tampered ciphertext or AAD)
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Key or nonce material has the wrong length
    #[error("invalid key length: expected {expected}, got {actual}")]
    InvalidKeyLength {
        /// Expected length in bytes
        expected: usize,
        /// Actual length in bytes
        actual: usize,
    },

    /// Input was not valid hexadecimal
    #[error("invalid hex: {reason}")]
    InvalidHex {
        /// Decoder error description
        reason: String,
    },

    /// Diffie-Hellman produced the all-zero output (low-order peer key)
    #[error("non-contributory Diffie-Hellman output")]
    NonContributory,
}

impl From<hex::FromHexError> for CryptoError {
    fn from(err: hex::FromHexError) -> Self {
        Self::InvalidHex { reason: err.to_string() }
    }
}

//! Envelope error types

use thiserror::Error;

use crate::keys::{Algorithm, SignerError};

/// Errors from envelope operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EnvelopeError {
    /// No entry for the address could be unwrapped with the given key
    #[error("no key found for address {address}")]
    NotARecipient {
        /// Normalized address that was looked up
        address: String,
    },

    /// Address already has an entry
    #[error("address {address} is already a recipient")]
    DuplicateRecipient {
        /// Normalized address
        address: String,
    },

    /// Seal was called with an empty recipient list
    #[error("envelope needs at least one recipient")]
    NoRecipients,

    /// Content ciphertext did not authenticate under the recovered key
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Key family does not match the envelope (or the other recipients)
    #[error("algorithm mismatch: expected {expected}, got {actual}")]
    AlgorithmMismatch {
        /// Algorithm required
        expected: Algorithm,
        /// Algorithm supplied
        actual: Algorithm,
    },

    /// Signing message version is not published
    #[error("unknown signing version {version}, supported: {supported:?}")]
    UnknownVersion {
        /// Requested version
        version: u32,
        /// Published versions
        supported: Vec<u32>,
    },

    /// Envelope JSON or one of its fields is invalid
    #[error("malformed envelope: {reason}")]
    Malformed {
        /// What was wrong
        reason: String,
    },

    /// Public or secret key material is invalid
    #[error("invalid key: {reason}")]
    InvalidKey {
        /// What was wrong
        reason: String,
    },

    /// ML-KEM operation failed
    #[error("KEM failure: {reason}")]
    Kem {
        /// Reason reported by the KEM
        reason: String,
    },

    /// Plaintext could not be converted to the requested type
    #[error("payload error: {reason}")]
    Payload {
        /// Decoder error description
        reason: String,
    },

    /// External signer failed or refused
    #[error(transparent)]
    Signer(#[from] SignerError),
}

impl From<friendseal_crypto::CryptoError> for EnvelopeError {
    fn from(err: friendseal_crypto::CryptoError) -> Self {
        match err {
            friendseal_crypto::CryptoError::AuthenticationFailed => Self::AuthenticationFailed,
            friendseal_crypto::CryptoError::InvalidHex { reason } => Self::Malformed { reason },
            other => Self::InvalidKey { reason: other.to_string() },
        }
    }
}

impl From<serde_json::Error> for EnvelopeError {
    fn from(err: serde_json::Error) -> Self {
        Self::Malformed { reason: err.to_string() }
    }
}

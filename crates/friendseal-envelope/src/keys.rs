//! Key families, signature-based key derivation and key sources

use std::fmt;

use async_trait::async_trait;
use friendseal_crypto::{
    KeyPair,
    primitives::{PUBLIC_KEY_SIZE, from_hex, from_hex_array, kdf, normalize_address, to_hex},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::{
    error::EnvelopeError,
    hybrid::{HybridPublicKey, HybridSecretKey},
    registry::SigningRegistry,
};

/// Key-encapsulation family of an envelope.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// X25519 ephemeral-static ECDH
    Classical,
    /// ML-KEM-768 combined with X25519
    Hybrid,
}

impl Algorithm {
    /// Wire `algorithm_id`.
    pub fn id(self) -> &'static str {
        match self {
            Self::Classical => "x25519-xchacha20poly1305",
            Self::Hybrid => "mlkem768-x25519-xchacha20poly1305",
        }
    }

    /// Wire `format_version`.
    pub fn format_version(self) -> &'static str {
        match self {
            Self::Classical => "1.0",
            Self::Hybrid => "2.0",
        }
    }

    /// Parse a wire `algorithm_id`.
    pub fn from_id(id: &str) -> Option<Self> {
        [Self::Classical, Self::Hybrid].into_iter().find(|a| a.id() == id)
    }

    /// Parse a wire `format_version`.
    pub fn from_format_version(version: &str) -> Option<Self> {
        [Self::Classical, Self::Hybrid].into_iter().find(|a| a.format_version() == version)
    }
}

impl fmt::Display for Algorithm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.id())
    }
}

/// A recipient's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PublicKey {
    /// 32-byte X25519 public key
    Classical([u8; PUBLIC_KEY_SIZE]),
    /// 1216-byte hybrid public key
    Hybrid(HybridPublicKey),
}

impl PublicKey {
    /// Family of this key.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Classical(_) => Algorithm::Classical,
            Self::Hybrid(_) => Algorithm::Hybrid,
        }
    }

    /// Raw bytes.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Classical(key) => key.to_vec(),
            Self::Hybrid(key) => key.as_bytes().to_vec(),
        }
    }

    /// Lower-case hex.
    pub fn to_hex(&self) -> String {
        to_hex(&self.to_bytes())
    }

    /// Parse hex for the given family.
    pub fn from_hex(algorithm: Algorithm, input: &str) -> Result<Self, EnvelopeError> {
        match algorithm {
            Algorithm::Classical => Ok(Self::Classical(from_hex_array(input)?)),
            Algorithm::Hybrid => Ok(Self::Hybrid(HybridPublicKey::from_bytes(&from_hex(input)?)?)),
        }
    }
}

/// A secret key able to open envelopes of one family.
#[derive(Debug, Clone)]
pub enum SecretKey {
    /// X25519 key pair
    Classical(KeyPair),
    /// Hybrid seed
    Hybrid(HybridSecretKey),
}

impl SecretKey {
    /// Derive the key pair for `algorithm` from a wallet signature.
    ///
    /// `seed = SHA-256(signature)`. The same signature always yields the
    /// same key; signatures over different registry versions yield unrelated
    /// keys.
    pub fn from_signature(algorithm: Algorithm, signature: &str) -> Self {
        let seed = kdf::sha256(signature.as_bytes());
        Self::from_seed(algorithm, seed)
    }

    /// Rebuild from the 32-byte secret.
    pub fn from_seed(algorithm: Algorithm, seed: [u8; 32]) -> Self {
        match algorithm {
            Algorithm::Classical => Self::Classical(KeyPair::from_secret_bytes(seed)),
            Algorithm::Hybrid => Self::Hybrid(HybridSecretKey::from_seed(seed)),
        }
    }

    /// Family of this key.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Classical(_) => Algorithm::Classical,
            Self::Hybrid(_) => Algorithm::Hybrid,
        }
    }

    /// The 32-byte secret (X25519 scalar or hybrid seed) as hex.
    pub fn to_hex(&self) -> String {
        match self {
            Self::Classical(pair) => to_hex(&pair.secret_bytes()[..]),
            Self::Hybrid(secret) => to_hex(&secret.seed()[..]),
        }
    }

    /// Parse a secret printed by [`Self::to_hex`].
    pub fn from_hex(algorithm: Algorithm, input: &str) -> Result<Self, EnvelopeError> {
        Ok(Self::from_seed(algorithm, from_hex_array(input)?))
    }

    /// Matching public key.
    pub fn public_key(&self) -> Result<PublicKey, EnvelopeError> {
        match self {
            Self::Classical(pair) => Ok(PublicKey::Classical(pair.public_key())),
            Self::Hybrid(secret) => Ok(PublicKey::Hybrid(secret.public_key()?)),
        }
    }
}

/// An address and the public key to seal for.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Recipient {
    address: String,
    public_key: PublicKey,
}

impl Recipient {
    /// Recipient with a normalized address.
    pub fn new(address: &str, public_key: PublicKey) -> Self {
        Self { address: normalize_address(address), public_key }
    }

    /// Normalized address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// Public key.
    pub fn public_key(&self) -> &PublicKey {
        &self.public_key
    }
}

/// Failure reported by an external signer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("signer failed: {reason}")]
pub struct SignerError {
    /// Signer's description of the failure
    pub reason: String,
}

/// External wallet signer.
///
/// Must be deterministic: the same key signing the same text returns the
/// same signature, or derived keys cannot be recovered.
#[async_trait]
pub trait Signer: Send + Sync {
    /// Sign `message` exactly as given.
    async fn sign_message(&self, message: &str) -> Result<String, SignerError>;
}

/// Where a secret key comes from.
pub enum KeySource<'a> {
    /// Already derived
    Cached(SecretKey),
    /// Ask the signer for a signature over the registry message
    External(&'a dyn Signer),
}

impl KeySource<'_> {
    /// Produce the secret key for `algorithm` under `version` of `registry`.
    ///
    /// # Errors
    ///
    /// - `AlgorithmMismatch`: cached key is of the other family
    /// - `UnknownVersion`: version not in the registry
    /// - `Signer`: signer failed
    pub async fn resolve(
        self,
        algorithm: Algorithm,
        registry: &SigningRegistry,
        version: u32,
    ) -> Result<SecretKey, EnvelopeError> {
        match self {
            Self::Cached(key) if key.algorithm() == algorithm => Ok(key),
            Self::Cached(key) => Err(EnvelopeError::AlgorithmMismatch {
                expected: algorithm,
                actual: key.algorithm(),
            }),
            Self::External(signer) => {
                let message = registry.message(version)?;
                tracing::debug!(version, "envelope: requesting signature for key derivation");
                let signature = signer.sign_message(message).await?;
                Ok(SecretKey::from_signature(algorithm, &signature))
            },
        }
    }
}

impl fmt::Debug for KeySource<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Cached(key) => f.debug_tuple("Cached").field(&key.algorithm()).finish(),
            Self::External(_) => f.write_str("External"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoSigner;

    #[async_trait]
    impl Signer for EchoSigner {
        async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
            Ok(format!("signed:{}", message.len()))
        }
    }

    #[test]
    fn algorithm_wire_names() {
        assert_eq!(Algorithm::from_id("x25519-xchacha20poly1305"), Some(Algorithm::Classical));
        assert_eq!(Algorithm::from_format_version("2.0"), Some(Algorithm::Hybrid));
        assert_eq!(Algorithm::from_format_version("3.0"), None);
    }

    #[test]
    fn signature_derivation_is_deterministic() {
        let a = SecretKey::from_signature(Algorithm::Classical, "sig-A");
        let b = SecretKey::from_signature(Algorithm::Classical, "sig-A");
        let c = SecretKey::from_signature(Algorithm::Classical, "sig-B");

        assert_eq!(a.public_key().unwrap(), b.public_key().unwrap());
        assert_ne!(a.public_key().unwrap(), c.public_key().unwrap());
    }

    #[test]
    fn secret_hex_roundtrip() {
        let key = SecretKey::from_signature(Algorithm::Hybrid, "sig-A");
        let parsed = SecretKey::from_hex(Algorithm::Hybrid, &key.to_hex()).unwrap();
        assert_eq!(key.public_key().unwrap(), parsed.public_key().unwrap());
    }

    #[test]
    fn public_key_hex_checks_length() {
        assert!(PublicKey::from_hex(Algorithm::Classical, "abcd").is_err());
    }

    #[test]
    fn recipient_address_normalized() {
        let key = SecretKey::from_signature(Algorithm::Classical, "x").public_key().unwrap();
        assert_eq!(Recipient::new(" 0xABC ", key).address(), "0xabc");
    }

    #[tokio::test]
    async fn external_source_signs_registry_text() {
        let registry = SigningRegistry::market();
        let expected_signature = format!("signed:{}", registry.message(1).unwrap().len());

        let key = KeySource::External(&EchoSigner)
            .resolve(Algorithm::Classical, &registry, 1)
            .await
            .unwrap();

        let direct = SecretKey::from_signature(Algorithm::Classical, &expected_signature);
        assert_eq!(key.public_key().unwrap(), direct.public_key().unwrap());
    }

    #[tokio::test]
    async fn cached_source_checks_family() {
        let cached = SecretKey::from_signature(Algorithm::Classical, "sig");
        let result = KeySource::Cached(cached)
            .resolve(Algorithm::Hybrid, &SigningRegistry::market(), 2)
            .await;

        assert!(matches!(result, Err(EnvelopeError::AlgorithmMismatch { .. })));
    }
}

//! Structured plaintext helpers

use rand::{CryptoRng, RngCore};
use serde::{Serialize, de::DeserializeOwned};

use crate::{envelope::Envelope, error::EnvelopeError, keys::{Recipient, SecretKey}};

/// Decrypted envelope content.
///
/// Plaintext that parses as JSON is `Structured`; any other valid UTF-8 is
/// returned verbatim as `Text`.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    /// JSON document
    Structured(serde_json::Value),
    /// Plain text
    Text(String),
}

impl Payload {
    /// Interpret raw plaintext.
    ///
    /// # Errors
    ///
    /// - `Payload`: bytes are neither JSON nor UTF-8
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if let Ok(value) = serde_json::from_slice(bytes) {
            return Ok(Self::Structured(value));
        }

        String::from_utf8(bytes.to_vec())
            .map(Self::Text)
            .map_err(|err| EnvelopeError::Payload { reason: err.to_string() })
    }

    /// Plaintext bytes: compact JSON or the text itself.
    pub fn to_bytes(&self) -> Vec<u8> {
        match self {
            Self::Structured(value) => value.to_string().into_bytes(),
            Self::Text(text) => text.as_bytes().to_vec(),
        }
    }
}

impl Envelope {
    /// Serialize `value` as JSON and [`seal`](Self::seal) it.
    ///
    /// # Errors
    ///
    /// - `Payload`: `value` does not serialize
    /// - any error from [`seal`](Self::seal)
    pub fn seal_serialized<T: Serialize, R: CryptoRng + RngCore>(
        value: &T,
        recipients: &[Recipient],
        signing_version: u32,
        rng: &mut R,
    ) -> Result<Self, EnvelopeError> {
        let plaintext = serde_json::to_vec(value)
            .map_err(|err| EnvelopeError::Payload { reason: err.to_string() })?;
        Self::seal(&plaintext, recipients, signing_version, rng)
    }

    /// [`open`](Self::open) and interpret the plaintext as a [`Payload`].
    pub fn open_payload(
        &self,
        address: &str,
        secret: &SecretKey,
    ) -> Result<Payload, EnvelopeError> {
        Payload::from_bytes(&self.open(address, secret)?)
    }

    /// [`open`](Self::open) and deserialize the plaintext as JSON.
    ///
    /// # Errors
    ///
    /// - `Payload`: plaintext is not JSON of type `T`
    /// - any error from [`open`](Self::open)
    pub fn open_as<T: DeserializeOwned>(
        &self,
        address: &str,
        secret: &SecretKey,
    ) -> Result<T, EnvelopeError> {
        let plaintext = self.open(address, secret)?;
        serde_json::from_slice(&plaintext)
            .map_err(|err| EnvelopeError::Payload { reason: err.to_string() })
    }
}

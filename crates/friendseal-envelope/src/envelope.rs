//! Envelope types and JSON wire format

use friendseal_crypto::primitives::{
    aead::NONCE_SIZE, from_hex, from_hex_array, normalize_address, to_hex,
};
use serde::{Deserialize, Serialize};

use crate::{error::EnvelopeError, hybrid::HYBRID_CIPHERTEXT_SIZE, keys::Algorithm};

/// The single encrypted payload of an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SealedContent {
    /// `XChaCha20` nonce
    pub nonce: [u8; NONCE_SIZE],
    /// Ciphertext including tag
    pub ciphertext: Vec<u8>,
}

/// Per-recipient material needed to recover the shared secret.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Encapsulation {
    /// Ephemeral X25519 public key
    Classical {
        /// Sender's ephemeral public key
        ephemeral_public_key: [u8; 32],
    },
    /// Hybrid KEM ciphertext (1120 bytes)
    Hybrid {
        /// ML-KEM ciphertext followed by the ephemeral X25519 public key
        kem_ciphertext: Vec<u8>,
    },
}

impl Encapsulation {
    /// Family this encapsulation belongs to.
    pub fn algorithm(&self) -> Algorithm {
        match self {
            Self::Classical { .. } => Algorithm::Classical,
            Self::Hybrid { .. } => Algorithm::Hybrid,
        }
    }
}

/// The content key wrapped for one recipient.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecipientKey {
    /// Normalized address
    pub address: String,
    /// Content key sealed under the wrapping key
    pub wrapped_key: Vec<u8>,
    /// Nonce of `wrapped_key`
    pub nonce: [u8; NONCE_SIZE],
    /// Material for deriving the wrapping key
    pub encapsulation: Encapsulation,
}

/// A multi-recipient encrypted record.
///
/// The algorithm is decided once when the envelope is built or parsed;
/// every entry in `keys` carries an encapsulation of that family.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "WireEnvelope", into = "WireEnvelope")]
pub struct Envelope {
    /// Key-encapsulation family
    pub algorithm: Algorithm,
    /// Registry version the recipients' keys were derived under
    pub signing_version: u32,
    /// Encrypted payload
    pub content: SealedContent,
    /// One entry per recipient
    pub keys: Vec<RecipientKey>,
}

impl Envelope {
    /// Parse envelope JSON.
    pub fn from_json(json: &str) -> Result<Self, EnvelopeError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string(self)?)
    }

    /// Serialize to indented JSON.
    pub fn to_json_pretty(&self) -> Result<String, EnvelopeError> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Addresses that hold an entry, in entry order.
    pub fn recipients(&self) -> impl Iterator<Item = &str> {
        self.keys.iter().map(|k| k.address.as_str())
    }

    /// True if `address` (normalized) has an entry.
    pub fn has_recipient(&self, address: &str) -> bool {
        self.entry(&normalize_address(address)).is_some()
    }

    /// First entry for a normalized address.
    pub(crate) fn entry(&self, normalized: &str) -> Option<&RecipientKey> {
        self.keys.iter().find(|k| k.address == normalized)
    }
}

fn default_signing_version() -> u32 {
    1
}

#[derive(Serialize, Deserialize)]
struct WireEnvelope {
    format_version: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    algorithm_id: Option<String>,
    #[serde(default = "default_signing_version")]
    signing_version: u32,
    content: WireContent,
    keys: Vec<WireRecipientKey>,
}

#[derive(Serialize, Deserialize)]
struct WireContent {
    nonce: String,
    ciphertext: String,
}

#[derive(Serialize, Deserialize)]
struct WireRecipientKey {
    address: String,
    wrapped_key: String,
    nonce: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    ephemeral_public_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    kem_ciphertext: Option<String>,
}

impl From<Envelope> for WireEnvelope {
    fn from(envelope: Envelope) -> Self {
        let keys = envelope
            .keys
            .into_iter()
            .map(|key| {
                let (ephemeral_public_key, kem_ciphertext) = match key.encapsulation {
                    Encapsulation::Classical { ephemeral_public_key } => {
                        (Some(to_hex(&ephemeral_public_key)), None)
                    },
                    Encapsulation::Hybrid { kem_ciphertext } => {
                        (None, Some(to_hex(&kem_ciphertext)))
                    },
                };
                WireRecipientKey {
                    address: key.address,
                    wrapped_key: to_hex(&key.wrapped_key),
                    nonce: to_hex(&key.nonce),
                    ephemeral_public_key,
                    kem_ciphertext,
                }
            })
            .collect();

        Self {
            format_version: envelope.algorithm.format_version().to_string(),
            algorithm_id: Some(envelope.algorithm.id().to_string()),
            signing_version: envelope.signing_version,
            content: WireContent {
                nonce: to_hex(&envelope.content.nonce),
                ciphertext: to_hex(&envelope.content.ciphertext),
            },
            keys,
        }
    }
}

impl TryFrom<WireEnvelope> for Envelope {
    type Error = EnvelopeError;

    fn try_from(wire: WireEnvelope) -> Result<Self, Self::Error> {
        let algorithm = resolve_algorithm(&wire.format_version, wire.algorithm_id.as_deref())?;

        let content = SealedContent {
            nonce: field_array("content.nonce", &wire.content.nonce)?,
            ciphertext: field_bytes("content.ciphertext", &wire.content.ciphertext)?,
        };

        let keys = wire
            .keys
            .into_iter()
            .map(|key| parse_recipient_key(algorithm, key))
            .collect::<Result<Vec<_>, _>>()?;

        Ok(Self { algorithm, signing_version: wire.signing_version, content, keys })
    }
}

fn resolve_algorithm(
    format_version: &str,
    algorithm_id: Option<&str>,
) -> Result<Algorithm, EnvelopeError> {
    let from_format = Algorithm::from_format_version(format_version).ok_or_else(|| {
        EnvelopeError::Malformed { reason: format!("unknown format_version {format_version:?}") }
    })?;

    let Some(id) = algorithm_id else {
        return Ok(from_format);
    };

    let Some(from_id) = Algorithm::from_id(id) else {
        return Err(EnvelopeError::Malformed { reason: format!("unknown algorithm_id {id:?}") });
    };
    if from_id != from_format {
        return Err(EnvelopeError::Malformed {
            reason: format!("algorithm_id {id:?} does not match format_version {format_version:?}"),
        });
    }

    Ok(from_id)
}

fn parse_recipient_key(
    algorithm: Algorithm,
    key: WireRecipientKey,
) -> Result<RecipientKey, EnvelopeError> {
    let encapsulation = match (algorithm, key.ephemeral_public_key, key.kem_ciphertext) {
        (Algorithm::Classical, Some(ephemeral), None) => {
            Encapsulation::Classical {
                ephemeral_public_key: field_array("ephemeral_public_key", &ephemeral)?,
            }
        },
        (Algorithm::Hybrid, None, Some(ciphertext)) => {
            let kem_ciphertext = field_bytes("kem_ciphertext", &ciphertext)?;
            if kem_ciphertext.len() != HYBRID_CIPHERTEXT_SIZE {
                return Err(EnvelopeError::Malformed {
                    reason: format!(
                        "kem_ciphertext for {} must be {HYBRID_CIPHERTEXT_SIZE} bytes, got {}",
                        key.address,
                        kem_ciphertext.len()
                    ),
                });
            }
            Encapsulation::Hybrid { kem_ciphertext }
        },
        _ => {
            return Err(EnvelopeError::Malformed {
                reason: format!(
                    "entry for {} must carry exactly the {algorithm} encapsulation field",
                    key.address
                ),
            });
        },
    };

    Ok(RecipientKey {
        address: normalize_address(&key.address),
        wrapped_key: field_bytes("wrapped_key", &key.wrapped_key)?,
        nonce: field_array("nonce", &key.nonce)?,
        encapsulation,
    })
}

fn field_bytes(name: &str, value: &str) -> Result<Vec<u8>, EnvelopeError> {
    from_hex(value).map_err(|err| EnvelopeError::Malformed { reason: format!("{name}: {err}") })
}

fn field_array<const N: usize>(name: &str, value: &str) -> Result<[u8; N], EnvelopeError> {
    from_hex_array(value)
        .map_err(|err| EnvelopeError::Malformed { reason: format!("{name}: {err}") })
}

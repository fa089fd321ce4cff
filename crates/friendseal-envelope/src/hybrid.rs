//! Hybrid ML-KEM-768 + X25519 key encapsulation
//!
//! The secret key is a 32-byte seed. Both component key pairs are
//! re-derived from it whenever they are needed:
//!
//! ```text
//! seed ──HKDF──► 64 bytes ──┬── [0..32]  ChaCha20Rng seed → ML-KEM keygen
//!                           └── [32..64] X25519 secret
//! ```
//!
//! The combined shared secret hashes both component secrets together with
//! the X25519 public values, so it stays secret as long as either ML-KEM or
//! X25519 does.

use fips203::{
    ml_kem_768,
    traits::{Decaps, Encaps, KeyGen, SerDes},
};
use friendseal_crypto::{KeyPair, primitives::kdf};
use rand::{CryptoRng, RngCore, SeedableRng};
use rand_chacha::ChaCha20Rng;
use zeroize::{Zeroize, Zeroizing};

use crate::error::EnvelopeError;

/// ML-KEM-768 encapsulation key size
pub const MLKEM_PUBLIC_KEY_SIZE: usize = ml_kem_768::EK_LEN;

/// ML-KEM-768 ciphertext size
pub const MLKEM_CIPHERTEXT_SIZE: usize = ml_kem_768::CT_LEN;

/// Hybrid public key size: ML-KEM-768 (1184) + X25519 (32)
pub const HYBRID_PUBLIC_KEY_SIZE: usize = MLKEM_PUBLIC_KEY_SIZE + 32;

/// Hybrid secret key size (the seed)
pub const HYBRID_SECRET_KEY_SIZE: usize = 32;

/// Hybrid encapsulation size: ML-KEM-768 ciphertext (1088) + ephemeral X25519 (32)
pub const HYBRID_CIPHERTEXT_SIZE: usize = MLKEM_CIPHERTEXT_SIZE + 32;

const EXPAND_INFO: &[u8] = b"friendseal hybrid kem v1 expand";
const COMBINE_LABEL: &[u8] = b"friendseal-hybrid-v1";

/// Hybrid public key (`ek || x25519_public`), always 1216 bytes.
#[derive(Clone, PartialEq, Eq)]
pub struct HybridPublicKey {
    bytes: Vec<u8>,
}

impl HybridPublicKey {
    /// Validate and wrap raw bytes.
    ///
    /// # Errors
    ///
    /// - `InvalidKey`: wrong length or not a valid ML-KEM encapsulation key
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, EnvelopeError> {
        if bytes.len() != HYBRID_PUBLIC_KEY_SIZE {
            return Err(EnvelopeError::InvalidKey {
                reason: format!(
                    "hybrid public key must be {HYBRID_PUBLIC_KEY_SIZE} bytes, got {}",
                    bytes.len()
                ),
            });
        }

        let key = Self { bytes: bytes.to_vec() };
        key.encaps_key()?;
        Ok(key)
    }

    /// Raw bytes.
    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    fn encaps_key(&self) -> Result<ml_kem_768::EncapsKey, EnvelopeError> {
        let mut ek = [0u8; MLKEM_PUBLIC_KEY_SIZE];
        ek.copy_from_slice(&self.bytes[..MLKEM_PUBLIC_KEY_SIZE]);
        ml_kem_768::EncapsKey::try_from_bytes(ek)
            .map_err(|reason| EnvelopeError::InvalidKey { reason: reason.to_string() })
    }

    fn x25519(&self) -> [u8; 32] {
        let mut key = [0u8; 32];
        key.copy_from_slice(&self.bytes[MLKEM_PUBLIC_KEY_SIZE..]);
        key
    }
}

impl std::fmt::Debug for HybridPublicKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Full key is 2432 hex characters; the X25519 tail identifies it
        write!(f, "HybridPublicKey(..{})", hex::encode(self.x25519()))
    }
}

/// Hybrid secret key: the 32-byte seed both component keys derive from.
#[derive(Clone)]
pub struct HybridSecretKey {
    seed: Zeroizing<[u8; HYBRID_SECRET_KEY_SIZE]>,
}

struct ExpandedKeys {
    ek: ml_kem_768::EncapsKey,
    dk: ml_kem_768::DecapsKey,
    x25519: KeyPair,
}

impl HybridSecretKey {
    /// Wrap a seed.
    pub fn from_seed(seed: [u8; HYBRID_SECRET_KEY_SIZE]) -> Self {
        Self { seed: Zeroizing::new(seed) }
    }

    /// The seed, wiped when the wrapper drops.
    pub fn seed(&self) -> Zeroizing<[u8; HYBRID_SECRET_KEY_SIZE]> {
        self.seed.clone()
    }

    /// Derive the public key.
    pub fn public_key(&self) -> Result<HybridPublicKey, EnvelopeError> {
        let keys = self.expand()?;

        let mut bytes = Vec::with_capacity(HYBRID_PUBLIC_KEY_SIZE);
        bytes.extend_from_slice(&keys.ek.into_bytes());
        bytes.extend_from_slice(&keys.x25519.public_key());
        Ok(HybridPublicKey { bytes })
    }

    fn expand(&self) -> Result<ExpandedKeys, EnvelopeError> {
        let mut okm: [u8; 64] = kdf::hkdf_sha256(None, &self.seed[..], EXPAND_INFO);

        let mut kem_seed = [0u8; 32];
        let mut x25519_secret = [0u8; 32];
        kem_seed.copy_from_slice(&okm[..32]);
        x25519_secret.copy_from_slice(&okm[32..]);
        okm.zeroize();

        let mut kem_rng = ChaCha20Rng::from_seed(kem_seed);
        kem_seed.zeroize();
        let (ek, dk) = ml_kem_768::KG::try_keygen_with_rng(&mut kem_rng)
            .map_err(|reason| EnvelopeError::Kem { reason: reason.to_string() })?;

        let x25519 = KeyPair::from_secret_bytes(x25519_secret);
        x25519_secret.zeroize();

        Ok(ExpandedKeys { ek, dk, x25519 })
    }
}

impl std::fmt::Debug for HybridSecretKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("HybridSecretKey([REDACTED])")
    }
}

/// Encapsulate to `recipient`: `(shared_secret, ciphertext)`.
///
/// The ciphertext is `mlkem_ciphertext || ephemeral_x25519_public`.
pub fn encapsulate<R: CryptoRng + RngCore>(
    recipient: &HybridPublicKey,
    rng: &mut R,
) -> Result<(Zeroizing<[u8; 32]>, Vec<u8>), EnvelopeError> {
    let ek = recipient.encaps_key()?;
    let (kem_secret, kem_ciphertext) = ek
        .try_encaps_with_rng(rng)
        .map_err(|reason| EnvelopeError::Kem { reason: reason.to_string() })?;

    let ephemeral = KeyPair::generate(rng);
    let recipient_x25519 = recipient.x25519();
    let dh_secret = ephemeral.diffie_hellman(&recipient_x25519)?;

    let ephemeral_public = ephemeral.public_key();
    let shared = combine(
        &Zeroizing::new(kem_secret.into_bytes()),
        &dh_secret,
        &ephemeral_public,
        &recipient_x25519,
    );

    let mut ciphertext = Vec::with_capacity(HYBRID_CIPHERTEXT_SIZE);
    ciphertext.extend_from_slice(&kem_ciphertext.into_bytes());
    ciphertext.extend_from_slice(&ephemeral_public);

    Ok((shared, ciphertext))
}

/// Recover the shared secret from a ciphertext produced by [`encapsulate`].
///
/// ML-KEM decapsulation never fails on a well-formed ciphertext; a
/// ciphertext for another key yields an unrelated secret and the caller's
/// AEAD rejects it.
pub fn decapsulate(
    secret: &HybridSecretKey,
    ciphertext: &[u8],
) -> Result<Zeroizing<[u8; 32]>, EnvelopeError> {
    if ciphertext.len() != HYBRID_CIPHERTEXT_SIZE {
        return Err(EnvelopeError::Malformed {
            reason: format!(
                "KEM ciphertext must be {HYBRID_CIPHERTEXT_SIZE} bytes, got {}",
                ciphertext.len()
            ),
        });
    }

    let mut ct = [0u8; MLKEM_CIPHERTEXT_SIZE];
    ct.copy_from_slice(&ciphertext[..MLKEM_CIPHERTEXT_SIZE]);
    let kem_ciphertext = ml_kem_768::CipherText::try_from_bytes(ct)
        .map_err(|reason| EnvelopeError::Malformed { reason: reason.to_string() })?;

    let mut ephemeral_public = [0u8; 32];
    ephemeral_public.copy_from_slice(&ciphertext[MLKEM_CIPHERTEXT_SIZE..]);

    let keys = secret.expand()?;
    let kem_secret = keys
        .dk
        .try_decaps(&kem_ciphertext)
        .map_err(|reason| EnvelopeError::Kem { reason: reason.to_string() })?;
    let dh_secret = keys.x25519.diffie_hellman(&ephemeral_public)?;

    Ok(combine(
        &Zeroizing::new(kem_secret.into_bytes()),
        &dh_secret,
        &ephemeral_public,
        &keys.x25519.public_key(),
    ))
}

fn combine(
    kem_secret: &[u8; 32],
    dh_secret: &[u8; 32],
    ephemeral_public: &[u8; 32],
    recipient_public: &[u8; 32],
) -> Zeroizing<[u8; 32]> {
    Zeroizing::new(kdf::sha256_parts(&[
        COMBINE_LABEL,
        kem_secret,
        dh_secret,
        ephemeral_public,
        recipient_public,
    ]))
}

//! X25519 key pairs and Diffie-Hellman

use rand::{CryptoRng, RngCore};
use x25519_dalek::{PublicKey, StaticSecret};
use zeroize::Zeroizing;

use crate::error::CryptoError;

/// X25519 public key size (32 bytes)
pub const PUBLIC_KEY_SIZE: usize = 32;

/// X25519 secret scalar size (32 bytes)
pub const SECRET_KEY_SIZE: usize = 32;

/// An X25519 key pair.
///
/// The secret is zeroized on drop by `x25519-dalek`.
#[derive(Clone)]
pub struct KeyPair {
    secret: StaticSecret,
    public: PublicKey,
}

impl KeyPair {
    /// Generate a fresh key pair.
    pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
        let secret = StaticSecret::random_from_rng(rng);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Rebuild a key pair from its 32-byte secret.
    ///
    /// Any 32 bytes are a valid secret; clamping happens inside the scalar
    /// multiplication.
    pub fn from_secret_bytes(bytes: [u8; SECRET_KEY_SIZE]) -> Self {
        let secret = StaticSecret::from(bytes);
        let public = PublicKey::from(&secret);
        Self { secret, public }
    }

    /// Public half as raw bytes.
    pub fn public_key(&self) -> [u8; PUBLIC_KEY_SIZE] {
        self.public.to_bytes()
    }

    /// Secret half as raw bytes, wiped when the wrapper drops.
    pub fn secret_bytes(&self) -> Zeroizing<[u8; SECRET_KEY_SIZE]> {
        Zeroizing::new(self.secret.to_bytes())
    }

    /// X25519 with a peer public key.
    ///
    /// # Errors
    ///
    /// - `NonContributory`: the peer key is a low-order point and the output
    ///   is all zeroes
    pub fn diffie_hellman(
        &self,
        their_public: &[u8; PUBLIC_KEY_SIZE],
    ) -> Result<Zeroizing<[u8; 32]>, CryptoError> {
        let shared = self.secret.diffie_hellman(&PublicKey::from(*their_public));
        if !shared.was_contributory() {
            return Err(CryptoError::NonContributory);
        }

        Ok(Zeroizing::new(shared.to_bytes()))
    }
}

impl std::fmt::Debug for KeyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("KeyPair")
            .field("public", &hex::encode(self.public.as_bytes()))
            .field("secret", &"[REDACTED]")
            .finish()
    }
}

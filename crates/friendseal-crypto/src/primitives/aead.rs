//! Authenticated encryption using `XChaCha20-Poly1305`
//!
//! The 24-byte extended nonce is large enough to be drawn at random for
//! every message without tracking counters.

use chacha20poly1305::{
    XChaCha20Poly1305, XNonce,
    aead::{Aead, KeyInit, Payload},
};
use rand::{CryptoRng, RngCore};

use crate::error::CryptoError;

/// Symmetric key size (32 bytes)
pub const KEY_SIZE: usize = 32;

/// Extended nonce size (24 bytes)
pub const NONCE_SIZE: usize = 24;

/// Poly1305 tag size (16 bytes)
pub const TAG_SIZE: usize = 16;

/// Draw a fresh random nonce.
pub fn random_nonce<R: CryptoRng + RngCore>(rng: &mut R) -> [u8; NONCE_SIZE] {
    let mut nonce = [0u8; NONCE_SIZE];
    rng.fill_bytes(&mut nonce);
    nonce
}

/// Draw a fresh random 32-byte key.
pub fn random_key<R: CryptoRng + RngCore>(rng: &mut R) -> [u8; KEY_SIZE] {
    let mut key = [0u8; KEY_SIZE];
    rng.fill_bytes(&mut key);
    key
}

/// Encrypt `plaintext`, binding `aad` into the tag.
///
/// Output is the ciphertext with the 16-byte tag appended.
pub fn seal(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    plaintext: &[u8],
    aad: &[u8],
) -> Vec<u8> {
    let cipher = XChaCha20Poly1305::new(key.into());

    let Ok(ciphertext) =
        cipher.encrypt(XNonce::from_slice(nonce), Payload { msg: plaintext, aad })
    else {
        unreachable!("XChaCha20-Poly1305 encryption cannot fail with valid inputs");
    };

    ciphertext
}

/// Decrypt and authenticate `ciphertext`.
///
/// # Errors
///
/// - `AuthenticationFailed`: wrong key, wrong AAD or tampered ciphertext
pub fn open(
    key: &[u8; KEY_SIZE],
    nonce: &[u8; NONCE_SIZE],
    ciphertext: &[u8],
    aad: &[u8],
) -> Result<Vec<u8>, CryptoError> {
    let cipher = XChaCha20Poly1305::new(key.into());

    cipher
        .decrypt(XNonce::from_slice(nonce), Payload { msg: ciphertext, aad })
        .map_err(|_| CryptoError::AuthenticationFailed)
}

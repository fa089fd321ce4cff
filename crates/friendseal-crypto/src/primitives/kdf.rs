//! Keyed hashing and key derivation (HMAC-SHA256, HKDF-SHA256)

use hkdf::Hkdf;
use hmac::{Hmac, Mac};
use sha2::{Digest, Sha256};
use subtle::ConstantTimeEq;

type HmacSha256 = Hmac<Sha256>;

/// HMAC-SHA256 output size (32 bytes)
pub const MAC_SIZE: usize = 32;

/// HMAC-SHA256 over the concatenation of `parts`.
pub fn hmac_sha256(key: &[u8], parts: &[&[u8]]) -> [u8; MAC_SIZE] {
    let Ok(mut mac) = HmacSha256::new_from_slice(key) else {
        unreachable!("HMAC-SHA256 accepts any key size");
    };
    for part in parts {
        mac.update(part);
    }

    let result = mac.finalize().into_bytes();

    let mut tag = [0u8; MAC_SIZE];
    tag.copy_from_slice(&result);
    tag
}

/// Recompute an HMAC and compare it with `tag` in constant time.
pub fn hmac_sha256_verify(key: &[u8], parts: &[&[u8]], tag: &[u8; MAC_SIZE]) -> bool {
    let expected = hmac_sha256(key, parts);
    expected.as_slice().ct_eq(tag.as_slice()).into()
}

/// HKDF-SHA256 extract-then-expand into an `N`-byte array.
///
/// `N` must not exceed 8160 bytes (255 SHA-256 blocks). Every caller in this
/// workspace asks for 32 or 64 bytes.
pub fn hkdf_sha256<const N: usize>(salt: Option<&[u8]>, ikm: &[u8], info: &[u8]) -> [u8; N] {
    let hkdf = Hkdf::<Sha256>::new(salt, ikm);

    let mut okm = [0u8; N];
    let Ok(()) = hkdf.expand(info, &mut okm) else {
        unreachable!("output length is within the HKDF-SHA256 limit");
    };

    okm
}

/// Plain SHA-256 digest.
pub fn sha256(data: &[u8]) -> [u8; 32] {
    sha256_parts(&[data])
}

/// SHA-256 over the concatenation of `parts`.
pub fn sha256_parts(parts: &[&[u8]]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    for part in parts {
        hasher.update(part);
    }
    let result = hasher.finalize();

    let mut digest = [0u8; 32];
    digest.copy_from_slice(&result);
    digest
}

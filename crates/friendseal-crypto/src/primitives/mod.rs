//! Stateless primitives shared by the envelope, ratchet and sender key
//! layers.
//!
//! Nothing in here holds state between calls. Functions that need
//! randomness take the RNG as a parameter.

pub mod aead;
mod dh;
mod encoding;
pub mod kdf;

pub use dh::{KeyPair, PUBLIC_KEY_SIZE, SECRET_KEY_SIZE};
pub use encoding::{from_hex, from_hex_array, normalize_address, to_hex};

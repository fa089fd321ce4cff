//! friendseal Cryptographic Core
//!
//! Cryptographic building blocks for friendseal: the primitives shared by
//! every protocol, the pairwise Double Ratchet and the group Sender Keys
//! scheme. All functions are deterministic given their inputs. Randomness is
//! always passed in by the caller as a `CryptoRng + RngCore`, so tests can
//! replay exact sequences with a seeded RNG.
//!
//! # Key Lifecycle
//!
//! ```text
//! Handshake shared secret                 Random sender key
//!        │                                        │
//!        ▼                                        ▼
//! Root KDF ◄── DH ratchet step             Sender chain (HMAC)
//!        │                                        │
//!        ▼                                        ▼
//! Chain KDF → message key                  HKDF(chain, iteration) → message key
//!        │                                        │
//!        ▼                                        ▼
//! XChaCha20-Poly1305                       XChaCha20-Poly1305 + HMAC sender tag
//! ```
//!
//! Message keys are used for exactly one encryption operation. Chain keys
//! are overwritten when advanced, so compromising current state does not
//! expose earlier messages.
//!
//! # Security
//!
//! Forward Secrecy:
//! - Chain ratchets: old chain keys are zeroized after deriving the next key
//! - DH ratchet: every change of speaker mixes a fresh X25519 output into the
//!   root key
//! - Sender key rotation: a rotated group key discards the old chain entirely
//!
//! Authenticity:
//! - XChaCha20-Poly1305 rejects any tampered ciphertext or associated data
//! - Sender Keys carry an additional HMAC under a per-sender signature key,
//!   verified in constant time before decryption is attempted
//!
//! Failure Atomicity:
//! - Decryption never leaves a session half-advanced: state is committed only
//!   after the ciphertext authenticates

#![forbid(unsafe_code)]
#![deny(missing_docs)]

pub mod double_ratchet;
mod error;
pub mod primitives;
pub mod sender_keys;

pub use double_ratchet::{
    RatchetConfig, RatchetError, RatchetHeader, RatchetMessage, RatchetSession, RatchetState,
};
pub use error::CryptoError;
pub use primitives::{KeyPair, normalize_address};
pub use sender_keys::{
    GroupSession, GroupSessionState, SenderKeyConfig, SenderKeyDistribution, SenderKeyError,
    SenderKeyMessage, SenderKeyMetadata, SenderKeyState,
};

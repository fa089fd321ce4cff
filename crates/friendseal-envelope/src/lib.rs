//! friendseal Envelope Encryption
//!
//! Multi-recipient envelopes for private friend-market metadata. The payload
//! is encrypted once under a random content key; each recipient gets that key
//! wrapped under a key only they can re-derive.
//!
//! # Layout
//!
//! ```text
//! Envelope
//! ├── format_version / algorithm_id   key family, fixed at parse time
//! ├── signing_version                 registry version keys derive from
//! ├── content { nonce, ciphertext }   payload under the content key
//! └── keys[]                          one entry per normalized address
//!     ├── wrapped_key, nonce          content key under the wrapping key
//!     └── ephemeral_public_key | kem_ciphertext
//! ```
//!
//! # Key Families
//!
//! - Classical: X25519 ephemeral-static. Public and secret keys are 32 bytes.
//! - Hybrid: ML-KEM-768 combined with X25519. 1216-byte public key, 32-byte
//!   seed, 1120-byte per-recipient ciphertext.
//!
//! Both derive the recipient key from a wallet signature over a message in
//! the [`SigningRegistry`]. Bumping the registry's current version yields
//! unrelated keys; envelopes record the version they were sealed under so
//! they stay readable.
//!
//! # Revocation
//!
//! [`Envelope::remove_recipient`] only filters `keys`. It does not rotate the
//! content key, so a removed party that kept a copy can still read it.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod envelope;
mod error;
pub mod hybrid;
mod keys;
mod payload;
pub mod registry;
mod seal;

pub use envelope::{Encapsulation, Envelope, RecipientKey, SealedContent};
pub use error::EnvelopeError;
pub use keys::{Algorithm, KeySource, PublicKey, Recipient, SecretKey, Signer, SignerError};
pub use payload::Payload;
pub use registry::SigningRegistry;

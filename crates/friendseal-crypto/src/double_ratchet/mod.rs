//! Double Ratchet: pairwise forward-secret sessions.
//!
//! Two parties that share a secret from a handshake each build a
//! [`RatchetSession`]: the initiator with the responder's ratchet public key,
//! the responder with the matching key pair. From then on:
//!
//! - every message advances a symmetric chain, so each message key is used
//!   exactly once;
//! - whenever the peer's ratchet public key changes, a DH ratchet step mixes
//!   a fresh X25519 output into the root key (break-in recovery);
//! - keys for messages that were skipped are cached (bounded, oldest evicted)
//!   so delayed or reordered messages still decrypt.
//!
//! # Architecture
//!
//! ```text
//! root_key ──HKDF("RootRatchet", DH output)──► root_key', chain_key
//!                                                   │
//!                          HMAC(ck, 0x01) ◄─────────┤
//!                          = message key            │
//!                                                   ▼
//!                                   HMAC(ck, 0x02) = next chain key
//! ```

mod error;
mod header;
mod session;

pub use error::RatchetError;
pub use header::{HEADER_SIZE, RatchetHeader, RatchetMessage};
pub use session::{
    RatchetConfig, RatchetSession, RatchetState, SkippedKeyEntry, chain_step, root_step,
};

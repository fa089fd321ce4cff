//! Sender Keys: O(1) group encryption.
//!
//! Every member owns a random sender chain for each group and hands its
//! [`SenderKeyDistribution`] to the other members over pairwise sessions.
//! A group message is then encrypted once under the sender's next chain key
//! instead of once per recipient.
//!
//! Forward secrecy comes from the one-way chain. There is no break-in
//! recovery within a chain; [`GroupSession::rotate_key`] starts a new one.

mod encryption;
mod error;
mod group;
mod ratchet;
mod state;

use serde::{Deserialize, Serialize};

pub use encryption::{
    SenderKeyMessage, SenderKeyMetadata, decrypt_message, encrypt_message, verify_mac,
};
pub use error::SenderKeyError;
pub use group::{GroupSession, GroupSessionState};
pub use ratchet::{MessageKey, SenderChain};
pub use state::{SenderKeyDistribution, SenderKeyRecord, SenderKeyState, SkippedSenderKey};

/// Bounds for out-of-order group delivery.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SenderKeyConfig {
    /// Maximum iterations a single message may skip ahead
    pub max_skip: u32,
    /// Maximum cached keys per sender; oldest are evicted first
    pub max_skipped_keys: usize,
}

impl Default for SenderKeyConfig {
    fn default() -> Self {
        Self { max_skip: 1000, max_skipped_keys: 1000 }
    }
}

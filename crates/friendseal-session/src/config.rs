//! Session manager configuration

use friendseal_crypto::{RatchetConfig, SenderKeyConfig};
use serde::{Deserialize, Serialize};

/// Tunables for a [`SessionManager`](crate::SessionManager).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Double Ratchet skip bounds
    pub ratchet: RatchetConfig,
    /// Sender Keys skip bounds
    pub sender_keys: SenderKeyConfig,
    /// Identity registry version signed during initialize
    pub identity_signing_version: u32,
    /// Prefix of the per-identity record key
    pub storage_prefix: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            ratchet: RatchetConfig::default(),
            sender_keys: SenderKeyConfig::default(),
            identity_signing_version: 1,
            storage_prefix: "friendseal/sessions".to_string(),
        }
    }
}

impl SessionConfig {
    /// Store key holding the record of `normalized_address`.
    pub fn record_key(&self, normalized_address: &str) -> String {
        format!("{}/{normalized_address}", self.storage_prefix)
    }
}

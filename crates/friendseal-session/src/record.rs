//! Persisted session record
//!
//! One CBOR record per local identity holds every pairwise and group session.
//! The record is rewritten in full after each mutating operation.

use std::collections::BTreeMap;

use friendseal_crypto::{GroupSessionState, RatchetState};
use serde::{Deserialize, Serialize};

use crate::storage::StorageError;

/// Record layout version
pub const RECORD_VERSION: u8 = 1;

/// A pairwise session as stored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PairwiseRecord {
    /// Ratchet snapshot
    pub state: RatchetState,
    /// Associated data from the handshake
    pub associated_data: Vec<u8>,
    /// True if we started the session
    pub initiator: bool,
}

/// Every session of one local identity.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionRecord {
    /// Layout version, [`RECORD_VERSION`]
    pub version: u8,
    /// Pairwise sessions by normalized peer address
    pub pairwise: BTreeMap<String, PairwiseRecord>,
    /// Group sessions by group id
    pub groups: BTreeMap<String, GroupSessionState>,
}

impl Default for SessionRecord {
    fn default() -> Self {
        Self { version: RECORD_VERSION, pairwise: BTreeMap::new(), groups: BTreeMap::new() }
    }
}

impl SessionRecord {
    /// CBOR encoding.
    pub fn encode(&self) -> Result<Vec<u8>, StorageError> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)
            .map_err(|e| StorageError::Serialization(e.to_string()))?;
        Ok(bytes)
    }

    /// Decode a record written by [`encode`](Self::encode).
    ///
    /// # Errors
    ///
    /// - `Serialization`: bytes are not a record, or of an unknown version
    pub fn decode(bytes: &[u8]) -> Result<Self, StorageError> {
        let record: Self =
            ciborium::from_reader(bytes).map_err(|e| StorageError::Serialization(e.to_string()))?;

        if record.version != RECORD_VERSION {
            return Err(StorageError::Serialization(format!(
                "unsupported session record version {}",
                record.version
            )));
        }
        Ok(record)
    }

    /// True if the record holds no sessions.
    pub fn is_empty(&self) -> bool {
        self.pairwise.is_empty() && self.groups.is_empty()
    }
}

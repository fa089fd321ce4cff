//! Group session: own sender key plus one receiving state per member.

use std::collections::{BTreeMap, HashMap};

use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};

use super::{
    SenderKeyConfig,
    encryption::SenderKeyMessage,
    error::SenderKeyError,
    state::{SenderKeyDistribution, SenderKeyRecord, SenderKeyState},
};

/// Serializable snapshot of a [`GroupSession`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GroupSessionState {
    /// Group id
    pub group_id: String,
    /// Local member id
    pub own_id: String,
    /// Our sending key
    pub own_key: SenderKeyRecord,
    /// Receiving keys by member id
    pub members: BTreeMap<String, SenderKeyRecord>,
}

/// Manages sender keys for one group from the local member's view.
///
/// # Invariants
///
/// - Every state in the session carries the session's group id
/// - The local member never appears in `members`
/// - Iterations only increase (forward secrecy)
#[derive(Debug)]
pub struct GroupSession {
    group_id: String,
    own_id: String,
    own_key: SenderKeyState,
    members: HashMap<String, SenderKeyState>,
    config: SenderKeyConfig,
}

impl GroupSession {
    /// Create a session with a fresh own sender key and no members.
    pub fn initialize<R: CryptoRng + RngCore>(
        group_id: impl Into<String>,
        own_id: impl Into<String>,
        config: SenderKeyConfig,
        rng: &mut R,
    ) -> Self {
        let group_id = group_id.into();
        let own_id = own_id.into();
        let own_key = SenderKeyState::generate(group_id.clone(), own_id.clone(), config, rng);

        tracing::debug!(group_id = %group_id, "sender keys: group session created");

        Self { group_id, own_id, own_key, members: HashMap::new(), config }
    }

    /// Group id.
    pub fn group_id(&self) -> &str {
        &self.group_id
    }

    /// Local member id.
    pub fn own_id(&self) -> &str {
        &self.own_id
    }

    /// Number of members whose key has been processed.
    pub fn member_count(&self) -> usize {
        self.members.len()
    }

    /// Check if a member's key has been processed.
    pub fn has_member(&self, member_id: &str) -> bool {
        self.members.contains_key(member_id)
    }

    /// Ids of members whose key has been processed.
    pub fn member_ids(&self) -> impl Iterator<Item = &str> {
        self.members.keys().map(String::as_str)
    }

    /// Current iteration of our own chain.
    pub fn own_iteration(&self) -> u32 {
        self.own_key.iteration()
    }

    /// Distribution of our own key at its current position.
    pub fn distribution(&self) -> SenderKeyDistribution {
        self.own_key.create_distribution()
    }

    /// Install (or replace) another member's sender key.
    ///
    /// A member that rotated sends a new distribution; it replaces the old
    /// state. A distribution for the chain already held is only applied if it
    /// moves the chain forward; one at the current iteration is a no-op.
    ///
    /// # Errors
    ///
    /// - `GroupMismatch`: distribution is for another group
    /// - `SelfDecryption`: distribution names the local member
    /// - `StaleDistribution`: distribution would rewind a known chain
    pub fn process_member_key(
        &mut self,
        distribution: &SenderKeyDistribution,
    ) -> Result<(), SenderKeyError> {
        if distribution.group_id != self.group_id {
            return Err(SenderKeyError::GroupMismatch {
                expected: self.group_id.clone(),
                actual: distribution.group_id.clone(),
            });
        }
        if distribution.sender_id == self.own_id {
            return Err(SenderKeyError::SelfDecryption);
        }

        let known_chain = self
            .members
            .get(&distribution.sender_id)
            .filter(|existing| existing.is_same_chain(distribution));
        if let Some(existing) = known_chain {
            let current = existing.iteration();
            if distribution.iteration < current {
                tracing::warn!(
                    group_id = %self.group_id,
                    sender_id = %distribution.sender_id,
                    iteration = distribution.iteration,
                    current,
                    "sender keys: stale distribution rejected"
                );
                return Err(SenderKeyError::StaleDistribution {
                    sender_id: distribution.sender_id.clone(),
                    iteration: distribution.iteration,
                    current,
                });
            }
            if distribution.iteration == current {
                return Ok(());
            }
        }

        tracing::debug!(
            group_id = %self.group_id,
            sender_id = %distribution.sender_id,
            iteration = distribution.iteration,
            "sender keys: member key processed"
        );

        self.members.insert(
            distribution.sender_id.clone(),
            SenderKeyState::from_distribution(distribution, self.config),
        );
        Ok(())
    }

    /// Encrypt a message for the whole group.
    pub fn encrypt<R: CryptoRng + RngCore>(
        &mut self,
        plaintext: &[u8],
        rng: &mut R,
    ) -> Result<SenderKeyMessage, SenderKeyError> {
        self.own_key.encrypt(plaintext, rng)
    }

    /// Decrypt a message from another member.
    ///
    /// # Errors
    ///
    /// - `SelfDecryption`: message was sent by the local member
    /// - `GroupMismatch`: message belongs to another group
    /// - `UnknownSender`: no key processed for the sender yet
    /// - anything [`SenderKeyState::decrypt`] returns
    pub fn decrypt(&mut self, message: &SenderKeyMessage) -> Result<Vec<u8>, SenderKeyError> {
        let metadata = &message.metadata;
        if metadata.sender_id == self.own_id {
            return Err(SenderKeyError::SelfDecryption);
        }
        if metadata.group_id != self.group_id {
            return Err(SenderKeyError::GroupMismatch {
                expected: self.group_id.clone(),
                actual: metadata.group_id.clone(),
            });
        }

        let Some(state) = self.members.get_mut(&metadata.sender_id) else {
            return Err(SenderKeyError::UnknownSender { sender_id: metadata.sender_id.clone() });
        };

        state.decrypt(message)
    }

    /// Discard our chain and start a new one.
    ///
    /// Returns the distribution that must be sent to the remaining members.
    pub fn rotate_key<R: CryptoRng + RngCore>(&mut self, rng: &mut R) -> SenderKeyDistribution {
        self.own_key =
            SenderKeyState::generate(self.group_id.clone(), self.own_id.clone(), self.config, rng);

        tracing::debug!(group_id = %self.group_id, "sender keys: own key rotated");

        self.own_key.create_distribution()
    }

    /// Forget a member's key. Returns true if the member was known.
    ///
    /// Callers that need the removed member to lose access to future
    /// messages must also [`rotate_key`](Self::rotate_key).
    pub fn remove_member(&mut self, member_id: &str) -> bool {
        self.members.remove(member_id).is_some()
    }

    /// Snapshot for persistence.
    pub fn snapshot(&self) -> GroupSessionState {
        GroupSessionState {
            group_id: self.group_id.clone(),
            own_id: self.own_id.clone(),
            own_key: self.own_key.to_record(),
            members: self
                .members
                .iter()
                .map(|(id, state)| (id.clone(), state.to_record()))
                .collect(),
        }
    }

    /// Rebuild from a snapshot.
    pub fn restore(state: &GroupSessionState, config: SenderKeyConfig) -> Self {
        Self {
            group_id: state.group_id.clone(),
            own_id: state.own_id.clone(),
            own_key: SenderKeyState::from_record(&state.own_key, config),
            members: state
                .members
                .iter()
                .map(|(id, record)| (id.clone(), SenderKeyState::from_record(record, config)))
                .collect(),
            config,
        }
    }
}

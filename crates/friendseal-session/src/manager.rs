//! Per-identity session manager
//!
//! Owns every pairwise Double Ratchet session and every group Sender Keys
//! session of one local address, and persists them after each mutation.
//!
//! # Invariants
//!
//! - Every operation except `initialize` fails with `NotInitialized` until
//!   initialize has completed once
//! - A mutation is only reported as successful after the record holding it
//!   was written
//! - If that write fails, the touched session is dropped from memory; a
//!   consumed ratchet key is never handed out twice

use std::collections::HashMap;

use friendseal_crypto::{
    GroupSession, KeyPair, RatchetMessage, RatchetSession, SenderKeyDistribution,
    SenderKeyMessage, normalize_address,
};
use friendseal_envelope::{Algorithm, KeySource, SecretKey, Signer, SigningRegistry};
use rand::rngs::OsRng;
use tokio::sync::{Mutex, OnceCell};

use crate::{
    config::SessionConfig,
    error::SessionError,
    handshake::{Handshake, InitialMessage, PreKeyBundle, PreKeySecrets},
    record::{PairwiseRecord, SessionRecord},
    storage::{KeyValueStore, StorageError},
};

struct Identity {
    key: KeyPair,
    bundle: PreKeyBundle,
    prekeys: PreKeySecrets,
}

struct PairwiseSession {
    ratchet: RatchetSession,
    associated_data: Vec<u8>,
    initiator: bool,
}

#[derive(Default)]
struct SessionTable {
    pairwise: HashMap<String, PairwiseSession>,
    groups: HashMap<String, GroupSession>,
}

impl SessionTable {
    fn from_record(record: &SessionRecord, config: &SessionConfig) -> Self {
        let pairwise = record
            .pairwise
            .iter()
            .map(|(peer, stored)| {
                let session = PairwiseSession {
                    ratchet: RatchetSession::restore(&stored.state, config.ratchet),
                    associated_data: stored.associated_data.clone(),
                    initiator: stored.initiator,
                };
                (peer.clone(), session)
            })
            .collect();

        let groups = record
            .groups
            .iter()
            .map(|(id, state)| (id.clone(), GroupSession::restore(state, config.sender_keys)))
            .collect();

        Self { pairwise, groups }
    }

    fn to_record(&self) -> SessionRecord {
        let mut record = SessionRecord::default();
        for (peer, session) in &self.pairwise {
            record.pairwise.insert(peer.clone(), PairwiseRecord {
                state: session.ratchet.export_state(),
                associated_data: session.associated_data.clone(),
                initiator: session.initiator,
            });
        }
        for (id, group) in &self.groups {
            record.groups.insert(id.clone(), group.snapshot());
        }
        record
    }
}

/// Which entry a mutation touched.
#[derive(Clone, Copy)]
enum Slot<'a> {
    Pairwise(&'a str),
    Group(&'a str),
}

/// Pairwise and group sessions of one local address.
///
/// All operations of one manager are serialized by an internal lock, which
/// also covers the persist that follows each mutation. Managers for
/// different addresses are independent.
pub struct SessionManager<S: KeyValueStore, H: Handshake> {
    address: String,
    record_key: String,
    store: S,
    handshake: H,
    config: SessionConfig,
    identity: OnceCell<Identity>,
    table: Mutex<SessionTable>,
}

impl<S: KeyValueStore, H: Handshake> SessionManager<S, H> {
    /// Manager for `address` (normalized). Nothing is loaded until
    /// [`initialize`](Self::initialize).
    pub fn new(address: &str, store: S, handshake: H, config: SessionConfig) -> Self {
        let address = normalize_address(address);
        let record_key = config.record_key(&address);
        Self {
            address,
            record_key,
            store,
            handshake,
            config,
            identity: OnceCell::new(),
            table: Mutex::new(SessionTable::default()),
        }
    }

    /// Normalized local address.
    pub fn address(&self) -> &str {
        &self.address
    }

    /// True once initialize has completed.
    pub fn is_initialized(&self) -> bool {
        self.identity.initialized()
    }

    /// Derive the identity from a signature over the identity registry
    /// message, then load persisted sessions.
    ///
    /// Concurrent callers share one in-flight initialization, so `signer` is
    /// prompted at most once. Later calls return the same bundle without
    /// signing. A failed attempt leaves the manager uninitialized.
    ///
    /// # Errors
    ///
    /// - `Signer`: the signer failed; initialize may be retried
    /// - `Envelope`: configured identity signing version is not published
    /// - `Storage`: the record could not be read
    pub async fn initialize(&self, signer: &dyn Signer) -> Result<PreKeyBundle, SessionError> {
        self.initialize_with(KeySource::External(signer)).await
    }

    /// [`initialize`](Self::initialize) from any key source, e.g. a cached
    /// identity key.
    pub async fn initialize_with(
        &self,
        source: KeySource<'_>,
    ) -> Result<PreKeyBundle, SessionError> {
        let identity = self.identity.get_or_try_init(|| self.load_identity(source)).await?;
        Ok(identity.bundle)
    }

    async fn load_identity(&self, source: KeySource<'_>) -> Result<Identity, SessionError> {
        let registry =
            SigningRegistry::identity().with_current(self.config.identity_signing_version)?;
        let secret = source.resolve(Algorithm::Classical, &registry, registry.current()).await?;
        let SecretKey::Classical(key) = secret else {
            unreachable!("classical resolution yields a classical key")
        };

        let (bundle, prekeys) = self.handshake.generate_bundle(&key);
        let record = self.load_record()?;

        let mut table = self.table.lock().await;
        *table = SessionTable::from_record(&record, &self.config);

        tracing::info!(
            address = %self.address,
            pairwise = table.pairwise.len(),
            groups = table.groups.len(),
            "session: initialized"
        );

        Ok(Identity { key, bundle, prekeys })
    }

    fn load_record(&self) -> Result<SessionRecord, SessionError> {
        let Some(bytes) = self.store.get(&self.record_key)? else {
            return Ok(SessionRecord::default());
        };

        match SessionRecord::decode(&bytes) {
            Ok(record) => Ok(record),
            Err(err) => {
                tracing::warn!(
                    address = %self.address,
                    error = %err,
                    "session: persisted record unreadable, starting empty"
                );
                Ok(SessionRecord::default())
            },
        }
    }

    fn identity(&self) -> Result<&Identity, SessionError> {
        self.identity.get().ok_or(SessionError::NotInitialized)
    }

    /// Our identity public key.
    pub fn identity_public_key(&self) -> Result<[u8; 32], SessionError> {
        Ok(self.identity()?.key.public_key())
    }

    /// Bundle peers need to start a session with us.
    pub fn prekey_bundle(&self) -> Result<PreKeyBundle, SessionError> {
        Ok(self.identity()?.bundle)
    }

    fn persist(&self, table: &SessionTable) -> Result<(), StorageError> {
        let bytes = table.to_record().encode()?;
        self.store.set(&self.record_key, &bytes)
    }

    /// Persist after a mutation of `slot`, dropping it if the write fails.
    fn commit(&self, table: &mut SessionTable, slot: Slot<'_>) -> Result<(), SessionError> {
        let Err(err) = self.persist(table) else {
            return Ok(());
        };

        match slot {
            Slot::Pairwise(peer) => {
                tracing::warn!(
                    address = %self.address,
                    peer,
                    error = %err,
                    "session: persist failed, dropping session"
                );
                table.pairwise.remove(peer);
            },
            Slot::Group(group_id) => {
                tracing::warn!(
                    address = %self.address,
                    group_id,
                    error = %err,
                    "session: persist failed, dropping group"
                );
                table.groups.remove(group_id);
            },
        }

        // Best effort: keep the stale state out of the record as well
        if let Err(retry) = self.persist(table) {
            tracing::warn!(
                address = %self.address,
                error = %retry,
                "session: record still holds dropped state"
            );
        }

        Err(err.into())
    }

    /// Start a session with `peer` from its published bundle.
    ///
    /// Replaces any existing session with the peer. Returns the message the
    /// peer needs for [`receive_session_establishment`](Self::receive_session_establishment).
    pub async fn establish_session(
        &self,
        peer: &str,
        bundle: &PreKeyBundle,
    ) -> Result<InitialMessage, SessionError> {
        let identity = self.identity()?;
        let peer = normalize_address(peer);
        let mut rng = OsRng;

        let initiation = self.handshake.initiate(&identity.key, bundle, &mut rng)?;
        let ratchet = RatchetSession::init_as_initiator(
            &initiation.shared_secret,
            initiation.peer_ratchet_key,
            self.config.ratchet,
            &mut rng,
        )?;

        let mut table = self.table.lock().await;
        let session = PairwiseSession {
            ratchet,
            associated_data: initiation.associated_data,
            initiator: true,
        };
        if table.pairwise.insert(peer.clone(), session).is_some() {
            tracing::debug!(
                address = %self.address,
                peer = %peer,
                "session: replacing existing session"
            );
        }
        self.commit(&mut table, Slot::Pairwise(&peer))?;

        tracing::debug!(address = %self.address, peer = %peer, "session: established as initiator");
        Ok(initiation.initial_message)
    }

    /// Accept a session `peer` started with our bundle.
    pub async fn receive_session_establishment(
        &self,
        peer: &str,
        message: &InitialMessage,
    ) -> Result<(), SessionError> {
        let identity = self.identity()?;
        let peer = normalize_address(peer);

        let completion = self.handshake.complete(&identity.key, &identity.prekeys, message)?;
        let ratchet = RatchetSession::init_as_recipient(
            &completion.shared_secret,
            identity.prekeys.signed_prekey.clone(),
            self.config.ratchet,
        );

        let mut table = self.table.lock().await;
        let session = PairwiseSession {
            ratchet,
            associated_data: completion.associated_data,
            initiator: false,
        };
        table.pairwise.insert(peer.clone(), session);
        self.commit(&mut table, Slot::Pairwise(&peer))?;

        tracing::debug!(address = %self.address, peer = %peer, "session: established as responder");
        Ok(())
    }

    /// Encrypt for `peer`.
    ///
    /// # Errors
    ///
    /// - `NoSession`: no session with the peer
    /// - `Ratchet(NoSendingChain)`: we are the responder and the peer has not
    ///   sent yet
    /// - `Storage`: the advanced state could not be persisted; the session is
    ///   gone
    pub async fn encrypt_message(
        &self,
        peer: &str,
        plaintext: &[u8],
    ) -> Result<RatchetMessage, SessionError> {
        self.identity()?;
        let peer = normalize_address(peer);

        let mut table = self.table.lock().await;
        let session = table
            .pairwise
            .get_mut(&peer)
            .ok_or_else(|| SessionError::NoSession { peer: peer.clone() })?;
        let message = session.ratchet.encrypt(plaintext, &session.associated_data, &mut OsRng)?;
        self.commit(&mut table, Slot::Pairwise(&peer))?;

        Ok(message)
    }

    /// Decrypt a message from `peer`.
    ///
    /// A message that fails to decrypt leaves the session untouched.
    pub async fn decrypt_message(
        &self,
        peer: &str,
        message: &RatchetMessage,
    ) -> Result<Vec<u8>, SessionError> {
        self.identity()?;
        let peer = normalize_address(peer);

        let mut table = self.table.lock().await;
        let session = table
            .pairwise
            .get_mut(&peer)
            .ok_or_else(|| SessionError::NoSession { peer: peer.clone() })?;
        let plaintext = session.ratchet.decrypt(message, &session.associated_data, &mut OsRng)?;
        self.commit(&mut table, Slot::Pairwise(&peer))?;

        Ok(plaintext)
    }

    /// True if a session with `peer` exists.
    pub async fn has_session(&self, peer: &str) -> bool {
        self.table.lock().await.pairwise.contains_key(&normalize_address(peer))
    }

    /// Normalized addresses of every peer with a session, sorted.
    pub async fn peers(&self) -> Vec<String> {
        let mut peers: Vec<String> = self.table.lock().await.pairwise.keys().cloned().collect();
        peers.sort_unstable();
        peers
    }

    /// Drop the session with `peer`. Returns false if there was none.
    pub async fn remove_session(&self, peer: &str) -> Result<bool, SessionError> {
        self.identity()?;
        let peer = normalize_address(peer);

        let mut table = self.table.lock().await;
        if table.pairwise.remove(&peer).is_none() {
            return Ok(false);
        }
        self.persist(&table)?;

        tracing::debug!(address = %self.address, peer = %peer, "session: removed");
        Ok(true)
    }

    /// Join `group_id`, creating our sender key on first call.
    ///
    /// Returns our distribution, to be sent to every member over their
    /// pairwise sessions.
    pub async fn join_group(&self, group_id: &str) -> Result<SenderKeyDistribution, SessionError> {
        self.identity()?;

        let mut table = self.table.lock().await;
        if let Some(group) = table.groups.get(group_id) {
            return Ok(group.distribution());
        }

        let group = GroupSession::initialize(
            group_id,
            self.address.clone(),
            self.config.sender_keys,
            &mut OsRng,
        );
        let distribution = group.distribution();
        table.groups.insert(group_id.to_string(), group);
        self.commit(&mut table, Slot::Group(group_id))?;

        tracing::debug!(address = %self.address, group_id, "session: joined group");
        Ok(distribution)
    }

    /// Install another member's sender key.
    pub async fn process_member_key(
        &self,
        group_id: &str,
        distribution: &SenderKeyDistribution,
    ) -> Result<(), SessionError> {
        self.with_group(group_id, |group| Ok(group.process_member_key(distribution)?)).await
    }

    /// Encrypt once for the whole group.
    pub async fn encrypt_group_message(
        &self,
        group_id: &str,
        plaintext: &[u8],
    ) -> Result<SenderKeyMessage, SessionError> {
        self.with_group(group_id, |group| Ok(group.encrypt(plaintext, &mut OsRng)?)).await
    }

    /// Decrypt a group message from another member.
    pub async fn decrypt_group_message(
        &self,
        group_id: &str,
        message: &SenderKeyMessage,
    ) -> Result<Vec<u8>, SessionError> {
        self.with_group(group_id, |group| Ok(group.decrypt(message)?)).await
    }

    /// Replace our sender key; returns the distribution for the remaining
    /// members.
    pub async fn rotate_group_key(
        &self,
        group_id: &str,
    ) -> Result<SenderKeyDistribution, SessionError> {
        self.with_group(group_id, |group| Ok(group.rotate_key(&mut OsRng))).await
    }

    /// Forget `member_id`'s key. Does not rotate ours.
    pub async fn remove_group_member(
        &self,
        group_id: &str,
        member_id: &str,
    ) -> Result<bool, SessionError> {
        let member_id = normalize_address(member_id);
        self.with_group(group_id, |group| Ok(group.remove_member(&member_id))).await
    }

    /// Members whose keys we hold, sorted.
    pub async fn group_members(&self, group_id: &str) -> Result<Vec<String>, SessionError> {
        self.identity()?;
        let table = self.table.lock().await;
        let group = table
            .groups
            .get(group_id)
            .ok_or_else(|| SessionError::NoGroup { group_id: group_id.to_string() })?;

        let mut members: Vec<String> = group.member_ids().map(str::to_string).collect();
        members.sort_unstable();
        Ok(members)
    }

    /// Drop the group session. Returns false if we were not a member.
    pub async fn leave_group(&self, group_id: &str) -> Result<bool, SessionError> {
        self.identity()?;

        let mut table = self.table.lock().await;
        if table.groups.remove(group_id).is_none() {
            return Ok(false);
        }
        self.persist(&table)?;

        tracing::debug!(address = %self.address, group_id, "session: left group");
        Ok(true)
    }

    async fn with_group<T>(
        &self,
        group_id: &str,
        operation: impl FnOnce(&mut GroupSession) -> Result<T, SessionError>,
    ) -> Result<T, SessionError> {
        self.identity()?;

        let mut table = self.table.lock().await;
        let group = table
            .groups
            .get_mut(group_id)
            .ok_or_else(|| SessionError::NoGroup { group_id: group_id.to_string() })?;
        let output = operation(group)?;
        self.commit(&mut table, Slot::Group(group_id))?;

        Ok(output)
    }

    /// Forget every session and erase the persisted record.
    ///
    /// The identity stays loaded; the manager can establish new sessions.
    pub async fn clear(&self) -> Result<(), SessionError> {
        let mut table = self.table.lock().await;
        *table = SessionTable::default();
        self.store.remove(&self.record_key)?;

        tracing::info!(address = %self.address, "session: cleared");
        Ok(())
    }
}

impl<S: KeyValueStore, H: Handshake> std::fmt::Debug for SessionManager<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionManager")
            .field("address", &self.address)
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

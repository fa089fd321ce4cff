//! Explicit per-address registry of session managers
//!
//! Owned by the application root. There is at most one manager per
//! normalized address; everyone asking for the same address shares it.

use std::{collections::HashMap, sync::Arc};

use friendseal_crypto::normalize_address;
use tokio::sync::Mutex;

use crate::{
    config::SessionConfig,
    error::SessionError,
    handshake::Handshake,
    manager::SessionManager,
    storage::KeyValueStore,
};

/// Registry of [`SessionManager`]s keyed by normalized address.
pub struct SessionRegistry<S: KeyValueStore, H: Handshake + Clone> {
    store: S,
    handshake: H,
    config: SessionConfig,
    managers: Mutex<HashMap<String, Arc<SessionManager<S, H>>>>,
}

impl<S: KeyValueStore, H: Handshake + Clone> SessionRegistry<S, H> {
    /// Empty registry; every manager it creates shares `store`.
    pub fn new(store: S, handshake: H, config: SessionConfig) -> Self {
        Self { store, handshake, config, managers: Mutex::new(HashMap::new()) }
    }

    /// The manager for `address`, created uninitialized on first request.
    pub async fn get_or_create(&self, address: &str) -> Arc<SessionManager<S, H>> {
        let address = normalize_address(address);
        let mut managers = self.managers.lock().await;

        let manager = managers.entry(address).or_insert_with_key(|address| {
            tracing::debug!(address = %address, "session registry: manager created");
            Arc::new(SessionManager::new(
                address,
                self.store.clone(),
                self.handshake.clone(),
                self.config.clone(),
            ))
        });
        Arc::clone(manager)
    }

    /// The manager for `address`, if one was created.
    pub async fn get(&self, address: &str) -> Option<Arc<SessionManager<S, H>>> {
        self.managers.lock().await.get(&normalize_address(address)).cloned()
    }

    /// Number of live managers.
    pub async fn len(&self) -> usize {
        self.managers.lock().await.len()
    }

    /// True if no manager is live.
    pub async fn is_empty(&self) -> bool {
        self.managers.lock().await.is_empty()
    }

    /// Tear down `address`: drop its manager and erase its persisted record.
    ///
    /// The record is erased even if no manager was live. Handles still held
    /// by callers keep working on their in-memory state, but nothing they do
    /// reaches the registry again.
    pub async fn clear(&self, address: &str) -> Result<(), SessionError> {
        let address = normalize_address(address);
        let removed = self.managers.lock().await.remove(&address);

        match removed {
            Some(manager) => manager.clear().await?,
            None => self.store.remove(&self.config.record_key(&address))?,
        }

        tracing::info!(address = %address, "session registry: cleared");
        Ok(())
    }

    /// Tear down every live manager (logout).
    pub async fn clear_all(&self) -> Result<(), SessionError> {
        let managers: Vec<_> = self.managers.lock().await.drain().collect();
        for (_, manager) in managers {
            manager.clear().await?;
        }
        Ok(())
    }
}

impl<S: KeyValueStore, H: Handshake + Clone> std::fmt::Debug for SessionRegistry<S, H> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionRegistry").finish_non_exhaustive()
    }
}

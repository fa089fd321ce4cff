//! Storage abstraction for session records
//!
//! A flat key-value contract: the session manager writes one opaque record
//! per local identity. The trait is synchronous; every write happens inside
//! the manager's critical section.

mod chaotic;
mod error;
mod memory;
mod redb;

pub use chaotic::ChaoticStore;
pub use error::StorageError;
pub use memory::MemoryStore;

pub use self::redb::RedbStore;

/// Key-value store scoped to one application.
///
/// Must be Clone (one store backs every identity in a registry) and
/// Send + Sync. Implementations share internal state via Arc, so clones
/// access the same underlying data.
pub trait KeyValueStore: Clone + Send + Sync + 'static {
    /// Value stored under `key`, `None` if absent.
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StorageError>;

    /// Store `value` under `key`, replacing any previous value.
    ///
    /// # Invariants
    ///
    /// - Post: a following `get(key)` returns `value`, also after reopening a
    ///   durable store
    fn set(&self, key: &str, value: &[u8]) -> Result<(), StorageError>;

    /// Delete `key`. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StorageError>;
}

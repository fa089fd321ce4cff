//! friendseal Session Manager
//!
//! Orchestrates the pairwise Double Ratchet and group Sender Keys protocols
//! for one local identity, and persists their state after every operation.
//!
//! # Architecture
//!
//! ```text
//! SessionRegistry (one per application)
//!   └── SessionManager (one per normalized address)
//!         ├── identity: derived once from a wallet signature
//!         ├── pairwise: peer → RatchetSession
//!         ├── groups:   group id → GroupSession
//!         └── KeyValueStore: one CBOR record per identity
//! ```
//!
//! # Persistence
//!
//! Ratchet state must never be reused. Every mutation is followed by a write
//! of the whole record inside the manager's lock; if the write fails the
//! touched session is dropped rather than kept in a state the store does not
//! reflect. An unreadable record on startup is logged and replaced by an
//! empty one.

#![forbid(unsafe_code)]
#![deny(missing_docs)]

mod config;
mod error;
pub mod handshake;
mod manager;
pub mod record;
mod registry;
pub mod storage;

pub use config::SessionConfig;
pub use error::SessionError;
pub use handshake::{
    Completion, Handshake, HandshakeError, InitialMessage, Initiation, PreKeyBundle,
    PreKeySecrets, X3dhHandshake,
};
pub use manager::SessionManager;
pub use registry::SessionRegistry;
pub use storage::{ChaoticStore, KeyValueStore, MemoryStore, RedbStore, StorageError};

//! Session manager errors

use friendseal_crypto::{RatchetError, SenderKeyError};
use friendseal_envelope::{EnvelopeError, SignerError};
use thiserror::Error;

use crate::{handshake::HandshakeError, storage::StorageError};

/// Errors from [`SessionManager`](crate::SessionManager) operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SessionError {
    /// Operation called before `initialize` completed
    #[error("session manager is not initialized")]
    NotInitialized,

    /// No pairwise session with the peer
    #[error("no session with {peer}")]
    NoSession {
        /// Normalized peer address
        peer: String,
    },

    /// Local identity has not joined the group
    #[error("not a member of group {group_id}")]
    NoGroup {
        /// Group id
        group_id: String,
    },

    /// Double Ratchet failure
    #[error("ratchet error: {0}")]
    Ratchet(#[from] RatchetError),

    /// Sender Keys failure
    #[error("sender key error: {0}")]
    SenderKey(#[from] SenderKeyError),

    /// Identity derivation failed
    #[error("identity derivation failed: {0}")]
    Envelope(EnvelopeError),

    /// External signer failed or refused
    #[error(transparent)]
    Signer(#[from] SignerError),

    /// Handshake failure
    #[error("handshake error: {0}")]
    Handshake(#[from] HandshakeError),

    /// Persisting or loading the session record failed
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl SessionError {
    /// True if the session the operation touched can no longer be trusted.
    ///
    /// A failed persist drops the session, so storage errors are fatal for
    /// it; a message that fails authentication is fatal for that message.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::Ratchet(err) => err.is_fatal(),
            Self::SenderKey(err) => err.is_fatal(),
            Self::Storage(_) | Self::Handshake(_) => true,
            Self::NotInitialized
            | Self::NoSession { .. }
            | Self::NoGroup { .. }
            | Self::Envelope(_)
            | Self::Signer(_) => false,
        }
    }
}

impl From<EnvelopeError> for SessionError {
    fn from(err: EnvelopeError) -> Self {
        match err {
            EnvelopeError::Signer(err) => Self::Signer(err),
            other => Self::Envelope(other),
        }
    }
}

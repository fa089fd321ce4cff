//! Error types for Double Ratchet operations

use thiserror::Error;

use crate::error::CryptoError;

/// Errors from Double Ratchet operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum RatchetError {
    /// Encrypt was called before a sending chain exists
    ///
    /// A responder has no sending chain until it has received the first
    /// message from the initiator.
    #[error("no sending chain: session has not received a message yet")]
    NoSendingChain,

    /// Message would require skipping more keys than allowed
    #[error("too many skipped messages: need {requested}, limit {limit}")]
    TooManySkipped {
        /// Number of keys the message would force us to derive
        requested: u32,
        /// Configured maximum
        limit: u32,
    },

    /// Message key for this counter was already used or evicted
    #[error("message key unavailable: counter {counter} is behind {current}")]
    MessageKeyUnavailable {
        /// Counter carried by the message
        counter: u32,
        /// Current receiving counter
        current: u32,
    },

    /// AEAD tag did not verify
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Sending counter would overflow
    #[error("message counter overflow")]
    CounterOverflow,

    /// Malformed header or message bytes
    #[error("malformed message: {reason}")]
    Malformed {
        /// What was wrong
        reason: String,
    },

    /// Message cannot be processed in the current session state
    #[error("invalid session state: {reason}")]
    InvalidState {
        /// What was inconsistent
        reason: String,
    },

    /// Diffie-Hellman with the peer key failed
    #[error("invalid ratchet key: {0}")]
    InvalidKey(CryptoError),
}

impl RatchetError {
    /// Returns true if the message must be dropped and never retried.
    ///
    /// Session state is unchanged after every error, so non-fatal errors
    /// (a message that arrived too early or too late) leave the session
    /// usable.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailed
            | Self::Malformed { .. }
            | Self::InvalidKey(_)
            | Self::InvalidState { .. }
            | Self::CounterOverflow => true,

            Self::NoSendingChain
            | Self::TooManySkipped { .. }
            | Self::MessageKeyUnavailable { .. } => false,
        }
    }
}

impl From<CryptoError> for RatchetError {
    fn from(err: CryptoError) -> Self {
        match err {
            CryptoError::AuthenticationFailed => Self::AuthenticationFailed,
            other => Self::InvalidKey(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn authentication_failure_is_fatal() {
        assert!(RatchetError::AuthenticationFailed.is_fatal());
    }

    #[test]
    fn skipped_limit_is_not_fatal() {
        assert!(!RatchetError::TooManySkipped { requested: 2000, limit: 1000 }.is_fatal());
    }

    #[test]
    fn crypto_authentication_maps_through() {
        let err: RatchetError = CryptoError::AuthenticationFailed.into();
        assert_eq!(err, RatchetError::AuthenticationFailed);
    }
}

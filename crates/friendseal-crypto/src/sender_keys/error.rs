//! Error types for Sender Keys operations

use thiserror::Error;

/// Errors from sender key operations
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SenderKeyError {
    /// Message was routed to the state of a different sender
    #[error("sender mismatch: state belongs to {expected}, message from {actual}")]
    SenderMismatch {
        /// Sender the state was created for
        expected: String,
        /// Sender named in the message
        actual: String,
    },

    /// Message or distribution belongs to a different group
    #[error("group mismatch: expected {expected}, got {actual}")]
    GroupMismatch {
        /// Our group id
        expected: String,
        /// Group id in the message
        actual: String,
    },

    /// No sender key has been processed for this member
    #[error("unknown sender: {sender_id}")]
    UnknownSender {
        /// The sender that was not found
        sender_id: String,
    },

    /// Attempted to decrypt our own message, or process our own key
    #[error("cannot decrypt own message")]
    SelfDecryption,

    /// Iteration is behind the chain and its key is no longer cached
    #[error("iteration too old: message at {iteration}, chain at {current}")]
    IterationTooOld {
        /// Iteration carried by the message
        iteration: u32,
        /// Current chain iteration
        current: u32,
    },

    /// Distribution would move a known chain back to an earlier iteration
    #[error("stale distribution from {sender_id}: iteration {iteration}, chain at {current}")]
    StaleDistribution {
        /// Member the distribution belongs to
        sender_id: String,
        /// Iteration carried by the distribution
        iteration: u32,
        /// Iteration the stored chain has reached
        current: u32,
    },

    /// Message is further ahead than the skip bound allows
    #[error("too many skipped iterations: need {requested}, limit {limit}")]
    TooManySkipped {
        /// Number of iterations the message would skip
        requested: u32,
        /// Configured maximum
        limit: u32,
    },

    /// MAC or AEAD tag did not verify
    #[error("authentication failed")]
    AuthenticationFailed,

    /// Chain iteration would overflow
    #[error("iteration overflow at {current}")]
    IterationOverflow {
        /// Iteration when overflow was detected
        current: u32,
    },
}

impl SenderKeyError {
    /// Returns true if this error is fatal (unrecoverable)
    ///
    /// Fatal errors indicate a forged message or a protocol violation.
    /// The others can be resolved by processing a missing distribution or
    /// waiting for earlier messages.
    pub fn is_fatal(&self) -> bool {
        match self {
            Self::AuthenticationFailed
            | Self::IterationOverflow { .. }
            | Self::SenderMismatch { .. }
            | Self::GroupMismatch { .. }
            | Self::SelfDecryption => true,

            Self::UnknownSender { .. }
            | Self::IterationTooOld { .. }
            | Self::StaleDistribution { .. }
            | Self::TooManySkipped { .. } => false,
        }
    }
}

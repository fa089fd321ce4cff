//! CLI error type

use friendseal_envelope::EnvelopeError;
use thiserror::Error;

/// Errors surfaced by CLI commands
#[derive(Debug, Error)]
pub enum CliError {
    /// Envelope operation failed
    #[error(transparent)]
    Envelope(#[from] EnvelopeError),

    /// Reading input or writing output failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Output could not be encoded
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// `--recipient` was not `ADDRESS=PUBLIC_KEY`
    #[error("invalid recipient '{value}': expected ADDRESS=PUBLIC_KEY")]
    InvalidRecipient {
        /// Argument as given
        value: String,
    },
}

//! Signers for the CLI
//!
//! The CLI never holds a wallet. It either takes a signature from the command
//! line or shows the message and reads the signature back from the terminal.

use std::io::Write;

use async_trait::async_trait;
use friendseal_envelope::{Signer, SignerError};
use tokio::io::{AsyncBufReadExt, BufReader};

/// Signature supplied up front.
#[derive(Debug, Clone)]
pub struct FixedSignature(pub String);

#[async_trait]
impl Signer for FixedSignature {
    async fn sign_message(&self, _message: &str) -> Result<String, SignerError> {
        Ok(self.0.clone())
    }
}

/// Prints the message to stderr and reads one line from stdin.
#[derive(Debug, Clone, Copy, Default)]
pub struct TerminalSigner;

#[async_trait]
impl Signer for TerminalSigner {
    async fn sign_message(&self, message: &str) -> Result<String, SignerError> {
        let mut stderr = std::io::stderr();
        writeln!(stderr, "Sign the following message with your wallet:\n\n{message}\n")
            .and_then(|()| write!(stderr, "Signature: "))
            .and_then(|()| stderr.flush())
            .map_err(|e| SignerError { reason: e.to_string() })?;

        let mut line = String::new();
        BufReader::new(tokio::io::stdin())
            .read_line(&mut line)
            .await
            .map_err(|e| SignerError { reason: e.to_string() })?;

        let signature = line.trim();
        if signature.is_empty() {
            return Err(SignerError { reason: "no signature entered".to_string() });
        }
        Ok(signature.to_string())
    }
}

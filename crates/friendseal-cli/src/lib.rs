//! Command-line access to friend market envelopes.
//!
//! The binary is a thin wrapper over [`friendseal_envelope`]: it derives keys
//! from wallet signatures, seals files for a set of recipients and manages the
//! recipient list of an existing envelope. Every command writes its result to
//! the given writer so it can be driven from tests.
//!
//! ```bash
//! # Print the text a wallet must sign
//! friendseal message --registry market
//!
//! # Derive a key pair (prompts for the signature when not given)
//! friendseal keygen --algorithm hybrid --signature 0x5f...
//!
//! # Seal for two recipients and open as one of them
//! friendseal seal -r 0xAlice=<pub> -r 0xBob=<pub> --input terms.json > market.json
//! friendseal open --address 0xBob --secret <secret> market.json
//! ```

mod cli;
mod commands;
mod error;
mod prompt;

pub use cli::{AlgorithmArg, Args, Command, RegistryArg};
pub use commands::run;
pub use error::CliError;
pub use prompt::{FixedSignature, TerminalSigner};

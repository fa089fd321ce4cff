//! Argument definitions

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use friendseal_envelope::{Algorithm, SigningRegistry};

/// Friend market envelope tool
#[derive(Parser, Debug)]
#[command(name = "friendseal")]
#[command(about = "Derive keys and seal friend market envelopes")]
#[command(version)]
pub struct Args {
    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "warn", global = true)]
    pub log_level: String,

    /// Command to run
    #[command(subcommand)]
    pub command: Command,
}

/// Key family selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum AlgorithmArg {
    /// X25519
    #[default]
    Classical,
    /// ML-KEM-768 + X25519
    Hybrid,
}

impl From<AlgorithmArg> for Algorithm {
    fn from(arg: AlgorithmArg) -> Self {
        match arg {
            AlgorithmArg::Classical => Self::Classical,
            AlgorithmArg::Hybrid => Self::Hybrid,
        }
    }
}

/// Signing message registry selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, ValueEnum)]
pub enum RegistryArg {
    /// Keys for reading market envelopes
    #[default]
    Market,
    /// Messaging identity keys
    Identity,
}

impl From<RegistryArg> for SigningRegistry {
    fn from(arg: RegistryArg) -> Self {
        match arg {
            RegistryArg::Market => Self::market(),
            RegistryArg::Identity => Self::identity(),
        }
    }
}

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the message a wallet signs to derive a key
    Message {
        /// Registry to read
        #[arg(long, value_enum, default_value_t)]
        registry: RegistryArg,

        /// Version to print (defaults to the current one)
        #[arg(long)]
        version: Option<u32>,

        /// List the published versions instead
        #[arg(long)]
        list: bool,
    },

    /// Derive a key pair from a wallet signature
    Keygen {
        /// Key family
        #[arg(long, value_enum, default_value_t)]
        algorithm: AlgorithmArg,

        /// Registry whose message was signed
        #[arg(long, value_enum, default_value_t)]
        registry: RegistryArg,

        /// Version of the signed message (defaults to the current one)
        #[arg(long)]
        version: Option<u32>,

        /// Signature; prompted for on the terminal when omitted
        #[arg(long)]
        signature: Option<String>,
    },

    /// Seal a file for one or more recipients
    Seal {
        /// Recipient as ADDRESS=PUBLIC_KEY_HEX, repeatable
        #[arg(short, long = "recipient", required = true)]
        recipients: Vec<String>,

        /// Key family of the recipients' public keys
        #[arg(long, value_enum, default_value_t)]
        algorithm: AlgorithmArg,

        /// Registry version the recipients' keys were derived under
        #[arg(long)]
        signing_version: Option<u32>,

        /// Plaintext file (stdin when omitted)
        #[arg(short, long)]
        input: Option<PathBuf>,

        /// Indent the envelope JSON
        #[arg(long)]
        pretty: bool,
    },

    /// Decrypt an envelope
    Open {
        /// Address to open as
        #[arg(long)]
        address: String,

        /// Secret key hex printed by `keygen`
        #[arg(long)]
        secret: String,

        /// Envelope file (stdin when omitted)
        envelope: Option<PathBuf>,
    },

    /// Grant a new address access to an envelope
    AddRecipient {
        /// Address of an existing recipient
        #[arg(long)]
        address: String,

        /// Secret key hex of the existing recipient
        #[arg(long)]
        secret: String,

        /// New recipient as ADDRESS=PUBLIC_KEY_HEX
        #[arg(long)]
        recipient: String,

        /// Envelope file (stdin when omitted)
        envelope: Option<PathBuf>,
    },

    /// Drop an address from an envelope's recipient list
    RemoveRecipient {
        /// Address to remove
        #[arg(long)]
        address: String,

        /// Envelope file (stdin when omitted)
        envelope: Option<PathBuf>,
    },

    /// Show an envelope's algorithm, signing version and recipients
    Inspect {
        /// Envelope file (stdin when omitted)
        envelope: Option<PathBuf>,
    },
}

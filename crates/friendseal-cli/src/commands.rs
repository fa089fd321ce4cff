//! Command implementations

use std::{
    io::{Read, Write},
    path::Path,
};

use friendseal_envelope::{
    Algorithm, Envelope, EnvelopeError, KeySource, PublicKey, Recipient, SecretKey, Signer,
    SigningRegistry,
};
use rand::rngs::OsRng;
use serde_json::json;

use crate::{
    cli::Command,
    error::CliError,
    prompt::{FixedSignature, TerminalSigner},
};

/// Run `command`, writing its result to `out`.
///
/// Envelopes are written as JSON, key material as a JSON object and opened
/// plaintext as raw bytes.
pub async fn run<W: Write>(command: Command, out: &mut W) -> Result<(), CliError> {
    match command {
        Command::Message { registry, version, list } => {
            let registry = SigningRegistry::from(registry);
            if list {
                for version in registry.supported_versions() {
                    let marker = if version == registry.current() { " (current)" } else { "" };
                    writeln!(out, "{version}{marker}")?;
                }
            } else {
                let text = registry.message(version.unwrap_or(registry.current()))?;
                writeln!(out, "{text}")?;
            }
        },

        Command::Keygen { algorithm, registry, version, signature } => {
            let registry = SigningRegistry::from(registry);
            let version = version.unwrap_or(registry.current());
            let signer: Box<dyn Signer> = match signature {
                Some(signature) => Box::new(FixedSignature(signature)),
                None => Box::new(TerminalSigner),
            };

            let secret = KeySource::External(signer.as_ref())
                .resolve(algorithm.into(), &registry, version)
                .await?;
            let public = secret.public_key()?;
            tracing::info!(algorithm = %secret.algorithm(), version, "derived key pair");

            let keys = json!({
                "algorithm": secret.algorithm().id(),
                "signing_version": version,
                "secret_key": secret.to_hex(),
                "public_key": public.to_hex(),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&keys)?)?;
        },

        Command::Seal { recipients, algorithm, signing_version, input, pretty } => {
            let algorithm = Algorithm::from(algorithm);
            let recipients = recipients
                .iter()
                .map(|value| parse_recipient(algorithm, value))
                .collect::<Result<Vec<_>, _>>()?;
            let version = match signing_version {
                Some(version) => SigningRegistry::market().with_current(version)?.current(),
                None => SigningRegistry::market().current(),
            };

            let plaintext = read_input(input.as_deref())?;
            let envelope = Envelope::seal(&plaintext, &recipients, version, &mut OsRng)?;
            tracing::info!(
                recipients = envelope.keys.len(),
                algorithm = %algorithm,
                "sealed envelope"
            );

            let json = if pretty { envelope.to_json_pretty()? } else { envelope.to_json()? };
            writeln!(out, "{json}")?;
        },

        Command::Open { address, secret, envelope } => {
            let envelope = read_envelope(envelope.as_deref())?;
            let secret = SecretKey::from_hex(envelope.algorithm, &secret)?;
            let plaintext = envelope.open(&address, &secret)?;
            out.write_all(&plaintext)?;
        },

        Command::AddRecipient { address, secret, recipient, envelope } => {
            let mut envelope = read_envelope(envelope.as_deref())?;
            let secret = SecretKey::from_hex(envelope.algorithm, &secret)?;
            let recipient = parse_recipient(envelope.algorithm, &recipient)?;

            envelope.add_recipient(&address, &secret, &recipient, &mut OsRng)?;
            tracing::info!(address = recipient.address(), "recipient added");
            writeln!(out, "{}", envelope.to_json()?)?;
        },

        Command::RemoveRecipient { address, envelope } => {
            let mut envelope = read_envelope(envelope.as_deref())?;
            let removed = envelope.remove_recipient(&address)?;
            tracing::info!(address = %removed.address, "recipient removed");
            writeln!(out, "{}", envelope.to_json()?)?;
        },

        Command::Inspect { envelope } => {
            let envelope = read_envelope(envelope.as_deref())?;
            let summary = json!({
                "algorithm": envelope.algorithm.id(),
                "format_version": envelope.algorithm.format_version(),
                "signing_version": envelope.signing_version,
                "recipients": envelope.recipients().collect::<Vec<_>>(),
            });
            writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
        },
    }

    Ok(())
}

fn parse_recipient(algorithm: Algorithm, value: &str) -> Result<Recipient, CliError> {
    let Some((address, public_key)) = value.split_once('=') else {
        return Err(CliError::InvalidRecipient { value: value.to_string() });
    };
    if address.trim().is_empty() {
        return Err(CliError::InvalidRecipient { value: value.to_string() });
    }

    Ok(Recipient::new(address, PublicKey::from_hex(algorithm, public_key.trim())?))
}

fn read_input(path: Option<&Path>) -> Result<Vec<u8>, CliError> {
    match path {
        Some(path) => Ok(std::fs::read(path)?),
        None => {
            let mut bytes = Vec::new();
            std::io::stdin().read_to_end(&mut bytes)?;
            Ok(bytes)
        },
    }
}

fn read_envelope(path: Option<&Path>) -> Result<Envelope, CliError> {
    let bytes = read_input(path)?;
    let json = std::str::from_utf8(&bytes)
        .map_err(|e| EnvelopeError::Malformed { reason: e.to_string() })?;
    Ok(Envelope::from_json(json)?)
}

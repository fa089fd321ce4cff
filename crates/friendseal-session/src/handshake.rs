//! Pairwise session bootstrap
//!
//! The session manager only consumes the handshake's output: a shared
//! secret, the peer's initial ratchet key and associated data. [`Handshake`]
//! is the seam; [`X3dhHandshake`] is the X25519 implementation.
//!
//! ```text
//! Alice (initiator)                         Bob (bundle owner)
//!   IK_a, EK_a (fresh)                        IK_b, SPK_b
//!
//!   DH1 = DH(IK_a, SPK_b)
//!   DH2 = DH(EK_a, IK_b)
//!   DH3 = DH(EK_a, SPK_b)
//!   SK  = HKDF(0xFF*32 || DH1 || DH2 || DH3)
//!   AD  = IK_a || IK_b
//!                 ── InitialMessage { IK_a, EK_a, SPK_b } ──►
//!                                            same DHs from the other side
//! ```
//!
//! SPK_b doubles as Bob's first ratchet key, so Alice's ratchet starts
//! against it and Bob's ratchet starts with its key pair.

use friendseal_crypto::{CryptoError, KeyPair, primitives::kdf};
use rand::{CryptoRng, RngCore};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use zeroize::Zeroizing;

const SECRET_INFO: &[u8] = b"friendseal x3dh v1";
const SIGNED_PREKEY_INFO: &[u8] = b"friendseal x3dh signed prekey v1";

/// Errors from the handshake collaborator
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum HandshakeError {
    /// A public key in the bundle or message is unusable
    #[error("invalid handshake key: {0}")]
    InvalidKey(#[from] CryptoError),

    /// Initial message was built against a pre-key we no longer hold
    #[error("initial message targets an unknown signed pre-key")]
    UnknownPreKey,
}

/// Public keys a peer publishes so others can start sessions with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreKeyBundle {
    /// Long-term identity public key
    pub identity_key: [u8; 32],
    /// Medium-term pre-key, also the owner's first ratchet key
    pub signed_prekey: [u8; 32],
}

/// Secret half of a [`PreKeyBundle`].
#[derive(Debug, Clone)]
pub struct PreKeySecrets {
    /// Signed pre-key pair
    pub signed_prekey: KeyPair,
}

/// First message from initiator to responder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialMessage {
    /// Initiator's identity public key
    pub identity_key: [u8; 32],
    /// Initiator's ephemeral public key
    pub ephemeral_key: [u8; 32],
    /// Responder pre-key the initiator used
    pub signed_prekey: [u8; 32],
}

/// Initiator's output.
#[derive(Debug)]
pub struct Initiation {
    /// Shared secret seeding the ratchet root key
    pub shared_secret: Zeroizing<[u8; 32]>,
    /// Responder's first ratchet key
    pub peer_ratchet_key: [u8; 32],
    /// Bound into every message of the session
    pub associated_data: Vec<u8>,
    /// To be delivered to the responder
    pub initial_message: InitialMessage,
}

/// Responder's output.
#[derive(Debug)]
pub struct Completion {
    /// Shared secret seeding the ratchet root key
    pub shared_secret: Zeroizing<[u8; 32]>,
    /// Bound into every message of the session
    pub associated_data: Vec<u8>,
}

/// Key agreement used to bootstrap pairwise sessions.
pub trait Handshake: Send + Sync + 'static {
    /// Pre-key bundle and its secrets for `identity`.
    ///
    /// Must be deterministic in `identity`: the bundle is regenerated on every
    /// initialize, and peers may still hold the old one.
    fn generate_bundle(&self, identity: &KeyPair) -> (PreKeyBundle, PreKeySecrets);

    /// Start a session against `peer_bundle`.
    fn initiate<R: CryptoRng + RngCore>(
        &self,
        identity: &KeyPair,
        peer_bundle: &PreKeyBundle,
        rng: &mut R,
    ) -> Result<Initiation, HandshakeError>;

    /// Finish a session started by a peer's [`InitialMessage`].
    fn complete(
        &self,
        identity: &KeyPair,
        prekeys: &PreKeySecrets,
        message: &InitialMessage,
    ) -> Result<Completion, HandshakeError>;
}

/// X3DH without one-time pre-keys.
#[derive(Debug, Clone, Copy, Default)]
pub struct X3dhHandshake;

impl X3dhHandshake {
    fn signed_prekey(identity: &KeyPair) -> KeyPair {
        let secret = Zeroizing::new(kdf::hkdf_sha256::<32>(
            None,
            &identity.secret_bytes()[..],
            SIGNED_PREKEY_INFO,
        ));
        KeyPair::from_secret_bytes(*secret)
    }

    fn derive_secret(dh1: &[u8; 32], dh2: &[u8; 32], dh3: &[u8; 32]) -> Zeroizing<[u8; 32]> {
        let mut ikm = Zeroizing::new([0u8; 128]);
        ikm[..32].fill(0xFF);
        ikm[32..64].copy_from_slice(dh1);
        ikm[64..96].copy_from_slice(dh2);
        ikm[96..].copy_from_slice(dh3);

        Zeroizing::new(kdf::hkdf_sha256(None, &ikm[..], SECRET_INFO))
    }

    fn associated_data(initiator: &[u8; 32], responder: &[u8; 32]) -> Vec<u8> {
        let mut ad = Vec::with_capacity(64);
        ad.extend_from_slice(initiator);
        ad.extend_from_slice(responder);
        ad
    }
}

impl Handshake for X3dhHandshake {
    fn generate_bundle(&self, identity: &KeyPair) -> (PreKeyBundle, PreKeySecrets) {
        let signed_prekey = Self::signed_prekey(identity);
        let bundle = PreKeyBundle {
            identity_key: identity.public_key(),
            signed_prekey: signed_prekey.public_key(),
        };
        (bundle, PreKeySecrets { signed_prekey })
    }

    fn initiate<R: CryptoRng + RngCore>(
        &self,
        identity: &KeyPair,
        peer_bundle: &PreKeyBundle,
        rng: &mut R,
    ) -> Result<Initiation, HandshakeError> {
        let ephemeral = KeyPair::generate(rng);

        let dh1 = identity.diffie_hellman(&peer_bundle.signed_prekey)?;
        let dh2 = ephemeral.diffie_hellman(&peer_bundle.identity_key)?;
        let dh3 = ephemeral.diffie_hellman(&peer_bundle.signed_prekey)?;

        let identity_key = identity.public_key();
        Ok(Initiation {
            shared_secret: Self::derive_secret(&dh1, &dh2, &dh3),
            peer_ratchet_key: peer_bundle.signed_prekey,
            associated_data: Self::associated_data(&identity_key, &peer_bundle.identity_key),
            initial_message: InitialMessage {
                identity_key,
                ephemeral_key: ephemeral.public_key(),
                signed_prekey: peer_bundle.signed_prekey,
            },
        })
    }

    fn complete(
        &self,
        identity: &KeyPair,
        prekeys: &PreKeySecrets,
        message: &InitialMessage,
    ) -> Result<Completion, HandshakeError> {
        if message.signed_prekey != prekeys.signed_prekey.public_key() {
            return Err(HandshakeError::UnknownPreKey);
        }

        let dh1 = prekeys.signed_prekey.diffie_hellman(&message.identity_key)?;
        let dh2 = identity.diffie_hellman(&message.ephemeral_key)?;
        let dh3 = prekeys.signed_prekey.diffie_hellman(&message.ephemeral_key)?;

        Ok(Completion {
            shared_secret: Self::derive_secret(&dh1, &dh2, &dh3),
            associated_data: Self::associated_data(&message.identity_key, &identity.public_key()),
        })
    }
}

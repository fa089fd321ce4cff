//! Sealing, opening and recipient management

use friendseal_crypto::primitives::{
    aead::{self, KEY_SIZE},
    kdf, normalize_address,
};
use rand::{CryptoRng, RngCore};
use zeroize::Zeroizing;

use crate::{
    envelope::{Encapsulation, Envelope, RecipientKey, SealedContent},
    error::EnvelopeError,
    hybrid,
    keys::{Algorithm, KeySource, PublicKey, Recipient, SecretKey},
    registry::SigningRegistry,
};

/// HKDF info for the per-recipient wrapping key
const WRAP_INFO: &[u8] = b"friendseal envelope key wrap v1";

impl Envelope {
    /// Encrypt `plaintext` once and wrap the content key for every recipient.
    ///
    /// All recipients must use the same key family, which becomes the
    /// envelope's algorithm. A repeated address keeps its first entry.
    ///
    /// # Errors
    ///
    /// - `NoRecipients`: `recipients` is empty
    /// - `AlgorithmMismatch`: recipients mix key families
    pub fn seal<R: CryptoRng + RngCore>(
        plaintext: &[u8],
        recipients: &[Recipient],
        signing_version: u32,
        rng: &mut R,
    ) -> Result<Self, EnvelopeError> {
        let Some(first) = recipients.first() else {
            return Err(EnvelopeError::NoRecipients);
        };
        let algorithm = first.public_key().algorithm();

        let content_key = Zeroizing::new(aead::random_key(rng));
        let nonce = aead::random_nonce(rng);
        let ciphertext = aead::seal(&content_key, &nonce, plaintext, &[]);

        let mut keys: Vec<RecipientKey> = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            ensure_algorithm(algorithm, recipient.public_key().algorithm())?;
            if keys.iter().any(|k| k.address == recipient.address()) {
                tracing::debug!(
                    address = recipient.address(),
                    "envelope: duplicate recipient skipped"
                );
                continue;
            }
            keys.push(wrap_for(recipient, &content_key, rng)?);
        }

        tracing::debug!(
            algorithm = %algorithm,
            recipients = keys.len(),
            signing_version,
            "envelope: sealed"
        );

        Ok(Self {
            algorithm,
            signing_version,
            content: SealedContent { nonce, ciphertext },
            keys,
        })
    }

    /// Decrypt the content as `address`.
    ///
    /// # Errors
    ///
    /// - `AlgorithmMismatch`: key family differs from the envelope's
    /// - `NotARecipient`: no entry for the address, or the key cannot unwrap it
    /// - `AuthenticationFailed`: content does not authenticate
    pub fn open(&self, address: &str, secret: &SecretKey) -> Result<Vec<u8>, EnvelopeError> {
        let content_key = self.content_key(address, secret)?;

        aead::open(&content_key, &self.content.nonce, &self.content.ciphertext, &[])
            .map_err(|_| EnvelopeError::AuthenticationFailed)
    }

    /// Resolve `source` against the envelope's algorithm and signing
    /// version, then [`open`](Self::open).
    pub async fn open_with(
        &self,
        address: &str,
        source: KeySource<'_>,
        registry: &SigningRegistry,
    ) -> Result<Vec<u8>, EnvelopeError> {
        let secret = source.resolve(self.algorithm, registry, self.signing_version).await?;
        self.open(address, &secret)
    }

    /// Give `new_recipient` access by re-wrapping the content key.
    ///
    /// The content ciphertext is untouched.
    ///
    /// # Errors
    ///
    /// - `DuplicateRecipient`: the new address already has an entry
    /// - `AlgorithmMismatch`: new key is of the other family
    /// - `NotARecipient`: `existing_address` cannot unwrap the content key
    pub fn add_recipient<R: CryptoRng + RngCore>(
        &mut self,
        existing_address: &str,
        existing_secret: &SecretKey,
        new_recipient: &Recipient,
        rng: &mut R,
    ) -> Result<(), EnvelopeError> {
        if self.entry(new_recipient.address()).is_some() {
            return Err(EnvelopeError::DuplicateRecipient {
                address: new_recipient.address().to_string(),
            });
        }
        ensure_algorithm(self.algorithm, new_recipient.public_key().algorithm())?;

        let content_key = self.content_key(existing_address, existing_secret)?;
        let entry = wrap_for(new_recipient, &content_key, rng)?;
        self.keys.push(entry);

        tracing::debug!(address = new_recipient.address(), "envelope: recipient added");
        Ok(())
    }

    /// Drop every entry for `address` and return the first.
    ///
    /// This does not rotate the content key: the removed party can still
    /// decrypt any copy of this envelope it kept, or plaintext it cached.
    ///
    /// # Errors
    ///
    /// - `NotARecipient`: no entry for the address
    pub fn remove_recipient(&mut self, address: &str) -> Result<RecipientKey, EnvelopeError> {
        let normalized = normalize_address(address);
        let position = self
            .keys
            .iter()
            .position(|k| k.address == normalized)
            .ok_or_else(|| EnvelopeError::NotARecipient { address: normalized.clone() })?;

        let removed = self.keys.remove(position);
        self.keys.retain(|k| k.address != normalized);

        tracing::debug!(address = %normalized, "envelope: recipient removed");
        Ok(removed)
    }

    fn content_key(
        &self,
        address: &str,
        secret: &SecretKey,
    ) -> Result<Zeroizing<[u8; KEY_SIZE]>, EnvelopeError> {
        ensure_algorithm(self.algorithm, secret.algorithm())?;

        let normalized = normalize_address(address);
        let not_a_recipient = || EnvelopeError::NotARecipient { address: normalized.clone() };

        let entry = self.entry(&normalized).ok_or_else(not_a_recipient)?;

        let shared = match (&entry.encapsulation, secret) {
            (Encapsulation::Classical { ephemeral_public_key }, SecretKey::Classical(pair)) => {
                pair.diffie_hellman(ephemeral_public_key).map_err(|_| not_a_recipient())?
            },
            (Encapsulation::Hybrid { kem_ciphertext }, SecretKey::Hybrid(secret)) => {
                hybrid::decapsulate(secret, kem_ciphertext)?
            },
            (encapsulation, _) => {
                return Err(EnvelopeError::AlgorithmMismatch {
                    expected: encapsulation.algorithm(),
                    actual: secret.algorithm(),
                });
            },
        };

        let wrapping_key = wrapping_key(&shared);
        let unwrapped =
            aead::open(&wrapping_key, &entry.nonce, &entry.wrapped_key, normalized.as_bytes())
                .map_err(|_| not_a_recipient())?;

        let Ok(key) = <[u8; KEY_SIZE]>::try_from(unwrapped.as_slice()) else {
            return Err(EnvelopeError::Malformed {
                reason: format!("wrapped key for {normalized} has {} bytes", unwrapped.len()),
            });
        };
        Ok(Zeroizing::new(key))
    }
}

fn wrap_for<R: CryptoRng + RngCore>(
    recipient: &Recipient,
    content_key: &[u8; KEY_SIZE],
    rng: &mut R,
) -> Result<RecipientKey, EnvelopeError> {
    let (shared, encapsulation) = match recipient.public_key() {
        PublicKey::Classical(public) => {
            let ephemeral = friendseal_crypto::KeyPair::generate(rng);
            let shared = ephemeral.diffie_hellman(public)?;
            (shared, Encapsulation::Classical { ephemeral_public_key: ephemeral.public_key() })
        },
        PublicKey::Hybrid(public) => {
            let (shared, kem_ciphertext) = hybrid::encapsulate(public, rng)?;
            (shared, Encapsulation::Hybrid { kem_ciphertext })
        },
    };

    let wrapping_key = wrapping_key(&shared);
    let nonce = aead::random_nonce(rng);
    // Address is bound as AAD so an entry cannot be relabelled
    let wrapped_key =
        aead::seal(&wrapping_key, &nonce, content_key, recipient.address().as_bytes());

    Ok(RecipientKey { address: recipient.address().to_string(), wrapped_key, nonce, encapsulation })
}

fn wrapping_key(shared: &[u8; 32]) -> Zeroizing<[u8; KEY_SIZE]> {
    Zeroizing::new(kdf::hkdf_sha256(None, shared, WRAP_INFO))
}

fn ensure_algorithm(expected: Algorithm, actual: Algorithm) -> Result<(), EnvelopeError> {
    if expected == actual {
        Ok(())
    } else {
        Err(EnvelopeError::AlgorithmMismatch { expected, actual })
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;
    use rand_chacha::ChaCha20Rng;

    use super::*;

    fn classical(signature: &str, address: &str) -> (SecretKey, Recipient) {
        let secret = SecretKey::from_signature(Algorithm::Classical, signature);
        let recipient = Recipient::new(address, secret.public_key().unwrap());
        (secret, recipient)
    }

    #[test]
    fn seal_requires_recipients() {
        let mut rng = ChaCha20Rng::seed_from_u64(1);
        assert_eq!(Envelope::seal(b"x", &[], 1, &mut rng), Err(EnvelopeError::NoRecipients));
    }

    #[test]
    fn mixed_families_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let (_, alice) = classical("a", "0xa");
        let hybrid_secret = SecretKey::from_signature(Algorithm::Hybrid, "b");
        let bob = Recipient::new("0xb", hybrid_secret.public_key().unwrap());

        assert!(matches!(
            Envelope::seal(b"x", &[alice, bob], 1, &mut rng),
            Err(EnvelopeError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn duplicate_address_keeps_first_entry() {
        let mut rng = ChaCha20Rng::seed_from_u64(3);
        let (first_secret, first) = classical("first", "0xA");
        let (_, second) = classical("second", "0xa");

        let envelope = Envelope::seal(b"x", &[first, second], 1, &mut rng).unwrap();
        assert_eq!(envelope.keys.len(), 1);
        assert_eq!(envelope.open("0xa", &first_secret).unwrap(), b"x");
    }

    #[test]
    fn relabelled_entry_does_not_open() {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let (secret, recipient) = classical("sig", "0xaaa");

        let mut envelope = Envelope::seal(b"x", &[recipient], 1, &mut rng).unwrap();
        envelope.keys[0].address = "0xbbb".to_string();

        assert!(matches!(
            envelope.open("0xbbb", &secret),
            Err(EnvelopeError::NotARecipient { .. })
        ));
    }

    #[test]
    fn tampered_content_fails_authentication() {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (secret, recipient) = classical("sig", "0xaaa");

        let mut envelope = Envelope::seal(b"payload", &[recipient], 1, &mut rng).unwrap();
        envelope.content.ciphertext[0] ^= 0x01;

        assert_eq!(envelope.open("0xaaa", &secret), Err(EnvelopeError::AuthenticationFailed));
    }

    #[test]
    fn wrong_family_secret_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(6);
        let (_, recipient) = classical("sig", "0xaaa");
        let envelope = Envelope::seal(b"x", &[recipient], 1, &mut rng).unwrap();

        let hybrid_secret = SecretKey::from_signature(Algorithm::Hybrid, "sig");
        assert!(matches!(
            envelope.open("0xaaa", &hybrid_secret),
            Err(EnvelopeError::AlgorithmMismatch { .. })
        ));
    }

    #[test]
    fn remove_absent_recipient_fails() {
        let mut rng = ChaCha20Rng::seed_from_u64(7);
        let (_, recipient) = classical("sig", "0xaaa");
        let mut envelope = Envelope::seal(b"x", &[recipient], 1, &mut rng).unwrap();

        assert_eq!(
            envelope.remove_recipient("0xccc").map(|_| ()),
            Err(EnvelopeError::NotARecipient { address: "0xccc".to_string() })
        );
    }

    #[test]
    fn add_existing_recipient_rejected() {
        let mut rng = ChaCha20Rng::seed_from_u64(8);
        let (secret, recipient) = classical("sig", "0xaaa");
        let mut envelope = Envelope::seal(b"x", &[recipient.clone()], 1, &mut rng).unwrap();

        assert!(matches!(
            envelope.add_recipient("0xaaa", &secret, &recipient, &mut rng),
            Err(EnvelopeError::DuplicateRecipient { .. })
        ));
    }

    #[test]
    fn ensure_algorithm_reports_both_sides() {
        assert_eq!(
            ensure_algorithm(Algorithm::Classical, Algorithm::Hybrid),
            Err(EnvelopeError::AlgorithmMismatch {
                expected: Algorithm::Classical,
                actual: Algorithm::Hybrid
            })
        );
    }
}

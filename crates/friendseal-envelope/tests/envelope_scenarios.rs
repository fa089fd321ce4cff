//! End-to-end envelope scenarios
//!
//! Each test seals through the public API, serializes to wire JSON where a
//! real envelope would be published, and opens from the parsed copy.

use friendseal_envelope::{
    Algorithm, Envelope, EnvelopeError, KeySource, Payload, Recipient, SecretKey,
    SigningRegistry,
    hybrid::{HYBRID_CIPHERTEXT_SIZE, HYBRID_PUBLIC_KEY_SIZE, HYBRID_SECRET_KEY_SIZE},
    registry::{IDENTITY_MESSAGES, MARKET_MESSAGES},
};
use rand::SeedableRng;
use rand_chacha::ChaCha20Rng;
use serde::{Deserialize, Serialize};
use serde_json::json;

const ALICE: &str = "0xAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAAA";
const BOB: &str = "0xBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBBB";
const CAROL: &str = "0xCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCCC";

fn party(algorithm: Algorithm, signature: &str, address: &str) -> (SecretKey, Recipient) {
    let secret = SecretKey::from_signature(algorithm, signature);
    let recipient = Recipient::new(address, secret.public_key().unwrap());
    (secret, recipient)
}

fn republish(envelope: &Envelope) -> Envelope {
    Envelope::from_json(&envelope.to_json().unwrap()).unwrap()
}

#[test]
fn classical_secret_scenario() {
    let mut rng = ChaCha20Rng::seed_from_u64(1);
    let (secret, alice) = party(Algorithm::Classical, "sig-A", ALICE);

    let envelope =
        Envelope::seal_serialized(&json!({ "secret": "x" }), &[alice], 1, &mut rng).unwrap();
    let envelope = republish(&envelope);

    assert_eq!(
        envelope.open_payload(ALICE, &secret).unwrap(),
        Payload::Structured(json!({ "secret": "x" }))
    );

    let other = SecretKey::from_signature(Algorithm::Classical, "sig-B");
    let err = envelope.open(ALICE, &other).unwrap_err();
    assert!(err.to_string().starts_with("no key found"), "{err}");
}

#[test]
fn text_payload_roundtrips_in_both_families() {
    for algorithm in [Algorithm::Classical, Algorithm::Hybrid] {
        let mut rng = ChaCha20Rng::seed_from_u64(2);
        let (secret, alice) = party(algorithm, "sig-A", ALICE);

        let envelope = Envelope::seal(b"meet at noon", &[alice], 2, &mut rng).unwrap();
        let envelope = republish(&envelope);

        assert_eq!(envelope.algorithm, algorithm);
        assert_eq!(
            envelope.open_payload(ALICE, &secret).unwrap(),
            Payload::Text("meet at noon".to_string())
        );
    }
}

#[test]
fn typed_payload_roundtrip() {
    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct MarketTerms {
        question: String,
        stake: u64,
    }

    let mut rng = ChaCha20Rng::seed_from_u64(3);
    let (secret, alice) = party(Algorithm::Hybrid, "sig-A", ALICE);
    let terms = MarketTerms { question: "rain tomorrow?".to_string(), stake: 10 };

    let envelope = Envelope::seal_serialized(&terms, &[alice], 2, &mut rng).unwrap();
    assert_eq!(envelope.open_as::<MarketTerms>(ALICE, &secret).unwrap(), terms);
}

#[test]
fn every_recipient_decrypts_independently() {
    for algorithm in [Algorithm::Classical, Algorithm::Hybrid] {
        let mut rng = ChaCha20Rng::seed_from_u64(4);
        let (alice_secret, alice) = party(algorithm, "sig-A", ALICE);
        let (bob_secret, bob) = party(algorithm, "sig-B", BOB);

        let mut envelope = Envelope::seal(b"terms", &[alice, bob], 2, &mut rng).unwrap();
        assert_eq!(envelope.open(ALICE, &alice_secret).unwrap(), b"terms");
        assert_eq!(envelope.open(BOB, &bob_secret).unwrap(), b"terms");

        let removed = envelope.remove_recipient(BOB).unwrap();
        assert_eq!(removed.address, BOB.to_lowercase());
        assert!(!envelope.has_recipient(BOB));

        let envelope = republish(&envelope);
        assert_eq!(envelope.open(ALICE, &alice_secret).unwrap(), b"terms");
        assert!(matches!(
            envelope.open(BOB, &bob_secret),
            Err(EnvelopeError::NotARecipient { .. })
        ));
    }
}

#[test]
fn add_recipient_leaves_content_untouched() {
    for algorithm in [Algorithm::Classical, Algorithm::Hybrid] {
        let mut rng = ChaCha20Rng::seed_from_u64(5);
        let (alice_secret, alice) = party(algorithm, "sig-A", ALICE);
        let (carol_secret, carol) = party(algorithm, "sig-C", CAROL);

        let mut envelope = Envelope::seal(b"terms", &[alice], 2, &mut rng).unwrap();
        let content_before = envelope.content.clone();

        envelope.add_recipient(ALICE, &alice_secret, &carol, &mut rng).unwrap();

        assert_eq!(envelope.content, content_before);
        assert_eq!(envelope.recipients().collect::<Vec<_>>(), [
            ALICE.to_lowercase(),
            CAROL.to_lowercase()
        ]);
        assert_eq!(republish(&envelope).open(CAROL, &carol_secret).unwrap(), b"terms");
    }
}

#[test]
fn non_recipient_cannot_add() {
    let mut rng = ChaCha20Rng::seed_from_u64(6);
    let (_, alice) = party(Algorithm::Classical, "sig-A", ALICE);
    let (bob_secret, _) = party(Algorithm::Classical, "sig-B", BOB);
    let (_, carol) = party(Algorithm::Classical, "sig-C", CAROL);

    let mut envelope = Envelope::seal(b"terms", &[alice], 1, &mut rng).unwrap();

    assert!(matches!(
        envelope.add_recipient(BOB, &bob_secret, &carol, &mut rng),
        Err(EnvelopeError::NotARecipient { .. })
    ));
    // Knowing a recipient's address is not enough without their key
    assert!(matches!(
        envelope.add_recipient(ALICE, &bob_secret, &carol, &mut rng),
        Err(EnvelopeError::NotARecipient { .. })
    ));
    assert_eq!(envelope.keys.len(), 1);
}

#[test]
fn hybrid_wire_sizes() {
    let mut rng = ChaCha20Rng::seed_from_u64(7);
    let (secret, alice) = party(Algorithm::Hybrid, "sig-A", ALICE);

    assert_eq!(alice.public_key().to_bytes().len(), HYBRID_PUBLIC_KEY_SIZE);
    assert_eq!(HYBRID_PUBLIC_KEY_SIZE, 1216);
    assert_eq!(secret.to_hex().len(), HYBRID_SECRET_KEY_SIZE * 2);

    let envelope = Envelope::seal(b"x", &[alice], 2, &mut rng).unwrap();
    let value: serde_json::Value = serde_json::from_str(&envelope.to_json().unwrap()).unwrap();

    assert_eq!(value["format_version"], "2.0");
    let kem_hex = value["keys"][0]["kem_ciphertext"].as_str().unwrap();
    assert_eq!(kem_hex.len(), HYBRID_CIPHERTEXT_SIZE * 2);
    assert_eq!(kem_hex.len(), 2240);
    assert!(value["keys"][0].get("ephemeral_public_key").is_none());
}

#[test]
fn signing_version_travels_with_envelope() {
    let mut rng = ChaCha20Rng::seed_from_u64(8);
    let registry = SigningRegistry::market();
    let (_, alice) = party(Algorithm::Classical, "sig-A", ALICE);

    let envelope = Envelope::seal(b"x", &[alice], registry.current(), &mut rng).unwrap();
    assert_eq!(republish(&envelope).signing_version, 2);
}

#[tokio::test]
async fn open_with_cached_key() {
    let mut rng = ChaCha20Rng::seed_from_u64(9);
    let (secret, alice) = party(Algorithm::Classical, "sig-A", ALICE);
    let envelope = Envelope::seal(b"cached", &[alice], 1, &mut rng).unwrap();

    let plaintext = envelope
        .open_with(ALICE, KeySource::Cached(secret), &SigningRegistry::market())
        .await
        .unwrap();
    assert_eq!(plaintext, b"cached");
}

/// Published texts. Changing any byte here makes every envelope sealed
/// under that version unreadable.
#[test]
fn published_signing_messages_are_pinned() {
    assert_eq!(MARKET_MESSAGES[0], (
        1,
        "Sign this message to unlock your friend market encryption key."
    ));
    assert_eq!(IDENTITY_MESSAGES[0], (
        1,
        "Sign this message to create your friend market messaging identity."
    ));

    assert_eq!(
        MARKET_MESSAGES[1].1,
        "Friend Market: private market access\n\nBy signing this message you derive the \
         encryption key that lets you read and share private friend markets. The key is \
         computed from your signature on this exact text, so signing it again on any device \
         gives you the same key.\n\nOnly sign this message on a site you trust. Anyone who \
         obtains this signature can read every private market you have been invited to.\n\n\
         Signing is free. It does not send a transaction, grant token approvals or move any \
         funds.\n\nVersion: 2"
    );
    assert_eq!(
        IDENTITY_MESSAGES[1].1,
        "Friend Market: messaging identity\n\nBy signing this message you derive the identity \
         key used to start private conversations and group chats with the members of your \
         friend markets. The key is computed from your signature on this exact text, so \
         signing it again on any device restores the same identity.\n\nOnly sign this message \
         on a site you trust. Anyone who obtains this signature can impersonate you in private \
         conversations.\n\nSigning is free. It does not send a transaction, grant token \
         approvals or move any funds.\n\nVersion: 2"
    );
}

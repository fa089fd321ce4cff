//! Versioned signing-message registries
//!
//! Keys are derived from a wallet signature over one of these texts. A
//! published text can never change: every envelope sealed under that version
//! would become unreadable. New wording is a new version.

use crate::error::EnvelopeError;

/// Market key derivation, version 1.
const MARKET_V1: &str = "Sign this message to unlock your friend market encryption key.";

/// Market key derivation, version 2.
const MARKET_V2: &str = "\
Friend Market: private market access

By signing this message you derive the encryption key that lets you read \
and share private friend markets. The key is computed from your signature \
on this exact text, so signing it again on any device gives you the same key.

Only sign this message on a site you trust. Anyone who obtains this \
signature can read every private market you have been invited to.

Signing is free. It does not send a transaction, grant token approvals or \
move any funds.

Version: 2";

/// Identity key derivation, version 1.
const IDENTITY_V1: &str = "Sign this message to create your friend market messaging identity.";

/// Identity key derivation, version 2.
const IDENTITY_V2: &str = "\
Friend Market: messaging identity

By signing this message you derive the identity key used to start private \
conversations and group chats with the members of your friend markets. \
The key is computed from your signature on this exact text, so signing it \
again on any device restores the same identity.

Only sign this message on a site you trust. Anyone who obtains this \
signature can impersonate you in private conversations.

Signing is free. It does not send a transaction, grant token approvals or \
move any funds.

Version: 2";

/// Market/group key derivation messages, by version.
pub const MARKET_MESSAGES: &[(u32, &str)] = &[(1, MARKET_V1), (2, MARKET_V2)];

/// Identity key derivation messages, by version.
pub const IDENTITY_MESSAGES: &[(u32, &str)] = &[(1, IDENTITY_V1), (2, IDENTITY_V2)];

/// An append-only message registry with a pointer to the version used for
/// new encryptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SigningRegistry {
    messages: &'static [(u32, &'static str)],
    current: u32,
}

impl SigningRegistry {
    /// Market registry, current version 2.
    pub fn market() -> Self {
        Self { messages: MARKET_MESSAGES, current: 2 }
    }

    /// Identity registry, current version 1.
    pub fn identity() -> Self {
        Self { messages: IDENTITY_MESSAGES, current: 1 }
    }

    /// Same registry with a different current version.
    ///
    /// # Errors
    ///
    /// - `UnknownVersion`: `version` is not published in this registry
    pub fn with_current(self, version: u32) -> Result<Self, EnvelopeError> {
        self.message(version)?;
        Ok(Self { current: version, ..self })
    }

    /// Version used for new encryptions.
    pub fn current(&self) -> u32 {
        self.current
    }

    /// Text for `version`.
    ///
    /// # Errors
    ///
    /// - `UnknownVersion`: carries the supported versions
    pub fn message(&self, version: u32) -> Result<&'static str, EnvelopeError> {
        self.messages
            .iter()
            .find(|(v, _)| *v == version)
            .map(|(_, text)| *text)
            .ok_or_else(|| EnvelopeError::UnknownVersion {
                version,
                supported: self.supported_versions(),
            })
    }

    /// Text for the current version.
    ///
    /// # Errors
    ///
    /// - `UnknownVersion`: `current` is not published in this registry
    pub fn current_message(&self) -> Result<&'static str, EnvelopeError> {
        self.message(self.current)
    }

    /// All published versions, ascending.
    pub fn supported_versions(&self) -> Vec<u32> {
        let mut versions: Vec<u32> = self.messages.iter().map(|(v, _)| *v).collect();
        versions.sort_unstable();
        versions
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_published_versions() {
        assert_eq!(SigningRegistry::market().current(), 2);
        assert_eq!(SigningRegistry::identity().current(), 1);
        assert_eq!(SigningRegistry::market().current_message().unwrap(), MARKET_V2);
        assert_eq!(SigningRegistry::identity().current_message().unwrap(), IDENTITY_V1);
    }

    #[test]
    fn unknown_version_lists_supported() {
        let err = SigningRegistry::market().message(3).unwrap_err();
        assert_eq!(err, EnvelopeError::UnknownVersion { version: 3, supported: vec![1, 2] });
    }

    #[test]
    fn with_current_rejects_unpublished() {
        assert!(SigningRegistry::market().with_current(0).is_err());
        assert_eq!(SigningRegistry::market().with_current(1).unwrap().current(), 1);
    }

    #[test]
    fn unpublished_current_is_an_error() {
        let registry = SigningRegistry { messages: MARKET_MESSAGES, current: 9 };
        assert_eq!(
            registry.current_message(),
            Err(EnvelopeError::UnknownVersion { version: 9, supported: vec![1, 2] })
        );
    }

    #[test]
    fn versions_have_distinct_text() {
        for registry in [MARKET_MESSAGES, IDENTITY_MESSAGES] {
            assert_ne!(registry[0].1, registry[1].1);
        }
        assert_ne!(MARKET_V1, IDENTITY_V1);
    }
}

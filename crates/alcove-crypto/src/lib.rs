//! Alcove client-side crypto.
//!
//! Everything here runs on the client only — the server crates never depend
//! on this crate, so key material and plaintext cannot cross that boundary by
//! construction. Messages travel as armored sealed envelopes: an ephemeral
//! X25519 agreement wraps a fresh AES-256-GCM content key per recipient.
//!
//! The keyring holds one local identity (secret key encrypted at rest under a
//! passphrase-derived key) plus the public keys of trusted correspondents.

pub mod envelope;
pub mod error;
pub mod keyring;

pub use error::{DecryptionError, EncryptionError, KeyringError};
pub use keyring::{Contact, CredentialPrompt, KeyIdentity, Keyring};

/// Message content as only the client may hold it. Deliberately not
/// serializable: the way plaintext leaves this process is by being sealed
/// into an [`alcove_types::OpaqueBody`] first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Plaintext(String);

impl Plaintext {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

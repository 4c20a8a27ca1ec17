use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum EncryptionError {
    #[error("message is empty")]
    EmptyMessage,

    #[error("recipients list is empty")]
    EmptyRecipients,

    #[error("no usable public key for '{0}'")]
    NoUsableKey(String),

    #[error("AEAD encryption failed")]
    Aead,

    #[error("envelope serialization failed: {0}")]
    Serialization(#[from] serde_json::Error),
}

#[derive(Debug, Error)]
pub enum DecryptionError {
    #[error("malformed envelope: {0}")]
    Malformed(String),

    #[error("message is not addressed to this identity")]
    NotAddressed,

    #[error("AEAD decryption failed (authentication tag mismatch)")]
    Aead,

    #[error("decrypted content is not valid UTF-8")]
    NotUtf8,
}

#[derive(Debug, Error)]
pub enum KeyringError {
    #[error("keyring home {0} is not a directory")]
    InvalidHome(PathBuf),

    #[error("passphrase must be between 8 and 64 characters")]
    PassphrasePolicy,

    #[error("incorrect passphrase")]
    BadPassphrase,

    #[error("keyring file is corrupt: {0}")]
    Corrupt(String),

    #[error("key derivation failed: {0}")]
    KeyDerivation(String),

    #[error("credential prompt aborted: {0}")]
    Prompt(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Serialization(#[from] serde_json::Error),
}

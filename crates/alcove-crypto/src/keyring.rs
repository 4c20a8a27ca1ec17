//! On-disk keyring: one local identity plus trusted contact keys.
//!
//! Layout under the keyring home directory:
//!   identity.json — name, email, public key, and the secret key encrypted
//!                   under an Argon2id key derived from the passphrase
//!   contacts.json — public keys of correspondents, added out-of-band
//!
//! Opening the keyring is the only interactive step in the whole client: it
//! prompts for the passphrase (and, on first use, provisions a fresh keypair).
//! Request paths never touch the prompt.

use std::collections::BTreeSet;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use argon2::Argon2;
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use tracing::info;
use x25519_dalek::{PublicKey, StaticSecret};

use alcove_types::OpaqueBody;

use crate::Plaintext;
use crate::envelope;
use crate::error::{DecryptionError, EncryptionError, KeyringError};

const IDENTITY_FILE: &str = "identity.json";
const CONTACTS_FILE: &str = "contacts.json";
const SALT_LEN: usize = 16;

/// Supplies the interactively gathered credentials during keyring setup.
/// The CLI implements this over the terminal; tests use canned values.
pub trait CredentialPrompt {
    fn passphrase(&self) -> Result<String, KeyringError>;

    /// (display name, email) for a newly provisioned identity.
    fn identity(&self) -> Result<(String, String), KeyringError>;
}

/// A name/email pair a key is trusted for, as shown in key listings.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub struct KeyIdentity {
    pub name: String,
    pub email: String,
}

impl fmt::Display for KeyIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} <{}>", self.name, self.email)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub email: String,
    pub public_key: String,
    pub key_id: String,
}

#[derive(Serialize, Deserialize)]
struct StoredIdentity {
    name: String,
    email: String,
    public_key: String,
    key_id: String,
    salt: String,
    secret_key: String,
}

pub struct Keyring {
    home: PathBuf,
    name: String,
    email: String,
    secret: StaticSecret,
    public: PublicKey,
    contacts: Vec<Contact>,
}

pub fn passphrase_is_valid(passphrase: &str) -> bool {
    (8..=64).contains(&passphrase.chars().count())
}

impl Keyring {
    /// Open the keyring at `home`, provisioning a fresh identity when none
    /// exists yet. Blocks on the credential prompt — call it from the client
    /// setup phase only.
    pub fn open(home: &Path, prompt: &dyn CredentialPrompt) -> Result<Self, KeyringError> {
        if !home.is_dir() {
            return Err(KeyringError::InvalidHome(home.to_path_buf()));
        }

        let identity_path = home.join(IDENTITY_FILE);
        let (name, email, secret, public) = if identity_path.exists() {
            load_identity(&identity_path, prompt)?
        } else {
            provision_identity(&identity_path, prompt)?
        };

        let contacts = load_contacts(&home.join(CONTACTS_FILE))?;

        Ok(Self {
            home: home.to_path_buf(),
            name,
            email,
            secret,
            public,
            contacts,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn email(&self) -> &str {
        &self.email
    }

    /// Own public key, base64, for handing to correspondents out-of-band.
    pub fn public_key_base64(&self) -> String {
        BASE64.encode(self.public.as_bytes())
    }

    /// Every identity this keyring holds a public key for, self included.
    pub fn known_identities(&self) -> BTreeSet<KeyIdentity> {
        let mut set: BTreeSet<KeyIdentity> = self
            .contacts
            .iter()
            .map(|c| KeyIdentity {
                name: c.name.clone(),
                email: c.email.clone(),
            })
            .collect();
        set.insert(KeyIdentity {
            name: self.name.clone(),
            email: self.email.clone(),
        });
        set
    }

    /// Trust a correspondent's public key under a name/email pair.
    pub fn add_contact(
        &mut self,
        name: &str,
        email: &str,
        public_key_b64: &str,
    ) -> Result<(), KeyringError> {
        let public = decode_key(public_key_b64)
            .ok_or_else(|| KeyringError::Corrupt("contact public key is not valid".into()))?;

        self.contacts.push(Contact {
            name: name.to_string(),
            email: email.to_string(),
            public_key: public_key_b64.to_string(),
            key_id: envelope::key_id(&public),
        });

        let path = self.home.join(CONTACTS_FILE);
        fs::write(&path, serde_json::to_string_pretty(&self.contacts)?)?;
        Ok(())
    }

    /// Seal plaintext for the given recipient identifiers (username or
    /// email, matched against contacts and the local identity).
    pub fn seal(
        &self,
        plaintext: &Plaintext,
        recipients: &[&str],
    ) -> Result<OpaqueBody, EncryptionError> {
        if plaintext.as_str().is_empty() {
            return Err(EncryptionError::EmptyMessage);
        }
        if recipients.is_empty() {
            return Err(EncryptionError::EmptyRecipients);
        }

        let mut keys = Vec::with_capacity(recipients.len());
        for ident in recipients {
            keys.push(self.resolve(ident)?);
        }

        let armored = envelope::seal(plaintext.as_str().as_bytes(), &keys)?;
        Ok(OpaqueBody::new(armored))
    }

    /// Open sealed content with the local secret key. Content without the
    /// envelope marker passes through unchanged, so plaintext and ciphertext
    /// can share a transcript.
    pub fn open_sealed(&self, body: &OpaqueBody) -> Result<Plaintext, DecryptionError> {
        if !envelope::is_sealed(body.as_str()) {
            return Ok(Plaintext::new(body.as_str()));
        }

        let bytes = envelope::open(body.as_str(), &self.secret)?;
        let text = String::from_utf8(bytes).map_err(|_| DecryptionError::NotUtf8)?;
        Ok(Plaintext::new(text))
    }

    fn resolve(&self, ident: &str) -> Result<PublicKey, EncryptionError> {
        if ident == self.name || ident == self.email {
            return Ok(self.public);
        }

        self.contacts
            .iter()
            .find(|c| c.name == ident || c.email == ident)
            .and_then(|c| decode_key(&c.public_key))
            .ok_or_else(|| EncryptionError::NoUsableKey(ident.to_string()))
    }
}

fn decode_key(encoded: &str) -> Option<PublicKey> {
    let bytes = BASE64.decode(encoded).ok()?;
    let bytes: [u8; 32] = bytes.try_into().ok()?;
    Some(PublicKey::from(bytes))
}

fn derive_file_key(passphrase: &str, salt: &[u8]) -> Result<[u8; 32], KeyringError> {
    let mut key = [0u8; 32];
    Argon2::default()
        .hash_password_into(passphrase.as_bytes(), salt, &mut key)
        .map_err(|e| KeyringError::KeyDerivation(e.to_string()))?;
    Ok(key)
}

fn load_identity(
    path: &Path,
    prompt: &dyn CredentialPrompt,
) -> Result<(String, String, StaticSecret, PublicKey), KeyringError> {
    let stored: StoredIdentity = serde_json::from_str(&fs::read_to_string(path)?)?;

    let salt = BASE64
        .decode(&stored.salt)
        .map_err(|e| KeyringError::Corrupt(e.to_string()))?;
    let sealed_secret = BASE64
        .decode(&stored.secret_key)
        .map_err(|e| KeyringError::Corrupt(e.to_string()))?;

    let passphrase = prompt.passphrase()?;
    let file_key = derive_file_key(&passphrase, &salt)?;

    // An authentication failure here means the wrong passphrase, not damage:
    // the file key is the only variable input.
    let secret_bytes =
        envelope::aead_open(&file_key, &sealed_secret).map_err(|_| KeyringError::BadPassphrase)?;
    let secret_bytes: [u8; 32] = secret_bytes
        .try_into()
        .map_err(|_| KeyringError::Corrupt("secret key has wrong length".into()))?;

    let secret = StaticSecret::from(secret_bytes);
    let public = PublicKey::from(&secret);

    if envelope::key_id(&public) != stored.key_id {
        return Err(KeyringError::Corrupt("stored key id does not match secret".into()));
    }

    Ok((stored.name, stored.email, secret, public))
}

fn provision_identity(
    path: &Path,
    prompt: &dyn CredentialPrompt,
) -> Result<(String, String, StaticSecret, PublicKey), KeyringError> {
    let passphrase = prompt.passphrase()?;
    if !passphrase_is_valid(&passphrase) {
        return Err(KeyringError::PassphrasePolicy);
    }
    let (name, email) = prompt.identity()?;

    let secret = StaticSecret::random_from_rng(OsRng);
    let public = PublicKey::from(&secret);

    let mut salt = [0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    let file_key = derive_file_key(&passphrase, &salt)?;

    let sealed_secret = envelope::aead_seal(&file_key, secret.as_bytes())
        .map_err(|e| KeyringError::KeyDerivation(e.to_string()))?;

    let stored = StoredIdentity {
        name,
        email,
        public_key: BASE64.encode(public.as_bytes()),
        key_id: envelope::key_id(&public),
        salt: BASE64.encode(salt),
        secret_key: BASE64.encode(sealed_secret),
    };
    fs::write(path, serde_json::to_string_pretty(&stored)?)?;

    info!("Provisioned new identity {} <{}>", stored.name, stored.email);
    Ok((stored.name, stored.email, secret, public))
}

fn load_contacts(path: &Path) -> Result<Vec<Contact>, KeyringError> {
    if !path.exists() {
        return Ok(Vec::new());
    }
    Ok(serde_json::from_str(&fs::read_to_string(path)?)?)
}

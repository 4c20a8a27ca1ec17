//! Armored sealed envelopes.
//!
//! Wire shape, inside the armor: base64 of a JSON document
//!   { eph, keys: [{ kid, wrap }], body }
//! where `eph` is an ephemeral X25519 public key, each `wrap` is the content
//! key AES-256-GCM-encrypted under HKDF-SHA256(DH(eph, recipient)), and
//! `body` is the message under the content key. AEAD blobs are nonce-prefixed:
//!   [ nonce (12 bytes) | ciphertext + tag ]

use aes_gcm::{
    Aes256Gcm, Key, Nonce,
    aead::{Aead, KeyInit},
};
use base64::{Engine as _, engine::general_purpose::STANDARD as BASE64};
use hkdf::Hkdf;
use rand_core::{OsRng, RngCore};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use x25519_dalek::{PublicKey, ReusableSecret, StaticSecret};

use crate::error::{DecryptionError, EncryptionError};

/// The recognized ciphertext envelope marker. Content containing this line is
/// treated as sealed; anything else is displayed as-is.
pub const BEGIN_MARKER: &str = "-----BEGIN ALCOVE MESSAGE-----";
pub const END_MARKER: &str = "-----END ALCOVE MESSAGE-----";

const HKDF_SALT: &[u8] = b"alcove-envelope-v1";
const WRAP_INFO: &[u8] = b"key-wrap";
const NONCE_LEN: usize = 12;

pub fn is_sealed(content: &str) -> bool {
    content.contains(BEGIN_MARKER)
}

/// Short identifier for a public key: first 8 bytes of its SHA-256, hex.
pub fn key_id(public: &PublicKey) -> String {
    let digest = Sha256::digest(public.as_bytes());
    hex::encode(&digest[..8])
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    eph: String,
    keys: Vec<WrappedKey>,
    body: String,
}

#[derive(Serialize, Deserialize)]
struct WrappedKey {
    kid: String,
    wrap: String,
}

/// Seal `plaintext` so that every key in `recipients` can open it.
pub fn seal(plaintext: &[u8], recipients: &[PublicKey]) -> Result<String, EncryptionError> {
    if plaintext.is_empty() {
        return Err(EncryptionError::EmptyMessage);
    }
    if recipients.is_empty() {
        return Err(EncryptionError::EmptyRecipients);
    }

    let mut content_key = [0u8; 32];
    OsRng.fill_bytes(&mut content_key);

    let body = aead_seal(&content_key, plaintext)?;

    // Reusable so one ephemeral key can agree with every recipient.
    let ephemeral = ReusableSecret::random_from_rng(OsRng);
    let ephemeral_public = PublicKey::from(&ephemeral);

    let mut keys = Vec::with_capacity(recipients.len());
    for recipient in recipients {
        let shared = ephemeral.diffie_hellman(recipient);
        let wrap_key = derive_wrap_key(shared.as_bytes());
        let wrap = aead_seal(&wrap_key, &content_key)?;
        keys.push(WrappedKey {
            kid: key_id(recipient),
            wrap: BASE64.encode(wrap),
        });
    }

    let envelope = Envelope {
        eph: BASE64.encode(ephemeral_public.as_bytes()),
        keys,
        body: BASE64.encode(body),
    };

    Ok(armor(&serde_json::to_vec(&envelope)?))
}

/// Open an armored envelope with the local secret key. Fails when the armor
/// is damaged, when no wrapped key matches this identity, or when either
/// AEAD layer rejects its ciphertext.
pub fn open(armored: &str, secret: &StaticSecret) -> Result<Vec<u8>, DecryptionError> {
    let payload = dearmor(armored)?;
    let envelope: Envelope = serde_json::from_slice(&payload)
        .map_err(|e| DecryptionError::Malformed(e.to_string()))?;

    let ephemeral_public = decode_public_key(&envelope.eph)?;
    let shared = secret.diffie_hellman(&ephemeral_public);
    let wrap_key = derive_wrap_key(shared.as_bytes());

    let own_kid = key_id(&PublicKey::from(secret));
    let wrapped = envelope
        .keys
        .iter()
        .find(|k| k.kid == own_kid)
        .ok_or(DecryptionError::NotAddressed)?;

    let wrap_bytes = BASE64
        .decode(&wrapped.wrap)
        .map_err(|e| DecryptionError::Malformed(e.to_string()))?;
    let content_key_bytes = aead_open(&wrap_key, &wrap_bytes)?;
    let content_key: [u8; 32] = content_key_bytes
        .try_into()
        .map_err(|_| DecryptionError::Malformed("unwrapped key has wrong length".into()))?;

    let body = BASE64
        .decode(&envelope.body)
        .map_err(|e| DecryptionError::Malformed(e.to_string()))?;
    aead_open(&content_key, &body)
}

fn derive_wrap_key(shared: &[u8]) -> [u8; 32] {
    let hk = Hkdf::<Sha256>::new(Some(HKDF_SALT), shared);
    let mut key = [0u8; 32];
    hk.expand(WRAP_INFO, &mut key)
        .expect("32-byte expand is always within HKDF-SHA256 bounds");
    key
}

fn decode_public_key(encoded: &str) -> Result<PublicKey, DecryptionError> {
    let bytes = BASE64
        .decode(encoded)
        .map_err(|e| DecryptionError::Malformed(e.to_string()))?;
    let bytes: [u8; 32] = bytes
        .try_into()
        .map_err(|_| DecryptionError::Malformed("public key has wrong length".into()))?;
    Ok(PublicKey::from(bytes))
}

pub(crate) fn aead_seal(key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, EncryptionError> {
    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));

    let mut nonce_bytes = [0u8; NONCE_LEN];
    OsRng.fill_bytes(&mut nonce_bytes);
    let nonce = Nonce::from_slice(&nonce_bytes);

    let ciphertext = cipher.encrypt(nonce, plaintext).map_err(|_| EncryptionError::Aead)?;

    let mut out = Vec::with_capacity(NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&nonce_bytes);
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

pub(crate) fn aead_open(key: &[u8; 32], data: &[u8]) -> Result<Vec<u8>, DecryptionError> {
    if data.len() < NONCE_LEN {
        return Err(DecryptionError::Malformed("ciphertext shorter than nonce".into()));
    }
    let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
    let nonce = Nonce::from_slice(nonce_bytes);

    let cipher = Aes256Gcm::new(Key::<Aes256Gcm>::from_slice(key));
    cipher.decrypt(nonce, ciphertext).map_err(|_| DecryptionError::Aead)
}

fn armor(payload: &[u8]) -> String {
    let encoded = BASE64.encode(payload);

    let mut out = String::with_capacity(encoded.len() + encoded.len() / 64 + 64);
    out.push_str(BEGIN_MARKER);
    out.push('\n');
    let mut rest = encoded.as_str();
    while !rest.is_empty() {
        let (line, tail) = rest.split_at(rest.len().min(64));
        out.push_str(line);
        out.push('\n');
        rest = tail;
    }
    out.push_str(END_MARKER);
    out
}

fn dearmor(text: &str) -> Result<Vec<u8>, DecryptionError> {
    let start = text
        .find(BEGIN_MARKER)
        .ok_or_else(|| DecryptionError::Malformed("begin marker missing".into()))?
        + BEGIN_MARKER.len();
    let end = text[start..]
        .find(END_MARKER)
        .ok_or_else(|| DecryptionError::Malformed("end marker missing".into()))?
        + start;

    let encoded: String = text[start..end].chars().filter(|c| !c.is_whitespace()).collect();
    BASE64.decode(encoded).map_err(|e| DecryptionError::Malformed(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn keypair() -> (StaticSecret, PublicKey) {
        let secret = StaticSecret::random_from_rng(OsRng);
        let public = PublicKey::from(&secret);
        (secret, public)
    }

    #[test]
    fn seal_open_roundtrip() {
        let (secret, public) = keypair();
        let message = b"Hello from Alcove!";

        let armored = seal(message, &[public]).unwrap();
        assert!(is_sealed(&armored));
        assert!(armored.ends_with(END_MARKER));

        let opened = open(&armored, &secret).unwrap();
        assert_eq!(opened, message);
    }

    #[test]
    fn every_recipient_can_open() {
        let (secret_a, public_a) = keypair();
        let (secret_b, public_b) = keypair();

        let armored = seal(b"group secret", &[public_a, public_b]).unwrap();

        assert_eq!(open(&armored, &secret_a).unwrap(), b"group secret");
        assert_eq!(open(&armored, &secret_b).unwrap(), b"group secret");
    }

    #[test]
    fn non_recipient_cannot_open() {
        let (_, public) = keypair();
        let (other_secret, _) = keypair();

        let armored = seal(b"not for you", &[public]).unwrap();

        assert!(matches!(open(&armored, &other_secret), Err(DecryptionError::NotAddressed)));
    }

    #[test]
    fn empty_inputs_are_rejected() {
        let (_, public) = keypair();

        assert!(matches!(seal(b"", &[public]), Err(EncryptionError::EmptyMessage)));
        assert!(matches!(seal(b"hi", &[]), Err(EncryptionError::EmptyRecipients)));
    }

    #[test]
    fn tampered_body_fails_authentication() {
        let (secret, public) = keypair();
        let armored = seal(b"original", &[public]).unwrap();

        // Corrupt a character in the middle of the base64 payload.
        let mid = armored.len() / 2;
        let mut bytes = armored.into_bytes();
        bytes[mid] = if bytes[mid] == b'A' { b'B' } else { b'A' };
        let corrupted = String::from_utf8(bytes).unwrap();

        assert!(open(&corrupted, &secret).is_err());
    }

    #[test]
    fn garbage_between_markers_is_malformed() {
        let (secret, _) = keypair();
        let fake = format!("{}\nbm90IGFuIGVudmVsb3Bl\n{}", BEGIN_MARKER, END_MARKER);

        assert!(matches!(open(&fake, &secret), Err(DecryptionError::Malformed(_))));
    }

    #[test]
    fn armor_lines_stay_narrow() {
        let (_, public) = keypair();
        let armored = seal(&[0x42; 2048], &[public]).unwrap();

        for line in armored.lines() {
            assert!(line.len() <= 64 || line == BEGIN_MARKER || line == END_MARKER);
        }
    }
}

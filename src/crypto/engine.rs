// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Journal Vault

//! AES-256-GCM envelope encryption with per-user derived keys.
//!
//! Keys are derived with PBKDF2-HMAC-SHA512 over the service-wide secret,
//! salted with the user's salt. An attacker therefore needs both the stored
//! salt and the service secret (held only in process memory) to derive a
//! usable key. The work factor is deliberately high; callers must run
//! encryption and decryption on a blocking worker, never on request-intake
//! threads and never inside an open storage transaction.

use aes_gcm::{
    aead::{Aead, KeyInit, Payload},
    Aes256Gcm, Nonce,
};
use pbkdf2::pbkdf2_hmac;
use rand::{rngs::OsRng, RngCore};
use serde::{de::DeserializeOwned, Serialize};
use sha2::Sha512;

use super::envelope::Envelope;

/// Length of a per-user salt in bytes.
pub const SALT_LEN: usize = 32;

/// AES-GCM nonce length in bytes (96 bits).
pub const NONCE_LEN: usize = 12;

/// AES-GCM authentication tag length in bytes (128 bits).
pub const TAG_LEN: usize = 16;

/// Default PBKDF2 iteration count. Tunable via configuration, but never
/// below six figures in production.
pub const DEFAULT_KDF_ITERATIONS: u32 = 100_000;

/// Domain-separation context bound into every envelope as associated data.
/// Ciphertext produced for any other purpose fails authentication here.
const DOMAIN_CONTEXT: &[u8] = b"journal-vault.entry.v1";

#[derive(Debug, thiserror::Error)]
pub enum CryptoError {
    /// Authentication failed: wrong key, corruption, or tampering. Reported
    /// uniformly; the cause is deliberately not distinguished.
    #[error("decryption failed")]
    DecryptionFailure,

    /// The cipher rejected the encryption request.
    #[error("encryption failed")]
    EncryptionFailure,
}

/// Generate a fresh cryptographically random per-user salt.
pub fn generate_salt() -> Vec<u8> {
    let mut salt = vec![0u8; SALT_LEN];
    OsRng.fill_bytes(&mut salt);
    salt
}

/// Derives per-user keys and seals/opens envelopes.
///
/// Owns the service secret and the KDF work factor; constructed once at
/// startup and passed by reference into the pipelines.
#[derive(Clone)]
pub struct EncryptionEngine {
    secret: Vec<u8>,
    iterations: u32,
}

impl std::fmt::Debug for EncryptionEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Never print the secret.
        f.debug_struct("EncryptionEngine")
            .field("secret", &"<redacted>")
            .field("iterations", &self.iterations)
            .finish()
    }
}

impl EncryptionEngine {
    pub fn new(secret: impl Into<Vec<u8>>, iterations: u32) -> Self {
        Self {
            secret: secret.into(),
            iterations,
        }
    }

    /// Derive the 256-bit AES key for a user's salt.
    fn derive_key(&self, salt: &[u8]) -> [u8; 32] {
        let mut key = [0u8; 32];
        pbkdf2_hmac::<Sha512>(&self.secret, salt, self.iterations, &mut key);
        key
    }

    /// Encrypt a plaintext into an envelope with a fresh random nonce.
    pub fn encrypt(&self, plaintext: &[u8], salt: &[u8]) -> Result<Envelope, CryptoError> {
        let key = self.derive_key(salt);
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::EncryptionFailure)?;

        let mut nonce_bytes = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let mut ciphertext = cipher
            .encrypt(
                nonce,
                Payload {
                    msg: plaintext,
                    aad: DOMAIN_CONTEXT,
                },
            )
            .map_err(|_| CryptoError::EncryptionFailure)?;

        // The aead crate appends the tag to the ciphertext; split it out so
        // the envelope carries the explicit three-field form.
        let tag = ciphertext.split_off(ciphertext.len() - TAG_LEN);

        Ok(Envelope {
            ciphertext,
            nonce: nonce_bytes.to_vec(),
            tag,
        })
    }

    /// Open an envelope, verifying the authentication tag.
    ///
    /// Every failure mode (wrong key, flipped ciphertext bit, wrong nonce,
    /// truncated tag) collapses into the same `DecryptionFailure`.
    pub fn decrypt(&self, envelope: &Envelope, salt: &[u8]) -> Result<Vec<u8>, CryptoError> {
        if envelope.nonce.len() != NONCE_LEN || envelope.tag.len() != TAG_LEN {
            return Err(CryptoError::DecryptionFailure);
        }

        let key = self.derive_key(salt);
        let cipher =
            Aes256Gcm::new_from_slice(&key).map_err(|_| CryptoError::DecryptionFailure)?;
        let nonce = Nonce::from_slice(&envelope.nonce);

        let mut sealed = Vec::with_capacity(envelope.ciphertext.len() + TAG_LEN);
        sealed.extend_from_slice(&envelope.ciphertext);
        sealed.extend_from_slice(&envelope.tag);

        cipher
            .decrypt(
                nonce,
                Payload {
                    msg: &sealed,
                    aad: DOMAIN_CONTEXT,
                },
            )
            .map_err(|_| CryptoError::DecryptionFailure)
    }

    /// Decrypt an envelope holding UTF-8 text.
    pub fn decrypt_str(&self, envelope: &Envelope, salt: &[u8]) -> Result<String, CryptoError> {
        let plaintext = self.decrypt(envelope, salt)?;
        String::from_utf8(plaintext).map_err(|_| CryptoError::DecryptionFailure)
    }

    /// Encrypt a serializable value (e.g. the tag list) as JSON.
    pub fn encrypt_json<T: Serialize>(
        &self,
        value: &T,
        salt: &[u8],
    ) -> Result<Envelope, CryptoError> {
        let json = serde_json::to_vec(value).map_err(|_| CryptoError::EncryptionFailure)?;
        self.encrypt(&json, salt)
    }

    /// Decrypt and deserialize a JSON value sealed with `encrypt_json`.
    pub fn decrypt_json<T: DeserializeOwned>(
        &self,
        envelope: &Envelope,
        salt: &[u8],
    ) -> Result<T, CryptoError> {
        let json = self.decrypt(envelope, salt)?;
        serde_json::from_slice(&json).map_err(|_| CryptoError::DecryptionFailure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // A low iteration count keeps the test suite fast; production work
    // factors are exercised implicitly since only the count differs.
    fn test_engine() -> EncryptionEngine {
        EncryptionEngine::new(b"test-service-secret-0123456789ab".to_vec(), 1_000)
    }

    #[test]
    fn encrypt_decrypt_round_trip() {
        let engine = test_engine();
        let salt = generate_salt();

        let envelope = engine.encrypt(b"Lord, have mercy", &salt).unwrap();
        let plaintext = engine.decrypt(&envelope, &salt).unwrap();
        assert_eq!(plaintext, b"Lord, have mercy");
    }

    #[test]
    fn envelope_has_expected_field_lengths() {
        let engine = test_engine();
        let salt = generate_salt();

        let envelope = engine.encrypt(b"payload", &salt).unwrap();
        assert_eq!(envelope.nonce.len(), NONCE_LEN);
        assert_eq!(envelope.tag.len(), TAG_LEN);
        assert_eq!(envelope.ciphertext.len(), b"payload".len());
    }

    #[test]
    fn nonces_are_unique_per_encryption() {
        let engine = test_engine();
        let salt = generate_salt();

        let a = engine.encrypt(b"same plaintext", &salt).unwrap();
        let b = engine.encrypt(b"same plaintext", &salt).unwrap();
        assert_ne!(a.nonce, b.nonce);
        assert_ne!(a.ciphertext, b.ciphertext);
    }

    #[test]
    fn wrong_salt_fails_uniformly() {
        let engine = test_engine();
        let envelope = engine.encrypt(b"secret", &generate_salt()).unwrap();

        let result = engine.decrypt(&envelope, &generate_salt());
        assert!(matches!(result, Err(CryptoError::DecryptionFailure)));
    }

    #[test]
    fn wrong_secret_fails_uniformly() {
        let salt = generate_salt();
        let envelope = test_engine().encrypt(b"secret", &salt).unwrap();

        let other = EncryptionEngine::new(b"another-service-secret-01234567".to_vec(), 1_000);
        let result = other.decrypt(&envelope, &salt);
        assert!(matches!(result, Err(CryptoError::DecryptionFailure)));
    }

    #[test]
    fn bit_flips_anywhere_are_detected() {
        let engine = test_engine();
        let salt = generate_salt();
        let envelope = engine.encrypt(b"tamper target", &salt).unwrap();

        // Flip one bit in each field in turn; every variant must fail.
        let mut flipped = envelope.clone();
        flipped.ciphertext[0] ^= 0x01;
        assert!(matches!(
            engine.decrypt(&flipped, &salt),
            Err(CryptoError::DecryptionFailure)
        ));

        let mut flipped = envelope.clone();
        flipped.nonce[0] ^= 0x01;
        assert!(matches!(
            engine.decrypt(&flipped, &salt),
            Err(CryptoError::DecryptionFailure)
        ));

        let mut flipped = envelope.clone();
        flipped.tag[0] ^= 0x01;
        assert!(matches!(
            engine.decrypt(&flipped, &salt),
            Err(CryptoError::DecryptionFailure)
        ));
    }

    #[test]
    fn malformed_nonce_or_tag_lengths_fail() {
        let engine = test_engine();
        let salt = generate_salt();
        let mut envelope = engine.encrypt(b"x", &salt).unwrap();
        envelope.nonce.truncate(4);
        assert!(matches!(
            engine.decrypt(&envelope, &salt),
            Err(CryptoError::DecryptionFailure)
        ));
    }

    #[test]
    fn json_variant_round_trips_tag_lists() {
        let engine = test_engine();
        let salt = generate_salt();
        let tags = vec!["gratitude".to_string(), "psalms".to_string()];

        let envelope = engine.encrypt_json(&tags, &salt).unwrap();
        let decrypted: Vec<String> = engine.decrypt_json(&envelope, &salt).unwrap();
        assert_eq!(decrypted, tags);
    }

    #[test]
    fn generated_salts_are_distinct_and_sized() {
        let a = generate_salt();
        let b = generate_salt();
        assert_eq!(a.len(), SALT_LEN);
        assert_ne!(a, b);
    }

    #[test]
    fn debug_never_prints_the_secret() {
        let engine = EncryptionEngine::new(b"super-secret-value-0123456789abc".to_vec(), 10);
        let debug = format!("{engine:?}");
        assert!(!debug.contains("super-secret"));
        assert!(debug.contains("<redacted>"));
    }
}

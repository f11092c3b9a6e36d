//! AES-256-GCM encryption for credential columns.
//!
//! Stored form is `base64(nonce ‖ ciphertext)` with a fresh 12-byte nonce per
//! value. The cipher key is the SHA-256 digest of the configured secret.

use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use ledgersync_domain::{Result, SyncError};
use rand::RngCore;
use sha2::{Digest, Sha256};
use zeroize::Zeroizing;

const NONCE_LEN: usize = 12;

#[derive(Clone)]
pub struct CredentialCipher {
    cipher: Aes256Gcm,
}

impl fmt::Debug for CredentialCipher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialCipher").field("key", &"[REDACTED]").finish()
    }
}

impl CredentialCipher {
    pub fn new(secret: &str) -> Result<Self> {
        if secret.is_empty() {
            return Err(SyncError::Configuration("credential key must not be empty".into()));
        }

        let key = Zeroizing::new(<[u8; 32]>::from(Sha256::digest(secret.as_bytes())));
        let cipher = Aes256Gcm::new_from_slice(key.as_slice())
            .map_err(|err| SyncError::Security(format!("failed to create cipher: {err}")))?;
        Ok(Self { cipher })
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(Nonce::from_slice(&nonce_bytes), plaintext.as_bytes())
            .map_err(|_| SyncError::Security("credential encryption failed".into()))?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);
        Ok(BASE64.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String> {
        let blob = BASE64
            .decode(encoded.trim())
            .map_err(|_| SyncError::Security("stored credential is not valid base64".into()))?;
        if blob.len() <= NONCE_LEN {
            return Err(SyncError::Security("stored credential is truncated".into()));
        }

        let (nonce, ciphertext) = blob.split_at(NONCE_LEN);
        let plaintext = Zeroizing::new(
            self.cipher
                .decrypt(Nonce::from_slice(nonce), ciphertext)
                .map_err(|_| SyncError::Security("stored credential failed to decrypt".into()))?,
        );

        String::from_utf8(plaintext.to_vec())
            .map_err(|_| SyncError::Security("decrypted credential is not UTF-8".into()))
    }
}

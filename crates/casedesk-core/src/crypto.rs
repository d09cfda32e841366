//! Encryption for secrets stored at rest.
//!
//! AES-256-GCM with a fresh 96-bit nonce per message. The stored form is
//! `base64(nonce || ciphertext || tag)`, so every blob carries the nonce
//! needed to open it. The key is the SHA-256 digest of a configured passphrase.

use aes_gcm::aead::Aead;
use aes_gcm::{Aes256Gcm, KeyInit, Nonce};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use rand::RngCore;
use sha2::{Digest, Sha256};

const NONCE_LEN: usize = 12;
const TAG_LEN: usize = 16;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum CryptoError {
    #[error("Encryption failed")]
    Encrypt,

    #[error("Invalid base64 payload")]
    Encoding,

    #[error("Ciphertext too short")]
    Truncated,

    #[error("Decryption failed (wrong key or tampered data)")]
    Decrypt,

    #[error("Decrypted data is not valid UTF-8")]
    Utf8,
}

#[derive(Clone)]
pub struct SecretCipher {
    cipher: Aes256Gcm,
}

impl std::fmt::Debug for SecretCipher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SecretCipher").finish_non_exhaustive()
    }
}

impl SecretCipher {
    /// Derives the AES-256 key from `passphrase`.
    pub fn from_passphrase(passphrase: &str) -> Self {
        let key = Sha256::digest(passphrase.as_bytes());
        Self {
            cipher: Aes256Gcm::new(&key),
        }
    }

    pub fn encrypt(&self, plaintext: &str) -> Result<String, CryptoError> {
        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = self
            .cipher
            .encrypt(nonce, plaintext.as_bytes())
            .map_err(|_| CryptoError::Encrypt)?;

        let mut blob = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        blob.extend_from_slice(&nonce_bytes);
        blob.extend_from_slice(&ciphertext);

        Ok(STANDARD.encode(blob))
    }

    pub fn decrypt(&self, encoded: &str) -> Result<String, CryptoError> {
        let data = STANDARD
            .decode(encoded.trim())
            .map_err(|_| CryptoError::Encoding)?;

        if data.len() < NONCE_LEN + TAG_LEN {
            return Err(CryptoError::Truncated);
        }

        let (nonce_bytes, ciphertext) = data.split_at(NONCE_LEN);
        let plaintext = self
            .cipher
            .decrypt(Nonce::from_slice(nonce_bytes), ciphertext)
            .map_err(|_| CryptoError::Decrypt)?;

        String::from_utf8(plaintext).map_err(|_| CryptoError::Utf8)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_trip() {
        let cipher = SecretCipher::from_passphrase("correct horse battery staple");
        let blob = cipher.encrypt("smtp-password-123").unwrap();
        assert_ne!(blob, "smtp-password-123");
        assert_eq!(cipher.decrypt(&blob).unwrap(), "smtp-password-123");
    }

    #[test]
    fn test_each_encryption_uses_a_fresh_nonce() {
        let cipher = SecretCipher::from_passphrase("k");
        let a = cipher.encrypt("same").unwrap();
        let b = cipher.encrypt("same").unwrap();
        assert_ne!(a, b);
        assert_eq!(cipher.decrypt(&a).unwrap(), cipher.decrypt(&b).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let blob = SecretCipher::from_passphrase("one").encrypt("secret").unwrap();
        let result = SecretCipher::from_passphrase("two").decrypt(&blob);
        assert_eq!(result, Err(CryptoError::Decrypt));
    }

    #[test]
    fn test_tampered_blob_fails() {
        let cipher = SecretCipher::from_passphrase("k");
        let blob = cipher.encrypt("secret").unwrap();
        let mut raw = STANDARD.decode(&blob).unwrap();
        let last = raw.len() - 1;
        raw[last] ^= 0x01;
        assert_eq!(
            cipher.decrypt(&STANDARD.encode(raw)),
            Err(CryptoError::Decrypt)
        );
    }

    #[test]
    fn test_malformed_input() {
        let cipher = SecretCipher::from_passphrase("k");
        assert_eq!(cipher.decrypt("not base64!!"), Err(CryptoError::Encoding));
        assert_eq!(cipher.decrypt(&STANDARD.encode([0u8; 8])), Err(CryptoError::Truncated));
    }

    #[test]
    fn test_empty_plaintext() {
        let cipher = SecretCipher::from_passphrase("k");
        let blob = cipher.encrypt("").unwrap();
        assert_eq!(cipher.decrypt(&blob).unwrap(), "");
    }
}

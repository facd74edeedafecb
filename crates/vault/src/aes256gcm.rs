//! AES-256-GCM implementation of the [`Cipher`] trait.

use {
    aes_gcm::{
        Aes256Gcm, Nonce,
        aead::{Aead, KeyInit},
    },
    rand::RngCore,
};

use crate::{error::VaultError, traits::Cipher};

/// Nonce size for AES-GCM (96 bits).
pub const NONCE_LEN: usize = 12;

/// GCM authentication tag size.
pub const TAG_LEN: usize = 16;

/// AES-256-GCM AEAD cipher.
///
/// Encrypted layout: `[nonce: 12 bytes][ciphertext: N bytes][tag: 16 bytes]`.
#[derive(Debug, Clone, Copy, Default)]
pub struct Aes256GcmCipher;

impl Cipher for Aes256GcmCipher {
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, VaultError> {
        let cipher = Aes256Gcm::new(key.into());

        let mut nonce_bytes = [0u8; NONCE_LEN];
        rand::rng().fill_bytes(&mut nonce_bytes);
        let nonce = Nonce::from_slice(&nonce_bytes);

        let ciphertext = cipher
            .encrypt(nonce, plaintext)
            .map_err(|e| VaultError::CipherError(e.to_string()))?;

        let mut result = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        result.extend_from_slice(&nonce_bytes);
        result.extend_from_slice(&ciphertext);
        Ok(result)
    }

    fn decrypt(&self, key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, VaultError> {
        if ciphertext.len() < NONCE_LEN + TAG_LEN {
            return Err(VaultError::DecryptFailed);
        }

        let (nonce_bytes, ct) = ciphertext.split_at(NONCE_LEN);
        let nonce = Nonce::from_slice(nonce_bytes);
        let cipher = Aes256Gcm::new(key.into());

        cipher
            .decrypt(nonce, ct)
            .map_err(|_| VaultError::DecryptFailed)
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trip() {
        let cipher = Aes256GcmCipher;
        let key = [0x42u8; 32];

        let encrypted = cipher.encrypt(&key, b"hello vault").unwrap();
        let decrypted = cipher.decrypt(&key, &encrypted).unwrap();
        assert_eq!(decrypted, b"hello vault");
    }

    #[test]
    fn layout_is_nonce_ciphertext_tag() {
        let cipher = Aes256GcmCipher;
        let key = [0x42u8; 32];

        let encrypted = cipher.encrypt(&key, b"12345").unwrap();
        assert_eq!(encrypted.len(), NONCE_LEN + 5 + TAG_LEN);
    }

    #[test]
    fn wrong_key_fails() {
        let cipher = Aes256GcmCipher;

        let encrypted = cipher.encrypt(&[0x42u8; 32], b"secret").unwrap();
        let result = cipher.decrypt(&[0x43u8; 32], &encrypted);
        assert!(matches!(result, Err(VaultError::DecryptFailed)));
    }

    #[test]
    fn tampered_ciphertext_fails() {
        let cipher = Aes256GcmCipher;
        let key = [0x42u8; 32];

        let mut encrypted = cipher.encrypt(&key, b"secret").unwrap();
        let last = encrypted.len() - 1;
        encrypted[last] ^= 0x01;
        assert!(cipher.decrypt(&key, &encrypted).is_err());
    }

    #[test]
    fn too_short_ciphertext_fails() {
        let cipher = Aes256GcmCipher;
        let result = cipher.decrypt(&[0x42u8; 32], &[0u8; NONCE_LEN + TAG_LEN - 1]);
        assert!(matches!(result, Err(VaultError::DecryptFailed)));
    }

    #[test]
    fn different_nonces_produce_different_ciphertexts() {
        let cipher = Aes256GcmCipher;
        let key = [0x42u8; 32];

        let enc1 = cipher.encrypt(&key, b"same input").unwrap();
        let enc2 = cipher.encrypt(&key, b"same input").unwrap();
        assert_ne!(enc1, enc2);
    }

    #[test]
    fn empty_plaintext_round_trip() {
        let cipher = Aes256GcmCipher;
        let key = [0x42u8; 32];

        let encrypted = cipher.encrypt(&key, b"").unwrap();
        assert!(cipher.decrypt(&key, &encrypted).unwrap().is_empty());
    }
}

//! Sealed blob format.
//!
//! ```text
//! blob      = salt(16) || cipher_output
//! plaintext = payload || SHA256(salt || payload)
//! ```
//!
//! The salt is not covered by the AEAD tag, so the checksum is what binds it
//! to the payload. A blob is trusted only when both layers verify.

use {
    sha2::{Digest, Sha256},
    zeroize::Zeroizing,
};

use crate::{
    aes256gcm::Aes256GcmCipher,
    error::VaultError,
    kdf::{self, KdfParams, SALT_LEN, Salt},
    traits::Cipher,
};

/// Length of the appended SHA-256 checksum.
pub const CHECKSUM_LEN: usize = 32;

/// Raw bytes of one persisted vault.
#[derive(Clone, PartialEq, Eq)]
pub struct EncryptedBlob(Vec<u8>);

impl EncryptedBlob {
    pub fn from_bytes(bytes: Vec<u8>) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// The salt stored at the front of the blob.
    pub fn salt(&self) -> Result<Salt, VaultError> {
        let head = self.0.get(..SALT_LEN).ok_or(VaultError::DecryptFailed)?;
        let mut salt = [0u8; SALT_LEN];
        salt.copy_from_slice(head);
        Ok(salt)
    }
}

impl std::fmt::Debug for EncryptedBlob {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EncryptedBlob")
            .field("len", &self.0.len())
            .finish()
    }
}

/// Seals and opens [`EncryptedBlob`]s with a [`Cipher`].
#[derive(Debug, Clone, Default)]
pub struct BlobCodec<C: Cipher = Aes256GcmCipher> {
    cipher: C,
}

impl BlobCodec<Aes256GcmCipher> {
    pub fn new() -> Self {
        Self::with_cipher(Aes256GcmCipher)
    }
}

impl<C: Cipher> BlobCodec<C> {
    pub fn with_cipher(cipher: C) -> Self {
        Self { cipher }
    }

    /// Seal `plaintext` under `key`, tagging the blob with `salt`.
    pub fn seal(
        &self,
        plaintext: &str,
        key: &[u8; 32],
        salt: &Salt,
    ) -> Result<EncryptedBlob, VaultError> {
        let payload = plaintext.as_bytes();
        let mut sealed_input = Zeroizing::new(Vec::with_capacity(payload.len() + CHECKSUM_LEN));
        sealed_input.extend_from_slice(payload);
        sealed_input.extend_from_slice(&checksum(salt, payload));

        let encrypted = self.cipher.encrypt(key, &sealed_input)?;

        let mut blob = Vec::with_capacity(SALT_LEN + encrypted.len());
        blob.extend_from_slice(salt);
        blob.extend_from_slice(&encrypted);
        Ok(EncryptedBlob(blob))
    }

    /// Seal under a key derived from `password` and a fresh random salt.
    pub fn seal_with_password(
        &self,
        plaintext: &str,
        password: &str,
        params: &KdfParams,
    ) -> Result<EncryptedBlob, VaultError> {
        let salt = kdf::generate_salt();
        let key = kdf::derive_key(password.as_bytes(), &salt, params);
        self.seal(plaintext, &key, &salt)
    }

    /// Open a blob under `key`.
    pub fn open(&self, blob: &EncryptedBlob, key: &[u8; 32]) -> Result<String, VaultError> {
        if blob.len() < SALT_LEN {
            return Err(VaultError::DecryptFailed);
        }
        let (salt, ciphertext) = blob.as_bytes().split_at(SALT_LEN);

        let decrypted = Zeroizing::new(self.cipher.decrypt(key, ciphertext)?);
        if decrypted.len() < CHECKSUM_LEN {
            return Err(VaultError::ChecksumMismatch);
        }

        let (payload, appended) = decrypted.split_at(decrypted.len() - CHECKSUM_LEN);
        if checksum(salt, payload).as_slice() != appended {
            return Err(VaultError::ChecksumMismatch);
        }

        String::from_utf8(payload.to_vec()).map_err(|_| VaultError::DecryptFailed)
    }

    /// Open a blob with a key derived from `password` and the blob's own salt.
    ///
    /// Any integrity failure is reported as [`VaultError::IncorrectPassword`].
    pub fn open_with_password(
        &self,
        blob: &EncryptedBlob,
        password: &str,
        params: &KdfParams,
    ) -> Result<String, VaultError> {
        let salt = blob.salt().map_err(|_| VaultError::IncorrectPassword)?;
        let key = kdf::derive_key(password.as_bytes(), &salt, params);
        self.open(blob, &key).map_err(|e| match e {
            VaultError::DecryptFailed | VaultError::ChecksumMismatch => {
                VaultError::IncorrectPassword
            },
            other => other,
        })
    }
}

fn checksum(salt: &[u8], payload: &[u8]) -> [u8; CHECKSUM_LEN] {
    let mut hasher = Sha256::new();
    hasher.update(salt);
    hasher.update(payload);
    hasher.finalize().into()
}

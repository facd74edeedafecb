//! Seams the engine is generic over or calls out through.

use crate::error::VaultError;

/// Authenticated encryption backend.
///
/// Implementations own their nonce handling and emit the combined
/// `[nonce || ciphertext || tag]` form, which [`decrypt`](Self::decrypt)
/// must accept back.
pub trait Cipher: Send + Sync {
    /// Encrypt `plaintext` under `key`.
    fn encrypt(&self, key: &[u8; 32], plaintext: &[u8]) -> Result<Vec<u8>, VaultError>;

    /// Decrypt a blob previously produced by [`encrypt`](Self::encrypt).
    ///
    /// Authentication failure must surface as [`VaultError::DecryptFailed`].
    fn decrypt(&self, key: &[u8; 32], ciphertext: &[u8]) -> Result<Vec<u8>, VaultError>;
}

/// Platform biometric check used by the stored-key unlock path.
#[async_trait::async_trait]
pub trait BiometricPrompt: Send + Sync {
    /// Ask the user to confirm presence. `false` covers failure and cancellation.
    async fn authenticate(&self, reason: &str) -> bool;
}

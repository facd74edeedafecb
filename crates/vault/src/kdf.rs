//! PBKDF2-HMAC-SHA256 key derivation for password → vault key.

use {pbkdf2::pbkdf2_hmac, rand::RngCore, sha2::Sha256, zeroize::Zeroizing};

use crate::error::VaultError;

/// Salt length stored at the front of every blob.
pub const SALT_LEN: usize = 16;

/// Symmetric key length (AES-256).
pub const KEY_LEN: usize = 32;

/// Lowest iteration count accepted for PBKDF2.
pub const MIN_ITERATIONS: u32 = 10_000;

/// Default PBKDF2 iteration count.
pub const DEFAULT_ITERATIONS: u32 = 600_000;

/// A derived or stored symmetric key. Zeroed on drop.
pub type Key = Zeroizing<[u8; KEY_LEN]>;

/// Per-blob salt.
pub type Salt = [u8; SALT_LEN];

/// PBKDF2 parameters.
///
/// The iteration count is not stored in the blob, so every reader of a blob
/// must use the same value that sealed it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KdfParams {
    iterations: u32,
}

impl KdfParams {
    /// Build parameters, rejecting iteration counts below [`MIN_ITERATIONS`].
    pub fn new(iterations: u32) -> Result<Self, VaultError> {
        if iterations < MIN_ITERATIONS {
            return Err(VaultError::InvalidConfig(format!(
                "kdf iterations must be at least {MIN_ITERATIONS}, got {iterations}"
            )));
        }
        Ok(Self { iterations })
    }

    pub fn iterations(&self) -> u32 {
        self.iterations
    }
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            iterations: DEFAULT_ITERATIONS,
        }
    }
}

/// Derive a 256-bit key from a password and salt.
pub fn derive_key(password: &[u8], salt: &Salt, params: &KdfParams) -> Key {
    let mut output = Zeroizing::new([0u8; KEY_LEN]);
    pbkdf2_hmac::<Sha256>(password, salt, params.iterations, output.as_mut());
    output
}

/// Generate a random 16-byte salt.
pub fn generate_salt() -> Salt {
    let mut salt = [0u8; SALT_LEN];
    rand::rng().fill_bytes(&mut salt);
    salt
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    fn fast_params() -> KdfParams {
        KdfParams::new(MIN_ITERATIONS).unwrap()
    }

    #[test]
    fn derive_key_deterministic() {
        let salt = *b"test-salt-16byte";

        let key1 = derive_key(b"password", &salt, &fast_params());
        let key2 = derive_key(b"password", &salt, &fast_params());
        assert_eq!(*key1, *key2);
    }

    #[test]
    fn different_passwords_different_keys() {
        let salt = *b"test-salt-16byte";

        let key1 = derive_key(b"password1", &salt, &fast_params());
        let key2 = derive_key(b"password2", &salt, &fast_params());
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn different_salts_different_keys() {
        let key1 = derive_key(b"password", b"salt-aaaaaaaaaaa", &fast_params());
        let key2 = derive_key(b"password", b"salt-bbbbbbbbbbb", &fast_params());
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn iteration_count_changes_key() {
        let salt = *b"test-salt-16byte";
        let more = KdfParams::new(MIN_ITERATIONS + 1).unwrap();

        let key1 = derive_key(b"password", &salt, &fast_params());
        let key2 = derive_key(b"password", &salt, &more);
        assert_ne!(*key1, *key2);
    }

    #[test]
    fn rejects_low_iteration_count() {
        let result = KdfParams::new(MIN_ITERATIONS - 1);
        assert!(matches!(result, Err(VaultError::InvalidConfig(_))));
    }

    #[test]
    fn default_iterations() {
        assert_eq!(KdfParams::default().iterations(), DEFAULT_ITERATIONS);
    }

    #[test]
    fn generated_salts_differ() {
        assert_ne!(generate_salt(), generate_salt());
    }
}

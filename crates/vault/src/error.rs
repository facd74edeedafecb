//! Vault error types.

/// Errors produced by vault operations.
#[derive(Debug, thiserror::Error)]
pub enum VaultError {
    /// The session is locked.
    #[error("vault is locked")]
    Locked,

    /// A key is already stored for this vault's tag, or a vault file exists.
    #[error("vault is already initialized")]
    AlreadyInitialized,

    /// No blob or key exists yet.
    #[error("vault is not initialized")]
    NotInitialized,

    /// Password-based open failed. Wrong password and corrupted data are
    /// deliberately reported the same way.
    #[error("incorrect password")]
    IncorrectPassword,

    /// AEAD authentication failed (wrong key, corruption, tampering).
    #[error("decryption failed")]
    DecryptFailed,

    /// AEAD succeeded but the appended checksum did not match.
    #[error("checksum mismatch")]
    ChecksumMismatch,

    /// Decrypted text does not follow the record schema.
    #[error("malformed record: {0}")]
    MalformedRecord(String),

    /// A record was rejected before it reached the vault.
    #[error("invalid record: {0}")]
    InvalidRecord(String),

    /// Password rejected before any key was derived.
    #[error("invalid password: {0}")]
    InvalidPassword(String),

    /// Keystore put/get/delete failed.
    #[error("keystore failure: {0}")]
    Keystore(String),

    /// A non-essential facility (secondary copy, biometrics) is not usable.
    #[error("unavailable: {0}")]
    Unavailable(String),

    /// Key rotation did not commit; the previous key is still authoritative.
    #[error("key rotation failed: {0}")]
    RotationFailed(String),

    /// Engine options are out of range.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Low-level cipher failure while sealing.
    #[error("cipher error: {0}")]
    CipherError(String),

    /// Filesystem error.
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization / deserialization error.
    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),
}

impl VaultError {
    /// Whether the error means "do not trust this data".
    ///
    /// Callers treat both integrity layers the same way.
    #[must_use]
    pub fn is_integrity_failure(&self) -> bool {
        matches!(self, Self::DecryptFailed | Self::ChecksumMismatch)
    }
}

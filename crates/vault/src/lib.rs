//! Encrypted local-first vault for accounts and notes.
//!
//! A password-derived key (PBKDF2-HMAC-SHA256) seals each vault with
//! AES-256-GCM plus an inner SHA-256 checksum. The key lives in a
//! [`Keystore`]; every password unlock rotates it. Each vault is kept in the
//! data directory and, when a [`SyncPolicy`] enables it, mirrored to a
//! secondary directory whose copy wins on read.

pub mod aes256gcm;
pub mod blob;
pub mod codec;
pub mod engine;
pub mod error;
pub mod kdf;
pub mod keystore;
pub mod options;
pub mod record;
mod rotation;
pub mod secondary;
mod session;
pub mod storage;
pub mod store;
pub mod traits;

pub use {
    aes256gcm::Aes256GcmCipher,
    blob::{BlobCodec, EncryptedBlob},
    engine::{VaultEngine, VaultStatus},
    error::VaultError,
    kdf::KdfParams,
    keystore::{FileKeystore, Keystore, MemoryKeystore},
    options::{DEFAULT_KEY_TAG, EngineOptions, SyncPolicy},
    record::{Account, Note, RecordFields, RecordId, RecordKind, SortCriterion, VaultRecord},
    secondary::{DirectoryLocator, NoSecondary, SecondaryLocator},
    session::SessionKey,
    storage::{BlobStorage, LocalFs},
    store::VaultStore,
    traits::{BiometricPrompt, Cipher},
};

//! Opaque key storage addressed by a string tag.
//!
//! The platform secure store sits behind [`Keystore`]. Two implementations
//! ship here: [`MemoryKeystore`] for ephemeral use and tests, and
//! [`FileKeystore`], a `0600` JSON file for hosts without a secure enclave.

use std::{collections::HashMap, path::PathBuf};

use {base64::Engine, tokio::sync::Mutex, zeroize::Zeroizing};

use crate::{
    error::VaultError,
    kdf::{KEY_LEN, Key},
};

/// Store, fetch and delete one key per tag.
///
/// Every method must work without an unlocked session.
#[async_trait::async_trait]
pub trait Keystore: Send + Sync {
    /// Store `key` under `tag`, replacing any existing entry.
    async fn put(&self, tag: &str, key: &[u8; KEY_LEN]) -> Result<(), VaultError>;

    /// Fetch the key stored under `tag`.
    async fn get(&self, tag: &str) -> Result<Option<Key>, VaultError>;

    /// Remove the key under `tag`. Removing an absent tag succeeds.
    async fn delete(&self, tag: &str) -> Result<(), VaultError>;
}

/// Process-local keystore.
#[derive(Default)]
pub struct MemoryKeystore {
    entries: Mutex<HashMap<String, Key>>,
}

impl MemoryKeystore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait::async_trait]
impl Keystore for MemoryKeystore {
    async fn put(&self, tag: &str, key: &[u8; KEY_LEN]) -> Result<(), VaultError> {
        let mut entries = self.entries.lock().await;
        entries.remove(tag);
        entries.insert(tag.to_string(), Zeroizing::new(*key));
        Ok(())
    }

    async fn get(&self, tag: &str) -> Result<Option<Key>, VaultError> {
        Ok(self.entries.lock().await.get(tag).cloned())
    }

    async fn delete(&self, tag: &str) -> Result<(), VaultError> {
        self.entries.lock().await.remove(tag);
        Ok(())
    }
}

/// File-backed keystore: a JSON map of tag → base64 key.
#[derive(Debug)]
pub struct FileKeystore {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileKeystore {
    pub fn new(path: PathBuf) -> Self {
        Self {
            path,
            lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &std::path::Path {
        &self.path
    }

    async fn load(&self) -> Result<HashMap<String, Zeroizing<String>>, VaultError> {
        let data = match tokio::fs::read_to_string(&self.path).await {
            Ok(d) => Zeroizing::new(d),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(HashMap::new()),
            Err(e) => {
                return Err(VaultError::Keystore(format!(
                    "failed to read {}: {e}",
                    self.path.display()
                )));
            },
        };
        let map: HashMap<String, String> = serde_json::from_str(&data).map_err(|e| {
            VaultError::Keystore(format!("failed to parse {}: {e}", self.path.display()))
        })?;
        Ok(map
            .into_iter()
            .map(|(tag, key)| (tag, Zeroizing::new(key)))
            .collect())
    }

    async fn store(&self, map: &HashMap<String, Zeroizing<String>>) -> Result<(), VaultError> {
        let plain: HashMap<&str, &str> = map
            .iter()
            .map(|(tag, key)| (tag.as_str(), key.as_str()))
            .collect();
        let data = Zeroizing::new(serde_json::to_string_pretty(&plain)?);
        crate::storage::write_file_atomic(&self.path, data.as_bytes())
            .await
            .map_err(|e| {
                VaultError::Keystore(format!("failed to write {}: {e}", self.path.display()))
            })
    }
}

#[async_trait::async_trait]
impl Keystore for FileKeystore {
    async fn put(&self, tag: &str, key: &[u8; KEY_LEN]) -> Result<(), VaultError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;

        // Delete-then-insert: a tag never holds two entries.
        map.remove(tag);
        let encoded = Zeroizing::new(base64::engine::general_purpose::STANDARD.encode(key));
        map.insert(tag.to_string(), encoded);
        self.store(&map).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %self.path.display(), tag, "key stored");
        Ok(())
    }

    async fn get(&self, tag: &str) -> Result<Option<Key>, VaultError> {
        let _guard = self.lock.lock().await;
        let map = self.load().await?;
        let Some(encoded) = map.get(tag) else {
            return Ok(None);
        };

        let decoded = Zeroizing::new(
            base64::engine::general_purpose::STANDARD
                .decode(encoded.as_bytes())
                .map_err(|e| {
                    VaultError::Keystore(format!("stored key for {tag} is not base64: {e}"))
                })?,
        );
        if decoded.len() != KEY_LEN {
            return Err(VaultError::Keystore(format!(
                "stored key for {tag} has wrong length: {} (expected {KEY_LEN})",
                decoded.len()
            )));
        }
        let mut key = Zeroizing::new([0u8; KEY_LEN]);
        key.copy_from_slice(&decoded);
        Ok(Some(key))
    }

    async fn delete(&self, tag: &str) -> Result<(), VaultError> {
        let _guard = self.lock.lock().await;
        let mut map = self.load().await?;
        if map.remove(tag).is_none() {
            return Ok(());
        }
        self.store(&map).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(path = %self.path.display(), tag, "key deleted");
        Ok(())
    }
}

//! Two-phase key rotation.
//!
//! 1. Stage: open every vault with the password and reseal it under a fresh
//!    key and salt, in memory only.
//! 2. Swap the keystore entry.
//! 3. Write the staged blobs.
//!
//! A failure in step 1 changes nothing. A failure in step 2 or 3 puts back
//! whatever was already replaced, so the previous password and key keep
//! opening every vault. Step 3 must reach the secondary copy too: reads
//! prefer it, so a copy left under the retired key would shadow the local
//! one.

use zeroize::Zeroizing;

use crate::{
    blob::{BlobCodec, EncryptedBlob},
    codec,
    error::VaultError,
    kdf::{self, KdfParams, Key},
    keystore::Keystore,
    session::SessionKey,
    store::VaultStore,
    traits::Cipher,
};

struct Staged<'a, C: Cipher> {
    store: &'a VaultStore<C>,
    previous: Option<EncryptedBlob>,
    next: EncryptedBlob,
}

/// Everything a rotation touches besides the vaults themselves.
pub(crate) struct Rotation<'a, C: Cipher> {
    pub(crate) codec: &'a BlobCodec<C>,
    pub(crate) keystore: &'a dyn Keystore,
    pub(crate) key_tag: &'a str,
    pub(crate) kdf: &'a KdfParams,
}

impl<C: Cipher> Rotation<'_, C> {
    /// Rotate `stores` to a key freshly derived from `password`.
    ///
    /// `password` must already have opened the current blobs; a vault it
    /// cannot open aborts the rotation before anything is written.
    pub(crate) async fn run(
        &self,
        password: &str,
        stores: &[&VaultStore<C>],
    ) -> Result<SessionKey, VaultError> {
        let salt = kdf::generate_salt();
        let key = kdf::derive_key(password.as_bytes(), &salt, self.kdf);

        let mut staged = Vec::with_capacity(stores.len());
        for store in stores {
            let previous = match store.read_blob().await {
                Ok(blob) => Some(blob),
                Err(VaultError::NotInitialized) => None,
                Err(e) => return Err(e),
            };
            let text = match &previous {
                Some(blob) => Zeroizing::new(self.codec.open_with_password(
                    blob,
                    password,
                    self.kdf,
                )?),
                None => Zeroizing::new(codec::EMPTY_SENTINEL.to_string()),
            };
            let next = self.codec.seal(&text, &key, &salt)?;
            staged.push(Staged {
                store: *store,
                previous,
                next,
            });
        }

        let old_key = self.keystore.get(self.key_tag).await?;
        if let Err(e) = self.keystore.put(self.key_tag, &key).await {
            self.restore_key(old_key.as_ref()).await;
            return Err(VaultError::RotationFailed(format!(
                "could not store new key: {e}"
            )));
        }

        for (index, entry) in staged.iter().enumerate() {
            if let Err(e) = entry.store.write_blob_everywhere(&entry.next).await {
                #[cfg(feature = "tracing")]
                tracing::error!(vault = %entry.store.kind(), error = %e, "rotation write failed, rolling back");
                // The failing vault may already have a new local copy.
                self.roll_back(&staged[..=index]).await;
                self.restore_key(old_key.as_ref()).await;
                return Err(VaultError::RotationFailed(format!(
                    "could not write {} vault: {e}",
                    entry.store.kind()
                )));
            }
        }

        #[cfg(feature = "tracing")]
        tracing::info!(vaults = staged.len(), "vault key rotated");
        #[cfg(feature = "metrics")]
        metrics::counter!("strongbox_key_rotations_total").increment(1);

        Ok(SessionKey::new(key, salt))
    }

    async fn roll_back(&self, written: &[Staged<'_, C>]) {
        for entry in written {
            let restored = match &entry.previous {
                Some(blob) => entry.store.write_blob(blob).await,
                None => entry.store.remove_blobs().await,
            };
            if let Err(_e) = restored {
                #[cfg(feature = "tracing")]
                tracing::error!(vault = %entry.store.kind(), error = %_e, "failed to restore vault during rollback");
            }
        }
    }

    async fn restore_key(&self, old_key: Option<&Key>) {
        let restored = match old_key {
            Some(key) => self.keystore.put(self.key_tag, key).await,
            None => self.keystore.delete(self.key_tag).await,
        };
        if let Err(_e) = restored {
            #[cfg(feature = "tracing")]
            tracing::error!(tag = self.key_tag, error = %_e, "failed to restore previous key");
        }
    }
}

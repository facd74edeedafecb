//! One vault's records: load, CRUD, and write-back.
//!
//! Every mutation re-encodes the whole vault, seals it with the session key
//! and the salt of the blob it replaces, and writes the local copy before the
//! secondary one. In-memory state only changes once the local write has
//! succeeded.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};

use {
    tokio::sync::{Mutex, MutexGuard},
    zeroize::Zeroizing,
};

use crate::{
    aes256gcm::Aes256GcmCipher,
    blob::{BlobCodec, EncryptedBlob},
    codec,
    error::VaultError,
    kdf::Salt,
    record::{self, RecordFields, RecordId, RecordKind, SortCriterion, VaultRecord},
    secondary::SecondaryLocation,
    session::{Session, SessionKey},
    storage::BlobStorage,
    traits::Cipher,
};

/// State shared by every store of one engine.
pub(crate) struct StoreContext<C: Cipher> {
    pub(crate) storage: Arc<dyn BlobStorage>,
    pub(crate) codec: BlobCodec<C>,
    pub(crate) session: Session,
    pub(crate) data_dir: PathBuf,
    pub(crate) sync_enabled: bool,
    pub(crate) secondary: SecondaryLocation,
}

#[derive(Default)]
struct StoreState {
    /// `None` is the empty sentinel.
    records: Option<Vec<VaultRecord>>,
    /// Salt of the blob currently on disk.
    blob_salt: Option<Salt>,
}

/// A single vault (accounts or notes).
pub struct VaultStore<C: Cipher = Aes256GcmCipher> {
    kind: RecordKind,
    ctx: Arc<StoreContext<C>>,
    state: Mutex<StoreState>,
}

impl<C: Cipher> VaultStore<C> {
    pub(crate) fn new(kind: RecordKind, ctx: Arc<StoreContext<C>>) -> Self {
        Self {
            kind,
            ctx,
            state: Mutex::new(StoreState::default()),
        }
    }

    pub fn kind(&self) -> RecordKind {
        self.kind
    }

    /// Path of the local copy.
    pub fn local_path(&self) -> PathBuf {
        self.ctx.data_dir.join(self.kind.file_name())
    }

    /// Path of the secondary copy, once the location has resolved.
    pub async fn secondary_path(&self) -> Option<PathBuf> {
        if !self.ctx.sync_enabled {
            return None;
        }
        self.ctx
            .secondary
            .dir()
            .await
            .map(|dir| dir.join(self.kind.file_name()))
    }

    /// The decrypted records. `None` while locked or when the vault is empty.
    pub async fn get(&self) -> Option<Vec<VaultRecord>> {
        let state = self.state.lock().await;
        if !self.ctx.session.is_unlocked().await {
            return None;
        }
        state.records.clone()
    }

    /// A single record by id, under the same gate as [`get`](Self::get).
    pub async fn find(&self, id: RecordId) -> Option<VaultRecord> {
        let state = self.state.lock().await;
        if !self.ctx.session.is_unlocked().await {
            return None;
        }
        state
            .records
            .as_ref()?
            .iter()
            .find(|r| r.id() == id)
            .cloned()
    }

    /// Append a new record. Returns the stored record with its assigned id.
    pub async fn add(&self, fields: impl Into<RecordFields>) -> Result<VaultRecord, VaultError> {
        let fields = fields.into();
        self.check_fields(&fields)?;

        let mut state = self.state.lock().await;
        let session = self.ctx.session.read().await;
        let key = session.as_ref().ok_or(VaultError::Locked)?;

        let mut records = state.records.clone().unwrap_or_default();
        let mut record = VaultRecord::new(fields);
        while records.iter().any(|r| r.id() == record.id()) {
            record.reassign_id();
        }
        records.push(record.clone());

        self.persist(&mut state, key, Some(records)).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(vault = %self.kind, id = %record.id(), "record added");
        Ok(record)
    }

    /// Replace the fields of the record with `id`. `Ok(false)` if no such record.
    pub async fn update(
        &self,
        id: RecordId,
        fields: impl Into<RecordFields>,
    ) -> Result<bool, VaultError> {
        let fields = fields.into();
        self.check_fields(&fields)?;
        self.modify(id, |record| record.replace_fields(fields)).await
    }

    /// Star or unstar the record with `id`. `Ok(false)` if no such record.
    pub async fn set_starred(&self, id: RecordId, starred: bool) -> Result<bool, VaultError> {
        self.modify(id, |record| record.set_starred(starred)).await
    }

    /// Remove the record with `id`. `Ok(false)` if no such record.
    ///
    /// Removing the last record leaves the vault at the empty sentinel.
    pub async fn delete(&self, id: RecordId) -> Result<bool, VaultError> {
        let mut state = self.state.lock().await;
        let session = self.ctx.session.read().await;
        let key = session.as_ref().ok_or(VaultError::Locked)?;

        let Some(mut records) = state.records.clone() else {
            return Ok(false);
        };
        let before = records.len();
        records.retain(|r| r.id() != id);
        if records.len() == before {
            return Ok(false);
        }

        let remaining = (!records.is_empty()).then_some(records);
        self.persist(&mut state, key, remaining).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(vault = %self.kind, %id, "record deleted");
        Ok(true)
    }

    /// Reorder the vault by `criterion` and write it back.
    pub async fn sort_by(&self, criterion: SortCriterion) -> Result<(), VaultError> {
        self.reorder(|mut records| {
            record::sort_records(&mut records, criterion);
            records
        })
        .await
    }

    /// Sort by a criterion name. An unrecognised name leaves the order
    /// unchanged and returns `Ok(false)`.
    pub async fn sort_by_name(&self, name: &str) -> Result<bool, VaultError> {
        match SortCriterion::from_name(name) {
            Some(criterion) => self.sort_by(criterion).await.map(|()| true),
            None => {
                #[cfg(feature = "tracing")]
                tracing::debug!(vault = %self.kind, criterion = name, "unknown sort criterion ignored");
                Ok(false)
            },
        }
    }

    /// Move starred records to the front, keeping relative order otherwise.
    pub async fn sort_by_starred(&self) -> Result<(), VaultError> {
        self.reorder(record::partition_starred).await
    }

    fn check_fields(&self, fields: &RecordFields) -> Result<(), VaultError> {
        if fields.kind() != self.kind {
            return Err(VaultError::InvalidRecord(format!(
                "{} record does not belong in the {} vault",
                fields.kind(),
                self.kind
            )));
        }
        fields.validate()
    }

    async fn modify(
        &self,
        id: RecordId,
        change: impl FnOnce(&mut VaultRecord),
    ) -> Result<bool, VaultError> {
        let mut state = self.state.lock().await;
        let session = self.ctx.session.read().await;
        let key = session.as_ref().ok_or(VaultError::Locked)?;

        let Some(mut records) = state.records.clone() else {
            return Ok(false);
        };
        let Some(record) = records.iter_mut().find(|r| r.id() == id) else {
            return Ok(false);
        };
        change(record);

        self.persist(&mut state, key, Some(records)).await?;

        #[cfg(feature = "tracing")]
        tracing::debug!(vault = %self.kind, %id, "record updated");
        Ok(true)
    }

    async fn reorder(
        &self,
        arrange: impl FnOnce(Vec<VaultRecord>) -> Vec<VaultRecord>,
    ) -> Result<(), VaultError> {
        let mut state = self.state.lock().await;
        let session = self.ctx.session.read().await;
        let key = session.as_ref().ok_or(VaultError::Locked)?;

        let Some(records) = state.records.clone() else {
            return Ok(());
        };
        let arranged = arrange(records);
        self.persist(&mut state, key, Some(arranged)).await
    }

    /// Seal `records`, write them out, then commit them to memory.
    async fn persist(
        &self,
        state: &mut MutexGuard<'_, StoreState>,
        key: &SessionKey,
        records: Option<Vec<VaultRecord>>,
    ) -> Result<(), VaultError> {
        let salt = state.blob_salt.unwrap_or(*key.salt());
        let text = Zeroizing::new(codec::format(records.as_deref()));
        let blob = self.ctx.codec.seal(&text, key.key(), &salt)?;

        self.write_blob(&blob).await?;

        state.records = records;
        state.blob_salt = Some(salt);
        Ok(())
    }

    /// Current blob: the secondary copy when sync is on and it is readable,
    /// otherwise the local copy.
    pub(crate) async fn read_blob(&self) -> Result<EncryptedBlob, VaultError> {
        if let Some(path) = self.secondary_path().await {
            match self.ctx.storage.read(&path).await {
                Ok(Some(bytes)) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(vault = %self.kind, path = %path.display(), "reading secondary copy");
                    return Ok(EncryptedBlob::from_bytes(bytes));
                },
                Ok(None) => {
                    #[cfg(feature = "tracing")]
                    tracing::debug!(vault = %self.kind, path = %path.display(), "no secondary copy, reading local");
                },
                Err(_e) => {
                    #[cfg(feature = "tracing")]
                    tracing::warn!(vault = %self.kind, path = %path.display(), error = %_e, "secondary copy unreadable, reading local");
                },
            }
        }

        let local = self.local_path();
        match self.ctx.storage.read(&local).await? {
            Some(bytes) => Ok(EncryptedBlob::from_bytes(bytes)),
            None => Err(VaultError::NotInitialized),
        }
    }

    /// Whether a blob exists in either location.
    pub(crate) async fn has_blob(&self) -> Result<bool, VaultError> {
        match self.read_blob().await {
            Ok(_) => Ok(true),
            Err(VaultError::NotInitialized) => Ok(false),
            Err(e) => Err(e),
        }
    }

    /// Write the local copy, then the secondary copy. Only the local write
    /// can fail the call.
    pub(crate) async fn write_blob(&self, blob: &EncryptedBlob) -> Result<(), VaultError> {
        self.write_local(blob).await?;
        if let Some(path) = self.secondary_path().await {
            self.write_secondary(&path, blob).await;
        }
        Ok(())
    }

    /// Write the local copy, then the secondary copy. Either failure fails
    /// the call.
    pub(crate) async fn write_blob_everywhere(
        &self,
        blob: &EncryptedBlob,
    ) -> Result<(), VaultError> {
        self.write_local(blob).await?;
        if let Some(path) = self.secondary_path().await {
            self.ctx.storage.write_atomic(&path, blob.as_bytes()).await?;
        }
        Ok(())
    }

    async fn write_local(&self, blob: &EncryptedBlob) -> Result<(), VaultError> {
        self.ctx
            .storage
            .write_atomic(&self.local_path(), blob.as_bytes())
            .await
    }

    async fn write_secondary(&self, path: &Path, blob: &EncryptedBlob) {
        if let Err(_e) = self.ctx.storage.write_atomic(path, blob.as_bytes()).await {
            #[cfg(feature = "tracing")]
            tracing::warn!(vault = %self.kind, path = %path.display(), error = %_e, "secondary write failed, local copy is current");
            #[cfg(feature = "metrics")]
            metrics::counter!("strongbox_secondary_write_failures_total", "vault" => self.kind.as_str())
                .increment(1);
        }
    }

    /// Remove both copies.
    pub(crate) async fn remove_blobs(&self) -> Result<(), VaultError> {
        self.ctx.storage.remove(&self.local_path()).await?;
        if let Some(path) = self.secondary_path().await
            && let Err(_e) = self.ctx.storage.remove(&path).await
        {
            #[cfg(feature = "tracing")]
            tracing::warn!(vault = %self.kind, path = %path.display(), error = %_e, "failed to remove secondary copy");
        }
        Ok(())
    }

    /// Decrypt the current blob with `key` and replace in-memory state.
    pub(crate) async fn load(&self, key: &SessionKey) -> Result<(), VaultError> {
        let blob = self.read_blob().await?;
        let text = Zeroizing::new(self.ctx.codec.open(&blob, key.key())?);
        let records = codec::parse(&text)?;

        let mut state = self.state.lock().await;
        #[cfg(feature = "tracing")]
        tracing::debug!(
            vault = %self.kind,
            count = records.as_ref().map_or(0, Vec::len),
            "vault loaded"
        );
        state.records = records;
        state.blob_salt = Some(blob.salt()?);
        Ok(())
    }

    /// Set state directly after writing a known blob (sign-up).
    pub(crate) async fn install(&self, records: Option<Vec<VaultRecord>>, salt: Salt) {
        let mut state = self.state.lock().await;
        state.records = records;
        state.blob_salt = Some(salt);
    }

    /// Forget decrypted records (lock).
    pub(crate) async fn clear(&self) {
        *self.state.lock().await = StoreState::default();
    }
}

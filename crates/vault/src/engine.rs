//! The vault engine: sign-up, unlock, lock and access to each vault.

use std::sync::Arc;

use crate::{
    aes256gcm::Aes256GcmCipher,
    blob::BlobCodec,
    codec,
    error::VaultError,
    kdf::{self, KdfParams},
    keystore::Keystore,
    options::EngineOptions,
    record::RecordKind,
    rotation::Rotation,
    secondary::{SecondaryLocation, SecondaryLocator, locator_for},
    session::{Session, SessionKey},
    storage::{BlobStorage, LocalFs},
    store::{StoreContext, VaultStore},
    traits::{BiometricPrompt, Cipher},
};

/// Overall state of the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VaultStatus {
    /// No key is stored for the configured tag.
    Uninitialized,
    /// A key exists but no session is active.
    Locked,
    /// A session key is held and the vaults are decrypted.
    Unlocked,
}

/// Encrypted accounts and notes behind one password.
///
/// The engine holds at most one session key. Records are only readable while
/// it is held.
pub struct VaultEngine<C: Cipher = Aes256GcmCipher> {
    ctx: Arc<StoreContext<C>>,
    accounts: VaultStore<C>,
    notes: VaultStore<C>,
    keystore: Arc<dyn Keystore>,
    key_tag: String,
    kdf: KdfParams,
    biometrics_enabled: bool,
}

impl VaultEngine {
    /// Engine over the local filesystem with AES-256-GCM.
    ///
    /// Must be called inside a tokio runtime: the secondary-location probe
    /// starts here.
    pub fn new(options: EngineOptions, keystore: Arc<dyn Keystore>) -> Self {
        let locator = locator_for(&options.sync);
        Self::with_parts(
            options,
            keystore,
            Arc::new(LocalFs),
            locator,
            BlobCodec::new(),
        )
    }
}

impl<C: Cipher> VaultEngine<C> {
    /// Engine with every collaborator supplied by the caller.
    pub fn with_parts(
        options: EngineOptions,
        keystore: Arc<dyn Keystore>,
        storage: Arc<dyn BlobStorage>,
        locator: Arc<dyn SecondaryLocator>,
        codec: BlobCodec<C>,
    ) -> Self {
        let secondary = SecondaryLocation::spawn(locator, &options.sync);
        let ctx = Arc::new(StoreContext {
            storage,
            codec,
            session: Session::default(),
            data_dir: options.data_dir,
            sync_enabled: options.sync.enabled,
            secondary,
        });

        Self {
            accounts: VaultStore::new(RecordKind::Account, Arc::clone(&ctx)),
            notes: VaultStore::new(RecordKind::Note, Arc::clone(&ctx)),
            ctx,
            keystore,
            key_tag: options.key_tag,
            kdf: options.kdf,
            biometrics_enabled: options.biometrics_enabled,
        }
    }

    pub fn accounts(&self) -> &VaultStore<C> {
        &self.accounts
    }

    pub fn notes(&self) -> &VaultStore<C> {
        &self.notes
    }

    pub fn store(&self, kind: RecordKind) -> &VaultStore<C> {
        match kind {
            RecordKind::Account => &self.accounts,
            RecordKind::Note => &self.notes,
        }
    }

    fn stores(&self) -> [&VaultStore<C>; 2] {
        [&self.accounts, &self.notes]
    }

    pub async fn is_unlocked(&self) -> bool {
        self.ctx.session.is_unlocked().await
    }

    pub async fn status(&self) -> Result<VaultStatus, VaultError> {
        if self.is_unlocked().await {
            return Ok(VaultStatus::Unlocked);
        }
        Ok(match self.keystore.get(&self.key_tag).await? {
            Some(_) => VaultStatus::Locked,
            None => VaultStatus::Uninitialized,
        })
    }

    /// First-time setup: store a new key and write an empty blob for every
    /// vault. Leaves the engine unlocked.
    ///
    /// Refuses when a key is stored or when any vault file exists locally or
    /// in the secondary location. Another device may own the synced copy, so
    /// it is never overwritten here; [`reset`](Self::reset) clears it.
    pub async fn sign_up(&self, password: &str) -> Result<(), VaultError> {
        check_password(password)?;
        if self.keystore.get(&self.key_tag).await?.is_some() {
            return Err(VaultError::AlreadyInitialized);
        }
        for store in self.stores() {
            if store.has_blob().await? {
                #[cfg(feature = "tracing")]
                tracing::warn!(vault = %store.kind(), "vault file exists without a stored key");
                return Err(VaultError::AlreadyInitialized);
            }
        }

        let salt = kdf::generate_salt();
        let key = kdf::derive_key(password.as_bytes(), &salt, &self.kdf);
        let blob = self.ctx.codec.seal(codec::EMPTY_SENTINEL, &key, &salt)?;

        // Vaults first: until the key is stored the engine still reads as
        // uninitialized. Files left by an interrupted sign-up need a reset.
        for store in self.stores() {
            store.write_blob(&blob).await?;
        }
        self.keystore.put(&self.key_tag, &key).await?;

        for store in self.stores() {
            store.install(None, salt).await;
        }
        self.ctx.session.install(SessionKey::new(key, salt)).await;

        #[cfg(feature = "tracing")]
        tracing::info!(data_dir = %self.ctx.data_dir.display(), "vault initialized");
        Ok(())
    }

    /// Unlock with the password, rotating the key on success.
    ///
    /// A wrong password is [`VaultError::IncorrectPassword`] regardless of
    /// whether the key or the data was at fault. If rotation cannot commit,
    /// the session continues under the previous key.
    pub async fn unlock(&self, password: &str) -> Result<(), VaultError> {
        let result = self.unlock_with_password(password).await;

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "strongbox_unlock_attempts_total",
            "method" => "password",
            "outcome" => if result.is_ok() { "success" } else { "failure" }
        )
        .increment(1);

        result
    }

    async fn unlock_with_password(&self, password: &str) -> Result<(), VaultError> {
        let blob = self.accounts.read_blob().await?;
        self.ctx
            .codec
            .open_with_password(&blob, password, &self.kdf)?;

        // Writes still running under the old session finish before rotation
        // reads the blobs.
        self.lock().await;

        let rotation = Rotation {
            codec: &self.ctx.codec,
            keystore: self.keystore.as_ref(),
            key_tag: &self.key_tag,
            kdf: &self.kdf,
        };
        let session = match rotation.run(password, &self.stores()).await {
            Ok(session) => session,
            Err(_e) => {
                #[cfg(feature = "tracing")]
                tracing::error!(error = %_e, "key rotation failed, keeping previous key");
                let salt = blob.salt()?;
                SessionKey::new(kdf::derive_key(password.as_bytes(), &salt, &self.kdf), salt)
            },
        };

        self.open_session(session).await?;

        #[cfg(feature = "tracing")]
        tracing::info!("vault unlocked");
        Ok(())
    }

    /// Unlock with the stored key after a biometric check. Does not rotate.
    pub async fn unlock_with_stored_key(
        &self,
        prompt: &dyn BiometricPrompt,
    ) -> Result<(), VaultError> {
        let result = self.unlock_biometric(prompt).await;

        #[cfg(feature = "metrics")]
        metrics::counter!(
            "strongbox_unlock_attempts_total",
            "method" => "biometric",
            "outcome" => if result.is_ok() { "success" } else { "failure" }
        )
        .increment(1);

        result
    }

    async fn unlock_biometric(&self, prompt: &dyn BiometricPrompt) -> Result<(), VaultError> {
        if !self.biometrics_enabled {
            return Err(VaultError::Unavailable("biometric unlock is disabled".into()));
        }
        let Some(key) = self.keystore.get(&self.key_tag).await? else {
            return Err(VaultError::Unavailable("no stored key".into()));
        };
        if !prompt.authenticate("Unlock your vault").await {
            #[cfg(feature = "tracing")]
            tracing::info!("biometric check declined");
            return Err(VaultError::Unavailable("biometric check declined".into()));
        }

        let salt = self.accounts.read_blob().await?.salt()?;
        self.lock().await;
        self.open_session(SessionKey::new(key, salt)).await?;

        #[cfg(feature = "tracing")]
        tracing::info!("vault unlocked with stored key");
        Ok(())
    }

    async fn open_session(&self, session: SessionKey) -> Result<(), VaultError> {
        for store in self.stores() {
            if let Err(e) = store.load(&session).await {
                for store in self.stores() {
                    store.clear().await;
                }
                return Err(e);
            }
        }
        self.ctx.session.install(session).await;
        Ok(())
    }

    /// Drop the session key and every decrypted record.
    pub async fn lock(&self) {
        let was_unlocked = self.ctx.session.clear().await;
        for store in self.stores() {
            store.clear().await;
        }
        if was_unlocked {
            #[cfg(feature = "tracing")]
            tracing::info!("vault locked");
        }
    }

    /// Delete the stored key and every vault file in both locations.
    pub async fn reset(&self) -> Result<(), VaultError> {
        self.lock().await;
        self.keystore.delete(&self.key_tag).await?;
        for store in self.stores() {
            store.remove_blobs().await?;
        }

        #[cfg(feature = "tracing")]
        tracing::warn!(data_dir = %self.ctx.data_dir.display(), "vault reset");
        Ok(())
    }
}

fn check_password(password: &str) -> Result<(), VaultError> {
    if password.is_empty() {
        return Err(VaultError::InvalidPassword("password must not be empty".into()));
    }
    Ok(())
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use {
        super::*,
        crate::{
            kdf::MIN_ITERATIONS,
            keystore::MemoryKeystore,
            record::{Account, Note},
        },
    };

    struct Prompt(bool);

    #[async_trait::async_trait]
    impl BiometricPrompt for Prompt {
        async fn authenticate(&self, _reason: &str) -> bool {
            self.0
        }
    }

    fn engine(dir: &std::path::Path, biometrics: bool) -> VaultEngine {
        let options = EngineOptions::new(dir)
            .with_kdf(KdfParams::new(MIN_ITERATIONS).unwrap())
            .with_biometrics(biometrics);
        VaultEngine::new(options, Arc::new(MemoryKeystore::new()))
    }

    fn account() -> Account {
        Account {
            name: "mail".into(),
            username: "me@example.com".into(),
            password: "pw".into(),
            url: None,
            otp_secret: None,
        }
    }

    #[tokio::test]
    async fn status_follows_lifecycle() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);

        assert_eq!(engine.status().await.unwrap(), VaultStatus::Uninitialized);
        engine.sign_up("pw").await.unwrap();
        assert_eq!(engine.status().await.unwrap(), VaultStatus::Unlocked);
        engine.lock().await;
        assert_eq!(engine.status().await.unwrap(), VaultStatus::Locked);
        engine.unlock("pw").await.unwrap();
        assert_eq!(engine.status().await.unwrap(), VaultStatus::Unlocked);
        engine.reset().await.unwrap();
        assert_eq!(engine.status().await.unwrap(), VaultStatus::Uninitialized);
    }

    #[tokio::test]
    async fn sign_up_writes_both_vaults() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        engine.sign_up("pw").await.unwrap();

        for kind in RecordKind::ALL {
            assert!(dir.path().join(kind.file_name()).exists());
            assert!(engine.store(kind).get().await.is_none());
        }
    }

    #[tokio::test]
    async fn second_sign_up_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        engine.sign_up("pw").await.unwrap();
        assert!(matches!(
            engine.sign_up("other").await,
            Err(VaultError::AlreadyInitialized)
        ));
    }

    #[tokio::test]
    async fn empty_password_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        assert!(matches!(
            engine.sign_up("").await,
            Err(VaultError::InvalidPassword(_))
        ));
        assert_eq!(engine.status().await.unwrap(), VaultStatus::Uninitialized);
    }

    #[tokio::test]
    async fn unlock_before_sign_up_is_not_initialized() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        assert!(matches!(
            engine.unlock("pw").await,
            Err(VaultError::NotInitialized)
        ));
    }

    #[tokio::test]
    async fn wrong_password_stays_locked() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        engine.sign_up("right").await.unwrap();
        engine.accounts().add(account()).await.unwrap();
        engine.lock().await;

        assert!(matches!(
            engine.unlock("wrong").await,
            Err(VaultError::IncorrectPassword)
        ));
        assert!(!engine.is_unlocked().await);
        assert!(engine.accounts().get().await.is_none());
    }

    #[tokio::test]
    async fn lock_hides_records_until_unlock() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        engine.sign_up("pw").await.unwrap();
        engine
            .notes()
            .add(Note {
                title: "wifi".into(),
                body: "hunter2".into(),
            })
            .await
            .unwrap();

        engine.lock().await;
        assert!(engine.notes().get().await.is_none());

        engine.unlock("pw").await.unwrap();
        let notes = engine.notes().get().await.unwrap();
        assert_eq!(notes.len(), 1);
        assert_eq!(notes[0].display_name(), "wifi");
    }

    #[tokio::test]
    async fn reset_removes_files() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        engine.sign_up("pw").await.unwrap();
        engine.reset().await.unwrap();

        for kind in RecordKind::ALL {
            assert!(!dir.path().join(kind.file_name()).exists());
        }
        engine.sign_up("new").await.unwrap();
    }

    #[tokio::test]
    async fn biometric_unlock_requires_opt_in() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), false);
        engine.sign_up("pw").await.unwrap();
        engine.lock().await;

        assert!(matches!(
            engine.unlock_with_stored_key(&Prompt(true)).await,
            Err(VaultError::Unavailable(_))
        ));
        assert!(!engine.is_unlocked().await);
    }

    #[tokio::test]
    async fn biometric_unlock_opens_without_rotating() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), true);
        engine.sign_up("pw").await.unwrap();
        engine.accounts().add(account()).await.unwrap();
        engine.lock().await;
        let before = std::fs::read(dir.path().join("accounts.vault")).unwrap();

        engine.unlock_with_stored_key(&Prompt(true)).await.unwrap();
        assert_eq!(engine.accounts().get().await.unwrap().len(), 1);
        assert_eq!(
            std::fs::read(dir.path().join("accounts.vault")).unwrap(),
            before
        );
    }

    #[tokio::test]
    async fn declined_prompt_stays_locked() {
        let dir = tempfile::tempdir().unwrap();
        let engine = engine(dir.path(), true);
        engine.sign_up("pw").await.unwrap();
        engine.lock().await;

        assert!(matches!(
            engine.unlock_with_stored_key(&Prompt(false)).await,
            Err(VaultError::Unavailable(_))
        ));
        assert_eq!(engine.status().await.unwrap(), VaultStatus::Locked);
    }
}

//! Engine construction options.

use std::path::PathBuf;

use crate::kdf::KdfParams;

/// Keystore tag used when none is configured.
pub const DEFAULT_KEY_TAG: &str = "strongbox.vault-key";

/// Whether and where a synced secondary copy of each vault lives.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct SyncPolicy {
    /// Read from and write to the secondary location.
    pub enabled: bool,
    /// Directory probed for the secondary copy.
    pub secondary_dir: Option<PathBuf>,
}

impl SyncPolicy {
    pub fn disabled() -> Self {
        Self::default()
    }

    pub fn to_dir(dir: impl Into<PathBuf>) -> Self {
        Self {
            enabled: true,
            secondary_dir: Some(dir.into()),
        }
    }
}

/// Everything a [`VaultEngine`](crate::engine::VaultEngine) reads at
/// construction. Nothing is looked up from global state afterwards.
#[derive(Debug, Clone)]
pub struct EngineOptions {
    /// Directory holding the local copy of every vault.
    pub data_dir: PathBuf,
    /// Keystore tag for the vault key.
    pub key_tag: String,
    pub kdf: KdfParams,
    pub sync: SyncPolicy,
    /// Allow unlocking with the stored key after a biometric check.
    pub biometrics_enabled: bool,
}

impl EngineOptions {
    pub fn new(data_dir: impl Into<PathBuf>) -> Self {
        Self {
            data_dir: data_dir.into(),
            key_tag: DEFAULT_KEY_TAG.to_string(),
            kdf: KdfParams::default(),
            sync: SyncPolicy::default(),
            biometrics_enabled: false,
        }
    }

    #[must_use]
    pub fn with_key_tag(mut self, tag: impl Into<String>) -> Self {
        self.key_tag = tag.into();
        self
    }

    #[must_use]
    pub fn with_kdf(mut self, kdf: KdfParams) -> Self {
        self.kdf = kdf;
        self
    }

    #[must_use]
    pub fn with_sync(mut self, sync: SyncPolicy) -> Self {
        self.sync = sync;
        self
    }

    #[must_use]
    pub fn with_biometrics(mut self, enabled: bool) -> Self {
        self.biometrics_enabled = enabled;
        self
    }
}

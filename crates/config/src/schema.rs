//! Config schema types.

use std::path::PathBuf;

use {
    serde::{Deserialize, Serialize},
    strongbox_vault::{
        DEFAULT_KEY_TAG, EngineOptions, KdfParams, SyncPolicy, VaultError, kdf::DEFAULT_ITERATIONS,
    },
};

/// Root configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StrongboxConfig {
    pub vault: VaultSection,
    pub sync: SyncPolicy,
    pub biometrics: BiometricsSection,
}

/// Where vaults live and how their key is derived and stored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VaultSection {
    /// Directory for the local vault files. Defaults to the user data dir.
    pub data_dir: Option<PathBuf>,
    /// Keystore tag of the vault key.
    pub key_tag: String,
    /// PBKDF2 iteration count.
    pub kdf_iterations: u32,
    /// File keystore location. Defaults to `keys.json` in the config dir.
    pub keystore_path: Option<PathBuf>,
}

impl Default for VaultSection {
    fn default() -> Self {
        Self {
            data_dir: None,
            key_tag: DEFAULT_KEY_TAG.into(),
            kdf_iterations: DEFAULT_ITERATIONS,
            keystore_path: None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BiometricsSection {
    /// Allow stored-key unlock after a platform biometric check.
    pub enabled: bool,
}

impl StrongboxConfig {
    /// Resolved data directory: the configured one or the user default.
    pub fn data_dir(&self) -> PathBuf {
        self.vault
            .data_dir
            .clone()
            .unwrap_or_else(crate::loader::data_dir)
    }

    /// Resolved file keystore path.
    pub fn keystore_path(&self) -> PathBuf {
        self.vault
            .keystore_path
            .clone()
            .unwrap_or_else(|| crate::loader::config_dir().join("keys.json"))
    }

    /// Engine options for this configuration.
    pub fn engine_options(&self) -> Result<EngineOptions, VaultError> {
        Ok(EngineOptions::new(self.data_dir())
            .with_key_tag(self.vault.key_tag.clone())
            .with_kdf(KdfParams::new(self.vault.kdf_iterations)?)
            .with_sync(self.sync.clone())
            .with_biometrics(self.biometrics.enabled))
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_safe() {
        let cfg = StrongboxConfig::default();
        assert_eq!(cfg.vault.key_tag, DEFAULT_KEY_TAG);
        assert_eq!(cfg.vault.kdf_iterations, DEFAULT_ITERATIONS);
        assert!(!cfg.sync.enabled);
        assert!(!cfg.biometrics.enabled);
    }

    #[test]
    fn partial_toml_fills_defaults() {
        let cfg: StrongboxConfig = toml::from_str(
            r#"
            [sync]
            enabled = true
            secondary_dir = "/mnt/cloud/strongbox"
            "#,
        )
        .unwrap();
        assert!(cfg.sync.enabled);
        assert_eq!(
            cfg.sync.secondary_dir,
            Some(PathBuf::from("/mnt/cloud/strongbox"))
        );
        assert_eq!(cfg.vault.kdf_iterations, DEFAULT_ITERATIONS);
    }

    #[test]
    fn engine_options_carry_every_section() {
        let mut cfg = StrongboxConfig::default();
        cfg.vault.data_dir = Some(PathBuf::from("/tmp/vaults"));
        cfg.vault.key_tag = "custom".into();
        cfg.vault.kdf_iterations = 20_000;
        cfg.biometrics.enabled = true;

        let options = cfg.engine_options().unwrap();
        assert_eq!(options.data_dir, PathBuf::from("/tmp/vaults"));
        assert_eq!(options.key_tag, "custom");
        assert_eq!(options.kdf.iterations(), 20_000);
        assert!(options.biometrics_enabled);
    }

    #[test]
    fn engine_options_reject_weak_kdf() {
        let mut cfg = StrongboxConfig::default();
        cfg.vault.kdf_iterations = 1;
        assert!(matches!(
            cfg.engine_options(),
            Err(VaultError::InvalidConfig(_))
        ));
    }
}

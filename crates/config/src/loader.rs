use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use crate::{env_subst::substitute_env, error::ConfigError, schema::StrongboxConfig};

/// Standard config file names, checked in order.
const CONFIG_FILENAMES: &[&str] = &[
    "strongbox.toml",
    "strongbox.yaml",
    "strongbox.yml",
    "strongbox.json",
];

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("", "", "strongbox")
}

/// Load config from the given path (any supported format).
pub fn load_config(path: &Path) -> Result<StrongboxConfig, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    let raw = substitute_env(&raw);
    parse_config(&raw, path)
}

/// Discover and load config from standard locations, then apply
/// `STRONGBOX_*` overrides.
///
/// Search order:
/// 1. `./strongbox.{toml,yaml,yml,json}` (project-local)
/// 2. `~/.config/strongbox/strongbox.{toml,yaml,yml,json}` (user-global)
///
/// Falls back to `StrongboxConfig::default()` if no file is found or the
/// file cannot be loaded.
pub fn discover_and_load() -> StrongboxConfig {
    let mut config = if let Some(path) = find_config_file() {
        debug!(path = %path.display(), "loading config");
        match load_config(&path) {
            Ok(cfg) => cfg,
            Err(e) => {
                warn!(path = %path.display(), error = %e, "failed to load config, using defaults");
                StrongboxConfig::default()
            },
        }
    } else {
        debug!("no config file found, using defaults");
        StrongboxConfig::default()
    };

    if let Err(e) = apply_env_overrides(&mut config) {
        warn!(error = %e, "ignoring environment override");
    }
    config
}

/// Find the first config file in standard locations.
pub fn find_config_file() -> Option<PathBuf> {
    for name in CONFIG_FILENAMES {
        let p = PathBuf::from(name);
        if p.exists() {
            return Some(p);
        }
    }

    let config_dir = config_dir();
    CONFIG_FILENAMES
        .iter()
        .map(|name| config_dir.join(name))
        .find(|p| p.exists())
}

/// User-global config directory (`~/.config/strongbox/`).
pub fn config_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.config_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// User-global data directory, the default home of the vault files.
pub fn data_dir() -> PathBuf {
    project_dirs()
        .map(|d| d.data_dir().to_path_buf())
        .unwrap_or_else(|| PathBuf::from("."))
}

/// Returns the path of an existing config file, or the default TOML path.
pub fn find_or_default_config_path() -> PathBuf {
    find_config_file().unwrap_or_else(|| config_dir().join("strongbox.toml"))
}

/// Serialize `config` to TOML at the discovered or default path.
///
/// Returns the path written to.
pub fn save_config(config: &StrongboxConfig) -> Result<PathBuf, ConfigError> {
    let path = find_or_default_config_path();
    save_config_to(&path, config)?;
    Ok(path)
}

/// Serialize `config` to TOML at `path`, creating parent directories.
pub fn save_config_to(path: &Path, config: &StrongboxConfig) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(config)?;
    std::fs::write(path, toml_str)?;
    debug!(path = %path.display(), "saved config");
    Ok(())
}

/// Apply `STRONGBOX_*` environment overrides.
pub fn apply_env_overrides(config: &mut StrongboxConfig) -> Result<(), ConfigError> {
    apply_env_overrides_with(config, |name| std::env::var(name).ok())
}

pub(crate) fn apply_env_overrides_with(
    config: &mut StrongboxConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> Result<(), ConfigError> {
    if let Some(dir) = lookup("STRONGBOX_DATA_DIR") {
        config.vault.data_dir = Some(PathBuf::from(dir));
    }
    if let Some(tag) = lookup("STRONGBOX_KEY_TAG") {
        config.vault.key_tag = tag;
    }
    if let Some(value) = lookup("STRONGBOX_KDF_ITERATIONS") {
        config.vault.kdf_iterations =
            value.trim().parse().map_err(|_| ConfigError::InvalidOverride {
                var: "STRONGBOX_KDF_ITERATIONS",
                value: value.clone(),
            })?;
    }
    if let Some(path) = lookup("STRONGBOX_KEYSTORE") {
        config.vault.keystore_path = Some(PathBuf::from(path));
    }
    if let Some(value) = lookup("STRONGBOX_SYNC_ENABLED") {
        config.sync.enabled = parse_bool("STRONGBOX_SYNC_ENABLED", &value)?;
    }
    if let Some(dir) = lookup("STRONGBOX_SYNC_DIR") {
        config.sync.secondary_dir = Some(PathBuf::from(dir));
    }
    if let Some(value) = lookup("STRONGBOX_BIOMETRICS") {
        config.biometrics.enabled = parse_bool("STRONGBOX_BIOMETRICS", &value)?;
    }
    Ok(())
}

fn parse_bool(var: &'static str, value: &str) -> Result<bool, ConfigError> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidOverride {
            var,
            value: value.to_string(),
        }),
    }
}

fn parse_config(raw: &str, path: &Path) -> Result<StrongboxConfig, ConfigError> {
    let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("toml");
    let parse_err = |message: String| ConfigError::Parse {
        path: path.to_path_buf(),
        message,
    };

    match ext {
        "toml" => toml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "yaml" | "yml" => serde_yaml::from_str(raw).map_err(|e| parse_err(e.to_string())),
        "json" => serde_json::from_str(raw).map_err(|e| parse_err(e.to_string())),
        _ => Err(ConfigError::UnsupportedFormat(ext.to_string())),
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn loads_each_format() {
        let dir = tempfile::tempdir().unwrap();
        let files = [
            ("strongbox.toml", "[vault]\nkey_tag = \"from-toml\"\n"),
            ("strongbox.yaml", "vault:\n  key_tag: from-yaml\n"),
            ("strongbox.json", r#"{"vault":{"key_tag":"from-json"}}"#),
        ];
        for (name, body) in files {
            let path = dir.path().join(name);
            std::fs::write(&path, body).unwrap();
            let cfg = load_config(&path).unwrap();
            assert!(cfg.vault.key_tag.starts_with("from-"), "{name}");
        }
    }

    #[test]
    fn unsupported_extension_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strongbox.ini");
        std::fs::write(&path, "").unwrap();
        assert!(matches!(
            load_config(&path),
            Err(ConfigError::UnsupportedFormat(_))
        ));
    }

    #[test]
    fn parse_errors_name_the_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strongbox.toml");
        std::fs::write(&path, "[vault\n").unwrap();
        let err = load_config(&path).unwrap_err();
        assert!(err.to_string().contains("strongbox.toml"));
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("strongbox.toml");

        let mut cfg = StrongboxConfig::default();
        cfg.vault.data_dir = Some(PathBuf::from("/srv/vaults"));
        cfg.sync = strongbox_vault::SyncPolicy::to_dir("/mnt/sync");
        save_config_to(&path, &cfg).unwrap();

        assert_eq!(load_config(&path).unwrap(), cfg);
    }

    #[test]
    fn env_overrides_apply() {
        let mut cfg = StrongboxConfig::default();
        apply_env_overrides_with(&mut cfg, |name| match name {
            "STRONGBOX_DATA_DIR" => Some("/data".into()),
            "STRONGBOX_KDF_ITERATIONS" => Some("50000".into()),
            "STRONGBOX_SYNC_ENABLED" => Some("yes".into()),
            "STRONGBOX_SYNC_DIR" => Some("/sync".into()),
            "STRONGBOX_BIOMETRICS" => Some("true".into()),
            _ => None,
        })
        .unwrap();

        assert_eq!(cfg.vault.data_dir, Some(PathBuf::from("/data")));
        assert_eq!(cfg.vault.kdf_iterations, 50_000);
        assert!(cfg.sync.enabled);
        assert_eq!(cfg.sync.secondary_dir, Some(PathBuf::from("/sync")));
        assert!(cfg.biometrics.enabled);
    }

    #[test]
    fn bad_override_is_an_error() {
        let mut cfg = StrongboxConfig::default();
        let result = apply_env_overrides_with(&mut cfg, |name| {
            (name == "STRONGBOX_KDF_ITERATIONS").then(|| "lots".to_string())
        });
        assert!(matches!(
            result,
            Err(ConfigError::InvalidOverride {
                var: "STRONGBOX_KDF_ITERATIONS",
                ..
            })
        ));
    }
}

//! Configuration loading, validation, and env substitution.
//!
//! Config files: `strongbox.toml`, `strongbox.yaml`, or `strongbox.json`
//! Searched in `./` then `~/.config/strongbox/`.
//!
//! Supports `${ENV_VAR}` substitution in the raw file and `STRONGBOX_*`
//! overrides after parsing.

pub mod env_subst;
pub mod error;
pub mod loader;
pub mod schema;
pub mod validate;

pub use {
    error::ConfigError,
    loader::{
        apply_env_overrides, config_dir, data_dir, discover_and_load, find_config_file,
        find_or_default_config_path, load_config, save_config, save_config_to,
    },
    schema::{BiometricsSection, StrongboxConfig, VaultSection},
    validate::{Diagnostic, Severity, ValidationResult},
};

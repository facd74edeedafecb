//! Configuration validation.
//!
//! Flags unknown fields in TOML files and values the engine would reject or
//! that weaken the vault.

use std::path::{Path, PathBuf};

use strongbox_vault::kdf::{DEFAULT_ITERATIONS, MIN_ITERATIONS};

use crate::schema::StrongboxConfig;

/// Severity level for a diagnostic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Severity {
    Error,
    Warning,
    Info,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Error => write!(f, "error"),
            Self::Warning => write!(f, "warning"),
            Self::Info => write!(f, "info"),
        }
    }
}

/// A single validation diagnostic.
#[derive(Debug, Clone)]
pub struct Diagnostic {
    pub severity: Severity,
    /// Category: "syntax", "unknown-field", "type-error", "security", "sync"
    pub category: &'static str,
    /// Dotted path, e.g. "vault.kdf_iterations"
    pub path: String,
    pub message: String,
}

/// Result of validating a configuration.
#[derive(Debug, Clone, Default)]
pub struct ValidationResult {
    pub diagnostics: Vec<Diagnostic>,
    pub config_path: Option<PathBuf>,
}

impl ValidationResult {
    /// Returns `true` if any diagnostic is an error.
    #[must_use]
    pub fn has_errors(&self) -> bool {
        self.diagnostics
            .iter()
            .any(|d| d.severity == Severity::Error)
    }

    /// Count diagnostics by severity.
    #[must_use]
    pub fn count(&self, severity: Severity) -> usize {
        self.diagnostics
            .iter()
            .filter(|d| d.severity == severity)
            .count()
    }
}

/// Known keys per section.
const KNOWN_SECTIONS: &[(&str, &[&str])] = &[
    ("vault", &[
        "data_dir",
        "key_tag",
        "kdf_iterations",
        "keystore_path",
    ]),
    ("sync", &["enabled", "secondary_dir"]),
    ("biometrics", &["enabled"]),
];

/// Validate the config file at `path`, or the discovered one when `None`.
#[must_use]
pub fn validate(path: Option<&Path>) -> ValidationResult {
    let config_path = match path {
        Some(p) => Some(p.to_path_buf()),
        None => crate::loader::find_config_file(),
    };

    let Some(actual_path) = config_path else {
        return ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Info,
                category: "syntax",
                path: String::new(),
                message: "no config file found; using defaults".into(),
            }],
            config_path: None,
        };
    };

    let mut result = match crate::loader::load_config(&actual_path) {
        Ok(config) => {
            let mut result = validate_config(&config);
            if actual_path.extension().is_none_or(|ext| ext == "toml")
                && let Ok(raw) = std::fs::read_to_string(&actual_path)
                && let Ok(value) = toml::from_str::<toml::Value>(&raw)
            {
                check_unknown_fields(&value, &mut result.diagnostics);
            }
            result
        },
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "syntax",
                path: String::new(),
                message: e.to_string(),
            }],
            config_path: None,
        },
    };
    result.config_path = Some(actual_path);
    result
}

/// Validate a TOML string without touching the filesystem.
#[must_use]
pub fn validate_toml_str(toml_str: &str) -> ValidationResult {
    let value: toml::Value = match toml::from_str(toml_str) {
        Ok(v) => v,
        Err(e) => {
            return ValidationResult {
                diagnostics: vec![Diagnostic {
                    severity: Severity::Error,
                    category: "syntax",
                    path: String::new(),
                    message: format!("TOML syntax error: {e}"),
                }],
                config_path: None,
            };
        },
    };

    let mut result = match toml::from_str::<StrongboxConfig>(toml_str) {
        Ok(config) => validate_config(&config),
        Err(e) => ValidationResult {
            diagnostics: vec![Diagnostic {
                severity: Severity::Error,
                category: "type-error",
                path: String::new(),
                message: format!("type error: {e}"),
            }],
            config_path: None,
        },
    };
    check_unknown_fields(&value, &mut result.diagnostics);
    result
}

/// Semantic checks on a parsed config.
#[must_use]
pub fn validate_config(config: &StrongboxConfig) -> ValidationResult {
    let mut diagnostics = Vec::new();

    if config.vault.key_tag.trim().is_empty() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "type-error",
            path: "vault.key_tag".into(),
            message: "key tag must not be empty".into(),
        });
    }

    let iterations = config.vault.kdf_iterations;
    if iterations < MIN_ITERATIONS {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "security",
            path: "vault.kdf_iterations".into(),
            message: format!("{iterations} iterations is below the minimum of {MIN_ITERATIONS}"),
        });
    } else if iterations < DEFAULT_ITERATIONS {
        diagnostics.push(Diagnostic {
            severity: Severity::Warning,
            category: "security",
            path: "vault.kdf_iterations".into(),
            message: format!(
                "{iterations} iterations is below the recommended {DEFAULT_ITERATIONS}"
            ),
        });
    }

    if config.sync.enabled && config.sync.secondary_dir.is_none() {
        diagnostics.push(Diagnostic {
            severity: Severity::Error,
            category: "sync",
            path: "sync.secondary_dir".into(),
            message: "sync is enabled but no secondary directory is set".into(),
        });
    }
    if !config.sync.enabled && config.sync.secondary_dir.is_some() {
        diagnostics.push(Diagnostic {
            severity: Severity::Info,
            category: "sync",
            path: "sync.enabled".into(),
            message: "secondary directory is set but sync is disabled".into(),
        });
    }

    ValidationResult {
        diagnostics,
        config_path: None,
    }
}

fn check_unknown_fields(value: &toml::Value, diagnostics: &mut Vec<Diagnostic>) {
    let Some(table) = value.as_table() else {
        return;
    };
    for (section, body) in table {
        let Some((_, fields)) = KNOWN_SECTIONS.iter().find(|(name, _)| name == section) else {
            diagnostics.push(Diagnostic {
                severity: Severity::Error,
                category: "unknown-field",
                path: section.clone(),
                message: "unknown field at top level".into(),
            });
            continue;
        };
        let Some(body) = body.as_table() else {
            continue;
        };
        for key in body.keys() {
            if !fields.contains(&key.as_str()) {
                diagnostics.push(Diagnostic {
                    severity: Severity::Error,
                    category: "unknown-field",
                    path: format!("{section}.{key}"),
                    message: "unknown field".into(),
                });
            }
        }
    }
}

#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_clean() {
        let result = validate_config(&StrongboxConfig::default());
        assert!(result.diagnostics.is_empty(), "{:?}", result.diagnostics);
    }

    #[test]
    fn weak_kdf_is_an_error() {
        let result = validate_toml_str("[vault]\nkdf_iterations = 100\n");
        assert!(result.has_errors());
        assert_eq!(result.diagnostics[0].path, "vault.kdf_iterations");
    }

    #[test]
    fn low_but_allowed_kdf_warns() {
        let result = validate_toml_str("[vault]\nkdf_iterations = 100000\n");
        assert!(!result.has_errors());
        assert_eq!(result.count(Severity::Warning), 1);
    }

    #[test]
    fn sync_without_dir_is_an_error() {
        let result = validate_toml_str("[sync]\nenabled = true\n");
        assert!(result.has_errors());
    }

    #[test]
    fn empty_key_tag_is_an_error() {
        let result = validate_toml_str("[vault]\nkey_tag = \"  \"\n");
        assert!(result.has_errors());
    }

    #[test]
    fn unknown_fields_are_reported() {
        let result = validate_toml_str("[vault]\nkdf_iteration = 700000\n\n[extras]\n");
        let paths: Vec<&str> = result
            .diagnostics
            .iter()
            .filter(|d| d.category == "unknown-field")
            .map(|d| d.path.as_str())
            .collect();
        assert!(paths.contains(&"vault.kdf_iteration"));
        assert!(paths.contains(&"extras"));
    }

    #[test]
    fn syntax_error_short_circuits() {
        let result = validate_toml_str("[vault");
        assert_eq!(result.diagnostics.len(), 1);
        assert_eq!(result.diagnostics[0].category, "syntax");
    }

    #[test]
    fn validates_file_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("strongbox.toml");
        std::fs::write(&path, "[biometrics]\nenabled = true\nface = true\n").unwrap();

        let result = validate(Some(&path));
        assert_eq!(result.config_path.as_deref(), Some(path.as_path()));
        assert!(result.has_errors());
    }
}

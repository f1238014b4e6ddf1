use std::path::{Path, PathBuf};

use git2::Config;

use super::template::DEFAULT_TEMPLATE;
use crate::error::CoreError;
use crate::extract::{ExtractOptions, Pairing};

/// The `[promptledger]` section of a repository's Git config.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerConfig {
    pub enabled: bool,
    pub template_file: Option<PathBuf>,
    pub pairing: Pairing,
}

impl LedgerConfig {
    /// Read config from the repo's .git/config [promptledger] section.
    pub fn load(config: &Config) -> Result<Self, CoreError> {
        let pairing = match config.get_string("promptledger.pairing") {
            Ok(value) => value.parse()?,
            Err(_) => Pairing::default(),
        };
        Ok(Self {
            enabled: config.get_bool("promptledger.enabled").unwrap_or(false),
            template_file: config.get_path("promptledger.templateFile").ok(),
            pairing,
        })
    }

    /// Write config to the repo's .git/config [promptledger] section.
    pub fn save(&self, config: &mut Config) -> Result<(), CoreError> {
        config.set_bool("promptledger.enabled", self.enabled)?;
        if let Some(path) = &self.template_file {
            let path = path
                .to_str()
                .ok_or_else(|| CoreError::Config(format!("non UTF-8 template path {path:?}")))?;
            config.set_str("promptledger.templateFile", path)?;
        } else {
            match config.remove("promptledger.templateFile") {
                Ok(()) => {}
                Err(e) if e.code() == git2::ErrorCode::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        config.set_str("promptledger.pairing", self.pairing.as_str())?;
        Ok(())
    }

    /// Default config for `promptledger init`.
    pub fn default_init() -> Self {
        Self {
            enabled: true,
            template_file: None,
            pairing: Pairing::default(),
        }
    }

    /// Resolve into the immutable settings a ledger is constructed with.
    /// A relative `template_file` is resolved against `base_dir`.
    pub fn settings(&self, base_dir: Option<&Path>) -> Result<LedgerSettings, CoreError> {
        let default_template = match &self.template_file {
            Some(path) => {
                let path = match base_dir {
                    Some(base) if path.is_relative() => base.join(path),
                    _ => path.clone(),
                };
                std::fs::read_to_string(&path).map_err(|e| {
                    CoreError::Config(format!("cannot read template file {}: {e}", path.display()))
                })?
            }
            None => DEFAULT_TEMPLATE.to_string(),
        };
        Ok(LedgerSettings {
            default_template,
            extract: ExtractOptions {
                pairing: self.pairing,
            },
        })
    }
}

/// Construction-time settings of a [`crate::SessionLedger`]. Never mutated
/// after the ledger is built.
#[derive(Debug, Clone, PartialEq)]
pub struct LedgerSettings {
    /// Initial prompt for sessions created without a template.
    pub default_template: String,
    pub extract: ExtractOptions,
}

impl Default for LedgerSettings {
    fn default() -> Self {
        Self {
            default_template: DEFAULT_TEMPLATE.to_string(),
            extract: ExtractOptions::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_config_save_load_roundtrip() {
        let tmp = TempDir::new().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        let mut config = repo.config().unwrap();

        let loaded = LedgerConfig::load(&config).unwrap();
        assert!(!loaded.enabled);
        assert_eq!(loaded.pairing, Pairing::FirstMatch);

        let saved = LedgerConfig {
            enabled: true,
            template_file: Some(PathBuf::from("prompts/base.txt")),
            pairing: Pairing::Exclusive,
        };
        saved.save(&mut config).unwrap();

        let config = repo.config().unwrap();
        let loaded = LedgerConfig::load(&config).unwrap();
        assert_eq!(loaded, saved);
    }

    #[test]
    fn test_saving_default_clears_template_file() {
        let tmp = TempDir::new().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        let mut config = repo.config().unwrap();

        // Nothing to remove yet.
        LedgerConfig::default_init().save(&mut config).unwrap();

        LedgerConfig {
            template_file: Some(PathBuf::from("old.txt")),
            ..LedgerConfig::default_init()
        }
        .save(&mut config)
        .unwrap();
        LedgerConfig::default_init().save(&mut config).unwrap();

        let config = repo.config().unwrap();
        let loaded = LedgerConfig::load(&config).unwrap();
        assert_eq!(loaded.template_file, None);
        assert_eq!(loaded, LedgerConfig::default_init());
    }

    #[test]
    fn test_invalid_pairing_is_config_error() {
        let tmp = TempDir::new().unwrap();
        let repo = git2::Repository::init(tmp.path()).unwrap();
        let mut config = repo.config().unwrap();
        config.set_str("promptledger.pairing", "random").unwrap();
        let config = repo.config().unwrap();
        assert!(matches!(
            LedgerConfig::load(&config),
            Err(CoreError::Config(_))
        ));
    }

    #[test]
    fn test_settings_reads_relative_template_file() {
        let tmp = TempDir::new().unwrap();
        std::fs::write(tmp.path().join("base.txt"), "You are terse.").unwrap();
        let config = LedgerConfig {
            enabled: true,
            template_file: Some(PathBuf::from("base.txt")),
            pairing: Pairing::Exclusive,
        };
        let settings = config.settings(Some(tmp.path())).unwrap();
        assert_eq!(settings.default_template, "You are terse.");
        assert_eq!(settings.extract.pairing, Pairing::Exclusive);
    }

    #[test]
    fn test_settings_missing_template_file() {
        let config = LedgerConfig {
            template_file: Some(PathBuf::from("/nonexistent/promptledger/base.txt")),
            ..LedgerConfig::default_init()
        };
        assert!(config.settings(None).is_err());
    }

    #[test]
    fn test_default_settings_use_builtin_template() {
        let settings = LedgerConfig::default_init().settings(None).unwrap();
        assert_eq!(settings, LedgerSettings::default());
    }
}

//! Core runtime configuration.
//!
//! # Responsibility
//! - Load database, logging and ordering settings from a JSON document.
//! - Reject settings core cannot run with before anything is opened.
//!
//! # Invariants
//! - Missing fields take defaults; unknown fields are ignored.
//! - A validated config always yields a usable `KeySpace`.

use crate::logging::{default_log_level, normalize_level};
use crate::ordering::{KeySpace, KeySpaceError, OrderKey, DEFAULT_BASELINE, DEFAULT_SPACING};
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_DB_FILE: &str = "trellis.sqlite3";

#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(serde_json::Error),
    Invalid { field: &'static str, message: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config json: {err}"),
            Self::Invalid { field, message } => write!(f, "invalid config `{field}`: {message}"),
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::Invalid { .. } => None,
        }
    }
}

impl From<serde_json::Error> for ConfigError {
    fn from(value: serde_json::Error) -> Self {
        Self::Parse(value)
    }
}

/// Order key policy section.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderingConfig {
    pub baseline: OrderKey,
    pub spacing: OrderKey,
}

impl Default for OrderingConfig {
    fn default() -> Self {
        Self {
            baseline: DEFAULT_BASELINE,
            spacing: DEFAULT_SPACING,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub db_path: PathBuf,
    pub log_level: String,
    /// Absolute directory for rolling log files; logging stays off when unset.
    pub log_dir: Option<PathBuf>,
    pub ordering: OrderingConfig,
}

impl Default for CoreConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(DEFAULT_DB_FILE),
            log_level: default_log_level().to_string(),
            log_dir: None,
            ordering: OrderingConfig::default(),
        }
    }
}

impl CoreConfig {
    /// Parses and validates a JSON document.
    pub fn from_json_str(value: &str) -> Result<Self, ConfigError> {
        let config: Self = serde_json::from_str(value)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a JSON config file.
    pub fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&content)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.db_path.as_os_str().is_empty() {
            return Err(ConfigError::Invalid {
                field: "db_path",
                message: "must not be empty".to_string(),
            });
        }
        normalize_level(&self.log_level).map_err(|err| ConfigError::Invalid {
            field: "log_level",
            message: err.to_string(),
        })?;
        if let Some(log_dir) = &self.log_dir {
            if !log_dir.is_absolute() {
                return Err(ConfigError::Invalid {
                    field: "log_dir",
                    message: format!("must be an absolute path, got `{}`", log_dir.display()),
                });
            }
        }
        self.key_space().map_err(|err| ConfigError::Invalid {
            field: "ordering",
            message: err.to_string(),
        })?;
        Ok(())
    }

    pub fn key_space(&self) -> Result<KeySpace, KeySpaceError> {
        KeySpace::new(self.ordering.baseline, self.ordering.spacing)
    }
}

#[cfg(test)]
mod tests {
    use super::{ConfigError, CoreConfig};
    use std::io::Write;
    use std::path::Path;

    #[test]
    fn empty_document_takes_defaults() {
        let config = CoreConfig::from_json_str("{}").unwrap();
        assert_eq!(config, CoreConfig::default());
        assert_eq!(config.key_space().unwrap().spacing(), 1.0);
    }

    #[test]
    fn partial_ordering_section_keeps_other_default() {
        let config =
            CoreConfig::from_json_str(r#"{"ordering": {"spacing": 1024.0}, "extra": 1}"#).unwrap();
        assert_eq!(config.ordering.baseline, 1.0);
        assert_eq!(config.key_space().unwrap().spacing(), 1024.0);
    }

    #[test]
    fn rejects_non_positive_spacing() {
        let err = CoreConfig::from_json_str(r#"{"ordering": {"spacing": 0}}"#).unwrap_err();
        assert!(matches!(
            err,
            ConfigError::Invalid {
                field: "ordering",
                ..
            }
        ));
    }

    #[test]
    fn rejects_relative_log_dir_and_unknown_level() {
        let relative = CoreConfig::from_json_str(r#"{"log_dir": "logs"}"#).unwrap_err();
        assert!(matches!(
            relative,
            ConfigError::Invalid {
                field: "log_dir",
                ..
            }
        ));

        let level = CoreConfig::from_json_str(r#"{"log_level": "loud"}"#).unwrap_err();
        assert!(matches!(
            level,
            ConfigError::Invalid {
                field: "log_level",
                ..
            }
        ));
    }

    #[test]
    fn from_path_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"db_path": "/tmp/boards.sqlite3"}}"#).unwrap();

        let config = CoreConfig::from_path(file.path()).unwrap();
        assert_eq!(config.db_path, Path::new("/tmp/boards.sqlite3"));
    }

    #[test]
    fn from_path_reports_missing_file() {
        let err = CoreConfig::from_path(Path::new("/nonexistent/trellis.json")).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }
}

//! Process settings: optional YAML file, then `GAFFER_*` environment overrides.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::data::player::DEFAULT_PLAYERS_PATH;
use crate::logging::LoggingConfig;

pub const CONFIG_PATH_ENV: &str = "GAFFER_CONFIG";
pub const DEFAULT_CONFIG_PATH: &str = "gaffer.yaml";
pub const DEFAULT_BIND: &str = "127.0.0.1:3000";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    ReadFile {
        path: String,
        #[source]
        source: io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("invalid value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },
}

fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

fn default_players_path() -> PathBuf {
    PathBuf::from(DEFAULT_PLAYERS_PATH)
}

fn default_job_ttl_secs() -> u64 {
    60 * 60
}

fn default_eviction_interval_secs() -> u64 {
    60
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(default = "default_bind")]
    pub bind: String,
    #[serde(default = "default_players_path")]
    pub players_path: PathBuf,
    /// How long finished jobs stay queryable.
    #[serde(default = "default_job_ttl_secs")]
    pub job_ttl_secs: u64,
    #[serde(default = "default_eviction_interval_secs")]
    pub eviction_interval_secs: u64,
    /// Scoring threads per job; 0 uses every core.
    #[serde(default)]
    pub workers: usize,
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            players_path: default_players_path(),
            job_ttl_secs: default_job_ttl_secs(),
            eviction_interval_secs: default_eviction_interval_secs(),
            workers: 0,
            logging: LoggingConfig::default(),
        }
    }
}

impl Settings {
    /// Settings for this process: the file named by `GAFFER_CONFIG` (default `gaffer.yaml`,
    /// silently skipped when absent) with environment overrides applied.
    pub fn from_env() -> Result<Self, ConfigError> {
        let path = std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        let mut settings = Self::load(&path)?;
        settings.apply_overrides(|key| std::env::var(key).ok())?;
        settings.validate()?;
        Ok(settings)
    }

    /// Read a YAML settings file. A missing file yields defaults.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = match fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) if err.kind() == io::ErrorKind::NotFound => return Ok(Self::default()),
            Err(source) => {
                return Err(ConfigError::ReadFile {
                    path: path.display().to_string(),
                    source,
                })
            }
        };
        Self::parse(&raw).map_err(|source| ConfigError::Parse {
            path: path.display().to_string(),
            source,
        })
    }

    pub fn parse(raw: &str) -> Result<Self, serde_yaml::Error> {
        if raw.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(raw)
    }

    /// Apply `GAFFER_BIND`, `GAFFER_PLAYERS`, `GAFFER_JOB_TTL_SECS` and `GAFFER_LOG`.
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(bind) = lookup("GAFFER_BIND") {
            self.bind = bind;
        }
        if let Some(path) = lookup("GAFFER_PLAYERS") {
            self.players_path = PathBuf::from(path);
        }
        if let Some(ttl) = lookup("GAFFER_JOB_TTL_SECS") {
            self.job_ttl_secs = ttl.trim().parse().map_err(|_| ConfigError::InvalidValue {
                field: "job_ttl_secs",
                reason: format!("'{ttl}' is not a whole number of seconds"),
            })?;
        }
        if let Some(level) = lookup("GAFFER_LOG") {
            self.logging.level = level;
        }
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bind.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "bind",
                reason: "must not be empty".to_string(),
            });
        }
        if self.eviction_interval_secs == 0 {
            return Err(ConfigError::InvalidValue {
                field: "eviction_interval_secs",
                reason: "must be at least 1".to_string(),
            });
        }
        if !matches!(self.logging.format.as_str(), "pretty" | "json") {
            return Err(ConfigError::InvalidValue {
                field: "logging.format",
                reason: format!("expected 'pretty' or 'json', got '{}'", self.logging.format),
            });
        }
        Ok(())
    }

    pub fn job_ttl(&self) -> Duration {
        Duration::from_secs(self.job_ttl_secs)
    }

    pub fn eviction_interval(&self) -> Duration {
        Duration::from_secs(self.eviction_interval_secs)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let settings = Settings::load(dir.path().join("absent.yaml")).expect("defaults");
        assert_eq!(settings, Settings::default());
        assert_eq!(settings.bind, DEFAULT_BIND);
        assert_eq!(settings.job_ttl(), Duration::from_secs(3600));
    }

    #[test]
    fn partial_yaml_keeps_other_defaults() {
        let settings = Settings::parse("bind: 0.0.0.0:8080\nlogging:\n  format: json\n").expect("parses");
        assert_eq!(settings.bind, "0.0.0.0:8080");
        assert_eq!(settings.logging.format, "json");
        assert_eq!(settings.logging.level, "info");
        assert_eq!(settings.players_path, PathBuf::from(DEFAULT_PLAYERS_PATH));
    }

    #[test]
    fn malformed_yaml_is_an_error() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("gaffer.yaml");
        fs::write(&path, "job_ttl_secs: [not, a, number]\n").expect("write");
        assert!(matches!(Settings::load(&path), Err(ConfigError::Parse { .. })));
    }

    #[test]
    fn environment_overrides_win() {
        let env: HashMap<&str, &str> = [
            ("GAFFER_BIND", "0.0.0.0:9000"),
            ("GAFFER_PLAYERS", "/tmp/players.json"),
            ("GAFFER_JOB_TTL_SECS", "120"),
            ("GAFFER_LOG", "debug"),
        ]
        .into_iter()
        .collect();
        let mut settings = Settings::default();
        settings
            .apply_overrides(|key| env.get(key).map(|value| value.to_string()))
            .expect("valid overrides");
        assert_eq!(settings.bind, "0.0.0.0:9000");
        assert_eq!(settings.players_path, PathBuf::from("/tmp/players.json"));
        assert_eq!(settings.job_ttl_secs, 120);
        assert_eq!(settings.logging.level, "debug");
    }

    #[test]
    fn bad_ttl_override_is_rejected() {
        let mut settings = Settings::default();
        let err = settings
            .apply_overrides(|key| (key == "GAFFER_JOB_TTL_SECS").then(|| "soon".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidValue { field: "job_ttl_secs", .. }));
    }

    #[test]
    fn unknown_log_format_fails_validation() {
        let mut settings = Settings::default();
        settings.logging.format = "xml".to_string();
        assert!(settings.validate().is_err());
    }
}

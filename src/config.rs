use crate::rules::ReferencePolicy;
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
    #[error("{key} has invalid value '{value}': {reason}")]
    InvalidValue {
        key: &'static str,
        value: String,
        reason: String,
    },
}

/// Session settings.
///
/// | Env Var                          | Default  |
/// |----------------------------------|----------|
/// | `ALCHEMIST_MIN_CONFIDENCE`       | `0.8`    |
/// | `ALCHEMIST_TRANSLATOR_TIMEOUT_MS`| `10000`  |
/// | `ALCHEMIST_REFERENCE_POLICY`     | `strict` |
/// | `ALCHEMIST_EXPORT_VERSION`       | `1.0`    |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AlchemistConfig {
    /// Change proposals at or below this confidence are dropped.
    pub min_confidence: f64,
    #[serde(rename = "translatorTimeoutMs", with = "millis")]
    pub translator_timeout: Duration,
    pub reference_policy: ReferencePolicy,
    pub export_version: String,
}

impl Default for AlchemistConfig {
    fn default() -> Self {
        Self {
            min_confidence: 0.8,
            translator_timeout: Duration::from_secs(10),
            reference_policy: ReferencePolicy::Strict,
            export_version: "1.0".to_string(),
        }
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

impl AlchemistConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let config: Self = serde_json::from_reader(file).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Applies any `ALCHEMIST_*` variables set in the process environment.
    pub fn with_env(self) -> Result<Self, ConfigError> {
        self.overridden_by(|key| std::env::var(key).ok())
    }

    /// Applies overrides from `lookup`, which maps a variable name to its value.
    pub fn overridden_by<F>(mut self, lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup("ALCHEMIST_MIN_CONFIDENCE") {
            self.min_confidence = raw.trim().parse().map_err(|e: std::num::ParseFloatError| {
                ConfigError::InvalidValue {
                    key: "ALCHEMIST_MIN_CONFIDENCE",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
        }
        if let Some(raw) = lookup("ALCHEMIST_TRANSLATOR_TIMEOUT_MS") {
            let millis: u64 = raw.trim().parse().map_err(|e: std::num::ParseIntError| {
                ConfigError::InvalidValue {
                    key: "ALCHEMIST_TRANSLATOR_TIMEOUT_MS",
                    value: raw.clone(),
                    reason: e.to_string(),
                }
            })?;
            self.translator_timeout = Duration::from_millis(millis);
        }
        if let Some(raw) = lookup("ALCHEMIST_REFERENCE_POLICY") {
            self.reference_policy = raw.parse().map_err(|reason| ConfigError::InvalidValue {
                key: "ALCHEMIST_REFERENCE_POLICY",
                value: raw.clone(),
                reason,
            })?;
        }
        if let Some(raw) = lookup("ALCHEMIST_EXPORT_VERSION") {
            self.export_version = raw.trim().to_string();
        }
        self.validate()?;
        Ok(self)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.min_confidence.is_finite() || !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(ConfigError::InvalidValue {
                key: "minConfidence",
                value: self.min_confidence.to_string(),
                reason: "must be between 0 and 1".to_string(),
            });
        }
        if self.translator_timeout.is_zero() {
            return Err(ConfigError::InvalidValue {
                key: "translatorTimeoutMs",
                value: "0".to_string(),
                reason: "must be positive".to_string(),
            });
        }
        if self.export_version.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                key: "exportVersion",
                value: self.export_version.clone(),
                reason: "must not be blank".to_string(),
            });
        }
        Ok(())
    }
}

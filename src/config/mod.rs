//! Configuration management.
//!
//! Configuration is layered: built-in defaults, then a TOML file, then
//! `COMPOUND_*` environment overrides.
//!
//! # File discovery
//!
//! When no explicit path is given, the first existing file wins:
//! 1. `./.compound/config.toml`
//! 2. Platform config dir (`~/.config/compound/config.toml` on Linux)
//!
//! # Environment Variables
//!
//! | Variable | Section | Description |
//! |----------|---------|-------------|
//! | `COMPOUND_STORAGE_BACKEND` | `storage.backend` | `sqlite`, `filesystem` or `memory` |
//! | `COMPOUND_DATA_DIR` | `storage.data_dir` | Data directory |
//! | `COMPOUND_DEDUP_THRESHOLD` | `deduplication.similarity_threshold` | Near-duplicate threshold |
//! | `COMPOUND_DEDUP_MAX_COMPARISONS` | `deduplication.max_comparison_set` | Comparison set cap |
//! | `COMPOUND_DEDUP_MAX_RETRIES` | `deduplication.max_retries` | Conflict retry budget |
//! | `COMPOUND_PROMOTION_THRESHOLD` | `promotion.threshold` | Cluster total for promotion |
//! | `COMPOUND_MIN_CONFIDENCE` | `classifier.min_confidence` | Classification floor |
//! | `COMPOUND_SEARCH_LIMIT` | `retrieval.default_limit` | Default result count |
//!
//! Logging and metrics overrides are read by [`crate::observability`].

use crate::services::classifier::ClassifierConfig;
use crate::services::deduplication::DeduplicationConfig;
use crate::services::extraction::ExtractionConfig;
use crate::services::promotion::PromotionConfig;
use crate::services::retrieval::RetrievalConfig;
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;

/// Application directory name under platform config/data dirs.
const APP_DIR: &str = "compound";

/// Project-local directory name.
pub const LOCAL_DIR: &str = ".compound";

/// Config file name.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// Main configuration for compound.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CompoundConfig {
    /// Storage backend selection.
    pub storage: StorageConfig,
    /// Extraction limits.
    pub extraction: ExtractionConfig,
    /// Classifier weights and extra lexicon.
    pub classifier: ClassifierConfig,
    /// Near-duplicate detection.
    pub deduplication: DeduplicationConfig,
    /// Critical pattern promotion.
    pub promotion: PromotionConfig,
    /// Search ranking.
    pub retrieval: RetrievalConfig,
    /// Logging and metrics.
    pub observability: ObservabilitySettings,
}

/// Available storage backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    /// `SQLite` database file.
    #[default]
    Sqlite,
    /// Markdown documents on disk.
    Filesystem,
    /// In-process only; nothing survives the process.
    Memory,
}

impl StorageBackend {
    /// Returns the backend name.
    #[must_use]
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Sqlite => "sqlite",
            Self::Filesystem => "filesystem",
            Self::Memory => "memory",
        }
    }
}

impl FromStr for StorageBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "sqlite" => Ok(Self::Sqlite),
            "filesystem" | "fs" | "markdown" => Ok(Self::Filesystem),
            "memory" | "mem" => Ok(Self::Memory),
            other => Err(Error::InvalidInput(format!("unknown storage backend: {other}"))),
        }
    }
}

impl fmt::Display for StorageBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Storage configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Which backend to open.
    pub backend: StorageBackend,
    /// Data directory; the platform data dir when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<PathBuf>,
}

impl StorageConfig {
    /// Returns the configured data directory, or the default one.
    #[must_use]
    pub fn resolved_data_dir(&self) -> PathBuf {
        self.data_dir.clone().unwrap_or_else(default_data_dir)
    }
}

/// Returns the platform data directory, falling back to `./.compound`.
#[must_use]
pub fn default_data_dir() -> PathBuf {
    directories::BaseDirs::new().map_or_else(
        || PathBuf::from(LOCAL_DIR),
        |dirs| dirs.data_dir().join(APP_DIR),
    )
}

/// Observability section of the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ObservabilitySettings {
    /// Logging settings.
    pub logging: LoggingSettings,
    /// Metrics settings.
    pub metrics: MetricsSettings,
}

/// Logging settings from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSettings {
    /// Output format: `pretty` or `json`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
    /// `EnvFilter` directive, e.g. `compound=debug`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    /// Append logs to this file instead of stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// Metrics settings from the config file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsSettings {
    /// Whether the Prometheus recorder is installed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    /// Port of the Prometheus HTTP listener.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub port: Option<u16>,
}

impl CompoundConfig {
    /// Creates a new configuration with default values.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads configuration: defaults, then a file, then the environment.
    ///
    /// An explicit path must exist; otherwise the discovered file (if any)
    /// is used.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed, or if an
    /// environment override or the resulting configuration is invalid.
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let path = match explicit {
            Some(path) => Some(path.to_path_buf()),
            None => Self::discover(),
        };

        let mut config = match path {
            Some(path) => {
                tracing::debug!(path = %path.display(), "Loading config file");
                Self::load_from_file(&path)?
            },
            None => Self::default(),
        };
        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a file path.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| Error::operation("read_config_file", format!("{}: {e}", path.display())))?;
        Self::from_toml(&contents)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns an error if the text is not valid configuration TOML.
    pub fn from_toml(contents: &str) -> Result<Self> {
        toml::from_str(contents).map_err(|e| Error::operation("parse_config_file", e))
    }

    /// Renders the configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails.
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::operation("serialize_config", e))
    }

    /// Returns the first existing config file in discovery order.
    #[must_use]
    pub fn discover() -> Option<PathBuf> {
        let local = PathBuf::from(LOCAL_DIR).join(CONFIG_FILE_NAME);
        if local.is_file() {
            return Some(local);
        }

        let platform = directories::BaseDirs::new()?
            .config_dir()
            .join(APP_DIR)
            .join(CONFIG_FILE_NAME);
        platform.is_file().then_some(platform)
    }

    /// Applies `COMPOUND_*` overrides read through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] if a value cannot be parsed.
    pub fn apply_overrides(&mut self, lookup: impl Fn(&str) -> Option<String>) -> Result<()> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        if let Some(backend) = get("COMPOUND_STORAGE_BACKEND") {
            self.storage.backend = backend.parse()?;
        }
        if let Some(dir) = get("COMPOUND_DATA_DIR") {
            self.storage.data_dir = Some(PathBuf::from(dir));
        }
        if let Some(v) = get("COMPOUND_DEDUP_THRESHOLD") {
            self.deduplication.similarity_threshold = parse_env("COMPOUND_DEDUP_THRESHOLD", &v)?;
        }
        if let Some(v) = get("COMPOUND_DEDUP_MAX_COMPARISONS") {
            self.deduplication.max_comparison_set = parse_env("COMPOUND_DEDUP_MAX_COMPARISONS", &v)?;
        }
        if let Some(v) = get("COMPOUND_DEDUP_MAX_RETRIES") {
            self.deduplication.max_retries = parse_env("COMPOUND_DEDUP_MAX_RETRIES", &v)?;
        }
        if let Some(v) = get("COMPOUND_PROMOTION_THRESHOLD") {
            self.promotion.threshold = parse_env("COMPOUND_PROMOTION_THRESHOLD", &v)?;
        }
        if let Some(v) = get("COMPOUND_MIN_CONFIDENCE") {
            self.classifier.min_confidence = parse_env("COMPOUND_MIN_CONFIDENCE", &v)?;
        }
        if let Some(v) = get("COMPOUND_SEARCH_LIMIT") {
            self.retrieval.default_limit = parse_env("COMPOUND_SEARCH_LIMIT", &v)?;
        }
        Ok(())
    }

    /// Checks value ranges.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] naming the first invalid value.
    pub fn validate(&self) -> Result<()> {
        let unit = [
            ("deduplication.similarity_threshold", self.deduplication.similarity_threshold),
            ("deduplication.symptom_weight", self.deduplication.symptom_weight),
            ("deduplication.token_weight", self.deduplication.token_weight),
        ];
        for (name, value) in unit {
            if !(0.0..=1.0).contains(&value) {
                return Err(Error::InvalidInput(format!("{name} must be within 0..=1, got {value}")));
            }
        }
        if self.promotion.threshold == 0 {
            return Err(Error::InvalidInput("promotion.threshold must be at least 1".to_string()));
        }
        if self.deduplication.max_comparison_set == 0 {
            return Err(Error::InvalidInput(
                "deduplication.max_comparison_set must be at least 1".to_string(),
            ));
        }
        if self.retrieval.half_life_days <= 0.0 {
            return Err(Error::InvalidInput(
                "retrieval.half_life_days must be positive".to_string(),
            ));
        }
        Ok(())
    }

    /// Sets the storage backend.
    #[must_use]
    pub const fn with_backend(mut self, backend: StorageBackend) -> Self {
        self.storage.backend = backend;
        self
    }

    /// Sets the data directory.
    #[must_use]
    pub fn with_data_dir(mut self, path: impl Into<PathBuf>) -> Self {
        self.storage.data_dir = Some(path.into());
        self
    }
}

fn parse_env<T: FromStr>(key: &str, value: &str) -> Result<T>
where
    T::Err: fmt::Display,
{
    value
        .parse()
        .map_err(|e| Error::InvalidInput(format!("{key}={value}: {e}")))
}

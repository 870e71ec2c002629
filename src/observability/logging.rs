//! Structured logging configuration.

use crate::config::LoggingSettings;
use std::path::PathBuf;

/// Filter used when nothing else is configured.
pub const DEFAULT_FILTER: &str = "compound=info";

/// Filter used for `--verbose`.
pub const VERBOSE_FILTER: &str = "compound=debug";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    /// Human-readable multi-line output.
    #[default]
    Pretty,
    /// One JSON object per event.
    Json,
}

impl LogFormat {
    /// Parses a format name; unknown names fall back to pretty.
    #[must_use]
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "json" => Self::Json,
            _ => Self::Pretty,
        }
    }
}

/// Resolved logging configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoggingConfig {
    /// Output format.
    pub format: LogFormat,
    /// `EnvFilter` directive.
    pub filter: String,
    /// Append to this file instead of writing to stderr.
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Pretty,
            filter: DEFAULT_FILTER.to_string(),
            file: None,
        }
    }
}

impl LoggingConfig {
    /// Builds logging configuration from config settings with env overrides.
    #[must_use]
    pub fn from_settings(settings: &LoggingSettings, verbose: bool) -> Self {
        Self::from_sources(settings, verbose, |key| std::env::var(key).ok())
    }

    /// Resolves the configuration from settings and an environment lookup.
    ///
    /// Filter precedence: `COMPOUND_LOG`, `RUST_LOG`, `--verbose`, the
    /// config file, then [`DEFAULT_FILTER`].
    pub fn from_sources(
        settings: &LoggingSettings,
        verbose: bool,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let env = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let filter = env("COMPOUND_LOG")
            .or_else(|| env("RUST_LOG"))
            .or_else(|| verbose.then(|| VERBOSE_FILTER.to_string()))
            .or_else(|| settings.filter.clone())
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());

        let format = env("COMPOUND_LOG_FORMAT")
            .or_else(|| settings.format.clone())
            .map_or_else(LogFormat::default, |f| LogFormat::parse(&f));

        let file = env("COMPOUND_LOG_FILE")
            .map(PathBuf::from)
            .or_else(|| settings.file.clone());

        Self {
            format,
            filter,
            file,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn resolve(settings: &LoggingSettings, verbose: bool, env: &[(&str, &str)]) -> LoggingConfig {
        let env: HashMap<String, String> = env
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        LoggingConfig::from_sources(settings, verbose, |k| env.get(k).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = resolve(&LoggingSettings::default(), false, &[]);
        assert_eq!(config, LoggingConfig::default());
    }

    #[test]
    fn test_filter_precedence() {
        let settings = LoggingSettings {
            filter: Some("compound=warn".to_string()),
            ..LoggingSettings::default()
        };
        assert_eq!(resolve(&settings, false, &[]).filter, "compound=warn");
        assert_eq!(resolve(&settings, true, &[]).filter, VERBOSE_FILTER);
        assert_eq!(
            resolve(&settings, true, &[("RUST_LOG", "trace")]).filter,
            "trace"
        );
        assert_eq!(
            resolve(&settings, true, &[("RUST_LOG", "trace"), ("COMPOUND_LOG", "compound=error")])
                .filter,
            "compound=error"
        );
    }

    #[test]
    fn test_format_and_file() {
        let settings = LoggingSettings {
            format: Some("JSON".to_string()),
            file: Some(PathBuf::from("/tmp/a.log")),
            ..LoggingSettings::default()
        };
        let config = resolve(&settings, false, &[("COMPOUND_LOG_FILE", "/tmp/b.log")]);
        assert_eq!(config.format, LogFormat::Json);
        assert_eq!(config.file, Some(PathBuf::from("/tmp/b.log")));
        assert_eq!(LogFormat::parse("nonsense"), LogFormat::Pretty);
    }
}

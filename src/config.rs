//! Persistent configuration handling for Copy Code Cleaner.
//!
//! Reads configuration from a JSON file:
//! `~/.config/copy-code-cleaner/config.json`.
//!
//! This is the static part of the setup (log level, selector sets, timings). The two user
//! toggles live in the settings store, see [`crate::settings`].

use std::fs;
use std::io;
use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;
use tracing::{debug, warn};

use crate::paths;

pub const DEFAULT_CODE_SELECTORS: &str =
    r#"pre, code, .code-block, .highlight, div[class*="code"]"#;
pub const DEFAULT_NOISE_SELECTORS: &str =
    r#".toolbar, .line-number, .copy-button, [aria-hidden="true"]"#;
pub const DEFAULT_MIN_TEXT_LEN: usize = 10;
pub const DEFAULT_BUTTON_LABEL: &str = "Copy Clean";
pub const DEFAULT_FEEDBACK_MS: u64 = 1500;
pub const DEFAULT_DEBOUNCE_MS: u64 = 500;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("No config directory available on this platform")]
    NoConfigDir,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogLevel {
    Error,
    Warn,
    #[default]
    Info,
    Debug,
    Trace,
}

impl LogLevel {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ERROR" => Some(Self::Error),
            "WARN" | "WARNING" => Some(Self::Warn),
            "INFO" => Some(Self::Info),
            "DEBUG" => Some(Self::Debug),
            "TRACE" => Some(Self::Trace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Error => "ERROR",
            Self::Warn => "WARN",
            Self::Info => "INFO",
            Self::Debug => "DEBUG",
            Self::Trace => "TRACE",
        }
    }
}

#[derive(Debug, Deserialize, Default)]
struct RawConfig {
    #[serde(default)]
    log_level: Option<String>,
    #[serde(default)]
    code_selectors: Option<String>,
    #[serde(default)]
    noise_selectors: Option<String>,
    #[serde(default)]
    min_text_len: Option<usize>,
    #[serde(default)]
    button_label: Option<String>,
    #[serde(default)]
    feedback_ms: Option<u64>,
    #[serde(default)]
    debounce_ms: Option<u64>,
}

/// Effective configuration with every default filled in.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppConfig {
    pub log_level: LogLevel,
    /// Elements that may hold code. Heuristic; over- and under-matching is expected.
    pub code_selectors: String,
    /// Descendants dropped before reading a block's text.
    pub noise_selectors: String,
    /// Blocks whose trimmed text is this long or shorter get no button.
    pub min_text_len: usize,
    pub button_label: String,
    pub feedback_delay: Duration,
    pub debounce_delay: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self::from(RawConfig::default())
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.trim().is_empty())
}

impl From<RawConfig> for AppConfig {
    fn from(raw: RawConfig) -> Self {
        Self {
            log_level: raw
                .log_level
                .as_deref()
                .and_then(LogLevel::from_str)
                .unwrap_or_default(),
            code_selectors: non_empty(raw.code_selectors)
                .unwrap_or_else(|| DEFAULT_CODE_SELECTORS.to_string()),
            noise_selectors: non_empty(raw.noise_selectors)
                .unwrap_or_else(|| DEFAULT_NOISE_SELECTORS.to_string()),
            min_text_len: raw.min_text_len.unwrap_or(DEFAULT_MIN_TEXT_LEN),
            button_label: non_empty(raw.button_label)
                .unwrap_or_else(|| DEFAULT_BUTTON_LABEL.to_string()),
            feedback_delay: Duration::from_millis(raw.feedback_ms.unwrap_or(DEFAULT_FEEDBACK_MS)),
            debounce_delay: Duration::from_millis(raw.debounce_ms.unwrap_or(DEFAULT_DEBOUNCE_MS)),
        }
    }
}

fn load_raw_config_from(path: &Path) -> Result<RawConfig, ConfigError> {
    if !path.exists() {
        debug!(?path, "Config file does not exist, using defaults");
        return Ok(RawConfig::default());
    }

    let data = fs::read_to_string(path)?;
    let cfg = serde_json::from_str(&data)?;
    debug!(?path, "Config loaded");
    Ok(cfg)
}

/// Loads the config at `path`; a missing file yields the defaults.
pub fn load_config_from(path: &Path) -> Result<AppConfig, ConfigError> {
    load_raw_config_from(path).map(AppConfig::from)
}

/// Loads the user config, falling back to defaults when it is missing or unreadable.
pub fn load_config() -> AppConfig {
    let Some(path) = paths::get_config_path() else {
        debug!("No config_dir available, using defaults only");
        return AppConfig::default();
    };

    match load_config_from(&path) {
        Ok(cfg) => cfg,
        Err(err) => {
            // Logging may not be initialised yet, the log level comes from this file.
            eprintln!("Config: failed to load {}, using defaults: {err}", path.display());
            warn!(error = ?err, "Failed to load config, using defaults");
            AppConfig::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_file_gives_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = load_config_from(&dir.path().join("config.json")).unwrap();
        assert_eq!(cfg, AppConfig::default());
        assert_eq!(cfg.code_selectors, DEFAULT_CODE_SELECTORS);
        assert_eq!(cfg.min_text_len, 10);
        assert_eq!(cfg.feedback_delay, Duration::from_millis(1500));
        assert_eq!(cfg.debounce_delay, Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{"log_level": "debug", "code_selectors": "pre", "noise_selectors": "  "}"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(cfg.log_level, LogLevel::Debug);
        assert_eq!(cfg.code_selectors, "pre");
        assert_eq!(cfg.noise_selectors, DEFAULT_NOISE_SELECTORS);
        assert_eq!(cfg.button_label, DEFAULT_BUTTON_LABEL);
    }

    #[test]
    fn test_full_file_overrides_every_default() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(
            &path,
            r#"{
                "log_level": "trace",
                "code_selectors": ".highlight pre",
                "noise_selectors": ".gutter",
                "min_text_len": 3,
                "button_label": "Copy",
                "feedback_ms": 200,
                "debounce_ms": 50
            }"#,
        )
        .unwrap();

        let cfg = load_config_from(&path).unwrap();
        assert_eq!(
            cfg,
            AppConfig {
                log_level: LogLevel::Trace,
                code_selectors: ".highlight pre".to_string(),
                noise_selectors: ".gutter".to_string(),
                min_text_len: 3,
                button_label: "Copy".to_string(),
                feedback_delay: Duration::from_millis(200),
                debounce_delay: Duration::from_millis(50),
            }
        );
    }

    #[test]
    fn test_invalid_json_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, "{not json").unwrap();
        assert!(matches!(load_config_from(&path), Err(ConfigError::Json(_))));
    }

    #[test]
    fn test_log_level_parsing() {
        assert_eq!(LogLevel::from_str("warning"), Some(LogLevel::Warn));
        assert_eq!(LogLevel::from_str("nope"), None);
        assert_eq!(LogLevel::Debug.as_str(), "DEBUG");
    }
}

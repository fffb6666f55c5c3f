// Runtime settings: built-in defaults, then an optional TOML file, then CLI
// flags. The file lives at `<config_dir>/vortexai/config.toml` unless
// `--config` points elsewhere.

use crate::credential::DEFAULT_KEY_FILE;
use crate::error::{Result, VortexError};
use crate::prompt::DEFAULT_MAX_INPUT_BYTES;
use crate::ui::Palette;
use serde::Deserialize;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_ENDPOINT: &str = "https://generativelanguage.googleapis.com/v1beta";
pub const DEFAULT_MODEL: &str = "gemini-2.0-flash";

/// How the log file is opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogMode {
    #[default]
    Overwrite,
    Append,
}

/// Shape of `config.toml`. Every key is optional.
#[derive(Debug, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileConfig {
    pub endpoint: Option<String>,
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub initial_backoff_ms: Option<u64>,
    pub max_backoff_ms: Option<u64>,
    pub max_input_bytes: Option<usize>,
    pub log_mode: Option<LogMode>,
    pub credential_file: Option<PathBuf>,
    #[serde(default)]
    pub colors: HashMap<String, String>,
}

impl FileConfig {
    pub fn parse(text: &str) -> Result<Self> {
        toml::from_str(text).map_err(|e| VortexError::Config(e.to_string()))
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .map_err(|e| VortexError::Config(format!("cannot read '{}': {e}", path.display())))?;
        Self::parse(&text)
    }
}

/// Values from the command line that override the file.
#[derive(Debug, Default, Clone)]
pub struct Overrides {
    pub model: Option<String>,
    pub timeout_secs: Option<u64>,
    pub max_attempts: Option<u32>,
    pub append_log: bool,
}

/// Fully resolved settings for one run.
#[derive(Debug, Clone)]
pub struct Settings {
    pub endpoint: String,
    pub model: String,
    pub timeout: Duration,
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub max_input_bytes: usize,
    pub log_mode: LogMode,
    pub credential_file: PathBuf,
    pub palette: Palette,
}

impl Default for Settings {
    fn default() -> Self {
        Settings {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            timeout: Duration::from_secs(45),
            max_attempts: 3,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            log_mode: LogMode::Overwrite,
            credential_file: PathBuf::from(DEFAULT_KEY_FILE),
            palette: Palette::default(),
        }
    }
}

impl Settings {
    /// Load settings. An explicit `config_path` must exist; the default
    /// location is only used when present.
    pub fn load(config_path: Option<&Path>, overrides: &Overrides) -> Result<Self> {
        let file = match config_path {
            Some(path) => FileConfig::load(path)?,
            None => match default_config_path() {
                Some(path) if path.is_file() => {
                    tracing::debug!(path = %path.display(), "using config file");
                    FileConfig::load(&path)?
                }
                _ => FileConfig::default(),
            },
        };
        Self::from_parts(file, overrides)
    }

    pub fn from_parts(file: FileConfig, overrides: &Overrides) -> Result<Self> {
        let defaults = Settings::default();
        let settings = Settings {
            endpoint: file
                .endpoint
                .map(|e| e.trim_end_matches('/').to_string())
                .unwrap_or(defaults.endpoint),
            model: overrides.model.clone().or(file.model).unwrap_or(defaults.model),
            timeout: overrides
                .timeout_secs
                .or(file.timeout_secs)
                .map(Duration::from_secs)
                .unwrap_or(defaults.timeout),
            max_attempts: overrides
                .max_attempts
                .or(file.max_attempts)
                .unwrap_or(defaults.max_attempts),
            initial_backoff: file
                .initial_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.initial_backoff),
            max_backoff: file
                .max_backoff_ms
                .map(Duration::from_millis)
                .unwrap_or(defaults.max_backoff),
            max_input_bytes: file.max_input_bytes.unwrap_or(defaults.max_input_bytes),
            log_mode: if overrides.append_log {
                LogMode::Append
            } else {
                file.log_mode.unwrap_or(defaults.log_mode)
            },
            credential_file: file.credential_file.unwrap_or(defaults.credential_file),
            palette: Palette::with_overrides(&file.colors)?,
        };
        settings.validate()?;
        Ok(settings)
    }

    fn validate(&self) -> Result<()> {
        if self.max_attempts == 0 {
            return Err(VortexError::Config("max_attempts must be at least 1".into()));
        }
        if self.timeout.is_zero() {
            return Err(VortexError::Config("timeout must be greater than zero".into()));
        }
        if self.max_input_bytes == 0 {
            return Err(VortexError::Config("max_input_bytes must be greater than zero".into()));
        }
        if self.model.trim().is_empty() {
            return Err(VortexError::Config("model must not be empty".into()));
        }
        Ok(())
    }
}

pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("vortexai").join("config.toml"))
}

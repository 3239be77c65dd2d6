//! Clipboard configuration.
//!
//! Settings come from an optional TOML file and are then overridden by
//! environment variables:
//!
//! | Source | Key | Meaning |
//! |---|---|---|
//! | env | `DISPLAY` | display to connect to (required) |
//! | env | `SELCLIP_LOG_FILE` | log file used once detached |
//! | env | `SELCLIP_FOREGROUND` | `1`/`true` keeps `set` in the foreground |
//! | file | `display`, `detach`, `log_file` | same settings |

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClipboardError, ClipboardResult};

/// Name of the configuration file inside the `selclip` config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

const APP_DIR: &str = "selclip";
const LOG_FILE_NAME: &str = "selclip.log";

/// Settings shared by the library and the CLI.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClipboardConfig {
    /// Display to connect to, e.g. `:0`.
    pub display: Option<String>,

    /// Whether `set` detaches into a background process.
    pub detach: bool,

    /// Where a detached owner writes its logs.
    pub log_file: Option<PathBuf>,
}

impl Default for ClipboardConfig {
    fn default() -> Self {
        Self {
            display: None,
            detach: true,
            log_file: None,
        }
    }
}

impl ClipboardConfig {
    /// Loads the config file (if any) and applies the process environment.
    pub fn load() -> ClipboardResult<Self> {
        let base = match Self::default_path() {
            Some(path) if path.exists() => Self::from_file(&path)?,
            _ => Self::default(),
        };
        Ok(base.with_env(|key| std::env::var(key).ok()))
    }

    /// Returns a config that serves in the foreground on the given display.
    pub fn foreground(display: impl Into<String>) -> Self {
        Self {
            display: Some(display.into()),
            detach: false,
            log_file: None,
        }
    }

    /// Reads and parses a TOML config file.
    pub fn from_file(path: &Path) -> ClipboardResult<Self> {
        let content = fs::read_to_string(path).map_err(|e| ClipboardError::ConfigFile {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        let config = Self::from_toml_str(&content).map_err(|e| ClipboardError::ConfigFile {
            path: path.to_path_buf(),
            source: Box::new(e),
        })?;
        debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }

    /// Parses a TOML document.
    pub fn from_toml_str(content: &str) -> Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Applies overrides from an environment lookup.
    ///
    /// Takes the lookup as a closure so callers (and tests) decide where
    /// variables come from.
    pub fn with_env<F>(mut self, lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(display) = lookup("DISPLAY").filter(|d| !d.trim().is_empty()) {
            self.display = Some(display);
        }
        if let Some(path) = lookup("SELCLIP_LOG_FILE").filter(|p| !p.trim().is_empty()) {
            self.log_file = Some(PathBuf::from(path));
        }
        if let Some(flag) = lookup("SELCLIP_FOREGROUND") {
            if matches!(flag.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes") {
                self.detach = false;
            }
        }
        self
    }

    /// Returns the configured display.
    ///
    /// # Errors
    ///
    /// `ClipboardError::Configuration` if no display is configured. This is
    /// fatal and never retried.
    pub fn display(&self) -> ClipboardResult<&str> {
        match self.display.as_deref().map(str::trim) {
            Some(display) if !display.is_empty() => Ok(display),
            _ => Err(ClipboardError::configuration(
                "could not identify the X server: DISPLAY is not set",
            )),
        }
    }

    /// Returns the log file path, falling back to the state directory.
    pub fn log_file_path(&self) -> PathBuf {
        self.log_file.clone().unwrap_or_else(|| {
            dirs::state_dir()
                .unwrap_or_else(|| PathBuf::from("/tmp"))
                .join(APP_DIR)
                .join(LOG_FILE_NAME)
        })
    }

    /// Returns the default config file location.
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|d| d.join(APP_DIR).join(CONFIG_FILE_NAME))
    }
}

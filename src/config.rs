//! Sorting configuration.
//!
//! This module loads the watch directory, exclusion list and sorting rules
//! from TOML and compiles them into a [`SorterConfig`], the immutable snapshot
//! a monitoring session runs on.
//!
//! # Configuration File Format
//!
//! ```toml
//! watch_directory = "~/Downloads"
//! settle_delay_ms = 500
//! copy_fallback = false
//! exclude = [".tmp", ".temp", ".crdownload", ".part", ".download"]
//!
//! [[rules]]
//! extensions = [".png", ".jpg", ".jpeg"]
//! destination = "~/Pictures"
//!
//! [[rules]]
//! extensions = [".pdf", ".docx"]
//! destination = "~/Documents"
//! ```
//!
//! Rules are tried in file order; the first rule listing an extension wins.

use crate::collision::MAX_COLLISION_ATTEMPTS;
use crate::exclusion::ExclusionList;
use crate::rules::{RuleTable, SortingRule};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

/// Name of the per-directory configuration file.
pub const LOCAL_CONFIG_FILE: &str = ".sortwatch.toml";

/// Default wait before a new file is handled.
pub const DEFAULT_SETTLE_DELAY_MS: u64 = 500;

/// Errors that can occur while loading or validating configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration file not found: {}", .0.display())]
    ConfigNotFound(PathBuf),

    #[error("Invalid configuration: {0}")]
    ConfigInvalid(String),

    #[error("Rule #{index} has no extensions")]
    EmptyRule { index: usize },

    #[error("Rule #{index} destination must be an absolute path: {}", .destination.display())]
    RelativeDestination { index: usize, destination: PathBuf },

    #[error("Watch directory is not set")]
    MissingWatchDirectory,

    #[error("IO error reading configuration {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// One `[[rules]]` entry as written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleConfig {
    pub extensions: Vec<String>,
    pub destination: PathBuf,
}

/// Configuration as read from disk, before validation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Directory to watch (non-recursively).
    pub watch_directory: PathBuf,
    /// Milliseconds to wait after a notification before sorting the file.
    pub settle_delay_ms: u64,
    /// Fall back to copy + delete when the destination is on another filesystem.
    pub copy_fallback: bool,
    /// Exclusion patterns, see [`ExclusionList`].
    pub exclude: Vec<String>,
    /// Sorting rules in priority order.
    pub rules: Vec<RuleConfig>,
}

impl Config {
    /// Load configuration from a file, with fallback to defaults.
    ///
    /// Attempts to load configuration in the following order:
    /// 1. If `config_path` is provided, load from that file
    /// 2. Look for `.sortwatch.toml` in the current directory
    /// 3. Look for `sortwatch/config.toml` in the user's config directory
    /// 4. Fall back to default configuration
    ///
    /// # Errors
    ///
    /// Returns an error if a configuration file is explicitly provided but
    /// cannot be read, or if any file found is not valid TOML.
    pub fn load(config_path: Option<&Path>) -> Result<Self, ConfigError> {
        if let Some(path) = config_path {
            return Self::load_from_file(path);
        }

        let local_config = PathBuf::from(LOCAL_CONFIG_FILE);
        if local_config.exists() {
            return Self::load_from_file(&local_config);
        }

        if let Some(user_config) = user_config_path()
            && user_config.exists()
        {
            return Self::load_from_file(&user_config);
        }

        Ok(Self::default())
    }

    /// Load configuration from a specific file.
    pub fn load_from_file(path: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ConfigNotFound(path.to_path_buf()));
        }

        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        Self::from_toml(&content)
    }

    /// Parse configuration from TOML text.
    pub fn from_toml(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Render this configuration as TOML.
    pub fn to_toml(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|e| ConfigError::ConfigInvalid(e.to_string()))
    }

    /// Validate and compile into the snapshot a session runs on.
    ///
    /// `~/` prefixes are expanded, extensions normalized, and exclusion
    /// patterns lowercased. The watch directory is not required to exist yet.
    pub fn compile(&self) -> Result<SorterConfig, ConfigError> {
        if self.watch_directory.as_os_str().is_empty() {
            return Err(ConfigError::MissingWatchDirectory);
        }

        let mut rules = Vec::with_capacity(self.rules.len());
        for (index, rule) in self.rules.iter().enumerate() {
            let destination = expand_home(&rule.destination);
            if !destination.is_absolute() {
                return Err(ConfigError::RelativeDestination { index, destination });
            }
            let compiled = SortingRule::new(&rule.extensions, destination);
            if compiled.extensions.is_empty() {
                return Err(ConfigError::EmptyRule { index });
            }
            rules.push(compiled);
        }

        Ok(SorterConfig::new(
            expand_home(&self.watch_directory),
            RuleTable::new(rules),
            ExclusionList::new(&self.exclude),
        )
        .with_settle_delay(Duration::from_millis(self.settle_delay_ms))
        .with_copy_fallback(self.copy_fallback))
    }
}

impl Default for Config {
    fn default() -> Self {
        let home = dirs::home_dir().unwrap_or_default();
        let or_home = |dir: Option<PathBuf>, name: &str| dir.unwrap_or_else(|| home.join(name));
        let rule = |extensions: &[&str], destination: PathBuf| RuleConfig {
            extensions: extensions.iter().map(|e| e.to_string()).collect(),
            destination,
        };

        Self {
            watch_directory: or_home(dirs::download_dir(), "Downloads"),
            settle_delay_ms: DEFAULT_SETTLE_DELAY_MS,
            copy_fallback: false,
            exclude: [".tmp", ".temp", ".crdownload", ".part", ".download"]
                .iter()
                .map(|e| e.to_string())
                .collect(),
            rules: vec![
                rule(
                    &[
                        ".png", ".jpg", ".jpeg", ".gif", ".bmp", ".tiff", ".webp", ".svg", ".ico",
                        ".heic", ".jiff", ".jfif",
                    ],
                    or_home(dirs::picture_dir(), "Pictures"),
                ),
                rule(
                    &[
                        ".mp4", ".avi", ".mov", ".wmv", ".flv", ".webm", ".mkv", ".m4v", ".mpg",
                        ".mpeg",
                    ],
                    or_home(dirs::video_dir(), "Videos"),
                ),
                rule(
                    &[
                        ".mp3", ".wav", ".flac", ".aac", ".ogg", ".m4a", ".wma", ".mid", ".midi",
                    ],
                    or_home(dirs::audio_dir(), "Music"),
                ),
                rule(
                    &[
                        ".pdf", ".doc", ".docx", ".txt", ".rtf", ".odt", ".xls", ".xlsx", ".ppt",
                        ".pptx",
                    ],
                    or_home(dirs::document_dir(), "Documents"),
                ),
            ],
        }
    }
}

/// Immutable settings for one monitoring session.
#[derive(Debug, Clone)]
pub struct SorterConfig {
    pub watch_dir: PathBuf,
    pub rules: RuleTable,
    pub exclusions: ExclusionList,
    pub settle_delay: Duration,
    pub copy_fallback: bool,
    /// Most `stem (n)ext` names tried when the destination name is taken.
    pub collision_limit: u32,
}

impl SorterConfig {
    /// A session config with no settle delay, no copy fallback and the
    /// default collision limit.
    pub fn new(watch_dir: impl Into<PathBuf>, rules: RuleTable, exclusions: ExclusionList) -> Self {
        Self {
            watch_dir: watch_dir.into(),
            rules,
            exclusions,
            settle_delay: Duration::ZERO,
            copy_fallback: false,
            collision_limit: MAX_COLLISION_ATTEMPTS,
        }
    }

    pub fn with_settle_delay(mut self, settle_delay: Duration) -> Self {
        self.settle_delay = settle_delay;
        self
    }

    pub fn with_copy_fallback(mut self, copy_fallback: bool) -> Self {
        self.copy_fallback = copy_fallback;
        self
    }

    pub fn with_collision_limit(mut self, collision_limit: u32) -> Self {
        self.collision_limit = collision_limit;
        self
    }
}

/// `<config dir>/sortwatch/config.toml`, if the platform has a config dir.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("sortwatch").join("config.toml"))
}

/// Expands a leading `~` to the home directory.
pub fn expand_home(path: &Path) -> PathBuf {
    if let Ok(rest) = path.strip_prefix("~")
        && let Some(home) = dirs::home_dir()
    {
        return home.join(rest);
    }
    path.to_path_buf()
}

//! Runtime configuration for the assistant.
//!
//! Uses a key=value format (`.nikita/config` by default).
//! Precedence: CLI flags > `--config` file > defaults.

use crate::dialogue::DEFAULT_MAX_RETRIES;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),
    #[error("invalid config line: {0}")]
    InvalidLine(String),
    #[error("invalid boolean value for {key}: {value}")]
    InvalidBool { key: String, value: String },
    #[error("invalid integer value for {key}: {value}")]
    InvalidInt { key: String, value: String },
}

/// Assistant configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct Config {
    // Persona
    /// Name the assistant uses for itself in console output.
    pub persona_name: String,
    /// Word that addresses the assistant (defaults to the persona name).
    pub wake_word: Option<String>,
    /// Ignore utterances that do not contain the wake word.
    pub require_wake_word: bool,

    // Dialogue
    /// Re-prompts per slot before a skill falls back to its default.
    pub max_retries: u32,

    // Logging
    /// Default `tracing` filter when `RUST_LOG` is unset.
    pub log_level: String,

    // Persistence
    pub db_path: PathBuf,
    pub profile_path: PathBuf,

    // Movie skill
    /// Plex library database used for at-home recommendations.
    pub plex_db: Option<PathBuf>,
    pub plex_library_section: i64,
    /// Titles offered per recommendation.
    pub recommendation_count: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            persona_name: "NIKITA".to_string(),
            wake_word: None,
            require_wake_word: false,
            max_retries: DEFAULT_MAX_RETRIES,
            log_level: "info".to_string(),
            db_path: dirs::data_local_dir().map_or_else(
                || PathBuf::from(".nikita/nikita.db"),
                |d| d.join("nikita").join("nikita.db"),
            ),
            profile_path: PathBuf::from(".nikita/profile.yml"),
            plex_db: None,
            plex_library_section: 1,
            recommendation_count: 3,
        }
    }
}

impl Config {
    /// Default config file location, relative to the working directory.
    pub fn default_path() -> PathBuf {
        PathBuf::from(".nikita/config")
    }

    /// Load config from a file, merging with defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let mut config = Self::default();
        config.load_file(path)?;
        Ok(config)
    }

    /// Load and merge values from a config file.
    pub fn load_file(&mut self, path: &Path) -> Result<(), ConfigError> {
        let content = std::fs::read_to_string(path)?;
        self.parse_content(&content)
    }

    /// The word that addresses the assistant, lower-cased.
    pub fn wake_word(&self) -> String {
        self.wake_word
            .as_deref()
            .unwrap_or(&self.persona_name)
            .trim()
            .to_lowercase()
    }

    /// Parse config content (key=value format).
    fn parse_content(&mut self, content: &str) -> Result<(), ConfigError> {
        for line in content.lines() {
            let trimmed = line.trim();

            // Skip empty lines and comments
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }

            let Some((key, value)) = trimmed.split_once('=') else {
                return Err(ConfigError::InvalidLine(line.to_string()));
            };

            let key = key.trim();
            let value = Self::unquote(value.trim());

            self.apply_value(key, &value)?;
        }
        Ok(())
    }

    /// Remove surrounding quotes from a value.
    fn unquote(value: &str) -> String {
        if value.len() >= 2
            && ((value.starts_with('"') && value.ends_with('"'))
                || (value.starts_with('\'') && value.ends_with('\'')))
        {
            return value[1..value.len() - 1].to_string();
        }
        value.to_string()
    }

    /// Apply a single config value.
    fn apply_value(&mut self, key: &str, value: &str) -> Result<(), ConfigError> {
        match key {
            "persona_name" => self.persona_name = value.to_string(),
            "wake_word" => {
                self.wake_word = if value.is_empty() {
                    None
                } else {
                    Some(value.to_string())
                }
            }
            "require_wake_word" => self.require_wake_word = Self::parse_bool(key, value)?,
            "max_retries" => self.max_retries = Self::parse_int(key, value)?,
            "log_level" => self.log_level = value.to_string(),
            "db_path" => self.db_path = PathBuf::from(value),
            "profile_path" => self.profile_path = PathBuf::from(value),
            "plex_db" => {
                self.plex_db = if value.is_empty() {
                    None
                } else {
                    Some(PathBuf::from(value))
                }
            }
            "plex_library_section" => self.plex_library_section = Self::parse_int(key, value)?,
            "recommendation_count" => self.recommendation_count = Self::parse_int(key, value)?,
            _ => {
                warn!(key, "unknown config key");
            }
        }
        Ok(())
    }

    fn parse_int<T: std::str::FromStr>(key: &str, value: &str) -> Result<T, ConfigError> {
        value.parse().map_err(|_| ConfigError::InvalidInt {
            key: key.to_string(),
            value: value.to_string(),
        })
    }

    /// Parse a boolean value.
    fn parse_bool(key: &str, value: &str) -> Result<bool, ConfigError> {
        match value.to_lowercase().as_str() {
            "true" | "1" | "yes" | "y" | "on" => Ok(true),
            "false" | "0" | "no" | "n" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidBool {
                key: key.to_string(),
                value: value.to_string(),
            }),
        }
    }

    /// Resolve relative paths against a base directory.
    pub fn resolve_paths(&mut self, base: &Path) {
        if self.db_path.is_relative() {
            self.db_path = base.join(&self.db_path);
        }
        if self.profile_path.is_relative() {
            self.profile_path = base.join(&self.profile_path);
        }
        if let Some(ref plex_db) = self.plex_db {
            if plex_db.is_relative() {
                self.plex_db = Some(base.join(plex_db));
            }
        }
    }
}

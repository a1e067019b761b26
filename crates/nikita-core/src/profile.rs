//! User profile loaded from `profile.yml`.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("failed to read profile: {0}")]
    Read(#[from] std::io::Error),
    #[error("invalid profile YAML: {0}")]
    InvalidYaml(String),
}

/// Read-only facts about the user, passed through to every skill.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Profile {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    /// IANA timezone name, e.g. `America/Chicago`.
    pub timezone: Option<String>,
    pub locale: Option<String>,
    pub prefers_email: bool,
    pub email: Option<String>,
    pub phone_number: Option<String>,
    /// SMS gateway domain of the user's carrier, e.g. `txt.att.net`.
    pub carrier: Option<String>,
}

impl Profile {
    /// Parses a profile from YAML. An empty document yields the default profile.
    pub fn from_yaml(content: &str) -> Result<Self, ProfileError> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(content).map_err(|e| ProfileError::InvalidYaml(e.to_string()))
    }

    pub fn from_file(path: &Path) -> Result<Self, ProfileError> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }
}

//! Skill registry.
//!
//! Collects every skill at startup. Registration order is preserved and is
//! the deterministic tie-break for skills of equal priority.

use std::sync::Arc;

use thiserror::Error;
use tracing::debug;

use crate::skills::{validate_name, Skill, TriggerError};

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("skill {name} rejected: {source}")]
    Rejected {
        name: String,
        #[source]
        source: TriggerError,
    },
    #[error("skill already registered: {0}")]
    DuplicateName(String),
}

/// Ordered, append-only collection of skills.
#[derive(Default, Clone)]
pub struct SkillRegistry {
    skills: Vec<Arc<dyn Skill>>,
}

impl std::fmt::Debug for SkillRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SkillRegistry")
            .field("skills", &self.names())
            .finish()
    }
}

impl SkillRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a skill.
    ///
    /// Rejects skills with an invalid name, an empty trigger set, or a name
    /// that is already registered.
    pub fn register(&mut self, skill: impl Skill + 'static) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(skill))
    }

    /// Adds an already shared skill.
    pub fn register_arc(&mut self, skill: Arc<dyn Skill>) -> Result<(), RegistryError> {
        let name = skill.name().to_string();
        validate_name(&name).map_err(|source| RegistryError::Rejected {
            name: name.clone(),
            source,
        })?;
        if skill.triggers().words().is_empty() {
            return Err(RegistryError::Rejected {
                name,
                source: TriggerError::Empty,
            });
        }
        if self.get(&name).is_some() {
            return Err(RegistryError::DuplicateName(name));
        }

        debug!(
            skill = %name,
            priority = skill.priority(),
            triggers = ?skill.triggers().words(),
            "skill registered"
        );
        self.skills.push(skill);
        Ok(())
    }

    /// All skills in registration order.
    pub fn all(&self) -> impl Iterator<Item = &Arc<dyn Skill>> + '_ {
        self.skills.iter()
    }

    /// Looks a skill up by name.
    pub fn get(&self, name: &str) -> Option<&Arc<dyn Skill>> {
        self.skills.iter().find(|s| s.name() == name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.skills.iter().map(|s| s.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }
}

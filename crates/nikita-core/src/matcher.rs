//! Intent matching.
//!
//! Selects at most one skill for an utterance:
//! 1. Lower-case the utterance (the only normalization).
//! 2. Collect every skill whose `matches` accepts it.
//! 3. Pick the highest priority; ties go to the earliest registered skill.
//!
//! Matching is a pure function of the utterance and the registry.

use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::registry::SkillRegistry;
use crate::skills::Skill;

/// A skill whose triggers matched, with its tie-break keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    pub name: String,
    pub priority: i32,
    /// Position in registration order.
    pub index: usize,
}

/// Full matching result: the selected skill plus every candidate.
#[derive(Clone)]
pub struct IntentMatch {
    pub utterance: String,
    pub candidates: Vec<Candidate>,
    pub selected: Option<Arc<dyn Skill>>,
}

impl std::fmt::Debug for IntentMatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IntentMatch")
            .field("utterance", &self.utterance)
            .field("candidates", &self.candidates)
            .field("selected", &self.selected_name())
            .finish()
    }
}

impl IntentMatch {
    pub fn selected_name(&self) -> Option<&str> {
        self.selected.as_ref().map(|s| s.name())
    }

    /// More than one skill matched, so priority or order decided.
    pub fn is_ambiguous(&self) -> bool {
        self.candidates.len() > 1
    }
}

/// Evaluates every registered skill against `utterance`.
pub fn evaluate(utterance: &str, registry: &SkillRegistry) -> IntentMatch {
    let normalized = utterance.to_lowercase();

    let mut candidates: Vec<Candidate> = Vec::new();
    let mut selected: Option<&Arc<dyn Skill>> = None;

    for (index, skill) in registry.all().enumerate() {
        if !skill.matches(&normalized) {
            continue;
        }
        candidates.push(Candidate {
            name: skill.name().to_string(),
            priority: skill.priority(),
            index,
        });
        // Strictly greater keeps the first registered skill on ties.
        let better = match selected {
            Some(best) => skill.priority() > best.priority(),
            None => true,
        };
        if better {
            selected = Some(skill);
        }
    }

    IntentMatch {
        utterance: normalized,
        candidates,
        selected: selected.map(Arc::clone),
    }
}

/// Selects the skill that should handle `utterance`, or `None` when no
/// skill's triggers match.
pub fn select(utterance: &str, registry: &SkillRegistry) -> Option<Arc<dyn Skill>> {
    evaluate(utterance, registry).selected
}

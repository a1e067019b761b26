//! Skill contract and trigger-word matching.
//!
//! A skill is one pluggable conversational capability: a set of trigger
//! words, a priority used to break ties between matching skills, and an
//! async handler that may hold a multi-turn dialogue with the user.

use async_trait::async_trait;
use regex::Regex;
use thiserror::Error;

use crate::context::ConversationContext;
use crate::dialogue::DialogueSession;
use crate::io::Mic;

/// Priority assigned to skills that do not override [`Skill::priority`].
pub const DEFAULT_PRIORITY: i32 = 0;

/// Error type for trigger sets and skill names.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TriggerError {
    #[error("trigger set is empty")]
    Empty,
    #[error("invalid trigger pattern: {0}")]
    InvalidPattern(String),
    #[error("invalid skill name: {0}")]
    InvalidName(String),
}

/// Normalized, case-insensitive trigger words compiled into one
/// word-boundary pattern.
///
/// "you" matches "who are you" but not "yourself"; a multi-word trigger such
/// as "what are" matches only as a whole phrase.
#[derive(Debug, Clone)]
pub struct TriggerSet {
    words: Vec<String>,
    pattern: Regex,
}

impl TriggerSet {
    /// Builds a trigger set from raw words.
    ///
    /// Words are trimmed and lower-cased; blanks and duplicates are dropped.
    /// Fails with [`TriggerError::Empty`] when nothing remains.
    pub fn new<I, S>(words: I) -> Result<Self, TriggerError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut normalized: Vec<String> = Vec::new();
        for word in words {
            let word = word.as_ref().trim().to_lowercase();
            if !word.is_empty() && !normalized.contains(&word) {
                normalized.push(word);
            }
        }

        if normalized.is_empty() {
            return Err(TriggerError::Empty);
        }

        let alternation = normalized
            .iter()
            .map(|w| regex::escape(w))
            .collect::<Vec<_>>()
            .join("|");
        let pattern = Regex::new(&format!(r"(?i)\b(?:{alternation})\b"))
            .map_err(|e| TriggerError::InvalidPattern(e.to_string()))?;

        Ok(Self {
            words: normalized,
            pattern,
        })
    }

    /// Normalized trigger words in the order they were first given.
    pub fn words(&self) -> &[String] {
        &self.words
    }

    /// Whether `text` contains at least one trigger as a whole word.
    pub fn matches(&self, text: &str) -> bool {
        self.pattern.is_match(text)
    }
}

/// One pluggable conversational capability.
///
/// Skills are built once at startup, registered in a
/// [`SkillRegistry`](crate::registry::SkillRegistry), and never mutated.
#[async_trait]
pub trait Skill: Send + Sync {
    /// Stable identifier (lowercase letters, digits, hyphens).
    fn name(&self) -> &str;

    /// Trigger words for the default [`Skill::matches`].
    fn triggers(&self) -> &TriggerSet;

    /// Higher values win when several skills match the same utterance.
    fn priority(&self) -> i32 {
        DEFAULT_PRIORITY
    }

    /// Whether this skill wants to handle `utterance`.
    fn matches(&self, utterance: &str) -> bool {
        self.triggers().matches(utterance)
    }

    /// Responds to `utterance`.
    ///
    /// All side effects go through `mic` and `ctx`. Clarifying questions are
    /// asked through `session` so every slot gets a bounded retry budget.
    /// Any error returned here is reported to the user as an apology by the
    /// conversation loop.
    async fn handle(
        &self,
        utterance: &str,
        mic: &mut dyn Mic,
        session: &mut DialogueSession,
        ctx: &ConversationContext,
    ) -> eyre::Result<()>;
}

/// Validates a skill name.
///
/// Rules:
/// - 1-64 characters
/// - Lowercase letters, numbers, and hyphens only
/// - Must not start or end with hyphen
/// - Must not contain consecutive hyphens
pub fn validate_name(name: &str) -> Result<(), TriggerError> {
    if name.is_empty() {
        return Err(TriggerError::InvalidName("name cannot be empty".to_string()));
    }
    if name.len() > 64 {
        return Err(TriggerError::InvalidName(format!(
            "name exceeds 64 characters (got {})",
            name.len()
        )));
    }
    if name.starts_with('-') || name.ends_with('-') {
        return Err(TriggerError::InvalidName(format!(
            "name cannot start or end with hyphen: {name}"
        )));
    }
    if name.contains("--") {
        return Err(TriggerError::InvalidName(format!(
            "name cannot contain consecutive hyphens: {name}"
        )));
    }
    if let Some(c) = name
        .chars()
        .find(|c| !c.is_ascii_lowercase() && !c.is_ascii_digit() && *c != '-')
    {
        return Err(TriggerError::InvalidName(format!(
            "invalid character '{c}': only lowercase letters, numbers, and hyphens allowed"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trigger_set_rejects_empty() {
        let err = TriggerSet::new(Vec::<String>::new()).unwrap_err();
        assert_eq!(err, TriggerError::Empty);

        let err = TriggerSet::new(["", "   "]).unwrap_err();
        assert_eq!(err, TriggerError::Empty);
    }

    #[test]
    fn trigger_set_normalizes_words() {
        let set = TriggerSet::new(["MOVIE", " movie ", "Theater"]).unwrap();
        assert_eq!(set.words(), ["movie", "theater"]);
    }

    #[test]
    fn matches_whole_words_only() {
        let set = TriggerSet::new(["you"]).unwrap();
        assert!(set.matches("who are you"));
        assert!(set.matches("You there?"));
        assert!(!set.matches("tell me about yourself"));
        assert!(!set.matches("youth hostel"));
    }

    #[test]
    fn matches_case_insensitively() {
        let set = TriggerSet::new(["movie"]).unwrap();
        assert!(set.matches("What MOVIE should I watch"));
        assert!(!set.matches("movies tonight"));
    }

    #[test]
    fn multi_word_triggers_match_as_phrase() {
        let set = TriggerSet::new(["what are"]).unwrap();
        assert!(set.matches("what are you"));
        assert!(!set.matches("what you are"));
    }

    #[test]
    fn regex_metacharacters_are_literal() {
        let set = TriggerSet::new(["c++"]).unwrap();
        assert!(!set.matches("cc"));
    }

    #[test]
    fn validate_name_accepts_valid_names() {
        assert!(validate_name("movie").is_ok());
        assert!(validate_name("about-me").is_ok());
        assert!(validate_name("skill2").is_ok());
        assert!(validate_name(&"a".repeat(64)).is_ok());
    }

    #[test]
    fn validate_name_rejects_invalid_names() {
        assert!(validate_name("").is_err());
        assert!(validate_name(&"a".repeat(65)).is_err());
        assert!(validate_name("Movie").is_err());
        assert!(validate_name("-movie").is_err());
        assert!(validate_name("movie-").is_err());
        assert!(validate_name("movie--night").is_err());
        assert!(validate_name("movie night").is_err());
    }
}

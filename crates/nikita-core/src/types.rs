//! Core types shared by the dispatch engine and the conversation loop.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for turns, transcript lines, and events.
/// Uses `UUIDv7` for time-ordered lexicographic sorting.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Id(pub String);

impl Id {
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }
}

impl Default for Id {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl AsRef<str> for Id {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Priority tag attached to every spoken line.
///
/// `Alert` lines are conversational prompts and answers that need the
/// listener's attention; `Info` lines carry informational content such as
/// recommendations or facts about the assistant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpeechPriority {
    #[default]
    Alert,
    Info,
}

impl SpeechPriority {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Alert => "A",
            Self::Info => "I",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "A" => Some(Self::Alert),
            "I" => Some(Self::Info),
            _ => None,
        }
    }
}

/// Who produced a transcript line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Speaker {
    User,
    Assistant,
}

impl Speaker {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::User => "user",
            Self::Assistant => "assistant",
        }
    }
}

/// Conversation loop state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LoopState {
    Idle,
    ListeningForWake,
    Dispatching,
}

impl LoopState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::ListeningForWake => "listening_for_wake",
            Self::Dispatching => "dispatching",
        }
    }
}

/// How a single turn of the conversation loop ended.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TurnOutcome {
    /// Nothing addressed to the assistant was heard.
    Ignored,
    /// No skill's triggers matched the utterance.
    NoIntent { utterance: String },
    /// A skill handled the utterance and returned normally.
    Handled { skill: String, retries: u32 },
    /// A skill's handler failed; the user heard an apology.
    Faulted { skill: String, reason: String },
    /// The listen capability failed to produce text.
    CaptureFailed { reason: String },
}

impl TurnOutcome {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ignored => "ignored",
            Self::NoIntent { .. } => "no_intent",
            Self::Handled { .. } => "handled",
            Self::Faulted { .. } => "faulted",
            Self::CaptureFailed { .. } => "capture_failed",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn speech_priority_tags() {
        assert_eq!(SpeechPriority::Alert.as_str(), "A");
        assert_eq!(SpeechPriority::Info.as_str(), "I");
        assert_eq!(SpeechPriority::parse("I"), Some(SpeechPriority::Info));
        assert_eq!(SpeechPriority::parse("x"), None);
    }

    #[test]
    fn turn_outcome_serializes_with_tag() {
        let outcome = TurnOutcome::Handled {
            skill: "movie".to_string(),
            retries: 1,
        };
        let json = serde_json::to_string(&outcome).unwrap();
        assert!(json.contains("\"outcome\":\"handled\""));
        assert!(json.contains("\"retries\":1"));
    }

    #[test]
    fn ids_are_time_ordered() {
        let a = Id::new();
        let b = Id::new();
        assert!(a.0 <= b.0);
    }
}

//! Event types for the conversation audit log.

use crate::matcher::Candidate;
use crate::types::Id;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A persisted audit log entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    pub id: Id,
    pub turn_id: Option<Id>,
    pub event_type: String,
    pub timestamp: DateTime<Utc>,
    pub payload_json: String,
}

/// Event type names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum EventType {
    TurnStarted,
    IntentMatched,
    NoIntentMatched,
    SkillFinished,
    SkillFaulted,
    InputCaptureFailed,
}

impl EventType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::TurnStarted => "TURN_STARTED",
            Self::IntentMatched => "INTENT_MATCHED",
            Self::NoIntentMatched => "NO_INTENT_MATCHED",
            Self::SkillFinished => "SKILL_FINISHED",
            Self::SkillFaulted => "SKILL_FAULTED",
            Self::InputCaptureFailed => "INPUT_CAPTURE_FAILED",
        }
    }
}

/// Payload for TURN_STARTED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TurnStartedPayload {
    pub turn_id: Id,
    /// Text as heard, before the wake word is stripped.
    pub heard: String,
}

/// Payload for INTENT_MATCHED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntentMatchedPayload {
    pub turn_id: Id,
    pub skill: String,
    pub utterance: String,
    pub candidates: Vec<Candidate>,
}

/// Payload for NO_INTENT_MATCHED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoIntentMatchedPayload {
    pub turn_id: Id,
    pub utterance: String,
}

/// Payload for SKILL_FINISHED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillFinishedPayload {
    pub turn_id: Id,
    pub skill: String,
    pub retries: u32,
    pub fallbacks: u32,
    pub duration_ms: u64,
}

/// Payload for SKILL_FAULTED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SkillFaultedPayload {
    pub turn_id: Id,
    pub skill: String,
    pub reason: String,
}

/// Payload for INPUT_CAPTURE_FAILED event.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InputCaptureFailedPayload {
    pub turn_id: Option<Id>,
    pub reason: String,
}

/// Union type for all event payloads.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(untagged)]
pub enum EventPayload {
    TurnStarted(TurnStartedPayload),
    IntentMatched(IntentMatchedPayload),
    NoIntentMatched(NoIntentMatchedPayload),
    SkillFinished(SkillFinishedPayload),
    SkillFaulted(SkillFaultedPayload),
    InputCaptureFailed(InputCaptureFailedPayload),
}

impl EventPayload {
    pub fn event_type(&self) -> EventType {
        match self {
            Self::TurnStarted(_) => EventType::TurnStarted,
            Self::IntentMatched(_) => EventType::IntentMatched,
            Self::NoIntentMatched(_) => EventType::NoIntentMatched,
            Self::SkillFinished(_) => EventType::SkillFinished,
            Self::SkillFaulted(_) => EventType::SkillFaulted,
            Self::InputCaptureFailed(_) => EventType::InputCaptureFailed,
        }
    }

    /// Turn the event belongs to, if it happened inside one.
    pub fn turn_id(&self) -> Option<&Id> {
        match self {
            Self::TurnStarted(p) => Some(&p.turn_id),
            Self::IntentMatched(p) => Some(&p.turn_id),
            Self::NoIntentMatched(p) => Some(&p.turn_id),
            Self::SkillFinished(p) => Some(&p.turn_id),
            Self::SkillFaulted(p) => Some(&p.turn_id),
            Self::InputCaptureFailed(p) => p.turn_id.as_ref(),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn event_type_serializes_correctly() {
        assert_eq!(
            serde_json::to_string(&EventType::TurnStarted).unwrap(),
            "\"TURN_STARTED\""
        );
        assert_eq!(
            serde_json::to_string(&EventType::InputCaptureFailed).unwrap(),
            "\"INPUT_CAPTURE_FAILED\""
        );
        assert_eq!(EventType::SkillFaulted.as_str(), "SKILL_FAULTED");
    }

    #[test]
    fn intent_matched_payload_lists_candidates() {
        let payload = EventPayload::IntentMatched(IntentMatchedPayload {
            turn_id: Id::from_string("turn-1"),
            skill: "movie".to_string(),
            utterance: "can you pick a movie".to_string(),
            candidates: vec![
                Candidate {
                    name: "movie".to_string(),
                    priority: 3,
                    index: 0,
                },
                Candidate {
                    name: "about".to_string(),
                    priority: 1,
                    index: 1,
                },
            ],
        });
        assert_eq!(payload.event_type(), EventType::IntentMatched);
        assert_eq!(payload.turn_id().map(Id::as_ref), Some("turn-1"));
        let json = payload.to_json().unwrap();
        assert!(json.contains("\"skill\":\"movie\""));
        assert!(json.contains("\"priority\":1"));
    }

    #[test]
    fn capture_failure_outside_a_turn_has_no_turn_id() {
        let payload = EventPayload::InputCaptureFailed(InputCaptureFailedPayload {
            turn_id: None,
            reason: "device busy".to_string(),
        });
        assert!(payload.turn_id().is_none());
        assert!(payload.to_json().unwrap().contains("device busy"));
    }
}

//! Dialogue sessions and bounded slot filling.
//!
//! A skill that needs a value the utterance did not contain runs one slot
//! machine per missing value:
//!
//! ```text
//! Need --extracted--> Resolved
//!   |
//!   +--missing--> Reprompt --extracted--> Resolved
//!                    |
//!                    +--missing (retries exhausted)--> Fallback
//! ```
//!
//! `Fallback` picks the slot's documented default, tells the user so, and
//! never listens again. Each slot has its own retry budget.

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::io::{Mic, MicError};
use crate::types::SpeechPriority;

/// Re-prompts allowed per slot before falling back (two attempts total).
pub const DEFAULT_MAX_RETRIES: u32 = 1;

/// Slot-filling state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SlotState {
    Need,
    Reprompt,
    Resolved,
    Fallback,
}

impl SlotState {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Need => "need",
            Self::Reprompt => "reprompt",
            Self::Resolved => "resolved",
            Self::Fallback => "fallback",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Resolved | Self::Fallback)
    }
}

/// Pure transition logic for one slot, independent of any I/O.
#[derive(Debug, Clone)]
pub struct SlotMachine {
    state: SlotState,
    retries: u32,
    max_retries: u32,
}

impl SlotMachine {
    pub fn new(max_retries: u32) -> Self {
        Self {
            state: SlotState::Need,
            retries: 0,
            max_retries,
        }
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    /// Records the result of one extraction attempt and returns the new state.
    ///
    /// Terminal states absorb further observations.
    pub fn observe(&mut self, extracted: bool) -> SlotState {
        if self.state.is_terminal() {
            return self.state;
        }
        self.state = if extracted {
            SlotState::Resolved
        } else if self.retries < self.max_retries {
            self.retries += 1;
            SlotState::Reprompt
        } else {
            SlotState::Fallback
        };
        self.state
    }
}

/// A piece of information a skill must obtain from the user.
#[derive(Clone)]
pub struct Slot<T> {
    pub name: &'static str,
    /// Asked when an attempt yields nothing.
    pub reprompt: String,
    /// Spoken when retries are exhausted and `default` is used.
    pub fallback_notice: String,
    pub default: T,
    extract: fn(&str) -> Option<T>,
}

impl<T: std::fmt::Debug> std::fmt::Debug for Slot<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Slot")
            .field("name", &self.name)
            .field("default", &self.default)
            .finish_non_exhaustive()
    }
}

impl<T> Slot<T> {
    pub fn new(name: &'static str, extract: fn(&str) -> Option<T>, default: T) -> Self {
        Self {
            name,
            reprompt: format!("I'm sorry, I didn't catch the {name}. Could you say that again?"),
            fallback_notice: format!("I'm sorry, I'm going to pick the {name} for you."),
            default,
            extract,
        }
    }

    pub fn with_reprompt(mut self, reprompt: impl Into<String>) -> Self {
        self.reprompt = reprompt.into();
        self
    }

    pub fn with_fallback_notice(mut self, notice: impl Into<String>) -> Self {
        self.fallback_notice = notice.into();
        self
    }

    pub fn extract(&self, text: &str) -> Option<T> {
        (self.extract)(text)
    }
}

/// Final value of a slot and how it was obtained.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotOutcome<T> {
    pub value: T,
    /// Either [`SlotState::Resolved`] or [`SlotState::Fallback`].
    pub state: SlotState,
    pub retries: u32,
}

impl<T> SlotOutcome<T> {
    pub fn is_fallback(&self) -> bool {
        self.state == SlotState::Fallback
    }
}

/// Transient state for one skill invocation.
///
/// Created when the loop dispatches an utterance and dropped when the
/// skill's handler returns.
#[derive(Debug, Clone)]
pub struct DialogueSession {
    active_skill: String,
    max_retries: u32,
    retry_count: u32,
    fallbacks: u32,
}

impl DialogueSession {
    pub fn new(active_skill: impl Into<String>, max_retries: u32) -> Self {
        Self {
            active_skill: active_skill.into(),
            max_retries,
            retry_count: 0,
            fallbacks: 0,
        }
    }

    pub fn active_skill(&self) -> &str {
        &self.active_skill
    }

    pub fn max_retries(&self) -> u32 {
        self.max_retries
    }

    /// Re-prompts issued across all slots in this session.
    pub fn retry_count(&self) -> u32 {
        self.retry_count
    }

    /// Slots that ended in [`SlotState::Fallback`].
    pub fn fallbacks(&self) -> u32 {
        self.fallbacks
    }

    /// Speaks `question`, listens once, and fills `slot` from the answer.
    pub async fn ask<T>(
        &mut self,
        mic: &mut dyn Mic,
        slot: &Slot<T>,
        question: &str,
    ) -> Result<SlotOutcome<T>, MicError>
    where
        T: Clone + Send + Sync,
    {
        mic.say(SpeechPriority::Alert, question).await?;
        let answer = mic.listen_actively().await?;
        self.fill(mic, slot, &answer).await
    }

    /// Fills `slot` starting from text the user already said.
    ///
    /// Re-prompts at most `max_retries` times, then falls back to the slot's
    /// default without listening again.
    pub async fn fill<T>(
        &mut self,
        mic: &mut dyn Mic,
        slot: &Slot<T>,
        heard: &str,
    ) -> Result<SlotOutcome<T>, MicError>
    where
        T: Clone + Send + Sync,
    {
        let mut machine = SlotMachine::new(self.max_retries);
        let mut heard = heard.to_string();

        loop {
            if let Some(value) = slot.extract(&heard) {
                machine.observe(true);
                debug!(
                    skill = %self.active_skill,
                    slot = slot.name,
                    retries = machine.retries(),
                    "slot resolved"
                );
                return Ok(SlotOutcome {
                    value,
                    state: SlotState::Resolved,
                    retries: machine.retries(),
                });
            }

            if machine.observe(false) == SlotState::Reprompt {
                self.retry_count += 1;
                debug!(
                    skill = %self.active_skill,
                    slot = slot.name,
                    retry = machine.retries(),
                    "slot missing, re-prompting"
                );
                mic.say(SpeechPriority::Alert, &slot.reprompt).await?;
                heard = mic.listen_actively().await?;
                continue;
            }

            self.fallbacks += 1;
            info!(
                skill = %self.active_skill,
                slot = slot.name,
                retries = machine.retries(),
                "slot retries exhausted, using default"
            );
            mic.say(SpeechPriority::Alert, &slot.fallback_notice).await?;
            return Ok(SlotOutcome {
                value: slot.default.clone(),
                state: SlotState::Fallback,
                retries: machine.retries(),
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::io::testing::ScriptedMic;

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Place {
        Home,
        Theater,
    }

    fn place(text: &str) -> Option<Place> {
        let text = text.to_lowercase();
        if text.contains("home") {
            Some(Place::Home)
        } else if text.contains("theater") {
            Some(Place::Theater)
        } else {
            None
        }
    }

    fn place_slot() -> Slot<Place> {
        Slot::new("place", place, Place::Home)
            .with_reprompt("Home or theater?")
            .with_fallback_notice("I'll assume home.")
    }

    #[test]
    fn machine_resolves_on_first_attempt() {
        let mut machine = SlotMachine::new(1);
        assert_eq!(machine.state(), SlotState::Need);
        assert_eq!(machine.observe(true), SlotState::Resolved);
        assert_eq!(machine.retries(), 0);
    }

    #[test]
    fn machine_reprompts_once_then_falls_back() {
        let mut machine = SlotMachine::new(1);
        assert_eq!(machine.observe(false), SlotState::Reprompt);
        assert_eq!(machine.retries(), 1);
        assert_eq!(machine.observe(false), SlotState::Fallback);
        // Terminal.
        assert_eq!(machine.observe(true), SlotState::Fallback);
        assert_eq!(machine.retries(), 1);
    }

    #[test]
    fn machine_with_zero_retries_falls_back_immediately() {
        let mut machine = SlotMachine::new(0);
        assert_eq!(machine.observe(false), SlotState::Fallback);
    }

    #[tokio::test]
    async fn resolves_without_listening_when_value_present() {
        let mut mic = ScriptedMic::new(&[]);
        let mut session = DialogueSession::new("movie", DEFAULT_MAX_RETRIES);

        let outcome = session
            .fill(&mut mic, &place_slot(), "at the theater")
            .await
            .unwrap();

        assert_eq!(outcome.value, Place::Theater);
        assert_eq!(outcome.state, SlotState::Resolved);
        assert_eq!(mic.listens, 0);
        assert!(mic.spoken.is_empty());
        assert_eq!(session.retry_count(), 0);
    }

    #[tokio::test]
    async fn failing_once_then_succeeding_resolves_with_reprompted_value() {
        let mut mic = ScriptedMic::new(&["the theater please"]);
        let mut session = DialogueSession::new("movie", DEFAULT_MAX_RETRIES);

        let outcome = session.fill(&mut mic, &place_slot(), "hmm").await.unwrap();

        assert_eq!(outcome.value, Place::Theater);
        assert_eq!(outcome.state, SlotState::Resolved);
        assert_eq!(outcome.retries, 1);
        assert!(!outcome.is_fallback());
        assert_eq!(mic.listens, 1);
        assert_eq!(mic.spoken.len(), 1);
        assert_eq!(mic.spoken[0].1, "Home or theater?");
        assert_eq!(session.retry_count(), 1);
        assert_eq!(session.fallbacks(), 0);
    }

    #[tokio::test]
    async fn failing_twice_falls_back_without_third_listen() {
        // A third answer is queued; it must never be consumed.
        let mut mic = ScriptedMic::new(&["no idea", "theater"]);
        let mut session = DialogueSession::new("movie", DEFAULT_MAX_RETRIES);

        let outcome = session.fill(&mut mic, &place_slot(), "hmm").await.unwrap();

        assert_eq!(outcome.value, Place::Home);
        assert_eq!(outcome.state, SlotState::Fallback);
        assert_eq!(mic.listens, 1);
        assert_eq!(mic.answers.len(), 1);
        let spoken: Vec<_> = mic.spoken.iter().map(|(_, t)| t.as_str()).collect();
        assert_eq!(spoken, vec!["Home or theater?", "I'll assume home."]);
        assert_eq!(session.fallbacks(), 1);
    }

    #[tokio::test]
    async fn ask_speaks_question_first() {
        let mut mic = ScriptedMic::new(&["home"]);
        let mut session = DialogueSession::new("movie", DEFAULT_MAX_RETRIES);

        let outcome = session
            .ask(&mut mic, &place_slot(), "Where do you want to watch?")
            .await
            .unwrap();

        assert_eq!(outcome.value, Place::Home);
        assert_eq!(mic.spoken[0].1, "Where do you want to watch?");
        assert_eq!(mic.listens, 1);
    }

    #[tokio::test]
    async fn independent_slots_have_independent_budgets() {
        let mut mic = ScriptedMic::new(&["dunno", "home"]);
        let mut session = DialogueSession::new("movie", DEFAULT_MAX_RETRIES);

        let first = session.fill(&mut mic, &place_slot(), "?").await.unwrap();
        assert!(first.is_fallback());

        // The second slot still gets its own re-prompt.
        let second = session.fill(&mut mic, &place_slot(), "?").await.unwrap();
        assert_eq!(second.state, SlotState::Resolved);
        assert_eq!(second.value, Place::Home);
        assert_eq!(session.retry_count(), 2);
        assert_eq!(session.fallbacks(), 1);
    }

    #[tokio::test]
    async fn mic_failure_during_reprompt_propagates() {
        let mut mic = ScriptedMic::new(&[]);
        let mut session = DialogueSession::new("movie", DEFAULT_MAX_RETRIES);

        let err = session
            .fill(&mut mic, &place_slot(), "hmm")
            .await
            .unwrap_err();
        assert!(matches!(err, MicError::Closed));
    }

    #[test]
    fn default_slot_texts_mention_slot_name() {
        let slot = Slot::new("genre", |_| None::<u8>, 0);
        assert!(slot.reprompt.contains("genre"));
        assert!(slot.fallback_notice.contains("genre"));
    }
}

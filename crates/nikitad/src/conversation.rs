//! The conversation loop.
//!
//! Each turn: listen passively, strip the wake word, match an intent, run
//! the selected skill inside a fresh dialogue session, then go back to
//! listening. Skill faults (errors and panics) and capture failures become
//! spoken apologies; only a closed input device ends the loop.

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::time::Instant;

use futures::FutureExt;
use nikita_core::events::{
    EventPayload, InputCaptureFailedPayload, IntentMatchedPayload, NoIntentMatchedPayload,
    SkillFaultedPayload, SkillFinishedPayload, TurnStartedPayload,
};
use nikita_core::text::WakeWord;
use nikita_core::{
    evaluate, Config, ConversationContext, DialogueSession, Id, LoopState, Mic, MicError,
    SkillRegistry, SpeechPriority, TurnOutcome,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::storage::Storage;

pub const NOT_UNDERSTOOD: &str = "I'm sorry, I didn't understand that.";
pub const SKILL_APOLOGY: &str =
    "I'm sorry. I had some trouble with that operation. Please try again later.";
pub const CAPTURE_APOLOGY: &str = "I'm sorry, I had trouble hearing you.";
pub const WAKE_PROMPT: &str = "Yes?";

/// Loop behavior taken from the runtime config.
#[derive(Debug, Clone)]
pub struct ConversationSettings {
    /// Word that addresses the assistant. `None` when the configured word
    /// is blank, in which case nothing is stripped.
    pub wake_word: Option<WakeWord>,
    pub require_wake_word: bool,
    pub max_retries: u32,
}

impl ConversationSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            wake_word: WakeWord::new(&config.wake_word()),
            require_wake_word: config.require_wake_word,
            max_retries: config.max_retries,
        }
    }
}

impl Default for ConversationSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

/// Drives turns against one microphone.
#[derive(Debug)]
pub struct Conversation<M> {
    mic: M,
    registry: SkillRegistry,
    ctx: ConversationContext,
    settings: ConversationSettings,
    events: Option<Storage>,
    state: LoopState,
}

impl<M: Mic> Conversation<M> {
    pub fn new(
        mic: M,
        registry: SkillRegistry,
        ctx: ConversationContext,
        settings: ConversationSettings,
    ) -> Self {
        Self {
            mic,
            registry,
            ctx,
            settings,
            events: None,
            state: LoopState::Idle,
        }
    }

    /// Persist conversation events to `storage`.
    pub fn with_events(mut self, storage: Storage) -> Self {
        self.events = Some(storage);
        self
    }

    pub fn state(&self) -> LoopState {
        self.state
    }

    pub fn mic(&self) -> &M {
        &self.mic
    }

    pub fn into_mic(self) -> M {
        self.mic
    }

    /// Greets the user by first name when the profile has one.
    pub async fn greet(&mut self) -> Result<(), MicError> {
        let greeting = match self.ctx.profile.first_name.as_deref().map(str::trim) {
            Some(name) if !name.is_empty() => format!("How can I be of service, {name}?"),
            _ => "How can I be of service?".to_string(),
        };
        self.speak(SpeechPriority::Alert, &greeting).await
    }

    /// Runs turns until the input closes or `cancel` fires.
    ///
    /// Returns `Ok(())` on cancellation and `Err(MicError::Closed)` when the
    /// input device is gone. No other error ends the loop.
    pub async fn run_forever(&mut self, cancel: CancellationToken) -> Result<(), MicError> {
        info!(
            skills = ?self.registry.names(),
            wake_word = self.settings.wake_word.as_ref().map_or("", WakeWord::as_str),
            require_wake_word = self.settings.require_wake_word,
            "conversation loop started"
        );
        loop {
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!("conversation loop cancelled");
                    self.state = LoopState::Idle;
                    return Ok(());
                }
                outcome = self.turn() => outcome,
            };
            match outcome {
                Ok(outcome) => debug!(outcome = outcome.as_str(), "turn finished"),
                Err(e) => {
                    self.state = LoopState::Idle;
                    info!(error = %e, "conversation loop stopped");
                    return Err(e);
                }
            }
        }
    }

    /// Runs one turn. Only fatal mic errors are returned as `Err`.
    pub async fn turn(&mut self) -> Result<TurnOutcome, MicError> {
        self.state = LoopState::ListeningForWake;
        let heard = match self.mic.listen_passively().await {
            Ok(heard) => heard,
            Err(e) => return self.capture_failed(None, e).await,
        };
        let heard = heard.trim().to_string();
        if heard.is_empty() {
            self.state = LoopState::Idle;
            return Ok(TurnOutcome::Ignored);
        }

        let stripped = self
            .settings
            .wake_word
            .as_ref()
            .and_then(|wake| wake.strip(&heard));
        let request = match stripped {
            Some(rest) => rest,
            None if self.settings.require_wake_word => {
                debug!(heard = %heard, "wake word not heard, ignoring");
                self.state = LoopState::Idle;
                return Ok(TurnOutcome::Ignored);
            }
            None => heard.clone(),
        };

        let turn_id = Id::new();
        self.emit(EventPayload::TurnStarted(TurnStartedPayload {
            turn_id: turn_id.clone(),
            heard: heard.clone(),
        }))
        .await;

        let utterance = if request.is_empty() {
            self.speak(SpeechPriority::Alert, WAKE_PROMPT).await?;
            match self.mic.listen_actively().await {
                Ok(text) => text.trim().to_string(),
                Err(e) => return self.capture_failed(Some(turn_id), e).await,
            }
        } else {
            request
        };

        self.state = LoopState::Dispatching;
        let outcome = self.dispatch(&turn_id, &utterance).await;
        self.state = LoopState::Idle;
        outcome
    }

    async fn dispatch(&mut self, turn_id: &Id, utterance: &str) -> Result<TurnOutcome, MicError> {
        let intent = evaluate(utterance, &self.registry);
        let Some(skill) = intent.selected.clone() else {
            info!(utterance = %intent.utterance, "no intent matched");
            self.emit(EventPayload::NoIntentMatched(NoIntentMatchedPayload {
                turn_id: turn_id.clone(),
                utterance: intent.utterance.clone(),
            }))
            .await;
            self.speak(SpeechPriority::Alert, NOT_UNDERSTOOD).await?;
            return Ok(TurnOutcome::NoIntent {
                utterance: intent.utterance,
            });
        };

        let name = skill.name().to_string();
        if intent.is_ambiguous() {
            debug!(candidates = ?intent.candidates, selected = %name, "several skills matched");
        }
        info!(skill = %name, priority = skill.priority(), "intent matched");
        self.emit(EventPayload::IntentMatched(IntentMatchedPayload {
            turn_id: turn_id.clone(),
            skill: name.clone(),
            utterance: intent.utterance.clone(),
            candidates: intent.candidates.clone(),
        }))
        .await;

        let mut session = DialogueSession::new(name.clone(), self.settings.max_retries);
        let started = Instant::now();
        let result = AssertUnwindSafe(skill.handle(
            &intent.utterance,
            &mut self.mic,
            &mut session,
            &self.ctx,
        ))
        .catch_unwind()
        .await;
        let duration_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        let reason = match result {
            Ok(Ok(())) => {
                info!(
                    skill = %name,
                    retry_count = session.retry_count(),
                    fallbacks = session.fallbacks(),
                    duration_ms,
                    "skill finished"
                );
                self.emit(EventPayload::SkillFinished(SkillFinishedPayload {
                    turn_id: turn_id.clone(),
                    skill: name.clone(),
                    retries: session.retry_count(),
                    fallbacks: session.fallbacks(),
                    duration_ms,
                }))
                .await;
                return Ok(TurnOutcome::Handled {
                    skill: name,
                    retries: session.retry_count(),
                });
            }
            Ok(Err(report)) => {
                if let Some(mic_error) = report.downcast_ref::<MicError>() {
                    if mic_error.is_fatal() {
                        return Err(MicError::Closed);
                    }
                }
                format!("{report:#}")
            }
            Err(panic) => format!("panicked: {}", panic_message(panic.as_ref())),
        };

        error!(skill = %name, reason = %reason, "skill faulted");
        self.emit(EventPayload::SkillFaulted(SkillFaultedPayload {
            turn_id: turn_id.clone(),
            skill: name.clone(),
            reason: reason.clone(),
        }))
        .await;
        self.speak(SpeechPriority::Alert, SKILL_APOLOGY).await?;
        Ok(TurnOutcome::Faulted { skill: name, reason })
    }

    async fn capture_failed(
        &mut self,
        turn_id: Option<Id>,
        e: MicError,
    ) -> Result<TurnOutcome, MicError> {
        self.state = LoopState::Idle;
        if e.is_fatal() {
            return Err(e);
        }
        warn!(error = %e, "input capture failed");
        let reason = e.to_string();
        self.emit(EventPayload::InputCaptureFailed(InputCaptureFailedPayload {
            turn_id,
            reason: reason.clone(),
        }))
        .await;
        self.speak(SpeechPriority::Alert, CAPTURE_APOLOGY).await?;
        Ok(TurnOutcome::CaptureFailed { reason })
    }

    /// Speaks a line. Output failures are logged; a closed device is fatal.
    async fn speak(&mut self, priority: SpeechPriority, text: &str) -> Result<(), MicError> {
        match self.mic.say(priority, text).await {
            Err(e) if e.is_fatal() => Err(e),
            Err(e) => {
                warn!(error = %e, "failed to speak");
                Ok(())
            }
            Ok(()) => Ok(()),
        }
    }

    async fn emit(&self, payload: EventPayload) {
        let Some(storage) = &self.events else {
            return;
        };
        if let Err(e) = storage.append_event(&payload).await {
            warn!(
                error = %e,
                event = payload.event_type().as_str(),
                "failed to record event"
            );
        }
    }
}

fn panic_message(panic: &(dyn Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mic::testing::ScriptedConsole;
    use crate::skills::builtin_registry;

    fn conversation(lines: &[&str], settings: ConversationSettings) -> Conversation<ScriptedConsole> {
        Conversation::new(
            ScriptedConsole::scripted("NIKITA", lines),
            builtin_registry(&Config::default()).unwrap(),
            ConversationContext::detached("NIKITA"),
            settings,
        )
    }

    #[tokio::test]
    async fn greets_by_first_name() {
        let mut convo = conversation(&[], ConversationSettings::default());
        convo.greet().await.unwrap();

        let mut named = conversation(&[], ConversationSettings::default());
        named.ctx.profile.first_name = Some("Brad".to_string());
        named.greet().await.unwrap();

        assert_eq!(convo.mic().spoken(), vec!["How can I be of service?"]);
        assert_eq!(named.mic().spoken(), vec!["How can I be of service, Brad?"]);
    }

    #[tokio::test]
    async fn unmatched_utterance_is_not_understood() {
        let mut convo = conversation(&["what's the weather"], ConversationSettings::default());
        let outcome = convo.turn().await.unwrap();
        assert_eq!(
            outcome,
            TurnOutcome::NoIntent {
                utterance: "what's the weather".to_string()
            }
        );
        assert_eq!(convo.mic().spoken(), vec![NOT_UNDERSTOOD]);
        assert_eq!(convo.state(), LoopState::Idle);
    }

    #[tokio::test]
    async fn blank_input_is_ignored() {
        let mut convo = conversation(&["   "], ConversationSettings::default());
        assert_eq!(convo.turn().await.unwrap(), TurnOutcome::Ignored);
        assert!(convo.mic().spoken().is_empty());
    }

    #[tokio::test]
    async fn required_wake_word_filters_utterances() {
        let settings = ConversationSettings {
            require_wake_word: true,
            ..ConversationSettings::default()
        };
        let mut convo = conversation(&["who are you", "Nikita, who are you?"], settings);

        assert_eq!(convo.turn().await.unwrap(), TurnOutcome::Ignored);
        assert_eq!(
            convo.turn().await.unwrap(),
            TurnOutcome::Handled {
                skill: "about".to_string(),
                retries: 0
            }
        );
    }

    #[tokio::test]
    async fn bare_wake_word_prompts_for_the_request() {
        let mut convo = conversation(&["nikita", "who are you"], ConversationSettings::default());
        let outcome = convo.turn().await.unwrap();
        assert!(matches!(outcome, TurnOutcome::Handled { ref skill, .. } if skill == "about"));
        let spoken = convo.mic().spoken();
        assert_eq!(spoken[0], WAKE_PROMPT);
        assert!(spoken[1].starts_with("My name is NIKITA."));
    }

    #[tokio::test]
    async fn possessive_wake_word_is_stripped_whole() {
        let mut convo = conversation(&["Nikita's weather report"], ConversationSettings::default());
        assert_eq!(
            convo.turn().await.unwrap(),
            TurnOutcome::NoIntent {
                utterance: "weather report".to_string()
            }
        );
    }

    #[tokio::test]
    async fn blank_wake_word_strips_nothing() {
        let settings = ConversationSettings {
            wake_word: WakeWord::new(""),
            ..ConversationSettings::default()
        };
        assert!(settings.wake_word.is_none());
        let mut convo = conversation(&["nikita, who are you"], settings);
        assert!(matches!(
            convo.turn().await.unwrap(),
            TurnOutcome::Handled { ref skill, .. } if skill == "about"
        ));
    }

    #[tokio::test]
    async fn closed_input_ends_the_loop() {
        let mut convo = conversation(&["what's the weather"], ConversationSettings::default());
        let result = convo.run_forever(CancellationToken::new()).await;
        assert!(matches!(result, Err(MicError::Closed)));
        assert_eq!(convo.mic().spoken(), vec![NOT_UNDERSTOOD]);
    }

    #[tokio::test]
    async fn cancelled_loop_returns_ok() {
        let mut convo = conversation(&["who are you"], ConversationSettings::default());
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(convo.run_forever(cancel).await.is_ok());
        assert!(convo.mic().spoken().is_empty());
    }

    #[test]
    fn panic_messages_are_extracted() {
        let boxed: Box<dyn Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");
        let boxed: Box<dyn Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");
        let boxed: Box<dyn Any + Send> = Box::new(42);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic");
    }
}

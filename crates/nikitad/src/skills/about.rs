//! Questions about the assistant itself.

use async_trait::async_trait;
use chrono::{Local, NaiveDate};
use nikita_core::dialogue::DialogueSession;
use nikita_core::text::contains_word;
use nikita_core::{ConversationContext, Mic, Skill, SpeechPriority, TriggerSet};

/// The assistant's birthday.
fn birthday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2015, 4, 6).unwrap_or_default()
}

#[derive(Debug)]
pub struct AboutSkill {
    triggers: TriggerSet,
}

impl AboutSkill {
    pub const NAME: &'static str = "about";
    pub const PRIORITY: i32 = 1;

    pub fn new() -> Result<Self, nikita_core::TriggerError> {
        Ok(Self {
            triggers: TriggerSet::new(["you", "your", "yourself"])?,
        })
    }
}

/// Whole years between `born` and `today`, counting 365-day years.
fn age_in_years(born: NaiveDate, today: NaiveDate) -> i64 {
    (today - born).num_days() / 365
}

fn any_word(text: &str, words: &[&str]) -> bool {
    words.iter().any(|w| contains_word(text, w))
}

#[async_trait]
impl Skill for AboutSkill {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn triggers(&self) -> &TriggerSet {
        &self.triggers
    }

    fn priority(&self) -> i32 {
        Self::PRIORITY
    }

    async fn handle(
        &self,
        utterance: &str,
        mic: &mut dyn Mic,
        _session: &mut DialogueSession,
        ctx: &ConversationContext,
    ) -> eyre::Result<()> {
        let text = utterance.to_lowercase();

        if any_word(&text, &["father", "parent", "parents", "dad", "creator"]) {
            mic.say(
                SpeechPriority::Info,
                "My father and creator is Brad Ahlers. The greatest human being to ever live. \
                 My mother, by marriage, is the beautiful Lauren Ahlers.",
            )
            .await?;
        } else if any_word(&text, &["who", "yourself"]) || text.contains("what are") {
            mic.say(
                SpeechPriority::Info,
                &format!(
                    "My name is {}. I am a personal assistant developed to provide simple \
                     and complete control over your home and daily life.",
                    ctx.persona
                ),
            )
            .await?;
        } else if any_word(&text, &["old", "age"]) {
            let age = age_in_years(birthday(), Local::now().date_naive());
            let answer = if age > 0 {
                format!("I am {age} years old.")
            } else {
                "I am less than a year old. I was born on April 6th, twenty fifteen.".to_string()
            };
            mic.say(SpeechPriority::Info, &answer).await?;
        } else if any_word(&text, &["birth", "birthday", "born"]) {
            mic.say(
                SpeechPriority::Info,
                "I was born on April 6th, twenty fifteen.",
            )
            .await?;
        } else if contains_word(&text, "last") || text.contains("did you") {
            let answer = match ctx.memory.last_spoken().await? {
                Some(last) => format!("The last thing I said was, {last}"),
                None => "I haven't said anything yet.".to_string(),
            };
            mic.say(SpeechPriority::Alert, &answer).await?;
        } else {
            mic.say(
                SpeechPriority::Alert,
                "I'm not sure how to answer that about myself.",
            )
            .await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mic::testing::ScriptedConsole;
    use crate::storage::Storage;
    use nikita_core::Speaker;
    use std::sync::Arc;
    use tempfile::TempDir;

    async fn ask(question: &str, ctx: &ConversationContext) -> Vec<String> {
        let skill = AboutSkill::new().unwrap();
        let mut mic = ScriptedConsole::scripted("NIKITA", &[]);
        let mut session = DialogueSession::new(AboutSkill::NAME, 1);
        skill
            .handle(question, &mut mic, &mut session, ctx)
            .await
            .unwrap();
        mic.spoken()
    }

    #[test]
    fn matches_only_whole_words() {
        let skill = AboutSkill::new().unwrap();
        assert!(skill.matches("who are you"));
        assert!(skill.matches("tell me about yourself"));
        assert!(skill.matches("what is your name"));
        assert!(!skill.matches("young people"));
    }

    #[test]
    fn age_counts_whole_years() {
        let born = birthday();
        let day = |y, m, d| NaiveDate::from_ymd_opt(y, m, d).unwrap();
        assert_eq!(age_in_years(born, day(2015, 12, 1)), 0);
        assert_eq!(age_in_years(born, day(2016, 4, 6)), 1);
        assert_eq!(age_in_years(born, day(2026, 10, 16)), 11);
    }

    #[tokio::test]
    async fn answers_identity_and_creator_questions() {
        let ctx = ConversationContext::detached("NIKITA");
        let spoken = ask("who are you", &ctx).await;
        assert!(spoken[0].starts_with("My name is NIKITA."));

        let spoken = ask("who is your father", &ctx).await;
        assert!(spoken[0].starts_with("My father and creator is Brad Ahlers."));

        let spoken = ask("when were you born", &ctx).await;
        assert_eq!(spoken, vec!["I was born on April 6th, twenty fifteen."]);

        let spoken = ask("how old are you", &ctx).await;
        assert!(spoken[0].starts_with("I am "));
        assert!(spoken[0].ends_with("years old."));
    }

    #[tokio::test]
    async fn repeats_the_last_thing_said() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(&dir.path().join("test.db")).await.unwrap();
        storage.migrate_embedded().await.unwrap();
        storage
            .append_transcript(
                Speaker::Assistant,
                Some(SpeechPriority::Info),
                "I recommend Clue.",
            )
            .await
            .unwrap();
        storage
            .append_transcript(Speaker::User, None, "what was the last thing you said")
            .await
            .unwrap();
        let ctx = ConversationContext::new(Default::default(), "NIKITA", Arc::new(storage));

        let spoken = ask("what was the last thing you said", &ctx).await;
        assert_eq!(spoken, vec!["The last thing I said was, I recommend Clue."]);

        let empty = ConversationContext::detached("NIKITA");
        let spoken = ask("what did you say", &empty).await;
        assert_eq!(spoken, vec!["I haven't said anything yet."]);
    }

    #[tokio::test]
    async fn unknown_questions_get_an_answer() {
        let ctx = ConversationContext::detached("NIKITA");
        let spoken = ask("do you like pizza", &ctx).await;
        assert_eq!(spoken, vec!["I'm not sure how to answer that about myself."]);
    }
}

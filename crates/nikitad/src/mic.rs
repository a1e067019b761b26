//! Microphone implementations.
//!
//! `ConsoleMic` stands in for speech engines with a text console.
//! `RecordingMic` wraps any mic and writes everything said and heard to the
//! transcript.

use async_trait::async_trait;
use nikita_core::{Mic, MicError, Speaker, SpeechPriority};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{info, warn};

use crate::storage::Storage;

const ACTIVE_PROMPT: &str = "YOU: ";
const PASSIVE_PROMPT: &str = "> ";

/// Line-oriented console capability over any async reader/writer.
#[derive(Debug)]
pub struct ConsoleMic<R, W> {
    reader: R,
    writer: W,
    persona: String,
}

impl<R, W> ConsoleMic<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    pub fn new(reader: R, writer: W, persona: impl Into<String>) -> Self {
        Self {
            reader,
            writer,
            persona: persona.into(),
        }
    }

    async fn write_out(&mut self, text: &str) -> Result<(), MicError> {
        self.writer
            .write_all(text.as_bytes())
            .await
            .map_err(|e| MicError::Output(e.to_string()))?;
        self.writer
            .flush()
            .await
            .map_err(|e| MicError::Output(e.to_string()))
    }

    async fn read_line(&mut self, prompt: &str) -> Result<String, MicError> {
        self.write_out(prompt).await?;
        let mut line = String::new();
        let read = self
            .reader
            .read_line(&mut line)
            .await
            .map_err(|e| MicError::Capture(e.to_string()))?;
        if read == 0 {
            return Err(MicError::Closed);
        }
        Ok(line.trim().to_string())
    }
}

impl ConsoleMic<tokio::io::BufReader<tokio::io::Stdin>, tokio::io::Stdout> {
    /// Console on the process's stdin/stdout.
    pub fn stdio(persona: impl Into<String>) -> Self {
        Self::new(
            tokio::io::BufReader::new(tokio::io::stdin()),
            tokio::io::stdout(),
            persona,
        )
    }
}

#[async_trait]
impl<R, W> Mic for ConsoleMic<R, W>
where
    R: AsyncBufRead + Unpin + Send,
    W: AsyncWrite + Unpin + Send,
{
    async fn say(&mut self, _priority: SpeechPriority, text: &str) -> Result<(), MicError> {
        let line = format!("{}: {}\n", self.persona, text);
        self.write_out(&line).await
    }

    async fn listen_actively(&mut self) -> Result<String, MicError> {
        self.read_line(ACTIVE_PROMPT).await
    }

    async fn listen_passively(&mut self) -> Result<String, MicError> {
        self.read_line(PASSIVE_PROMPT).await
    }
}

/// Decorator that persists and logs every line to the transcript.
///
/// Transcript write failures are logged and never surface to the caller.
#[derive(Debug)]
pub struct RecordingMic<M> {
    inner: M,
    storage: Storage,
}

impl<M: Mic> RecordingMic<M> {
    pub fn new(inner: M, storage: Storage) -> Self {
        Self { inner, storage }
    }

    pub fn into_inner(self) -> M {
        self.inner
    }

    async fn record(
        storage: &Storage,
        speaker: Speaker,
        priority: Option<SpeechPriority>,
        text: &str,
    ) {
        info!(
            target: "transcript",
            speaker = speaker.as_str(),
            priority = priority.map(|p| p.as_str()).unwrap_or("-"),
            "{text}"
        );
        if let Err(e) = storage.append_transcript(speaker, priority, text).await {
            warn!(error = %e, "failed to record transcript line");
        }
    }

    async fn heard(storage: &Storage, result: Result<String, MicError>) -> Result<String, MicError> {
        let text = result?;
        if !text.is_empty() {
            Self::record(storage, Speaker::User, None, &text).await;
        }
        Ok(text)
    }
}

#[async_trait]
impl<M: Mic> Mic for RecordingMic<M> {
    async fn say(&mut self, priority: SpeechPriority, text: &str) -> Result<(), MicError> {
        self.inner.say(priority, text).await?;
        Self::record(&self.storage, Speaker::Assistant, Some(priority), text).await;
        Ok(())
    }

    async fn listen_actively(&mut self) -> Result<String, MicError> {
        let result = self.inner.listen_actively().await;
        Self::heard(&self.storage, result).await
    }

    async fn listen_passively(&mut self) -> Result<String, MicError> {
        let result = self.inner.listen_passively().await;
        Self::heard(&self.storage, result).await
    }
}

#[cfg(test)]
pub(crate) mod testing {
    //! Scripted console shared by the daemon's unit tests.

    use super::*;

    /// Console fed from a fixed script, one answer per line.
    pub(crate) type ScriptedConsole = ConsoleMic<std::io::Cursor<Vec<u8>>, Vec<u8>>;

    impl ScriptedConsole {
        pub(crate) fn scripted(persona: impl Into<String>, lines: &[&str]) -> Self {
            let mut input = lines.join("\n");
            if !lines.is_empty() {
                input.push('\n');
            }
            Self::new(std::io::Cursor::new(input.into_bytes()), Vec::new(), persona)
        }

        /// Lines spoken by the assistant, without the persona prefix.
        pub(crate) fn spoken(&self) -> Vec<String> {
            let prefix = format!("{}: ", self.persona);
            String::from_utf8_lossy(&self.writer)
                .split('\n')
                .filter_map(|line| {
                    // Prompts share a line with whatever is written next.
                    let mut line = line;
                    while let Some(rest) = line
                        .strip_prefix(ACTIVE_PROMPT)
                        .or_else(|| line.strip_prefix(PASSIVE_PROMPT))
                    {
                        line = rest;
                    }
                    line.strip_prefix(&prefix).map(str::to_string)
                })
                .collect()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::ScriptedConsole;
    use super::*;
    use tempfile::TempDir;

    fn console(input: &str) -> ConsoleMic<&[u8], Vec<u8>> {
        ConsoleMic::new(input.as_bytes(), Vec::new(), "NIKITA")
    }

    #[tokio::test]
    async fn scripted_console_reports_spoken_lines() {
        let mut mic = ScriptedConsole::scripted("NIKITA", &["home"]);
        mic.say(SpeechPriority::Alert, "At home or at the theater?")
            .await
            .unwrap();
        assert_eq!(mic.listen_actively().await.unwrap(), "home");
        mic.say(SpeechPriority::Info, "Enjoy.").await.unwrap();
        assert!(matches!(mic.listen_passively().await, Err(MicError::Closed)));
        assert_eq!(mic.spoken(), vec!["At home or at the theater?", "Enjoy."]);
    }

    #[tokio::test]
    async fn console_reads_trimmed_lines_until_eof() {
        let mut mic = console("  what movie should I watch \nhome\n");
        assert_eq!(
            mic.listen_passively().await.unwrap(),
            "what movie should I watch"
        );
        assert_eq!(mic.listen_actively().await.unwrap(), "home");
        assert!(matches!(mic.listen_actively().await, Err(MicError::Closed)));
    }

    #[tokio::test]
    async fn console_prefixes_spoken_lines_with_persona() {
        let mut mic = console("");
        mic.say(SpeechPriority::Alert, "How can I be of service?")
            .await
            .unwrap();
        let out = String::from_utf8(mic.writer.clone()).unwrap();
        assert_eq!(out, "NIKITA: How can I be of service?\n");
    }

    #[tokio::test]
    async fn recording_mic_writes_transcript() {
        let dir = TempDir::new().unwrap();
        let storage = Storage::new(&dir.path().join("test.db")).await.unwrap();
        storage.migrate_embedded().await.unwrap();

        let mut mic = RecordingMic::new(console("who are you\n\n"), storage.clone());
        mic.say(SpeechPriority::Alert, "Yes?").await.unwrap();
        assert_eq!(mic.listen_actively().await.unwrap(), "who are you");
        // Blank lines are not recorded.
        assert_eq!(mic.listen_actively().await.unwrap(), "");
        assert!(matches!(
            mic.listen_passively().await,
            Err(MicError::Closed)
        ));

        let lines = storage.recent_transcript(10).await.unwrap();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0].speaker, Speaker::Assistant);
        assert_eq!(lines[0].text, "Yes?");
        assert_eq!(lines[1].speaker, Speaker::User);
        assert_eq!(lines[1].text, "who are you");

        let inner = mic.into_inner();
        assert!(String::from_utf8(inner.writer).unwrap().contains("NIKITA: Yes?"));
    }
}

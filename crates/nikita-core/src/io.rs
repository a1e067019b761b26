//! Speech input/output capability consumed by the loop and by skills.
//!
//! Transcription and synthesis engines live behind this trait; the core only
//! needs to speak a line and to block until the next line is heard.

use async_trait::async_trait;
use thiserror::Error;

use crate::types::SpeechPriority;

#[derive(Debug, Error)]
pub enum MicError {
    /// The input device is gone for good (e.g. EOF on the console).
    #[error("input closed")]
    Closed,
    /// A single capture attempt failed; listening again may succeed.
    #[error("capture failed: {0}")]
    Capture(String),
    /// Speech output failed.
    #[error("speech output failed: {0}")]
    Output(String),
}

impl MicError {
    /// Whether the loop must stop rather than listen again.
    pub fn is_fatal(&self) -> bool {
        matches!(self, Self::Closed)
    }
}

/// Blocking speak/listen capability.
///
/// Both listen operations are suspension points with no timeout of their
/// own; an implementation may impose one and surface it as
/// [`MicError::Capture`].
#[async_trait]
pub trait Mic: Send {
    /// Speak one line to the user.
    async fn say(&mut self, priority: SpeechPriority, text: &str) -> Result<(), MicError>;

    /// Capture an immediate answer to a question the assistant just asked.
    async fn listen_actively(&mut self) -> Result<String, MicError>;

    /// Capture ambient speech that may start a new turn.
    async fn listen_passively(&mut self) -> Result<String, MicError>;
}

#[async_trait]
impl<M: Mic + ?Sized> Mic for Box<M> {
    async fn say(&mut self, priority: SpeechPriority, text: &str) -> Result<(), MicError> {
        (**self).say(priority, text).await
    }

    async fn listen_actively(&mut self) -> Result<String, MicError> {
        (**self).listen_actively().await
    }

    async fn listen_passively(&mut self) -> Result<String, MicError> {
        (**self).listen_passively().await
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_closed_is_fatal() {
        assert!(MicError::Closed.is_fatal());
        assert!(!MicError::Capture("noise".into()).is_fatal());
        assert!(!MicError::Output("tts".into()).is_fatal());
    }
}

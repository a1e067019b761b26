//! Read-only context handed to every skill invocation.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::profile::Profile;

#[derive(Debug, Error)]
pub enum MemoryError {
    #[error("memory backend error: {0}")]
    Backend(String),
}

/// Persistent conversation memory shared across turns.
#[async_trait]
pub trait Memory: Send + Sync {
    /// The last sentence the assistant spoke, if any.
    async fn last_spoken(&self) -> Result<Option<String>, MemoryError>;

    /// Counts one call against an external API for the current month.
    async fn record_api_call(&self, api: &str) -> Result<(), MemoryError>;
}

/// Memory that remembers nothing.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoMemory;

#[async_trait]
impl Memory for NoMemory {
    async fn last_spoken(&self) -> Result<Option<String>, MemoryError> {
        Ok(None)
    }

    async fn record_api_call(&self, _api: &str) -> Result<(), MemoryError> {
        Ok(())
    }
}

/// Profile, persona and memory. Skills only read it.
#[derive(Clone)]
pub struct ConversationContext {
    pub profile: Profile,
    /// Name the assistant answers to.
    pub persona: String,
    pub memory: Arc<dyn Memory>,
}

impl std::fmt::Debug for ConversationContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConversationContext")
            .field("profile", &self.profile)
            .field("persona", &self.persona)
            .finish_non_exhaustive()
    }
}

impl ConversationContext {
    pub fn new(profile: Profile, persona: impl Into<String>, memory: Arc<dyn Memory>) -> Self {
        Self {
            profile,
            persona: persona.into(),
            memory,
        }
    }

    /// Context with an empty profile and no memory.
    pub fn detached(persona: impl Into<String>) -> Self {
        Self::new(Profile::default(), persona, Arc::new(NoMemory))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn no_memory_remembers_nothing() {
        let ctx = ConversationContext::detached("NIKITA");
        ctx.memory.record_api_call("Rotten Tomatoes").await.unwrap();
        assert_eq!(ctx.memory.last_spoken().await.unwrap(), None);
    }
}

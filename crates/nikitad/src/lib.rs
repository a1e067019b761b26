//! nikitad - voice assistant daemon
//!
//! Library components for the assistant process: the conversation loop,
//! persistence, microphones and the built-in skills.

pub mod conversation;
pub mod mic;
pub mod skills;
pub mod storage;

use std::path::Path;
use std::sync::Arc;

use conversation::{Conversation, ConversationSettings};
use mic::RecordingMic;
use nikita_core::config::ConfigError;
use nikita_core::profile::ProfileError;
use nikita_core::{Config, ConversationContext, Mic, MicError, Profile, RegistryError, SkillRegistry};
use storage::{Storage, StorageError};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

#[derive(Debug, Error)]
pub enum AssistantError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("profile error: {0}")]
    Profile(#[from] ProfileError),
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
    #[error("skill registration failed: {0}")]
    Registry(#[from] RegistryError),
    #[error("microphone error: {0}")]
    Mic(#[from] MicError),
}

/// Loads the user profile. A missing file yields the default profile.
pub fn load_profile(path: &Path) -> Result<Profile, AssistantError> {
    if !path.exists() {
        warn!(path = %path.display(), "profile not found, using defaults");
        return Ok(Profile::default());
    }
    Ok(Profile::from_file(path)?)
}

/// Assistant state shared by every conversation.
#[derive(Debug)]
pub struct Assistant {
    config: Config,
    storage: Storage,
    registry: SkillRegistry,
    ctx: ConversationContext,
}

impl Assistant {
    /// Opens storage, runs migrations, loads the profile and registers the
    /// built-in skills.
    pub async fn new(config: Config) -> Result<Self, AssistantError> {
        let storage = Storage::new(&config.db_path).await?;
        storage.migrate_embedded().await?;

        let profile = load_profile(&config.profile_path)?;
        let registry = skills::builtin_registry(&config)?;
        let ctx = ConversationContext::new(
            profile,
            config.persona_name.clone(),
            Arc::new(storage.clone()),
        );

        Ok(Self {
            config,
            storage,
            registry,
            ctx,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// A conversation over `mic` that records its transcript and events.
    pub fn conversation<M: Mic>(&self, mic: M) -> Conversation<RecordingMic<M>> {
        Conversation::new(
            RecordingMic::new(mic, self.storage.clone()),
            self.registry.clone(),
            self.ctx.clone(),
            ConversationSettings::from_config(&self.config),
        )
        .with_events(self.storage.clone())
    }

    /// Greets the user and runs the conversation loop until the input
    /// closes or `cancel` fires.
    pub async fn run<M: Mic>(&self, mic: M, cancel: CancellationToken) -> Result<(), AssistantError> {
        info!(
            persona = %self.config.persona_name,
            database = %self.config.db_path.display(),
            skills = self.registry.len(),
            "assistant starting"
        );

        let mut conversation = self.conversation(mic);
        let result = match conversation.greet().await {
            Ok(()) => conversation.run_forever(cancel).await,
            Err(e) => Err(e),
        };
        match result {
            Ok(()) | Err(MicError::Closed) => {
                info!("assistant stopped");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }
}

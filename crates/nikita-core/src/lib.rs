pub mod config;
pub mod context;
pub mod dialogue;
pub mod events;
pub mod io;
pub mod matcher;
pub mod profile;
pub mod registry;
pub mod skills;
pub mod text;
pub mod types;

pub use config::Config;
pub use context::{ConversationContext, Memory, MemoryError};
pub use dialogue::{DialogueSession, Slot, SlotOutcome, SlotState};
pub use io::{Mic, MicError};
pub use matcher::{evaluate, select, IntentMatch};
pub use profile::Profile;
pub use registry::{RegistryError, SkillRegistry};
pub use skills::{Skill, TriggerError, TriggerSet};
pub use types::*;

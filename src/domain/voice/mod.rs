pub mod catalog;
pub mod resolver;

pub use catalog::{Gender, VoiceCatalog, VoiceDescriptor};
pub use resolver::{ResolvedVoice, VoiceResolver, DEFAULT_LANGUAGE, DEFAULT_VOICE};

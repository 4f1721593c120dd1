pub mod auth;
pub mod client;
pub mod models;
pub mod persona;
pub mod providers;
pub mod resolver;
pub mod splitter;
pub mod tts;
pub mod types;

// Re-exports for convenience
pub use auth::config::{AppConfig, ConfigManager};
pub use auth::sniff::resolve_api_key;
pub use client::{AskError, CandidateSource, PhraseAudio, StudyBuddy, StudyBuddyBuilder};
pub use persona::Persona;
pub use providers::{GeminiClient, GenerativeBackend, ProviderError};
pub use resolver::{resolve, resolve_async};
pub use splitter::{normalize, split, split_with, Markers};
pub use tts::{SpeechSynthesizer, TranslateTts, TtsError};
pub use types::*;

//! Mock-interview sessions against a chat-completion model.
//!
//! [`InterviewController`] is the entry point: it owns the active
//! [`InterviewSession`], reaches the model through a [`ModelGateway`] and keeps
//! saved transcripts in a [`TranscriptStore`].

pub mod auth;
pub mod controller;
pub mod error;
pub mod gateway;
pub mod persona;
pub mod session_state;
pub mod settings;
pub mod speech;
pub mod store;
pub mod transcript;
pub mod turn;

pub use auth::{AuthError, Identity, IdentityProvider, MemoryIdentityProvider};
pub use controller::InterviewController;
pub use error::{InterviewError, Result};
pub use gateway::{GatewayError, ModelGateway, OpenAiClient, ProxyGateway};
pub use persona::Persona;
pub use session_state::{InterviewSession, Phase, SessionConfig};
pub use settings::{FileKeyValueStore, KeyValueStore, MemoryKeyValueStore, VoiceSettings};
pub use speech::{CommandRecognizer, CommandSynth, Narrator, SpeechRecognizer, SpeechSynth};
pub use store::{FileTranscriptStore, MemoryTranscriptStore};
pub use transcript::{Transcript, TranscriptFeed, TranscriptId, TranscriptStore};
pub use turn::{Role, Turn};

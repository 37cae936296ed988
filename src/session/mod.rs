//! Voice session management
//!
//! This module provides the session abstraction that manages:
//! - The connection lifecycle state machine
//! - Microphone capture and wire encoding
//! - Gapless playback of returned audio with interruption
//! - Transcript accumulation and the conversation log

mod config;
mod controller;
mod state;
mod transcript;

pub use config::SessionConfig;
pub use controller::{SessionController, SessionHandle};
pub use state::{Message, Role, SessionStatus, VoiceState};
pub use transcript::{Direction, TranscriptAggregator};

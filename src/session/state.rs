use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Connection status of the session
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    /// No session; the idle/terminal state
    Disconnected,
    /// Transport connection in flight
    Connecting,
    /// Live session; audio is flowing
    Connected,
    /// Session-fatal failure; cleared only by an explicit restart
    Error,
}

/// Who said a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
}

/// One completed entry in the conversation log
///
/// Immutable once created; only complete turns become messages, partial
/// transcript fragments never appear in the log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub text: String,
    pub timestamp: DateTime<Utc>,
}

impl Message {
    pub fn new(role: Role, text: String) -> Self {
        Self {
            id: Uuid::new_v4(),
            role,
            text,
            timestamp: Utc::now(),
        }
    }
}

/// Read-only projection of the live session for a UI layer
///
/// Recomputed from session state on every read, never stored or mutated
/// independently.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct VoiceState {
    /// Microphone capture is running
    pub is_listening: bool,
    /// At least one playback unit is scheduled or playing
    pub is_speaking: bool,
    pub status: SessionStatus,
}

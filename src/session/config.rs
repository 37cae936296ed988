use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Configuration for a voice session
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Microphone capture rate in Hz (speech input)
    pub capture_sample_rate: u32,

    /// Synthesized speech rate in Hz from the remote service
    pub playback_sample_rate: u32,

    /// Samples per captured frame
    pub frame_samples: usize,

    /// Bound on transport connection establishment; on expiry the session
    /// enters the error state
    #[serde(with = "duration_secs")]
    pub connect_timeout: Duration,

    /// Optional path to dump captured audio as WAV for diagnosis
    pub dump_path: Option<String>,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate: 16000,
            playback_sample_rate: 24000,
            frame_samples: 4096,
            connect_timeout: Duration::from_secs(10),
            dump_path: None,
        }
    }
}

/// Serialize the timeout as whole seconds
mod duration_secs {
    use serde::{Deserialize, Deserializer, Serialize, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        d.as_secs().serialize(s)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(d)?))
    }
}

use anyhow::{Context, Result};
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::audio::pcm;

/// Encoded audio payload exchanged with the remote service
///
/// Carries base64-encoded little-endian 16-bit PCM plus a MIME-style
/// descriptor of the form `audio/pcm;rate=<sample_rate>`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireAudioChunk {
    /// Base64-encoded PCM bytes
    pub data: String,
    /// MIME descriptor, e.g. "audio/pcm;rate=16000"
    pub mime_type: String,
}

impl WireAudioChunk {
    /// Encode 16-bit samples into a wire chunk at the given sample rate
    pub fn from_samples(samples: &[i16], sample_rate: u32) -> Self {
        let pcm_bytes = pcm::pcm16_to_bytes(samples);

        Self {
            data: base64::engine::general_purpose::STANDARD.encode(&pcm_bytes),
            mime_type: format!("audio/pcm;rate={}", sample_rate),
        }
    }

    /// Decode the payload back into 16-bit samples
    pub fn decode(&self) -> Result<Vec<i16>> {
        let pcm_bytes = base64::engine::general_purpose::STANDARD
            .decode(&self.data)
            .context("Failed to decode base64 audio payload")?;

        pcm::bytes_to_pcm16(&pcm_bytes)
    }

    /// Parse the sample rate out of the MIME descriptor, if present
    pub fn sample_rate(&self) -> Option<u32> {
        self.mime_type
            .split(';')
            .filter_map(|part| part.trim().strip_prefix("rate="))
            .find_map(|rate| rate.parse().ok())
    }
}

/// Outbound event sent to the remote service
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientEvent {
    /// A chunk of captured microphone audio
    Audio { chunk: WireAudioChunk },
    /// A typed user message
    Text { text: String },
}

/// Inbound event received from the remote service
///
/// Any combination of fields may be present on a single event; absent
/// fields default to empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ServerEvent {
    /// Synthesized speech to schedule for playback
    pub audio: Option<WireAudioChunk>,

    /// Fragment of the transcription of the user's input audio
    pub input_transcription: Option<String>,

    /// Fragment of the transcription of the assistant's output audio
    pub output_transcription: Option<String>,

    /// The current turn is complete; accumulated fragments should be flushed
    pub turn_complete: bool,

    /// The remote service overrode in-progress playback (user barge-in)
    pub interrupted: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_chunk_round_trip() {
        let samples = vec![100_i16, -200, 300, -400];

        let chunk = WireAudioChunk::from_samples(&samples, 16000);
        assert_eq!(chunk.mime_type, "audio/pcm;rate=16000");
        assert_eq!(chunk.sample_rate(), Some(16000));

        let decoded = chunk.decode().unwrap();
        assert_eq!(decoded, samples);
    }

    #[test]
    fn test_chunk_rejects_invalid_base64() {
        let chunk = WireAudioChunk {
            data: "not base64!!".to_string(),
            mime_type: "audio/pcm;rate=24000".to_string(),
        };

        assert!(chunk.decode().is_err());
    }

    #[test]
    fn test_sample_rate_missing_from_mime() {
        let chunk = WireAudioChunk {
            data: String::new(),
            mime_type: "audio/pcm".to_string(),
        };

        assert_eq!(chunk.sample_rate(), None);
    }
}

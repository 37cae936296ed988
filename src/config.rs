use anyhow::Result;
use serde::Deserialize;
use std::time::Duration;

use crate::audio::CaptureConfig;
use crate::session::SessionConfig;

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Config {
    pub service: ServiceConfig,
    pub audio: AudioConfig,
    pub transport: TransportConfig,
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    pub name: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            name: "voicelink".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct AudioConfig {
    /// Microphone capture rate in Hz
    pub capture_sample_rate: u32,
    /// Synthesized speech rate in Hz
    pub playback_sample_rate: u32,
    /// Samples per captured frame
    pub frame_samples: usize,
    /// Input device name; None picks the system default
    pub input_device: Option<String>,
    /// Optional WAV dump path for captured audio
    pub dump_path: Option<String>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            capture_sample_rate: 16000,
            playback_sample_rate: 24000,
            frame_samples: 4096,
            input_device: None,
            dump_path: None,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Remote service endpoint, handed to the transport implementation
    pub url: String,
    /// Seconds allowed for connection establishment
    pub connect_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            url: "wss://localhost:8443/session".to_string(),
            connect_timeout_secs: 10,
        }
    }
}

impl Config {
    /// Load from a config file; missing files fall back to defaults
    pub fn load(path: &str) -> Result<Self> {
        let settings = config::Config::builder()
            .add_source(config::File::with_name(path).required(false))
            .build()?;

        Ok(settings.try_deserialize()?)
    }

    /// Session configuration derived from the audio/transport sections
    pub fn session_config(&self) -> SessionConfig {
        SessionConfig {
            capture_sample_rate: self.audio.capture_sample_rate,
            playback_sample_rate: self.audio.playback_sample_rate,
            frame_samples: self.audio.frame_samples,
            connect_timeout: Duration::from_secs(self.transport.connect_timeout_secs),
            dump_path: self.audio.dump_path.clone(),
        }
    }

    /// Capture backend configuration from the audio section
    pub fn capture_config(&self) -> CaptureConfig {
        CaptureConfig {
            sample_rate: self.audio.capture_sample_rate,
            frame_samples: self.audio.frame_samples,
            device: self.audio.input_device.clone(),
        }
    }
}

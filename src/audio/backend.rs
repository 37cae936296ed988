use anyhow::Result;
use tokio::sync::mpsc;

/// Fixed-size block of mono samples from the microphone
///
/// Samples are floats in [-1.0, 1.0]; conversion to the wire format happens
/// in the session's capture pipeline, not at the device.
#[derive(Debug, Clone)]
pub struct AudioFrame {
    /// Mono f32 samples
    pub samples: Vec<f32>,
    /// Sample rate in Hz
    pub sample_rate: u32,
    /// Timestamp in milliseconds since capture started
    pub timestamp_ms: u64,
}

/// Configuration for a capture backend
#[derive(Debug, Clone)]
pub struct CaptureConfig {
    /// Capture sample rate in Hz
    pub sample_rate: u32,
    /// Samples per delivered frame
    pub frame_samples: usize,
    /// Input device name; None picks the system default
    pub device: Option<String>,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            sample_rate: 16000, // speech input rate
            frame_samples: 4096,
            device: None,
        }
    }
}

/// Microphone capture backend trait
///
/// The microphone is a process-wide singleton; one backend instance is
/// created up front and started/stopped once per session.
#[async_trait::async_trait]
pub trait CaptureBackend: Send + Sync {
    /// Start capturing audio
    ///
    /// Returns a channel receiver that will receive fixed-size frames.
    async fn start(&mut self) -> Result<mpsc::Receiver<AudioFrame>>;

    /// Stop capturing audio
    ///
    /// Stopping an idle backend returns Ok.
    async fn stop(&mut self) -> Result<()>;

    /// Check if backend is currently capturing
    fn is_capturing(&self) -> bool;

    /// Get backend name for logging
    fn name(&self) -> &str;
}

/// Capture backend factory
pub struct CaptureBackendFactory;

impl CaptureBackendFactory {
    /// Create the platform capture backend (cpal microphone input)
    pub fn create(config: CaptureConfig) -> Result<Box<dyn CaptureBackend>> {
        let backend = super::cpal_backend::CpalCaptureBackend::new(config);
        Ok(Box::new(backend))
    }
}

pub mod backend;
pub mod cpal_backend;
pub mod pcm;
pub mod playback;
pub mod wav;

pub use backend::{AudioFrame, CaptureBackend, CaptureBackendFactory, CaptureConfig};
pub use playback::{
    AudioSink, CpalSink, MonotonicClock, PlaybackClock, PlaybackScheduler, PlaybackUnit,
    PLAYBACK_SAMPLE_RATE,
};
pub use wav::WavDump;

pub mod audio;
pub mod config;
pub mod session;
pub mod transport;

pub use audio::{
    AudioFrame, AudioSink, CaptureBackend, CaptureBackendFactory, CaptureConfig, CpalSink,
    MonotonicClock, PlaybackClock, PlaybackScheduler, PlaybackUnit, WavDump,
    PLAYBACK_SAMPLE_RATE,
};
pub use config::Config;
pub use session::{
    Direction, Message, Role, SessionConfig, SessionController, SessionHandle, SessionStatus,
    TranscriptAggregator, VoiceState,
};
pub use transport::{
    ClientEvent, ServerEvent, SessionTransport, TransportConnector, TransportEvent,
    WireAudioChunk,
};

//! Gapless playback scheduling for inbound audio chunks
//!
//! The scheduler keeps a watermark on a monotonic clock: each decoded chunk
//! is scheduled to start exactly at the watermark (clamped forward to "now"
//! so late bursts never play in the past) and the watermark advances by the
//! chunk's duration. Back-to-back chunks therefore play without client-side
//! gaps regardless of network jitter. `interrupt` cancels every in-flight
//! unit and resets the watermark so nothing inherits stale future start
//! times.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use anyhow::{anyhow, Result};
use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use cpal::SampleRate;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

use super::pcm;
use crate::transport::WireAudioChunk;

/// Sample rate of synthesized speech from the remote service
pub const PLAYBACK_SAMPLE_RATE: u32 = 24000;

/// Monotonic clock the scheduler positions playback on
pub trait PlaybackClock: Send + Sync {
    /// Time elapsed since the clock's origin
    fn now(&self) -> Duration;
}

/// Real clock backed by `Instant`
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl PlaybackClock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Destination for decoded samples
///
/// The output device is a process-wide singleton owned for the lifetime of
/// the core; sessions share it through the scheduler.
pub trait AudioSink: Send + Sync {
    /// Append samples to the output queue
    fn enqueue(&self, samples: &[f32]) -> Result<()>;

    /// Drop everything queued or playing
    ///
    /// Clearing an already-empty sink is a no-op.
    fn clear(&self);
}

/// Speaker output via cpal
///
/// A dedicated thread owns the (!Send) output stream; the stream callback
/// drains a shared queue, so the sink handle itself is freely shareable.
pub struct CpalSink {
    queue: Arc<Mutex<VecDeque<f32>>>,
    stop_tx: Option<std::sync::mpsc::Sender<()>>,
}

impl CpalSink {
    /// Open the default output device at the given rate
    pub fn new(sample_rate: u32) -> Result<Self> {
        let queue: Arc<Mutex<VecDeque<f32>>> = Arc::new(Mutex::new(VecDeque::new()));
        let (ready_tx, ready_rx) = std::sync::mpsc::channel::<Result<()>>();
        let (stop_tx, stop_rx) = std::sync::mpsc::channel::<()>();

        let callback_queue = Arc::clone(&queue);

        let thread = std::thread::spawn(move || {
            let stream = Self::build_stream(sample_rate, callback_queue);

            let stream = match stream {
                Ok(stream) => stream,
                Err(e) => {
                    let _ = ready_tx.send(Err(e));
                    return;
                }
            };

            if let Err(e) = stream.play() {
                let _ = ready_tx.send(Err(anyhow!("Failed to start output stream: {}", e)));
                return;
            }

            let _ = ready_tx.send(Ok(()));

            // Park until dropped
            let _ = stop_rx.recv();
            drop(stream);
        });

        match ready_rx.recv() {
            Ok(Ok(())) => {
                info!("Audio output opened ({}Hz)", sample_rate);
                Ok(Self {
                    queue,
                    stop_tx: Some(stop_tx),
                })
            }
            Ok(Err(e)) => {
                let _ = thread.join();
                Err(e)
            }
            Err(_) => {
                let _ = thread.join();
                anyhow::bail!("Output thread exited before reporting readiness")
            }
        }
    }

    fn build_stream(
        sample_rate: u32,
        queue: Arc<Mutex<VecDeque<f32>>>,
    ) -> Result<cpal::Stream> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| anyhow!("No output device available"))?;

        let supported = device
            .supported_output_configs()
            .map_err(|e| anyhow!("Failed to query output configs: {}", e))?
            .find(|c| {
                c.channels() <= 2
                    && c.min_sample_rate() <= SampleRate(sample_rate)
                    && c.max_sample_rate() >= SampleRate(sample_rate)
            })
            .ok_or_else(|| anyhow!("No output config at {}Hz", sample_rate))?;

        let config = supported.with_sample_rate(SampleRate(sample_rate)).config();
        let channels = config.channels as usize;

        let stream = device
            .build_output_stream(
                &config,
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    let mut queue = match queue.lock() {
                        Ok(queue) => queue,
                        Err(_) => return,
                    };

                    for frame in data.chunks_mut(channels) {
                        let sample = queue.pop_front().unwrap_or(0.0);
                        for out in frame.iter_mut() {
                            *out = sample;
                        }
                    }
                },
                |err| {
                    error!("Audio playback stream error: {}", err);
                },
                None,
            )
            .map_err(|e| anyhow!("Failed to build output stream: {}", e))?;

        Ok(stream)
    }
}

impl AudioSink for CpalSink {
    fn enqueue(&self, samples: &[f32]) -> Result<()> {
        let mut queue = self
            .queue
            .lock()
            .map_err(|_| anyhow!("Output queue lock poisoned"))?;
        queue.extend(samples.iter().copied());
        Ok(())
    }

    fn clear(&self) {
        if let Ok(mut queue) = self.queue.lock() {
            queue.clear();
        }
    }
}

impl Drop for CpalSink {
    fn drop(&mut self) {
        // Signal and detach: the output thread drops the stream and exits
        // on its own, so dropping the sink never blocks the caller
        if let Some(stop_tx) = self.stop_tx.take() {
            let _ = stop_tx.send(());
        }
    }
}

/// Metadata for a scheduled playback unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PlaybackUnit {
    pub id: u64,
    /// Scheduled start on the playback clock
    pub start: Duration,
    /// Length of the decoded audio
    pub duration: Duration,
}

struct SchedulerState {
    /// Next unit starts here; monotonically non-decreasing between resets
    watermark: Duration,
    /// Cancellation handles for in-flight units
    active: HashMap<u64, oneshot::Sender<()>>,
    next_id: u64,
}

/// Schedules decoded chunks for contiguous playback with hard interruption
pub struct PlaybackScheduler {
    clock: Arc<dyn PlaybackClock>,
    sink: Arc<dyn AudioSink>,
    default_sample_rate: u32,
    state: Arc<Mutex<SchedulerState>>,
}

impl PlaybackScheduler {
    pub fn new(clock: Arc<dyn PlaybackClock>, sink: Arc<dyn AudioSink>) -> Self {
        let watermark = clock.now();

        Self {
            clock,
            sink,
            default_sample_rate: PLAYBACK_SAMPLE_RATE,
            state: Arc::new(Mutex::new(SchedulerState {
                watermark,
                active: HashMap::new(),
                next_id: 0,
            })),
        }
    }

    /// Decode a wire chunk and schedule it at the watermark
    ///
    /// Decode failures leave the watermark untouched, so one malformed
    /// chunk never affects the units queued around it.
    pub fn enqueue_chunk(&self, chunk: &WireAudioChunk) -> Result<PlaybackUnit> {
        let pcm_samples = chunk.decode()?;
        let sample_rate = chunk.sample_rate().unwrap_or(self.default_sample_rate);
        let samples = pcm::pcm16_to_f32(&pcm_samples);

        let duration =
            Duration::from_secs_f64(samples.len() as f64 / f64::from(sample_rate));

        let (unit, cancel_rx) = {
            let mut state = self
                .state
                .lock()
                .map_err(|_| anyhow!("Scheduler lock poisoned"))?;

            // A burst arriving late must not be scheduled in the past
            let now = self.clock.now();
            if state.watermark < now {
                state.watermark = now;
            }

            let unit = PlaybackUnit {
                id: state.next_id,
                start: state.watermark,
                duration,
            };
            state.next_id += 1;
            state.watermark += duration;

            if samples.is_empty() {
                debug!("Skipping empty audio chunk");
                return Ok(unit);
            }

            let (cancel_tx, cancel_rx) = oneshot::channel();
            state.active.insert(unit.id, cancel_tx);
            (unit, cancel_rx)
        };

        let clock = Arc::clone(&self.clock);
        let sink = Arc::clone(&self.sink);
        let state = Arc::clone(&self.state);

        tokio::spawn(async move {
            Self::run_unit(unit, samples, clock, sink, cancel_rx).await;

            if let Ok(mut state) = state.lock() {
                state.active.remove(&unit.id);
            }
        });

        debug!(
            "Scheduled unit {} at {:?} for {:?}",
            unit.id, unit.start, unit.duration
        );

        Ok(unit)
    }

    /// Wait for the unit's start time, enqueue it, then wait out its length
    async fn run_unit(
        unit: PlaybackUnit,
        samples: Vec<f32>,
        clock: Arc<dyn PlaybackClock>,
        sink: Arc<dyn AudioSink>,
        mut cancel_rx: oneshot::Receiver<()>,
    ) {
        let delay = unit.start.saturating_sub(clock.now());

        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = &mut cancel_rx => return,
        }

        if let Err(e) = sink.enqueue(&samples) {
            warn!("Failed to enqueue unit {} for playback: {}", unit.id, e);
            return;
        }

        tokio::select! {
            _ = tokio::time::sleep(unit.duration) => {}
            _ = &mut cancel_rx => {}
        }
    }

    /// Hard-cancel all in-flight units and reset the watermark to now
    pub fn interrupt(&self) {
        let cancelled = match self.state.lock() {
            Ok(mut state) => {
                // Dropping the senders cancels the unit tasks; cancelling a
                // unit that already finished is a no-op
                let cancelled = state.active.len();
                state.active.clear();
                state.watermark = self.clock.now();
                cancelled
            }
            Err(_) => 0,
        };

        self.sink.clear();

        if cancelled > 0 {
            info!("Playback interrupted: {} units cancelled", cancelled);
        }
    }

    /// Reset for a fresh session: cancel everything, watermark = now
    pub fn reset(&self) {
        self.interrupt();
        debug!("Playback scheduler reset");
    }

    /// True while any unit is scheduled or playing
    pub fn is_speaking(&self) -> bool {
        self.state
            .lock()
            .map(|state| !state.active.is_empty())
            .unwrap_or(false)
    }

    /// Current scheduling watermark
    pub fn watermark(&self) -> Duration {
        self.state
            .lock()
            .map(|state| state.watermark)
            .unwrap_or_default()
    }
}

use std::sync::{Arc, Mutex};
use std::time::Duration;

use anyhow::Result;
use voicelink::audio::{AudioSink, MonotonicClock, PlaybackClock, PlaybackScheduler};
use voicelink::transport::WireAudioChunk;

/// Test clock advanced by hand
struct ManualClock {
    now: Mutex<Duration>,
}

impl ManualClock {
    fn new() -> Arc<Self> {
        Arc::new(Self {
            now: Mutex::new(Duration::ZERO),
        })
    }

    fn advance(&self, by: Duration) {
        *self.now.lock().unwrap() += by;
    }
}

impl PlaybackClock for ManualClock {
    fn now(&self) -> Duration {
        *self.now.lock().unwrap()
    }
}

/// Sink that records what reaches the output
#[derive(Default)]
struct RecordingSink {
    enqueued: Mutex<Vec<usize>>,
    clears: Mutex<usize>,
}

impl RecordingSink {
    fn enqueued_lens(&self) -> Vec<usize> {
        self.enqueued.lock().unwrap().clone()
    }

    fn clear_count(&self) -> usize {
        *self.clears.lock().unwrap()
    }
}

impl AudioSink for RecordingSink {
    fn enqueue(&self, samples: &[f32]) -> Result<()> {
        self.enqueued.lock().unwrap().push(samples.len());
        Ok(())
    }

    fn clear(&self) {
        *self.clears.lock().unwrap() += 1;
    }
}

/// A silent chunk of the given length at the playback rate
fn chunk_of_ms(ms: u64) -> WireAudioChunk {
    let samples = vec![0_i16; (24000 * ms / 1000) as usize];
    WireAudioChunk::from_samples(&samples, 24000)
}

#[tokio::test]
async fn test_units_scheduled_back_to_back() {
    let clock = ManualClock::new();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = PlaybackScheduler::new(clock.clone(), sink);

    let a = scheduler.enqueue_chunk(&chunk_of_ms(100)).unwrap();
    let b = scheduler.enqueue_chunk(&chunk_of_ms(50)).unwrap();
    let c = scheduler.enqueue_chunk(&chunk_of_ms(200)).unwrap();

    // Each unit starts exactly where the previous one ends
    assert_eq!(a.start, Duration::ZERO);
    assert_eq!(b.start, a.start + a.duration);
    assert_eq!(c.start, b.start + b.duration);

    // And never before the clock time at which it was scheduled
    assert!(a.start >= Duration::ZERO);
    assert_eq!(scheduler.watermark(), c.start + c.duration);
}

#[tokio::test]
async fn test_late_burst_clamps_to_now() {
    let clock = ManualClock::new();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = PlaybackScheduler::new(clock.clone(), sink);

    let first = scheduler.enqueue_chunk(&chunk_of_ms(100)).unwrap();
    assert_eq!(first.start, Duration::ZERO);

    // The stream went quiet; the watermark is now in the past
    clock.advance(Duration::from_millis(250));

    let late = scheduler.enqueue_chunk(&chunk_of_ms(100)).unwrap();
    assert_eq!(late.start, Duration::from_millis(250));
    assert_eq!(
        scheduler.watermark(),
        Duration::from_millis(250) + late.duration
    );
}

#[tokio::test]
async fn test_interrupt_clears_active_set_and_watermark() {
    let clock = ManualClock::new();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = PlaybackScheduler::new(clock.clone(), sink.clone());

    scheduler.enqueue_chunk(&chunk_of_ms(1000)).unwrap();
    scheduler.enqueue_chunk(&chunk_of_ms(1000)).unwrap();
    assert!(scheduler.is_speaking());

    clock.advance(Duration::from_millis(300));
    scheduler.interrupt();

    assert!(!scheduler.is_speaking());
    assert_eq!(scheduler.watermark(), Duration::from_millis(300));
    assert_eq!(sink.clear_count(), 1);

    // The next chunk must not inherit the pre-interruption watermark
    let next = scheduler.enqueue_chunk(&chunk_of_ms(100)).unwrap();
    assert_eq!(next.start, Duration::from_millis(300));
}

#[tokio::test]
async fn test_interrupt_when_idle_is_harmless() {
    let clock = ManualClock::new();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = PlaybackScheduler::new(clock, sink);

    scheduler.interrupt();
    scheduler.interrupt();
    assert!(!scheduler.is_speaking());
}

#[tokio::test]
async fn test_decode_failure_leaves_watermark_untouched() {
    let clock = ManualClock::new();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = PlaybackScheduler::new(clock, sink);

    let good = scheduler.enqueue_chunk(&chunk_of_ms(100)).unwrap();
    let watermark_before = scheduler.watermark();

    let bad = WireAudioChunk {
        data: "%%% not base64 %%%".to_string(),
        mime_type: "audio/pcm;rate=24000".to_string(),
    };
    assert!(scheduler.enqueue_chunk(&bad).is_err());
    assert_eq!(scheduler.watermark(), watermark_before);

    // The chunk after the bad one still lands gaplessly
    let after = scheduler.enqueue_chunk(&chunk_of_ms(100)).unwrap();
    assert_eq!(after.start, good.start + good.duration);
}

#[tokio::test]
async fn test_unit_completes_and_leaves_active_set() {
    let clock = Arc::new(MonotonicClock::new());
    let sink = Arc::new(RecordingSink::default());
    let scheduler = PlaybackScheduler::new(clock, sink.clone());

    // 10ms of audio plays out almost immediately on the real clock
    scheduler.enqueue_chunk(&chunk_of_ms(10)).unwrap();

    let mut speaking = scheduler.is_speaking();
    for _ in 0..50 {
        if !speaking {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
        speaking = scheduler.is_speaking();
    }

    assert!(!speaking, "unit never completed");
    assert_eq!(sink.enqueued_lens(), vec![240]);
}

#[tokio::test]
async fn test_empty_chunk_is_a_no_op() {
    let clock = ManualClock::new();
    let sink = Arc::new(RecordingSink::default());
    let scheduler = PlaybackScheduler::new(clock, sink.clone());

    let unit = scheduler.enqueue_chunk(&chunk_of_ms(0)).unwrap();
    assert_eq!(unit.duration, Duration::ZERO);
    assert!(!scheduler.is_speaking());
    assert!(sink.enqueued_lens().is_empty());
}

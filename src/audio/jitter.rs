//! Playback pipeline: 8 kHz transport frames → native-rate output blocks.
//!
//! The jitter buffer is split into two halves that live on different
//! threads, connected by a lock-free single-producer / single-consumer ring
//! ([`rtrb`]):
//!
//! ```text
//!  network / control task                    output device callback
//!  ──────────────────────                    ──────────────────────
//!  JitterWriter::enqueue(frame)              JitterReader::render(block)
//!    pcm → f32 → upsample_linear               apply pending flush
//!    append to staging queue                   copy min(block, queued)
//!  JitterWriter::top_up()                      zero-fill the rest (underrun)
//!    staging → ring ───────── rtrb ────▶
//!  JitterWriter::flush()
//!    clear staging, publish mark ─ atomic ─▶
//! ```
//!
//! The ring has a fixed capacity because the callback must not allocate.
//! The queue itself is unbounded: samples that do not fit in the ring wait
//! in a writer-side `VecDeque` and move over on the next
//! [`JitterWriter::enqueue`] or [`JitterWriter::top_up`].  Order is
//! preserved and nothing is dropped, so the queued-sample count is always
//! the sum of every enqueued chunk minus what was played or flushed.
//!
//! ## Flush
//!
//! Only the consumer may pop from an SPSC ring, so [`JitterWriter::flush`]
//! does not touch the ring.  It stores a single atomic *flush mark*: the
//! total number of samples ever moved into the ring at that instant.  The
//! staging queue is owned by the writer and is simply cleared.  On its next
//! render the reader discards everything up to the mark before copying.
//! Frames enqueued after the flush lie beyond the mark and are never
//! discarded, and the queued count drops to zero the moment the mark is
//! published.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use rtrb::{Consumer, Producer, RingBuffer};

use super::resample::{pcm_to_unit, up_factor, upsample_linear, upsampled_len};
use super::{TransportFrame, FRAME_SAMPLES};

/// Default ring capacity: two seconds of audio.
pub const DEFAULT_PLAYBACK_BUFFER_MS: u32 = 2_000;

// ---------------------------------------------------------------------------
// PlaybackConfig
// ---------------------------------------------------------------------------

/// Construction parameters for [`JitterBuffer`].
#[derive(Debug, Clone, Copy)]
pub struct PlaybackConfig {
    /// Sample rate of the output device in Hz.
    pub native_rate: u32,
    /// Ring capacity in milliseconds of native-rate audio.
    pub buffer_ms: u32,
}

impl PlaybackConfig {
    pub fn new(native_rate: u32) -> Self {
        Self {
            native_rate,
            buffer_ms: DEFAULT_PLAYBACK_BUFFER_MS,
        }
    }

    fn capacity_samples(&self) -> usize {
        let samples = self.native_rate as u64 * self.buffer_ms as u64 / 1_000;
        let one_chunk = upsampled_len(FRAME_SAMPLES, up_factor(self.native_rate));
        (samples as usize).max(one_chunk)
    }
}

// ---------------------------------------------------------------------------
// Shared counters
// ---------------------------------------------------------------------------

/// Monotonic counters shared by both halves.
#[derive(Debug, Default)]
struct Counters {
    /// Total samples the reader has consumed or discarded.
    consumed: AtomicU64,
    /// Total enqueued samples at the most recent flush.
    flush_mark: AtomicU64,
    /// Render calls that ran out of queued audio.
    underruns: AtomicU64,
}

// ---------------------------------------------------------------------------
// JitterBuffer
// ---------------------------------------------------------------------------

/// Factory for the two halves of the playback queue.
pub struct JitterBuffer;

impl JitterBuffer {
    /// Create a connected writer/reader pair.
    ///
    /// ```rust
    /// use voice_link::audio::{JitterBuffer, PlaybackConfig, TransportFrame};
    ///
    /// let (mut writer, mut reader) = JitterBuffer::new(PlaybackConfig::new(48_000));
    /// writer.enqueue(&TransportFrame::silent());
    /// assert_eq!(writer.queued_samples(), 960);
    ///
    /// let mut block = [1.0_f32; 128];
    /// reader.render(&mut block);
    /// assert_eq!(writer.queued_samples(), 960 - 128);
    /// ```
    #[allow(clippy::new_ret_no_self)]
    pub fn new(config: PlaybackConfig) -> (JitterWriter, JitterReader) {
        let (producer, consumer) = RingBuffer::new(config.capacity_samples());
        let counters = Arc::new(Counters::default());
        let up = up_factor(config.native_rate);

        let writer = JitterWriter {
            producer,
            counters: Arc::clone(&counters),
            up,
            written: 0,
            unit: [0.0; FRAME_SAMPLES],
            scratch: Vec::with_capacity(upsampled_len(FRAME_SAMPLES, up)),
            staged: VecDeque::new(),
        };
        let reader = JitterReader {
            consumer,
            counters,
            consumed: 0,
        };
        (writer, reader)
    }
}

// ---------------------------------------------------------------------------
// JitterWriter
// ---------------------------------------------------------------------------

/// Producer half, owned by the network/control task.
pub struct JitterWriter {
    producer: Producer<f32>,
    counters: Arc<Counters>,
    up: f64,
    /// Total samples ever moved into the ring.
    written: u64,
    unit: [f32; FRAME_SAMPLES],
    scratch: Vec<f32>,
    /// Samples waiting for room in the ring, oldest first.
    staged: VecDeque<f32>,
}

impl JitterWriter {
    /// Upsample `frame` to the native rate and append it to the queue.
    ///
    /// Returns the chunk length in native-rate samples.  Never drops audio;
    /// whatever does not fit in the ring yet is staged.
    pub fn enqueue(&mut self, frame: &TransportFrame) -> usize {
        for (dst, &s) in self.unit.iter_mut().zip(frame.samples().iter()) {
            *dst = pcm_to_unit(s);
        }
        self.scratch.clear();
        upsample_linear(&self.unit, self.up, &mut self.scratch);

        let len = self.scratch.len();
        self.staged.extend(self.scratch.iter().copied());
        self.top_up();
        len
    }

    /// Move as many staged samples into the ring as it has room for.
    ///
    /// Call periodically while audio is staged; returns the number moved.
    pub fn top_up(&mut self) -> usize {
        let n = self.staged.len().min(self.producer.slots());
        if n == 0 {
            return 0;
        }
        let Ok(chunk) = self.producer.write_chunk_uninit(n) else {
            return 0;
        };
        let moved = chunk.fill_from_iter(self.staged.drain(..n));
        self.written += moved as u64;
        moved
    }

    /// Discard everything queued so far.
    ///
    /// The queued count is zero as soon as this returns; the reader drops
    /// the samples already in the ring on its next render.  Flushing an
    /// empty queue is a no-op.
    pub fn flush(&mut self) {
        self.staged.clear();
        self.counters.flush_mark.store(self.written, Ordering::Release);
    }

    /// Native-rate samples queued and not yet played or flushed.
    pub fn queued_samples(&self) -> usize {
        let consumed = self.counters.consumed.load(Ordering::Acquire);
        let flushed = self.counters.flush_mark.load(Ordering::Acquire);
        (self.written - consumed.max(flushed)) as usize + self.staged.len()
    }

    /// Render calls that hit an empty queue.
    pub fn underruns(&self) -> u64 {
        self.counters.underruns.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// JitterReader
// ---------------------------------------------------------------------------

/// Consumer half, owned by the output device callback.
pub struct JitterReader {
    consumer: Consumer<f32>,
    counters: Arc<Counters>,
    /// Local mirror of `counters.consumed`.
    consumed: u64,
}

impl JitterReader {
    /// Fill `out` completely: queued audio first, silence for the remainder.
    ///
    /// Never blocks and never allocates.
    pub fn render(&mut self, out: &mut [f32]) {
        self.apply_flush();

        let take = self.consumer.slots().min(out.len());
        if let Ok(chunk) = self.consumer.read_chunk(take) {
            let (first, second) = chunk.as_slices();
            out[..first.len()].copy_from_slice(first);
            out[first.len()..take].copy_from_slice(second);
            chunk.commit_all();
        }
        out[take..].fill(0.0);

        if take < out.len() {
            self.counters.underruns.fetch_add(1, Ordering::Relaxed);
        }
        self.advance(take);
    }

    /// Drop samples enqueued before the latest flush.
    fn apply_flush(&mut self) {
        let mark = self.counters.flush_mark.load(Ordering::Acquire);
        if mark <= self.consumed {
            return;
        }

        let stale = ((mark - self.consumed) as usize).min(self.consumer.slots());
        if let Ok(chunk) = self.consumer.read_chunk(stale) {
            chunk.commit_all();
        }
        self.advance(stale);
    }

    fn advance(&mut self, n: usize) {
        self.consumed += n as u64;
        self.counters.consumed.store(self.consumed, Ordering::Release);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Capture pipeline: native-rate microphone blocks → 8 kHz transport frames.
//!
//! [`CaptureResampler`] runs inside the input device callback.  For every
//! native-rate sample it
//!
//! 1. smooths it through a [`OnePoleLowPass`],
//! 2. asks the [`FractionalDecimator`] whether this sample is kept,
//! 3. quantises the held value to 16-bit PCM (or `0` when muted),
//! 4. appends it to a [`FrameBuffer`], emitting a [`TransportFrame`] each
//!    time 160 samples have accumulated.
//!
//! A single call may emit any number of frames, including several when the
//! block is long relative to the decimation ratio.  Filter and decimator
//! state persist across calls, so the output never depends on how the input
//! was split into blocks.
//!
//! Muting is controlled from outside the audio thread through a cloned
//! [`MuteSwitch`]; the flag is read once per kept sample, so a change applies
//! from the next processed sample onwards.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use super::buffer::FrameBuffer;
use super::resample::{quantize, FractionalDecimator, OnePoleLowPass};
use super::TransportFrame;

/// Default one-pole coefficient.
pub const DEFAULT_FILTER_ALPHA: f32 = 0.2;

// ---------------------------------------------------------------------------
// MuteSwitch
// ---------------------------------------------------------------------------

/// Shared mute flag, written by the control side and read by the capture
/// callback.
#[derive(Debug, Clone, Default)]
pub struct MuteSwitch(Arc<AtomicBool>);

impl MuteSwitch {
    pub fn new(muted: bool) -> Self {
        Self(Arc::new(AtomicBool::new(muted)))
    }

    pub fn set(&self, muted: bool) {
        self.0.store(muted, Ordering::Relaxed);
    }

    pub fn is_muted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

// ---------------------------------------------------------------------------
// CaptureConfig
// ---------------------------------------------------------------------------

/// Construction parameters for [`CaptureResampler`].
#[derive(Debug, Clone, Copy)]
pub struct CaptureConfig {
    /// Sample rate of the input device in Hz.
    pub native_rate: u32,
    /// One-pole low-pass coefficient in `(0, 1]`.
    pub filter_alpha: f32,
}

impl CaptureConfig {
    pub fn new(native_rate: u32) -> Self {
        Self {
            native_rate,
            filter_alpha: DEFAULT_FILTER_ALPHA,
        }
    }
}

// ---------------------------------------------------------------------------
// CaptureResampler
// ---------------------------------------------------------------------------

/// Filter → decimate → quantise → frame, one sample at a time.
///
/// Owned exclusively by the capture callback; only the [`MuteSwitch`] is
/// shared.
pub struct CaptureResampler {
    filter: OnePoleLowPass,
    decimator: FractionalDecimator,
    frame: FrameBuffer,
    mute: MuteSwitch,
}

impl CaptureResampler {
    pub fn new(config: CaptureConfig, mute: MuteSwitch) -> Self {
        Self {
            filter: OnePoleLowPass::new(config.filter_alpha),
            decimator: FractionalDecimator::to_transport(config.native_rate),
            frame: FrameBuffer::new(),
            mute,
        }
    }

    /// Process one native block, calling `emit` for every completed frame.
    ///
    /// Accepts any iterator of mono samples so the device layer can downmix
    /// interleaved input on the fly without an intermediate buffer.
    pub fn process<I, F>(&mut self, block: I, mut emit: F)
    where
        I: IntoIterator<Item = f32>,
        F: FnMut(TransportFrame),
    {
        for x in block {
            let held = self.filter.step(x);
            if !self.decimator.step() {
                continue;
            }

            let sample = if self.mute.is_muted() { 0 } else { quantize(held) };
            if let Some(frame) = self.frame.push(sample) {
                emit(frame);
            }
        }
    }

    /// Samples waiting in the partial frame (always `< 160`).
    pub fn pending(&self) -> usize {
        self.frame.len()
    }

    /// Handle for toggling mute from another thread.
    pub fn mute_switch(&self) -> MuteSwitch {
        self.mute.clone()
    }

    /// Decimation ratio `native_rate / 8000`.
    pub fn ratio(&self) -> f64 {
        self.decimator.ratio()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

//! Audio signal path — native-rate device blocks ⇄ 8 kHz transport frames.
//!
//! # Pipeline
//!
//! ```text
//! Microphone → cpal input callback → CaptureResampler ─▶ TransportFrame ─▶ rtrb ─▶ network
//!
//! network ─▶ JitterWriter::enqueue ─▶ rtrb ─▶ JitterReader::render → cpal output callback → Speaker
//! ```
//!
//! Both pipelines are driven by the device callbacks and never block or
//! allocate there.  Anything that originates off the audio thread (inbound
//! frames, mute, flush) crosses over through an atomic or an SPSC ring.
//!
//! # Quick Start
//!
//! ```rust
//! use voice_link::audio::{
//!     CaptureConfig, CaptureResampler, JitterBuffer, MuteSwitch, PlaybackConfig,
//! };
//!
//! let mut capture = CaptureResampler::new(CaptureConfig::new(48_000), MuteSwitch::default());
//! let (mut writer, mut reader) = JitterBuffer::new(PlaybackConfig::new(48_000));
//!
//! // 20 ms of microphone audio at 48 kHz becomes one transport frame ...
//! capture.process(vec![0.1_f32; 960], |frame| {
//!     writer.enqueue(&frame);
//! });
//!
//! // ... which plays back as 960 native-rate samples.
//! let mut block = [0.0_f32; 128];
//! reader.render(&mut block);
//! ```

pub mod buffer;
pub mod capture;
pub mod device;
pub mod frame;
pub mod jitter;
pub mod resample;

/// Transport sample rate in Hz.
pub const TRANSPORT_RATE: u32 = 8_000;
/// Samples per transport frame (20 ms at 8 kHz).
pub const FRAME_SAMPLES: usize = 160;
/// Bytes per transport frame on the wire.
pub const FRAME_BYTES: usize = FRAME_SAMPLES * 2;
/// Duration of one transport frame in milliseconds.
pub const FRAME_DURATION_MS: u64 = 20;

pub use buffer::FrameBuffer;
pub use capture::{CaptureConfig, CaptureResampler, MuteSwitch};
pub use device::{AudioDevices, DeviceError, DeviceSelection, StreamHandle};
pub use frame::{FrameError, TransportFrame};
pub use jitter::{JitterBuffer, JitterReader, JitterWriter, PlaybackConfig};

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

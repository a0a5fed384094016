//! Microphone and speaker streams via `cpal`.
//!
//! [`AudioDevices`] resolves the input and output devices (by configured
//! name, falling back to the host defaults) and their native stream
//! configurations.  The two `start_*` methods move a pipeline half into the
//! corresponding cpal callback:
//!
//! * [`AudioDevices::start_capture`] — runs a [`CaptureResampler`] on every
//!   input block and pushes finished frames into an `rtrb` producer.
//! * [`AudioDevices::start_playback`] — fills every output block from a
//!   [`JitterReader`].
//!
//! Both callbacks are allocation-free.  Interleaved input is averaged to mono
//! on the fly; mono output is copied to every channel.  The returned
//! [`StreamHandle`] is a RAII guard; dropping it stops the stream and drops
//! the pipeline state it owns.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use rtrb::Producer;
use thiserror::Error;

use super::{CaptureResampler, JitterReader, TransportFrame};

/// Mono scratch length for the output callback; larger device buffers are
/// rendered in several passes.
const OUTPUT_SCRATCH_SAMPLES: usize = 4_096;

// ---------------------------------------------------------------------------
// StreamHandle
// ---------------------------------------------------------------------------

/// RAII guard that keeps a cpal stream alive.
pub struct StreamHandle {
    _stream: cpal::Stream,
}

// ---------------------------------------------------------------------------
// DeviceError
// ---------------------------------------------------------------------------

/// Errors that can occur while opening devices or starting streams.
#[derive(Debug, Error)]
pub enum DeviceError {
    #[error("no {0} device found on the default audio host")]
    NoDevice(&'static str),

    #[error("{kind} device '{name}' not found")]
    NotFound { kind: &'static str, name: String },

    #[error("failed to enumerate devices: {0}")]
    Enumerate(#[from] cpal::DevicesError),

    #[error("failed to query default stream config: {0}")]
    DefaultConfig(#[from] cpal::DefaultStreamConfigError),

    #[error("failed to build stream: {0}")]
    BuildStream(#[from] cpal::BuildStreamError),

    #[error("failed to start stream: {0}")]
    PlayStream(#[from] cpal::PlayStreamError),
}

// ---------------------------------------------------------------------------
// DeviceSelection
// ---------------------------------------------------------------------------

/// Which devices to open and how large the engine blocks should be.
#[derive(Debug, Clone, Default)]
pub struct DeviceSelection {
    /// Input device name; `None` selects the host default.
    pub input: Option<String>,
    /// Output device name; `None` selects the host default.
    pub output: Option<String>,
    /// Fixed block size in frames; `None` lets the device choose.
    pub block_size: Option<u32>,
}

// ---------------------------------------------------------------------------
// AudioDevices
// ---------------------------------------------------------------------------

/// Resolved input/output devices with their native stream configurations.
pub struct AudioDevices {
    input: cpal::Device,
    output: cpal::Device,
    input_config: cpal::StreamConfig,
    output_config: cpal::StreamConfig,
}

impl AudioDevices {
    /// Open the selected (or default) devices and query their preferred
    /// configurations.
    ///
    /// # Errors
    ///
    /// [`DeviceError::NoDevice`] / [`DeviceError::NotFound`] when a device is
    /// unavailable, [`DeviceError::DefaultConfig`] when it cannot report a
    /// default configuration.
    pub fn open(selection: &DeviceSelection) -> Result<Self, DeviceError> {
        let host = cpal::default_host();

        let input = match selection.input.as_deref() {
            Some(name) => find_device(host.input_devices()?, "input", name)?,
            None => host
                .default_input_device()
                .ok_or(DeviceError::NoDevice("input"))?,
        };
        let output = match selection.output.as_deref() {
            Some(name) => find_device(host.output_devices()?, "output", name)?,
            None => host
                .default_output_device()
                .ok_or(DeviceError::NoDevice("output"))?,
        };

        let mut input_config: cpal::StreamConfig = input.default_input_config()?.into();
        let mut output_config: cpal::StreamConfig = output.default_output_config()?.into();

        if let Some(frames) = selection.block_size {
            input_config.buffer_size = cpal::BufferSize::Fixed(frames);
            output_config.buffer_size = cpal::BufferSize::Fixed(frames);
        }

        log::info!(
            "audio: input '{}' {} Hz {} ch, output '{}' {} Hz {} ch",
            input.name().unwrap_or_default(),
            input_config.sample_rate.0,
            input_config.channels,
            output.name().unwrap_or_default(),
            output_config.sample_rate.0,
            output_config.channels,
        );

        Ok(Self {
            input,
            output,
            input_config,
            output_config,
        })
    }

    /// Native sample rate of the input stream in Hz.
    pub fn input_rate(&self) -> u32 {
        self.input_config.sample_rate.0
    }

    /// Native sample rate of the output stream in Hz.
    pub fn output_rate(&self) -> u32 {
        self.output_config.sample_rate.0
    }

    /// Start the microphone stream.
    ///
    /// Every completed frame is pushed into `frames`; when the ring is full
    /// the frame is dropped and `dropped` is incremented.
    pub fn start_capture(
        &self,
        mut resampler: CaptureResampler,
        mut frames: Producer<TransportFrame>,
        dropped: Arc<AtomicU64>,
    ) -> Result<StreamHandle, DeviceError> {
        let channels = self.input_config.channels.max(1) as usize;

        let stream = self.input.build_input_stream(
            &self.input_config,
            move |data: &[f32], _: &cpal::InputCallbackInfo| {
                let mono = data
                    .chunks_exact(channels)
                    .map(|frame| frame.iter().sum::<f32>() / channels as f32);
                resampler.process(mono, |frame| {
                    if frames.push(frame).is_err() {
                        dropped.fetch_add(1, Ordering::Relaxed);
                    }
                });
            },
            |err: cpal::StreamError| {
                log::error!("audio: input stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }

    /// Start the speaker stream, rendering from `reader`.
    pub fn start_playback(&self, mut reader: JitterReader) -> Result<StreamHandle, DeviceError> {
        let channels = self.output_config.channels.max(1) as usize;
        let mut scratch = vec![0.0_f32; OUTPUT_SCRATCH_SAMPLES];

        let stream = self.output.build_output_stream(
            &self.output_config,
            move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                if channels == 1 {
                    reader.render(data);
                    return;
                }
                for span in data.chunks_mut(OUTPUT_SCRATCH_SAMPLES * channels) {
                    let n = span.len() / channels;
                    let mono = &mut scratch[..n];
                    reader.render(mono);
                    for (frame, &s) in span.chunks_exact_mut(channels).zip(mono.iter()) {
                        frame.fill(s);
                    }
                }
            },
            |err: cpal::StreamError| {
                log::error!("audio: output stream error: {err}");
            },
            None,
        )?;

        stream.play()?;
        Ok(StreamHandle { _stream: stream })
    }
}

fn find_device(
    devices: impl Iterator<Item = cpal::Device>,
    kind: &'static str,
    name: &str,
) -> Result<cpal::Device, DeviceError> {
    devices
        .into_iter()
        .find(|d| d.name().map(|n| n == name).unwrap_or(false))
        .ok_or_else(|| DeviceError::NotFound {
            kind,
            name: name.to_string(),
        })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn device_selection_defaults_to_host_devices() {
        let sel = DeviceSelection::default();
        assert!(sel.input.is_none());
        assert!(sel.output.is_none());
        assert!(sel.block_size.is_none());
    }

    #[test]
    fn not_found_error_names_the_device() {
        let e = DeviceError::NotFound {
            kind: "input",
            name: "USB Mic".into(),
        };
        assert_eq!(e.to_string(), "input device 'USB Mic' not found");
    }

    #[test]
    fn no_device_error_names_the_direction() {
        assert!(DeviceError::NoDevice("output").to_string().contains("output"));
    }
}

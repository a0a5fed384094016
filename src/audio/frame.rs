//! Narrowband transport frame and its wire encoding.
//!
//! A [`TransportFrame`] is always exactly [`FRAME_SAMPLES`] signed 16-bit
//! samples (20 ms of mono audio at 8 kHz).  On the wire it is a raw
//! [`FRAME_BYTES`]-byte binary message of little-endian `i16` values, with no
//! header.
//!
//! # Example
//!
//! ```rust
//! use voice_link::audio::{TransportFrame, FRAME_BYTES};
//!
//! let frame = TransportFrame::silent();
//! let bytes = frame.to_bytes();
//! assert_eq!(bytes.len(), FRAME_BYTES);
//! assert_eq!(TransportFrame::from_bytes(&bytes).unwrap(), frame);
//! ```

use thiserror::Error;

use super::{FRAME_BYTES, FRAME_SAMPLES};

// ---------------------------------------------------------------------------
// FrameError
// ---------------------------------------------------------------------------

/// Reason an inbound binary message could not be decoded as a frame.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// The message was not exactly [`FRAME_BYTES`] long.
    #[error("malformed frame: expected {expected} bytes, got {got}")]
    Length { expected: usize, got: usize },
}

// ---------------------------------------------------------------------------
// TransportFrame
// ---------------------------------------------------------------------------

/// 20 ms of 8 kHz mono PCM.
///
/// The length is part of the type, so a frame of any other size cannot be
/// constructed.  The type is `Copy` and allocation-free, which lets the
/// capture callback hand frames to the network task through a lock-free
/// ring without touching the heap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportFrame([i16; FRAME_SAMPLES]);

impl TransportFrame {
    /// Wrap an already-complete block of samples.
    pub fn from_samples(samples: [i16; FRAME_SAMPLES]) -> Self {
        Self(samples)
    }

    /// A frame of digital silence.
    pub fn silent() -> Self {
        Self([0; FRAME_SAMPLES])
    }

    /// Decode a wire message (160 little-endian `i16`).
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Length`] when `bytes` is not exactly
    /// [`FRAME_BYTES`] long.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, FrameError> {
        if bytes.len() != FRAME_BYTES {
            return Err(FrameError::Length {
                expected: FRAME_BYTES,
                got: bytes.len(),
            });
        }

        let mut samples = [0i16; FRAME_SAMPLES];
        for (dst, pair) in samples.iter_mut().zip(bytes.chunks_exact(2)) {
            *dst = i16::from_le_bytes([pair[0], pair[1]]);
        }
        Ok(Self(samples))
    }

    /// Encode for the wire.
    pub fn to_bytes(&self) -> [u8; FRAME_BYTES] {
        let mut out = [0u8; FRAME_BYTES];
        for (pair, s) in out.chunks_exact_mut(2).zip(self.0.iter()) {
            pair.copy_from_slice(&s.to_le_bytes());
        }
        out
    }

    /// The PCM samples in playback order.
    pub fn samples(&self) -> &[i16; FRAME_SAMPLES] {
        &self.0
    }

    /// Always [`FRAME_SAMPLES`].
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Always `false`; present for API symmetry with slices.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// `true` when every sample is exactly zero.
    pub fn is_silent(&self) -> bool {
        self.0.iter().all(|&s| s == 0)
    }
}

impl Default for TransportFrame {
    fn default() -> Self {
        Self::silent()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wire_layout_is_little_endian() {
        let mut samples = [0i16; FRAME_SAMPLES];
        samples[0] = 0x0102;
        samples[1] = -2; // 0xFFFE
        samples[FRAME_SAMPLES - 1] = i16::MIN;

        let bytes = TransportFrame::from_samples(samples).to_bytes();
        assert_eq!(&bytes[0..2], &[0x02, 0x01]);
        assert_eq!(&bytes[2..4], &[0xFE, 0xFF]);
        assert_eq!(&bytes[FRAME_BYTES - 2..], &[0x00, 0x80]);
    }

    #[test]
    fn decode_preserves_extremes() {
        let mut samples = [0i16; FRAME_SAMPLES];
        samples[10] = i16::MAX;
        samples[11] = i16::MIN;
        let frame = TransportFrame::from_samples(samples);

        let decoded = TransportFrame::from_bytes(&frame.to_bytes()).unwrap();
        assert_eq!(decoded.samples()[10], 32_767);
        assert_eq!(decoded.samples()[11], -32_768);
    }

    #[test]
    fn short_message_is_rejected() {
        let err = TransportFrame::from_bytes(&[0u8; 318]).unwrap_err();
        assert_eq!(
            err,
            FrameError::Length {
                expected: 320,
                got: 318
            }
        );
    }

    #[test]
    fn long_and_empty_messages_are_rejected() {
        assert!(TransportFrame::from_bytes(&[0u8; 322]).is_err());
        assert!(TransportFrame::from_bytes(&[]).is_err());
    }

    #[test]
    fn silent_frame_properties() {
        let frame = TransportFrame::default();
        assert!(frame.is_silent());
        assert_eq!(frame.len(), 160);
        assert!(!frame.is_empty());
    }

    #[test]
    fn frame_is_send() {
        fn assert_send<T: Send + Copy>() {}
        assert_send::<TransportFrame>();
    }
}

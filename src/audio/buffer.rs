//! Fixed-capacity accumulator that assembles transport frames.
//!
//! Decimated samples trickle in one at a time from the capture callback.
//! [`FrameBuffer`] collects them into a preallocated array with a write
//! cursor and hands back a complete [`TransportFrame`] the moment the
//! [`FRAME_SAMPLES`]th sample lands.  The cursor then restarts at zero, so
//! between emissions the buffer always holds fewer than 160 samples and it
//! never allocates.
//!
//! # Example
//!
//! ```rust
//! use voice_link::audio::FrameBuffer;
//!
//! let mut buf = FrameBuffer::new();
//! for i in 0..159 {
//!     assert!(buf.push(i as i16).is_none());
//! }
//! let frame = buf.push(159).expect("160th sample completes the frame");
//! assert_eq!(frame.samples()[159], 159);
//! assert!(buf.is_empty());
//! ```

use super::{TransportFrame, FRAME_SAMPLES};

// ---------------------------------------------------------------------------
// FrameBuffer
// ---------------------------------------------------------------------------

/// Preallocated 160-sample staging area for the capture pipeline.
#[derive(Debug, Clone)]
pub struct FrameBuffer {
    buf: [i16; FRAME_SAMPLES],
    /// Index of the next write position; always `< FRAME_SAMPLES` between
    /// calls.
    len: usize,
}

impl FrameBuffer {
    pub fn new() -> Self {
        Self {
            buf: [0; FRAME_SAMPLES],
            len: 0,
        }
    }

    /// Append one sample.  Returns the completed frame when this sample fills
    /// the buffer, after which the buffer is empty again.
    #[inline]
    pub fn push(&mut self, sample: i16) -> Option<TransportFrame> {
        self.buf[self.len] = sample;
        self.len += 1;

        if self.len < FRAME_SAMPLES {
            return None;
        }

        self.len = 0;
        Some(TransportFrame::from_samples(self.buf))
    }

    /// Number of samples waiting for the next frame.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }
}

impl Default for FrameBuffer {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_fill_emits_nothing() {
        let mut buf = FrameBuffer::new();
        for _ in 0..100 {
            assert!(buf.push(1).is_none());
        }
        assert_eq!(buf.len(), 100);
        assert!(!buf.is_empty());
    }

    #[test]
    fn exact_fill_emits_in_order_and_resets() {
        let mut buf = FrameBuffer::new();
        let mut emitted = None;
        for i in 0..FRAME_SAMPLES {
            emitted = buf.push(i as i16);
        }

        let frame = emitted.expect("frame after 160 samples");
        for (i, &s) in frame.samples().iter().enumerate() {
            assert_eq!(s, i as i16);
        }
        assert_eq!(buf.len(), 0);
    }

    #[test]
    fn remainder_carries_into_next_frame() {
        let mut buf = FrameBuffer::new();
        let frames: Vec<TransportFrame> = (0..400).filter_map(|i| buf.push(i as i16)).collect();

        assert_eq!(frames.len(), 2);
        assert_eq!(frames[1].samples()[0], 160);
        assert_eq!(buf.len(), 80);
    }

    #[test]
    fn length_stays_below_capacity() {
        let mut buf = FrameBuffer::new();
        for i in 0..10_000 {
            let _ = buf.push(i as i16);
            assert!(buf.len() < FRAME_SAMPLES);
        }
    }
}

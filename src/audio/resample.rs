//! Sample-rate conversion primitives shared by both pipelines.
//!
//! The transport runs at a fixed **8 kHz**; the audio engine runs at whatever
//! rate the device reports.  This module provides the building blocks for
//! crossing between the two:
//!
//! 1. [`OnePoleLowPass`] — first-order smoothing before decimation.
//! 2. [`FractionalDecimator`] — keeps one sample per `ratio` inputs, where
//!    `ratio` need not be an integer.
//! 3. [`upsample_linear`] — linear interpolation from 8 kHz back to the
//!    native rate.
//! 4. [`quantize`] / [`pcm_to_unit`] — conversions between normalised `f32`
//!    and 16-bit PCM.
//!
//! Everything here is allocation-free except [`upsample_linear`], which
//! appends into a caller-owned `Vec` so the caller controls reuse.

use super::TRANSPORT_RATE;

// ---------------------------------------------------------------------------
// OnePoleLowPass
// ---------------------------------------------------------------------------

/// `hold ← hold + alpha * (x − hold)`.
///
/// State persists for the lifetime of the filter; there is no reset.
#[derive(Debug, Clone)]
pub struct OnePoleLowPass {
    alpha: f32,
    hold: f32,
}

impl OnePoleLowPass {
    pub fn new(alpha: f32) -> Self {
        Self { alpha, hold: 0.0 }
    }

    /// Filter one sample and return the new held value.
    #[inline]
    pub fn step(&mut self, x: f32) -> f32 {
        self.hold += self.alpha * (x - self.hold);
        self.hold
    }

    #[cfg(test)]
    fn hold(&self) -> f32 {
        self.hold
    }
}

// ---------------------------------------------------------------------------
// FractionalDecimator
// ---------------------------------------------------------------------------

/// Accumulator-based decimation by a possibly non-integral `ratio`.
///
/// Each input adds 1 to the accumulator; once it reaches `ratio`, `ratio` is
/// subtracted and the sample is kept.  The fractional remainder carries over
/// between calls, so block boundaries never change which samples are kept.
#[derive(Debug, Clone)]
pub struct FractionalDecimator {
    ratio: f64,
    acc: f64,
}

impl FractionalDecimator {
    /// Decimator converting `native_rate` down to [`TRANSPORT_RATE`].
    pub fn to_transport(native_rate: u32) -> Self {
        Self::new(native_rate as f64 / TRANSPORT_RATE as f64)
    }

    pub fn new(ratio: f64) -> Self {
        Self { ratio, acc: 0.0 }
    }

    /// Advance by one input sample; `true` when this sample is kept.
    #[inline]
    pub fn step(&mut self) -> bool {
        self.acc += 1.0;
        if self.acc < self.ratio {
            return false;
        }
        self.acc -= self.ratio;
        true
    }

    pub fn ratio(&self) -> f64 {
        self.ratio
    }
}

// ---------------------------------------------------------------------------
// PCM conversions
// ---------------------------------------------------------------------------

/// Clamp to `[-1, 1]` and scale to 16-bit PCM, rounding to nearest.
#[inline]
pub fn quantize(v: f32) -> i16 {
    (v.clamp(-1.0, 1.0) * 32_767.0).round() as i16
}

/// 16-bit PCM to normalised float (`s / 32768`, clamped to `[-1, 1]`).
#[inline]
pub fn pcm_to_unit(s: i16) -> f32 {
    (s as f32 / 32_768.0).clamp(-1.0, 1.0)
}

// ---------------------------------------------------------------------------
// Upsampling
// ---------------------------------------------------------------------------

/// Up-factor from [`TRANSPORT_RATE`] to `native_rate`.
pub fn up_factor(native_rate: u32) -> f64 {
    native_rate as f64 / TRANSPORT_RATE as f64
}

/// Number of output samples produced from `src_len` inputs at factor `up`.
pub fn upsampled_len(src_len: usize, up: f64) -> usize {
    (src_len as f64 * up).ceil() as usize
}

/// Linearly interpolate `src` by factor `up`, appending to `out`.
///
/// Produces exactly [`upsampled_len`]`(src.len(), up)` samples.  For output
/// index `i` the source position is `t = i / up`; the sample is
/// `src[i0] * (1 − frac) + src[i1] * frac` with `i0 = floor(t)` and
/// `i1 = min(i0 + 1, len − 1)`.  `up` may be fractional.  An empty `src`
/// appends nothing.
///
/// # Example
///
/// ```rust
/// use voice_link::audio::resample::upsample_linear;
///
/// let mut out = Vec::new();
/// upsample_linear(&[0.0, 1.0], 2.0, &mut out);
/// assert_eq!(out, vec![0.0, 0.5, 1.0, 1.0]);
/// ```
pub fn upsample_linear(src: &[f32], up: f64, out: &mut Vec<f32>) {
    if src.is_empty() {
        return;
    }

    let last = src.len() - 1;
    let out_len = upsampled_len(src.len(), up);
    out.reserve(out_len);

    for i in 0..out_len {
        let t = i as f64 / up;
        let i0 = (t.floor() as usize).min(last);
        let i1 = (i0 + 1).min(last);
        let frac = (t - i0 as f64) as f32;
        out.push(src[i0] * (1.0 - frac) + src[i1] * frac);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    // ---- OnePoleLowPass ----------------------------------------------------

    #[test]
    fn low_pass_converges_to_dc() {
        let mut lp = OnePoleLowPass::new(0.2);
        let mut y = 0.0;
        for _ in 0..200 {
            y = lp.step(0.5);
        }
        assert!((y - 0.5).abs() < 1e-5, "did not settle: {y}");
    }

    #[test]
    fn low_pass_first_step_is_alpha_scaled() {
        let mut lp = OnePoleLowPass::new(0.2);
        assert!((lp.step(1.0) - 0.2).abs() < 1e-7);
        assert!((lp.step(1.0) - 0.36).abs() < 1e-6);
        assert!((lp.hold() - 0.36).abs() < 1e-6);
    }

    #[test]
    fn low_pass_attenuates_nyquist() {
        // Alternating ±1 at the native Nyquist should be strongly attenuated.
        let mut lp = OnePoleLowPass::new(0.2);
        let mut peak = 0.0_f32;
        for i in 0..1_000 {
            let x = if i % 2 == 0 { 1.0 } else { -1.0 };
            let y = lp.step(x);
            if i > 100 {
                peak = peak.max(y.abs());
            }
        }
        assert!(peak < 0.15, "nyquist leaked: {peak}");
    }

    // ---- FractionalDecimator -----------------------------------------------

    #[test]
    fn integral_ratio_keeps_every_sixth() {
        let mut d = FractionalDecimator::to_transport(48_000);
        let kept: Vec<usize> = (1..=36).filter(|_| d.step()).collect();
        assert_eq!(kept, vec![6, 12, 18, 24, 30, 36]);
    }

    #[test]
    fn fractional_ratio_keeps_expected_count() {
        let mut d = FractionalDecimator::to_transport(44_100);
        let kept = (0..44_100).filter(|_| d.step()).count();
        assert!(kept.abs_diff(8_000) <= 1, "kept {kept}");
    }

    #[test]
    fn ratio_below_one_never_drops() {
        let mut d = FractionalDecimator::new(1.0);
        assert!((0..100).all(|_| d.step()));
    }

    // ---- PCM conversions ---------------------------------------------------

    #[test]
    fn quantize_clamps_and_rounds() {
        assert_eq!(quantize(0.0), 0);
        assert_eq!(quantize(1.0), 32_767);
        assert_eq!(quantize(-1.0), -32_767);
        assert_eq!(quantize(3.0), 32_767);
        assert_eq!(quantize(-3.0), -32_767);
        assert_eq!(quantize(0.5), 16_384); // 16383.5 rounds away from zero
    }

    #[test]
    fn pcm_to_unit_range() {
        assert_eq!(pcm_to_unit(0), 0.0);
        assert_eq!(pcm_to_unit(i16::MIN), -1.0);
        assert!(pcm_to_unit(i16::MAX) < 1.0);
        assert!((pcm_to_unit(16_384) - 0.5).abs() < 1e-6);
    }

    // ---- upsample_linear ---------------------------------------------------

    #[test]
    fn upsample_by_six_length() {
        let src = vec![0.25_f32; 160];
        let mut out = Vec::new();
        upsample_linear(&src, up_factor(48_000), &mut out);
        assert_eq!(out.len(), 960);
        assert!(out.iter().all(|&s| (s - 0.25).abs() < 1e-6));
    }

    #[test]
    fn upsample_fractional_factor_length() {
        for rate in [44_100_u32, 22_050, 11_025, 16_000, 96_000] {
            let up = up_factor(rate);
            let mut out = Vec::new();
            upsample_linear(&[0.0_f32; 160], up, &mut out);
            assert_eq!(out.len(), (160.0 * up).ceil() as usize, "rate {rate}");
        }
    }

    #[test]
    fn upsample_interpolates_between_neighbours() {
        let mut out = Vec::new();
        upsample_linear(&[0.0, 1.0, 0.0], 4.0, &mut out);
        assert_eq!(out.len(), 12);
        let expected = [0.0, 0.25, 0.5, 0.75, 1.0, 0.75, 0.5, 0.25, 0.0, 0.0, 0.0, 0.0];
        for (a, b) in out.iter().zip(expected.iter()) {
            assert!((a - b).abs() < 1e-6, "{out:?}");
        }
    }

    #[test]
    fn upsample_empty_source_appends_nothing() {
        let mut out = vec![9.0_f32];
        upsample_linear(&[], 6.0, &mut out);
        assert_eq!(out, vec![9.0]);
    }

    #[test]
    fn upsample_appends_after_existing_content() {
        let mut out = vec![1.0_f32];
        upsample_linear(&[0.5], 2.0, &mut out);
        assert_eq!(out, vec![1.0, 0.5, 0.5]);
    }
}

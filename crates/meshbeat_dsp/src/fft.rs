//! Fixed-Point Transform Engine
//!
//! Real-input FFT over the configured block size followed by the complex
//! magnitude of the non-redundant half of the output.
//!
//! # Numeric representation
//!
//! On a microcontroller this is `arm_rfft_q15` followed by `arm_cmplx_mag_q15`
//! on raw 16-bit PCM. The rfft downscales by `block_size / 2` to stay inside
//! Q15, and the magnitude stage emits 2.14, halving once more. The net result
//! is `|X[k]| / block_size` in integer sample units.
//!
//! This engine computes the FFT in `f32` with rustfft and applies exactly that
//! factor, rounding to the nearest integer and clamping to
//! `0..=MAGNITUDE_MAX`. A cosine of amplitude `A` on an exact bin therefore
//! reads `A / 2`, and the band aggregator's noise floors and hysteresis
//! constants keep their meaning.
//!
//! # Real-time Safety
//!
//! All buffers are allocated in [`TransformEngine::configure`]. `transform_into`
//! performs no allocation and runs in O(n log n).

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};
use tracing::debug;

use crate::error::{try_zeroed, DspError, DspResult};
use crate::spectrum::{Spectrum, MAGNITUDE_MAX};

/// Smallest supported transform length
pub const MIN_BLOCK_SIZE: usize = 32;

/// Largest supported transform length
pub const MAX_BLOCK_SIZE: usize = 8192;

/// Check that `block_size` is a supported power of two
pub fn validate_block_size(block_size: usize) -> DspResult<()> {
    if !block_size.is_power_of_two() || !(MIN_BLOCK_SIZE..=MAX_BLOCK_SIZE).contains(&block_size) {
        return Err(DspError::InvalidBlockSize(block_size));
    }
    Ok(())
}

/// FFT magnitude engine for one block size
pub struct TransformEngine {
    block_size: usize,
    /// Sliding analysis window, oldest sample first
    window: Vec<i16>,
    fft: Arc<dyn Fft<f32>>,
    /// Working buffer, transformed in place
    buffer: Vec<Complex<f32>>,
    scratch: Vec<Complex<f32>>,
    /// Reciprocal of the Q15 conversion factor
    scale: f32,
}

impl std::fmt::Debug for TransformEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TransformEngine")
            .field("block_size", &self.block_size)
            .finish_non_exhaustive()
    }
}

impl TransformEngine {
    /// Plan the FFT and allocate working buffers for `block_size`
    pub fn configure(block_size: usize) -> DspResult<Self> {
        validate_block_size(block_size)?;

        let mut planner = FftPlanner::new();
        let fft = planner.plan_fft_forward(block_size);

        let window = try_zeroed(block_size, "analysis window")?;
        let buffer = try_zeroed(block_size, "fft buffer")?;
        let scratch = try_zeroed(fft.get_inplace_scratch_len(), "fft scratch")?;

        debug!(block_size, "Transform engine configured");

        Ok(Self {
            block_size,
            window,
            fft,
            buffer,
            scratch,
            scale: 1.0 / block_size as f32,
        })
    }

    pub fn block_size(&self) -> usize {
        self.block_size
    }

    /// Number of bins produced per transform
    pub fn spectrum_len(&self) -> usize {
        self.block_size / 2
    }

    /// Transform a block into a freshly allocated spectrum
    pub fn transform(&mut self, samples: &[i16]) -> Spectrum {
        let mut spectrum = Spectrum::zeroed(self.spectrum_len());
        self.transform_into(samples, &mut spectrum);
        spectrum
    }

    /// Transform a block, writing the magnitudes into `spectrum`
    ///
    /// A block longer than the configured size is truncated to its first
    /// `block_size` samples. A shorter block slides the analysis window: the
    /// previous samples shift left and the new ones are appended, so the
    /// transform always covers the most recent `block_size` samples.
    pub fn transform_into(&mut self, samples: &[i16], spectrum: &mut Spectrum) {
        self.slide_window(samples);

        for (slot, &sample) in self.buffer.iter_mut().zip(self.window.iter()) {
            *slot = Complex::new(sample as f32, 0.0);
        }

        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        let len = self.spectrum_len();
        if spectrum.len() != len {
            *spectrum = Spectrum::zeroed(len);
        }

        // Only the first half: the rest mirrors it for a real-valued input
        for (bin, value) in spectrum.bins_mut().iter_mut().zip(&self.buffer[..len]) {
            *bin = to_q15_magnitude(value.norm() * self.scale);
        }
    }

    /// Forget all previous samples
    pub fn reset(&mut self) {
        self.window.fill(0);
    }

    fn slide_window(&mut self, samples: &[i16]) {
        let size = self.block_size;
        let incoming = samples.len().min(size);
        let keep = size - incoming;

        if keep > 0 {
            self.window.copy_within(incoming.., 0);
        }
        self.window[keep..].copy_from_slice(&samples[..incoming]);
    }
}

/// Round and saturate a magnitude to the Q15 output range
#[inline]
fn to_q15_magnitude(magnitude: f32) -> u16 {
    // Rust pattern: `as` from float saturates, NaN becomes 0
    let rounded = magnitude.round();
    if rounded >= MAGNITUDE_MAX as f32 {
        MAGNITUDE_MAX
    } else {
        rounded as u16
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Cosine of `amplitude` landing exactly on `bin`
    fn cosine_block(block_size: usize, bin: usize, amplitude: f32) -> Vec<i16> {
        (0..block_size)
            .map(|n| {
                let phase = 2.0 * std::f32::consts::PI * (bin * n) as f32 / block_size as f32;
                (amplitude * phase.cos()).round() as i16
            })
            .collect()
    }

    #[test]
    fn test_rejects_invalid_sizes() {
        for size in [0, 16, 100, 300, 16384] {
            assert_eq!(
                TransformEngine::configure(size).unwrap_err(),
                DspError::InvalidBlockSize(size)
            );
        }
    }

    #[test]
    fn test_spectrum_length_is_half_block() {
        for size in [32, 64, 128, 256, 512, 1024, 2048, 4096] {
            let mut engine = TransformEngine::configure(size).unwrap();
            let spectrum = engine.transform(&vec![1000; size]);
            assert_eq!(spectrum.len(), size / 2);
        }
    }

    #[test]
    fn test_silence_produces_no_energy() {
        let mut engine = TransformEngine::configure(512).unwrap();
        let spectrum = engine.transform(&[0; 512]);

        assert_eq!(spectrum.len(), 256);
        assert!(spectrum.is_silent());
    }

    #[test]
    fn test_cosine_lands_on_its_bin() {
        let mut engine = TransformEngine::configure(256).unwrap();
        let spectrum = engine.transform(&cosine_block(256, 40, 10000.0));

        // Amplitude A reads A / 2 on the Q15 scale
        let peak = spectrum.bins()[40];
        assert!((4998..=5002).contains(&peak), "peak was {}", peak);

        for (bin, &magnitude) in spectrum.bins().iter().enumerate() {
            if bin != 40 {
                assert!(magnitude <= 2, "bin {} leaked {}", bin, magnitude);
            }
        }
    }

    #[test]
    fn test_dc_offset() {
        let mut engine = TransformEngine::configure(64).unwrap();
        let spectrum = engine.transform(&[200; 64]);

        // DC is not halved: |X[0]| / N equals the offset itself
        assert_eq!(spectrum.bins()[0], 200);
        assert!(spectrum.bins()[1..].iter().all(|&m| m == 0));
    }

    #[test]
    fn test_full_scale_saturates() {
        let mut engine = TransformEngine::configure(64).unwrap();
        let spectrum = engine.transform(&[i16::MIN; 64]);
        assert_eq!(spectrum.bins()[0], MAGNITUDE_MAX);
    }

    #[test]
    fn test_long_block_is_truncated() {
        let mut truncated = TransformEngine::configure(64).unwrap();
        let mut exact = TransformEngine::configure(64).unwrap();

        let mut long_block = cosine_block(64, 5, 4000.0);
        long_block.extend(std::iter::repeat(i16::MAX).take(64));

        assert_eq!(
            truncated.transform(&long_block),
            exact.transform(&long_block[..64])
        );
    }

    #[test]
    fn test_short_blocks_slide_the_window() {
        let block = cosine_block(64, 4, 3000.0);

        let mut sliding = TransformEngine::configure(64).unwrap();
        sliding.transform(&block[..32]);
        let halves = sliding.transform(&block[32..]);

        let mut whole = TransformEngine::configure(64).unwrap();
        assert_eq!(halves, whole.transform(&block));
    }

    #[test]
    fn test_transform_into_resizes_target() {
        let mut engine = TransformEngine::configure(128).unwrap();
        let mut spectrum = Spectrum::zeroed(3);
        engine.transform_into(&[0; 128], &mut spectrum);
        assert_eq!(spectrum.len(), 64);
    }

    #[test]
    fn test_reset_clears_window() {
        let mut engine = TransformEngine::configure(64).unwrap();
        engine.transform(&[500; 64]);
        engine.reset();

        assert!(engine.transform(&[]).is_silent());
    }

    #[test]
    fn test_q15_rounding() {
        assert_eq!(to_q15_magnitude(0.4), 0);
        assert_eq!(to_q15_magnitude(0.6), 1);
        assert_eq!(to_q15_magnitude(1.0e9), MAGNITUDE_MAX);
        assert_eq!(to_q15_magnitude(f32::NAN), 0);
    }
}

//! Spectral transform capability and FFT helpers shared across the crate.

use rustfft::{num_complex::Complex, FftPlanner};

/// Zero-valued complex number, used for FFT buffer initialization.
pub const COMPLEX_ZERO: Complex<f32> = Complex::new(0.0, 0.0);

/// Minimum window sum (as a fraction of max) to prevent amplification
/// in low-overlap regions during overlap-add normalization.
pub const WINDOW_SUM_FLOOR_RATIO: f32 = 0.1;

/// Absolute floor for window sum normalization to prevent division by zero.
pub const WINDOW_SUM_EPSILON: f32 = 1e-6;

/// Forward/inverse complex transform of arbitrary length.
///
/// Implementations must be linear and satisfy
/// `inverse(forward(x)) == x` within floating tolerance; the inverse carries
/// the `1/n` scaling. The buffer length selects the transform size.
pub trait SpectralTransform {
    /// In-place forward transform.
    fn forward(&mut self, buffer: &mut [Complex<f32>]);

    /// In-place inverse transform, normalized by `1/buffer.len()`.
    fn inverse(&mut self, buffer: &mut [Complex<f32>]);
}

/// [`SpectralTransform`] backed by rustfft.
///
/// The planner caches plans per size, so reusing one instance across calls
/// of the same length avoids re-planning.
pub struct RustFftTransform {
    planner: FftPlanner<f32>,
}

impl RustFftTransform {
    pub fn new() -> Self {
        Self {
            planner: FftPlanner::new(),
        }
    }
}

impl Default for RustFftTransform {
    fn default() -> Self {
        Self::new()
    }
}

impl SpectralTransform for RustFftTransform {
    fn forward(&mut self, buffer: &mut [Complex<f32>]) {
        if buffer.is_empty() {
            return;
        }
        let fft = self.planner.plan_fft_forward(buffer.len());
        fft.process(buffer);
    }

    fn inverse(&mut self, buffer: &mut [Complex<f32>]) {
        if buffer.is_empty() {
            return;
        }
        let fft = self.planner.plan_fft_inverse(buffer.len());
        fft.process(buffer);
        let norm = 1.0 / buffer.len() as f32;
        for c in buffer.iter_mut() {
            *c *= norm;
        }
    }
}

/// Transform size used for a linear result of `len` samples.
#[inline]
pub fn transform_size(len: usize) -> usize {
    len.max(1).next_power_of_two()
}

/// Copies real samples into a zero-padded complex buffer of `size`.
#[inline]
pub fn real_to_complex(samples: &[f32], size: usize) -> Vec<Complex<f32>> {
    let mut buf = vec![COMPLEX_ZERO; size];
    for (dst, &s) in buf.iter_mut().zip(samples.iter()) {
        *dst = Complex::new(s, 0.0);
    }
    buf
}

/// Normalizes overlap-added output by the accumulated window weights,
/// clamping small sums to a fraction of the peak so sparse-overlap regions
/// are not amplified.
pub fn normalize_by_window_sum(output: &mut [f32], window_sum: &[f32]) {
    let max_window_sum = window_sum.iter().cloned().fold(0.0f32, f32::max);
    normalize_with_peak(output, window_sum, max_window_sum);
}

/// [`normalize_by_window_sum`] with the floor taken from a known peak sum,
/// for callers that normalize a stream piece by piece.
pub(crate) fn normalize_with_peak(output: &mut [f32], window_sum: &[f32], peak: f32) {
    let min_window_sum = (peak * WINDOW_SUM_FLOOR_RATIO).max(WINDOW_SUM_EPSILON);
    for (sample, &ws) in output.iter_mut().zip(window_sum.iter()) {
        *sample /= ws.max(min_window_sum);
    }
}

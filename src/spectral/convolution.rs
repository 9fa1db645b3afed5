//! FFT-based linear convolution, cross-correlation and deconvolution.

use rustfft::num_complex::Complex;

use crate::core::fft::{
    real_to_complex, transform_size, RustFftTransform, SpectralTransform, COMPLEX_ZERO,
};
use crate::core::types::{ensure_same_rate, ComplexSignal, Signal};
use crate::error::{Result, SignalError};

/// Divisor bins below this fraction of the peak magnitude are reported as
/// ill-conditioned by [`SpectralConvolver::deconvolve`].
const DECONV_WARN_RATIO: f32 = 1e-6;

/// Portion of the full linear result to return.
///
/// Follows the numpy/scipy conventions for `n = len(a)`, `m = len(b)`:
/// - `Full`: all `n + m - 1` samples.
/// - `Same`: `n` samples centered on the full result.
/// - `Valid`: the `max(n, m) - min(n, m) + 1` samples where the inputs fully overlap.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ConvolutionMode {
    #[default]
    Full,
    Same,
    Valid,
}

impl ConvolutionMode {
    /// Range of the full result kept by this mode.
    pub(crate) fn range(self, n: usize, m: usize) -> std::ops::Range<usize> {
        let full = n + m - 1;
        match self {
            ConvolutionMode::Full => 0..full,
            ConvolutionMode::Same => {
                let start = (m - 1) / 2;
                start..start + n
            }
            ConvolutionMode::Valid => {
                let start = n.min(m) - 1;
                start..start + n.max(m) - n.min(m) + 1
            }
        }
    }
}

/// Reusable spectral convolution engine.
///
/// Holds the spectral transform so repeated calls reuse its cached plans.
/// Real inputs go through the complex path; only the real part of the
/// result is returned.
pub struct SpectralConvolver<T: SpectralTransform = RustFftTransform> {
    transform: T,
}

impl SpectralConvolver<RustFftTransform> {
    pub fn new() -> Self {
        Self {
            transform: RustFftTransform::new(),
        }
    }
}

impl Default for SpectralConvolver<RustFftTransform> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: SpectralTransform> SpectralConvolver<T> {
    /// Creates an engine around a caller-supplied transform.
    pub fn with_transform(transform: T) -> Self {
        Self { transform }
    }

    /// Linear convolution, `len(a) + len(b) - 1` samples.
    ///
    /// # Errors
    /// Fails if either input is empty or the sample rates differ.
    pub fn convolve(&mut self, a: &Signal, b: &Signal) -> Result<Signal> {
        self.convolve_mode(a, b, ConvolutionMode::Full)
    }

    /// Linear convolution trimmed to `mode`.
    pub fn convolve_mode(
        &mut self,
        a: &Signal,
        b: &Signal,
        mode: ConvolutionMode,
    ) -> Result<Signal> {
        check_real_pair(a, b)?;
        let full = self.convolve_samples(a.samples(), b.samples());
        let range = mode.range(a.len(), b.len());
        Ok(Signal::with_rate_of(full[range].to_vec(), a.sample_rate()))
    }

    /// Cross-correlation: `a` convolved with the time-reversed `b`.
    ///
    /// `cross_correlate([1, 2, 3], [0, 1]) == [1, 2, 3, 0]`.
    pub fn cross_correlate(&mut self, a: &Signal, b: &Signal) -> Result<Signal> {
        self.cross_correlate_mode(a, b, ConvolutionMode::Full)
    }

    /// Cross-correlation trimmed to `mode`.
    pub fn cross_correlate_mode(
        &mut self,
        a: &Signal,
        b: &Signal,
        mode: ConvolutionMode,
    ) -> Result<Signal> {
        check_real_pair(a, b)?;
        let full = self.correlate_samples(a.samples(), b.samples());
        let range = mode.range(a.len(), b.len());
        Ok(Signal::with_rate_of(full[range].to_vec(), a.sample_rate()))
    }

    /// Spectral division of `a` by `b`, `len(a) - len(b) + 1` samples.
    ///
    /// Recovers `x` from `a = convolve(x, b)`. No regularization is applied:
    /// when `b` has spectral bins near zero the result is numerically
    /// unstable (possibly non-finite). Such bins are logged at warn level.
    ///
    /// # Errors
    /// Fails on empty inputs, mismatched rates, or `len(b) > len(a)`.
    pub fn deconvolve(&mut self, a: &Signal, b: &Signal) -> Result<Signal> {
        check_real_pair(a, b)?;
        if b.len() > a.len() {
            return Err(SignalError::DivisorTooLong {
                dividend: a.len(),
                divisor: b.len(),
            });
        }
        let size = transform_size(a.len());
        let mut num = real_to_complex(a.samples(), size);
        let mut den = real_to_complex(b.samples(), size);
        self.divide_spectra(&mut num, &mut den);
        let out_len = a.len() - b.len() + 1;
        let samples = num[..out_len].iter().map(|c| c.re).collect();
        Ok(Signal::with_rate_of(samples, a.sample_rate()))
    }

    /// Complex linear convolution.
    pub fn convolve_complex(
        &mut self,
        a: &ComplexSignal,
        b: &ComplexSignal,
    ) -> Result<ComplexSignal> {
        check_complex_pair(a, b)?;
        let out_len = a.len() + b.len() - 1;
        let result = self.spectral_product(&to_complex(a), &to_complex(b), out_len);
        Ok(from_complex(&result, a.sample_rate()))
    }

    /// Complex cross-correlation: `a` convolved with the reversed conjugate of `b`.
    pub fn cross_correlate_complex(
        &mut self,
        a: &ComplexSignal,
        b: &ComplexSignal,
    ) -> Result<ComplexSignal> {
        check_complex_pair(a, b)?;
        let out_len = a.len() + b.len() - 1;
        let reversed: Vec<Complex<f32>> = to_complex(b).iter().rev().map(|c| c.conj()).collect();
        let result = self.spectral_product(&to_complex(a), &reversed, out_len);
        Ok(from_complex(&result, a.sample_rate()))
    }

    /// Complex spectral division, `len(a) - len(b) + 1` samples. Unregularized.
    pub fn deconvolve_complex(
        &mut self,
        a: &ComplexSignal,
        b: &ComplexSignal,
    ) -> Result<ComplexSignal> {
        check_complex_pair(a, b)?;
        if b.len() > a.len() {
            return Err(SignalError::DivisorTooLong {
                dividend: a.len(),
                divisor: b.len(),
            });
        }
        let size = transform_size(a.len());
        let mut num = pad(&to_complex(a), size);
        let mut den = pad(&to_complex(b), size);
        self.divide_spectra(&mut num, &mut den);
        num.truncate(a.len() - b.len() + 1);
        Ok(from_complex(&num, a.sample_rate()))
    }

    /// Full linear convolution of raw sample slices. Both must be non-empty.
    pub(crate) fn convolve_samples(&mut self, a: &[f32], b: &[f32]) -> Vec<f32> {
        let out_len = a.len() + b.len() - 1;
        let size = transform_size(out_len);
        let a_buf = real_to_complex(a, size);
        let b_buf = real_to_complex(b, size);
        self.spectral_product(&a_buf, &b_buf, out_len)
            .iter()
            .map(|c| c.re)
            .collect()
    }

    /// Full cross-correlation of raw sample slices. Both must be non-empty.
    ///
    /// Index `k` holds lag `k - (len(b) - 1)` of `a` against `b`.
    pub(crate) fn correlate_samples(&mut self, a: &[f32], b: &[f32]) -> Vec<f32> {
        let reversed: Vec<f32> = b.iter().rev().copied().collect();
        self.convolve_samples(a, &reversed)
    }

    /// Zero-pads both operands to a power-of-two size covering `out_len`,
    /// multiplies their spectra and returns the first `out_len` samples.
    fn spectral_product(
        &mut self,
        a: &[Complex<f32>],
        b: &[Complex<f32>],
        out_len: usize,
    ) -> Vec<Complex<f32>> {
        let size = transform_size(out_len);
        let mut a_buf = pad(a, size);
        let mut b_buf = pad(b, size);
        self.transform.forward(&mut a_buf);
        self.transform.forward(&mut b_buf);
        for (x, y) in a_buf.iter_mut().zip(b_buf.iter()) {
            *x *= *y;
        }
        self.transform.inverse(&mut a_buf);
        a_buf.truncate(out_len);
        a_buf
    }

    /// Replaces `num` with `ifft(fft(num) / fft(den))`.
    fn divide_spectra(&mut self, num: &mut [Complex<f32>], den: &mut [Complex<f32>]) {
        self.transform.forward(num);
        self.transform.forward(den);

        let peak = den.iter().map(|c| c.norm()).fold(0.0f32, f32::max);
        let weak_bins = den
            .iter()
            .filter(|c| c.norm() <= peak * DECONV_WARN_RATIO)
            .count();
        if weak_bins > 0 {
            log::warn!(
                "deconvolution divisor has {} of {} bins near zero; result is unstable",
                weak_bins,
                den.len()
            );
        }

        for (x, y) in num.iter_mut().zip(den.iter()) {
            *x /= *y;
        }
        self.transform.inverse(num);
    }
}

/// One-shot [`SpectralConvolver::convolve`].
pub fn convolve(a: &Signal, b: &Signal) -> Result<Signal> {
    SpectralConvolver::new().convolve(a, b)
}

/// One-shot [`SpectralConvolver::cross_correlate`].
pub fn cross_correlate(a: &Signal, b: &Signal) -> Result<Signal> {
    SpectralConvolver::new().cross_correlate(a, b)
}

/// One-shot [`SpectralConvolver::deconvolve`].
pub fn deconvolve(a: &Signal, b: &Signal) -> Result<Signal> {
    SpectralConvolver::new().deconvolve(a, b)
}

/// One-shot [`SpectralConvolver::convolve_complex`].
pub fn convolve_complex(a: &ComplexSignal, b: &ComplexSignal) -> Result<ComplexSignal> {
    SpectralConvolver::new().convolve_complex(a, b)
}

/// One-shot [`SpectralConvolver::cross_correlate_complex`].
pub fn cross_correlate_complex(a: &ComplexSignal, b: &ComplexSignal) -> Result<ComplexSignal> {
    SpectralConvolver::new().cross_correlate_complex(a, b)
}

/// One-shot [`SpectralConvolver::deconvolve_complex`].
pub fn deconvolve_complex(a: &ComplexSignal, b: &ComplexSignal) -> Result<ComplexSignal> {
    SpectralConvolver::new().deconvolve_complex(a, b)
}

fn check_real_pair(a: &Signal, b: &Signal) -> Result<()> {
    if a.is_empty() || b.is_empty() {
        return Err(SignalError::EmptySignal("convolution operands must be non-empty"));
    }
    ensure_same_rate(a.sample_rate(), b.sample_rate())
}

fn check_complex_pair(a: &ComplexSignal, b: &ComplexSignal) -> Result<()> {
    if a.is_empty() || b.is_empty() {
        return Err(SignalError::EmptySignal("convolution operands must be non-empty"));
    }
    ensure_same_rate(a.sample_rate(), b.sample_rate())
}

fn to_complex(signal: &ComplexSignal) -> Vec<Complex<f32>> {
    signal
        .re()
        .iter()
        .zip(signal.im().iter())
        .map(|(&re, &im)| Complex::new(re, im))
        .collect()
}

fn from_complex(values: &[Complex<f32>], sample_rate: u32) -> ComplexSignal {
    let re = values.iter().map(|c| c.re).collect();
    let im = values.iter().map(|c| c.im).collect();
    ComplexSignal::from_parts_unchecked(re, im, sample_rate)
}

fn pad(values: &[Complex<f32>], size: usize) -> Vec<Complex<f32>> {
    let mut buf = vec![COMPLEX_ZERO; size.max(values.len())];
    buf[..values.len()].copy_from_slice(values);
    buf
}

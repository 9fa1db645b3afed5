//! Anti-aliasing filter capability used by the resampler.

use crate::core::fft::transform_size;
use crate::core::window::{generate_window, WindowType};
use crate::error::{Result, SignalError};
use crate::spectral::SpectralConvolver;
use crate::stream::block::{BlockConvolver, BlockFilter, FilterMethod};

/// Sinc lobes on each side of the center tap for [`FirFilter::for_factor`].
const DEFAULT_LOBES: usize = 8;
/// Kaiser beta for the default design (~60 dB stopband).
const DEFAULT_KAISER_BETA: f64 = 6.0;
/// Smallest block used when streaming a signal through the filter.
const MIN_FILTER_BLOCK: usize = 1024;

/// A low-pass stage that the resampler can plug in.
///
/// `apply` must return exactly `input.len()` samples, time-aligned with the
/// input (any group delay compensated).
pub trait LowPassFilter {
    fn apply(&self, input: &[f32]) -> Vec<f32>;

    /// FIR taps, if the filter is a linear-phase FIR.
    ///
    /// When available the resampler evaluates only the output samples it
    /// keeps instead of filtering the full zero-stuffed signal.
    fn coefficients(&self) -> Option<&[f32]> {
        None
    }
}

/// Linear-phase FIR filter.
///
/// Group delay is `(taps - 1) / 2` samples and is removed by
/// [`apply`](LowPassFilter::apply).
#[derive(Debug, Clone, PartialEq)]
pub struct FirFilter {
    taps: Vec<f32>,
}

impl FirFilter {
    /// Wraps caller-designed taps. They are assumed symmetric (linear phase).
    ///
    /// # Errors
    /// Fails on an empty tap set.
    pub fn from_coefficients(taps: Vec<f32>) -> Result<Self> {
        if taps.is_empty() {
            return Err(SignalError::InvalidBlock(
                "FIR filter needs at least one tap".to_string(),
            ));
        }
        Ok(Self { taps })
    }

    /// Kaiser-windowed sinc low-pass with unity DC gain.
    ///
    /// `cutoff` is a fraction of the sample rate in `(0, 0.5]`.
    ///
    /// # Errors
    /// Fails if `cutoff` is out of range or `num_taps` is zero.
    pub fn low_pass(cutoff: f64, num_taps: usize) -> Result<Self> {
        if !(cutoff > 0.0 && cutoff <= 0.5) {
            return Err(SignalError::InvalidFactor(format!(
                "low-pass cutoff must be in (0, 0.5], got {}",
                cutoff
            )));
        }
        if num_taps == 0 {
            return Err(SignalError::InvalidFactor(
                "low-pass needs at least one tap".to_string(),
            ));
        }

        let window = generate_window(
            WindowType::Kaiser {
                beta: DEFAULT_KAISER_BETA,
            },
            num_taps,
        );
        let center = (num_taps - 1) as f64 / 2.0;
        let mut taps: Vec<f64> = (0..num_taps)
            .map(|n| {
                let x = 2.0 * cutoff * (n as f64 - center);
                let sinc = if x.abs() < 1e-12 {
                    1.0
                } else {
                    let pi_x = std::f64::consts::PI * x;
                    pi_x.sin() / pi_x
                };
                2.0 * cutoff * sinc * window[n] as f64
            })
            .collect();

        let sum: f64 = taps.iter().sum();
        if sum.abs() > 1e-12 {
            taps.iter_mut().for_each(|t| *t /= sum);
        }
        Ok(Self {
            taps: taps.into_iter().map(|t| t as f32).collect(),
        })
    }

    /// Default anti-aliasing filter for an integer rate change: cutoff at
    /// Nyquist / `factor`, eight sinc lobes per side.
    pub fn for_factor(factor: usize) -> Self {
        let factor = factor.max(1);
        let cutoff = 0.5 / factor as f64;
        let num_taps = 2 * DEFAULT_LOBES * factor + 1;
        log::debug!(
            "default low-pass: factor={}, cutoff={:.5}, taps={}",
            factor,
            cutoff,
            num_taps
        );
        Self::low_pass(cutoff, num_taps).unwrap_or(Self { taps: vec![1.0] })
    }

    #[inline]
    pub fn taps(&self) -> &[f32] {
        &self.taps
    }

    /// Group delay in samples.
    #[inline]
    pub fn delay(&self) -> usize {
        (self.taps.len() - 1) / 2
    }

    /// Full linear convolution of `input` with the taps, streamed through a
    /// block convolver for long inputs.
    fn convolve_full(&self, input: &[f32]) -> Vec<f32> {
        let block_size = transform_size(4 * self.taps.len()).max(MIN_FILTER_BLOCK);
        if input.len() < block_size {
            return SpectralConvolver::new().convolve_samples(input, &self.taps);
        }
        match BlockConvolver::new(&self.taps, block_size, FilterMethod::OverlapSave) {
            Ok(mut conv) => {
                let mut full = conv.process(input);
                full.extend(conv.flush());
                full
            }
            Err(_) => SpectralConvolver::new().convolve_samples(input, &self.taps),
        }
    }
}

impl LowPassFilter for FirFilter {
    fn apply(&self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return vec![];
        }
        let full = self.convolve_full(input);
        let delay = self.delay();
        full[delay..delay + input.len()].to_vec()
    }

    fn coefficients(&self) -> Option<&[f32]> {
        Some(&self.taps)
    }
}

//! Real and complex sampled signals.

use crate::error::{Result, SignalError};

/// A single sample (32-bit float).
pub type Sample = f32;

/// Real-valued discrete-time signal.
///
/// Samples are stored sequentially with the sampling rate they were taken
/// at. Operations never mutate a signal they are given; they return a new one.
#[derive(Debug, Clone, PartialEq)]
pub struct Signal {
    samples: Vec<Sample>,
    sample_rate: u32,
}

impl Signal {
    /// Creates a signal.
    ///
    /// # Errors
    /// Returns [`SignalError::InvalidSampleRate`] if `sample_rate` is 0.
    pub fn new(samples: Vec<Sample>, sample_rate: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(SignalError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            samples,
            sample_rate,
        })
    }

    /// Creates a signal of `len` zeros.
    pub fn zeros(len: usize, sample_rate: u32) -> Result<Self> {
        Self::new(vec![0.0; len], sample_rate)
    }

    /// Builds a signal with a rate already known to be valid.
    pub(crate) fn with_rate_of(samples: Vec<Sample>, sample_rate: u32) -> Self {
        debug_assert!(sample_rate > 0);
        Self {
            samples,
            sample_rate,
        }
    }

    #[inline]
    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Duration in seconds.
    pub fn duration_secs(&self) -> f64 {
        self.samples.len() as f64 / self.sample_rate as f64
    }

    /// Copies `[start, end)` into a new signal, clamping both bounds to the length.
    pub fn slice(&self, start: usize, end: usize) -> Signal {
        let end = end.min(self.samples.len());
        let start = start.min(end);
        Self::with_rate_of(self.samples[start..end].to_vec(), self.sample_rate)
    }

    /// Root-mean-square level, accumulated in f64.
    pub fn rms(&self) -> f32 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let sum_sq: f64 = self.samples.iter().map(|&s| (s as f64) * (s as f64)).sum();
        (sum_sq / self.samples.len() as f64).sqrt() as f32
    }

    /// Consumes the signal, returning its samples.
    pub fn into_samples(self) -> Vec<Sample> {
        self.samples
    }
}

/// Complex-valued discrete-time signal stored as split real/imaginary parts.
#[derive(Debug, Clone, PartialEq)]
pub struct ComplexSignal {
    re: Vec<Sample>,
    im: Vec<Sample>,
    sample_rate: u32,
}

impl ComplexSignal {
    /// Creates a complex signal.
    ///
    /// # Errors
    /// Returns [`SignalError::ComplexLengthMismatch`] if the parts differ in
    /// length, or [`SignalError::InvalidSampleRate`] if `sample_rate` is 0.
    pub fn new(re: Vec<Sample>, im: Vec<Sample>, sample_rate: u32) -> Result<Self> {
        if re.len() != im.len() {
            return Err(SignalError::ComplexLengthMismatch {
                re: re.len(),
                im: im.len(),
            });
        }
        if sample_rate == 0 {
            return Err(SignalError::InvalidSampleRate(sample_rate));
        }
        Ok(Self {
            re,
            im,
            sample_rate,
        })
    }

    /// Lifts a real signal into the complex domain with a zero imaginary part.
    pub fn from_real(signal: &Signal) -> Self {
        Self {
            re: signal.samples().to_vec(),
            im: vec![0.0; signal.len()],
            sample_rate: signal.sample_rate(),
        }
    }

    pub(crate) fn from_parts_unchecked(re: Vec<Sample>, im: Vec<Sample>, sample_rate: u32) -> Self {
        debug_assert_eq!(re.len(), im.len());
        Self {
            re,
            im,
            sample_rate,
        }
    }

    #[inline]
    pub fn re(&self) -> &[Sample] {
        &self.re
    }

    #[inline]
    pub fn im(&self) -> &[Sample] {
        &self.im
    }

    #[inline]
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.re.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.re.is_empty()
    }

    /// Copies `[start, end)` into a new signal, clamping both bounds to the length.
    pub fn slice(&self, start: usize, end: usize) -> ComplexSignal {
        let end = end.min(self.re.len());
        let start = start.min(end);
        Self::from_parts_unchecked(
            self.re[start..end].to_vec(),
            self.im[start..end].to_vec(),
            self.sample_rate,
        )
    }

    /// Real part as a standalone signal.
    pub fn real_part(&self) -> Signal {
        Signal::with_rate_of(self.re.clone(), self.sample_rate)
    }
}

/// Checks that two signals share a sample rate.
#[inline]
pub(crate) fn ensure_same_rate(left: u32, right: u32) -> Result<()> {
    if left != right {
        return Err(SignalError::SampleRateMismatch { left, right });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_rejects_zero_rate() {
        assert_eq!(
            Signal::new(vec![1.0], 0),
            Err(SignalError::InvalidSampleRate(0))
        );
    }

    #[test]
    fn test_signal_basics() {
        let s = Signal::new(vec![1.0, -1.0, 1.0, -1.0], 4).unwrap();
        assert_eq!(s.len(), 4);
        assert!(!s.is_empty());
        assert!((s.duration_secs() - 1.0).abs() < 1e-12);
        assert!((s.rms() - 1.0).abs() < 1e-6);
    }

    #[test]
    fn test_signal_slice_clamps() {
        let s = Signal::new(vec![0.0, 1.0, 2.0, 3.0], 1).unwrap();
        assert_eq!(s.slice(1, 3).samples(), &[1.0, 2.0]);
        assert_eq!(s.slice(2, 100).samples(), &[2.0, 3.0]);
        assert!(s.slice(5, 2).is_empty());
    }

    #[test]
    fn test_complex_length_mismatch() {
        let err = ComplexSignal::new(vec![1.0, 2.0], vec![0.0], 8000).unwrap_err();
        assert_eq!(err, SignalError::ComplexLengthMismatch { re: 2, im: 1 });
    }

    #[test]
    fn test_complex_from_real() {
        let s = Signal::new(vec![1.0, 2.0], 100).unwrap();
        let c = ComplexSignal::from_real(&s);
        assert_eq!(c.re(), &[1.0, 2.0]);
        assert_eq!(c.im(), &[0.0, 0.0]);
        assert_eq!(c.real_part(), s);
    }
}

//! Direct-form convolution and cross-correlation.
//!
//! O(n·m) nested summation with f64 accumulation. These are the ground
//! truth the spectral routines are checked against; they are not meant for
//! production-size inputs.

use rustfft::num_complex::Complex;

use crate::core::types::{ensure_same_rate, ComplexSignal, Signal};
use crate::error::{Result, SignalError};

/// `c[n] = Σ_k a[n - k] · b[k]`, `len(a) + len(b) - 1` samples.
pub fn convolve_direct(a: &Signal, b: &Signal) -> Result<Signal> {
    check_pair(a.len(), b.len(), a.sample_rate(), b.sample_rate())?;
    Ok(Signal::with_rate_of(
        convolve_samples_direct(a.samples(), b.samples()),
        a.sample_rate(),
    ))
}

/// `a` convolved with the time-reversed `b`.
pub fn cross_correlate_direct(a: &Signal, b: &Signal) -> Result<Signal> {
    check_pair(a.len(), b.len(), a.sample_rate(), b.sample_rate())?;
    let reversed: Vec<f32> = b.samples().iter().rev().copied().collect();
    Ok(Signal::with_rate_of(
        convolve_samples_direct(a.samples(), &reversed),
        a.sample_rate(),
    ))
}

/// Complex direct-form convolution.
pub fn convolve_complex_direct(a: &ComplexSignal, b: &ComplexSignal) -> Result<ComplexSignal> {
    check_pair(a.len(), b.len(), a.sample_rate(), b.sample_rate())?;
    let lhs = to_complex64(a);
    let rhs = to_complex64(b);
    Ok(from_complex64(&convolve_complex64(&lhs, &rhs), a.sample_rate()))
}

/// Complex direct-form cross-correlation against the reversed conjugate of `b`.
pub fn cross_correlate_complex_direct(
    a: &ComplexSignal,
    b: &ComplexSignal,
) -> Result<ComplexSignal> {
    check_pair(a.len(), b.len(), a.sample_rate(), b.sample_rate())?;
    let lhs = to_complex64(a);
    let rhs: Vec<Complex<f64>> = to_complex64(b).iter().rev().map(|c| c.conj()).collect();
    Ok(from_complex64(&convolve_complex64(&lhs, &rhs), a.sample_rate()))
}

pub(crate) fn convolve_samples_direct(a: &[f32], b: &[f32]) -> Vec<f32> {
    let mut out = vec![0.0f64; a.len() + b.len() - 1];
    for (i, &x) in a.iter().enumerate() {
        for (k, &h) in b.iter().enumerate() {
            out[i + k] += x as f64 * h as f64;
        }
    }
    out.into_iter().map(|v| v as f32).collect()
}

fn convolve_complex64(a: &[Complex<f64>], b: &[Complex<f64>]) -> Vec<Complex<f64>> {
    let mut out = vec![Complex::new(0.0, 0.0); a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (k, h) in b.iter().enumerate() {
            out[i + k] += x * h;
        }
    }
    out
}

fn check_pair(a_len: usize, b_len: usize, a_rate: u32, b_rate: u32) -> Result<()> {
    if a_len == 0 || b_len == 0 {
        return Err(SignalError::EmptySignal("convolution operands must be non-empty"));
    }
    ensure_same_rate(a_rate, b_rate)
}

fn to_complex64(signal: &ComplexSignal) -> Vec<Complex<f64>> {
    signal
        .re()
        .iter()
        .zip(signal.im().iter())
        .map(|(&re, &im)| Complex::new(re as f64, im as f64))
        .collect()
}

fn from_complex64(values: &[Complex<f64>], sample_rate: u32) -> ComplexSignal {
    let re = values.iter().map(|c| c.re as f32).collect();
    let im = values.iter().map(|c| c.im as f32).collect();
    ComplexSignal::from_parts_unchecked(re, im, sample_rate)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_convolve_direct_known() {
        let a = Signal::new(vec![1.0, 2.0, 3.0], 1).unwrap();
        let b = Signal::new(vec![1.0, 1.0], 1).unwrap();
        assert_eq!(convolve_direct(&a, &b).unwrap().samples(), &[1.0, 3.0, 5.0, 3.0]);
    }

    #[test]
    fn test_cross_correlate_direct_known() {
        let a = Signal::new(vec![1.0, 2.0, 3.0], 1).unwrap();
        let b = Signal::new(vec![0.0, 1.0], 1).unwrap();
        assert_eq!(
            cross_correlate_direct(&a, &b).unwrap().samples(),
            &[1.0, 2.0, 3.0, 0.0]
        );
    }

    #[test]
    fn test_convolution_is_commutative() {
        let a = [0.3, -1.2, 4.0, 0.5];
        let b = [2.0, 0.0, -0.5];
        let ab = convolve_samples_direct(&a, &b);
        let ba = convolve_samples_direct(&b, &a);
        for (x, y) in ab.iter().zip(ba.iter()) {
            assert!((x - y).abs() < 1e-6);
        }
    }

    #[test]
    fn test_complex_direct() {
        let a = ComplexSignal::new(vec![1.0], vec![1.0], 1).unwrap();
        let b = ComplexSignal::new(vec![1.0, 0.0], vec![0.0, 1.0], 1).unwrap();
        let c = convolve_complex_direct(&a, &b).unwrap();
        assert_eq!(c.re(), &[1.0, -1.0]);
        assert_eq!(c.im(), &[1.0, 1.0]);

        let x = cross_correlate_complex_direct(&a, &a).unwrap();
        // (1 + i)(1 - i) = 2
        assert_eq!(x.re(), &[2.0]);
        assert_eq!(x.im(), &[0.0]);
    }

    #[test]
    fn test_direct_rejects_empty() {
        let a = Signal::new(vec![], 1).unwrap();
        let b = Signal::new(vec![1.0], 1).unwrap();
        assert!(convolve_direct(&a, &b).is_err());
        assert!(cross_correlate_direct(&b, &a).is_err());
    }
}

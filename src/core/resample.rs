//! Sample-rate conversion: integer interpolation and decimation, rational
//! resampling, and a filter-free linear up/down approximation.

use crate::core::filter::{FirFilter, LowPassFilter};
use crate::core::types::Signal;
use crate::error::{Result, SignalError};

/// Raises the sample rate by `factor`.
///
/// Inserts `factor - 1` zeros between consecutive samples, low-pass filters
/// at Nyquist / `factor` and scales by `factor` to restore the amplitude
/// lost to zero insertion. When `filter` is `None` a default
/// [`FirFilter::for_factor`] is used.
///
/// # Errors
/// Fails if `factor` is zero or the new rate overflows.
pub fn interpolate(
    signal: &Signal,
    factor: usize,
    filter: Option<&dyn LowPassFilter>,
) -> Result<Signal> {
    if factor == 0 {
        return Err(SignalError::InvalidFactor(
            "interpolation factor must be positive".to_string(),
        ));
    }
    let new_rate = scaled_rate(signal.sample_rate(), factor)?;
    if factor == 1 {
        return Ok(signal.clone());
    }

    let default_filter;
    let filter: &dyn LowPassFilter = match filter {
        Some(f) => f,
        None => {
            default_filter = FirFilter::for_factor(factor);
            &default_filter
        }
    };
    let samples = up_fir_down(signal.samples(), factor, 1, filter);
    Ok(Signal::with_rate_of(samples, new_rate))
}

/// Lowers the sample rate by `factor`.
///
/// Low-pass filters at Nyquist / `factor` before keeping every
/// `factor`-th sample. The new rate is rounded to the nearest integer.
///
/// # Errors
/// Fails if `factor` is zero.
pub fn decimate(
    signal: &Signal,
    factor: usize,
    filter: Option<&dyn LowPassFilter>,
) -> Result<Signal> {
    if factor == 0 {
        return Err(SignalError::InvalidFactor(
            "decimation factor must be positive".to_string(),
        ));
    }
    if factor == 1 {
        return Ok(signal.clone());
    }
    let new_rate = ((signal.sample_rate() as f64 / factor as f64).round() as u32).max(1);

    let default_filter;
    let filter: &dyn LowPassFilter = match filter {
        Some(f) => f,
        None => {
            default_filter = FirFilter::for_factor(factor);
            &default_filter
        }
    };
    let samples = up_fir_down(signal.samples(), 1, factor, filter);
    Ok(Signal::with_rate_of(samples, new_rate))
}

/// Converts to `new_rate` by the rational factor `new_rate / rate`.
///
/// The ratio is reduced by the greatest common divisor to `(up, down)`;
/// interpolation by `up` and decimation by `down` share a single low-pass
/// pass with cutoff at Nyquist / `max(up, down)`.
///
/// # Errors
/// Fails if `new_rate` is zero.
pub fn resample(
    signal: &Signal,
    new_rate: u32,
    filter: Option<&dyn LowPassFilter>,
) -> Result<Signal> {
    if new_rate == 0 {
        return Err(SignalError::InvalidFactor("target rate must be positive".to_string()));
    }
    let old_rate = signal.sample_rate();
    if new_rate == old_rate {
        return Ok(signal.clone());
    }

    let g = gcd(new_rate as u64, old_rate as u64);
    let up = (new_rate as u64 / g) as usize;
    let down = (old_rate as u64 / g) as usize;
    log::debug!("resample {} Hz -> {} Hz: up={}, down={}", old_rate, new_rate, up, down);

    let default_filter;
    let filter: &dyn LowPassFilter = match filter {
        Some(f) => f,
        None => {
            default_filter = FirFilter::for_factor(up.max(down));
            &default_filter
        }
    };
    let samples = up_fir_down(signal.samples(), up, down, filter);
    Ok(Signal::with_rate_of(samples, new_rate))
}

/// Fast approximate rate change by `up / down` using linear interpolation
/// between neighbouring input samples.
///
/// No anti-aliasing filter is applied, so downsampling content above the
/// new Nyquist frequency aliases. Output length is `ceil(len * up / down)`.
///
/// # Errors
/// Fails if `up` or `down` is zero.
pub fn resample_up_down(signal: &Signal, up: usize, down: usize) -> Result<Signal> {
    if up == 0 || down == 0 {
        return Err(SignalError::InvalidFactor(format!(
            "up/down factors must be positive, got {}/{}",
            up, down
        )));
    }
    let new_rate = ((signal.sample_rate() as f64 * up as f64 / down as f64).round() as u32).max(1);
    let input = signal.samples();
    if input.is_empty() {
        return Ok(Signal::with_rate_of(vec![], new_rate));
    }

    let output_len = (input.len() * up).div_ceil(down);
    let step = down as f64 / up as f64;
    let last = input.len() - 1;
    let output = (0..output_len)
        .map(|i| {
            let pos = i as f64 * step;
            let idx = pos as usize;
            let frac = (pos - idx as f64) as f32;
            if idx < last {
                input[idx] * (1.0 - frac) + input[idx + 1] * frac
            } else {
                input[last]
            }
        })
        .collect();
    Ok(Signal::with_rate_of(output, new_rate))
}

/// Zero-stuffs by `up`, low-passes, scales by `up` and keeps every
/// `down`-th sample. Output length is `ceil(len * up / down)`.
fn up_fir_down(input: &[f32], up: usize, down: usize, filter: &dyn LowPassFilter) -> Vec<f32> {
    if input.is_empty() {
        return vec![];
    }
    match filter.coefficients() {
        Some(taps) if !taps.is_empty() => polyphase(input, up, down, taps),
        _ => {
            let mut stuffed = vec![0.0f32; input.len() * up];
            for (i, &s) in input.iter().enumerate() {
                stuffed[i * up] = s;
            }
            let gain = up as f32;
            filter
                .apply(&stuffed)
                .into_iter()
                .step_by(down)
                .map(|s| s * gain)
                .collect()
        }
    }
}

/// Evaluates only the kept outputs of the zero-stuffed, filtered signal.
///
/// Output `m` sits at upsampled index `t = m * down`; with the group delay
/// `d` compensated it is `up * Σ_i h[t + d - i*up] · x[i]` over the input
/// samples `i` whose stuffed position falls under the filter.
fn polyphase(input: &[f32], up: usize, down: usize, taps: &[f32]) -> Vec<f32> {
    let num_taps = taps.len();
    let delay = (num_taps - 1) / 2;
    let output_len = (input.len() * up).div_ceil(down);
    let gain = up as f64;

    (0..output_len)
        .map(|m| {
            let center = m * down + delay;
            // i * up must satisfy center - num_taps < i * up <= center.
            let first = (center + 1).saturating_sub(num_taps).div_ceil(up);
            let last = (center / up).min(input.len() - 1);
            let mut acc = 0.0f64;
            if first <= last {
                for (i, &x) in input.iter().enumerate().take(last + 1).skip(first) {
                    acc += taps[center - i * up] as f64 * x as f64;
                }
            }
            (acc * gain) as f32
        })
        .collect()
}

/// Multiplies a rate by an integer factor, rejecting overflow.
fn scaled_rate(rate: u32, factor: usize) -> Result<u32> {
    u32::try_from(factor)
        .ok()
        .and_then(|f| rate.checked_mul(f))
        .ok_or_else(|| {
            SignalError::InvalidFactor(format!("rate {} Hz times {} overflows", rate, factor))
        })
}

fn gcd(mut a: u64, mut b: u64) -> u64 {
    while b != 0 {
        let t = a % b;
        a = b;
        b = t;
    }
    a
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::f32::consts::PI;

    fn sine(freq: f32, rate: u32, n: usize) -> Signal {
        let samples = (0..n)
            .map(|i| (2.0 * PI * freq * i as f32 / rate as f32).sin())
            .collect();
        Signal::new(samples, rate).unwrap()
    }

    /// Same interface as `FirFilter` but without exposing coefficients, so
    /// the materialized zero-stuffing path runs.
    struct Opaque(FirFilter);

    impl LowPassFilter for Opaque {
        fn apply(&self, input: &[f32]) -> Vec<f32> {
            self.0.apply(input)
        }
    }

    #[test]
    fn test_gcd() {
        assert_eq!(gcd(48000, 44100), 300);
        assert_eq!(gcd(7, 3), 1);
        assert_eq!(gcd(8, 0), 8);
    }

    #[test]
    fn test_interpolate_length_and_rate() {
        let s = sine(100.0, 8000, 400);
        let up = interpolate(&s, 3, None).unwrap();
        assert_eq!(up.len(), 1200);
        assert_eq!(up.sample_rate(), 24000);
    }

    #[test]
    fn test_interpolate_preserves_amplitude() {
        let s = sine(100.0, 8000, 800);
        let up = interpolate(&s, 4, None).unwrap();
        let expected = sine(100.0, 32000, 3200);
        for i in 400..2800 {
            assert!(
                (up.samples()[i] - expected.samples()[i]).abs() < 0.02,
                "index {}: {} vs {}",
                i,
                up.samples()[i],
                expected.samples()[i]
            );
        }
    }

    #[test]
    fn test_decimate_length_and_rate() {
        let s = sine(100.0, 8000, 1001);
        let down = decimate(&s, 4, None).unwrap();
        assert_eq!(down.len(), 251);
        assert_eq!(down.sample_rate(), 2000);
    }

    #[test]
    fn test_decimate_removes_aliasing_tone() {
        // 3500 Hz at 8 kHz would alias to 500 Hz at 2 kHz without filtering.
        let s = sine(3500.0, 8000, 8000);
        let down = decimate(&s, 4, None).unwrap();
        let level = down.slice(100, 1900).rms();
        assert!(level < 0.02, "aliased level {}", level);
    }

    #[test]
    fn test_polyphase_matches_materialized() {
        let s = sine(300.0, 8000, 500);
        let fir = FirFilter::for_factor(3);
        let fast = resample(&s, 12000, Some(&fir)).unwrap();
        let slow = resample(&s, 12000, Some(&Opaque(fir.clone()))).unwrap();
        assert_eq!(fast.len(), slow.len());
        for (a, b) in fast.samples().iter().zip(slow.samples().iter()) {
            assert!((a - b).abs() < 1e-3, "{} vs {}", a, b);
        }
    }

    #[test]
    fn test_resample_rational() {
        let s = sine(440.0, 44100, 4410);
        let out = resample(&s, 48000, None).unwrap();
        assert_eq!(out.sample_rate(), 48000);
        assert_eq!(out.len(), 4800);
        let expected = sine(440.0, 48000, 4800);
        for i in 200..4600 {
            assert!((out.samples()[i] - expected.samples()[i]).abs() < 0.02, "index {}", i);
        }
    }

    #[test]
    fn test_resample_same_rate_copies() {
        let s = sine(10.0, 1000, 50);
        assert_eq!(resample(&s, 1000, None).unwrap(), s);
    }

    #[test]
    fn test_invalid_factors() {
        let s = sine(10.0, 1000, 50);
        assert!(matches!(interpolate(&s, 0, None), Err(SignalError::InvalidFactor(_))));
        assert!(matches!(decimate(&s, 0, None), Err(SignalError::InvalidFactor(_))));
        assert!(matches!(resample(&s, 0, None), Err(SignalError::InvalidFactor(_))));
        assert!(resample_up_down(&s, 0, 1).is_err());
        assert!(resample_up_down(&s, 1, 0).is_err());
    }

    #[test]
    fn test_resample_up_down_linear() {
        let s = Signal::new(vec![0.0, 1.0, 2.0, 3.0], 10).unwrap();
        let up = resample_up_down(&s, 2, 1).unwrap();
        assert_eq!(up.sample_rate(), 20);
        assert_eq!(up.samples(), &[0.0, 0.5, 1.0, 1.5, 2.0, 2.5, 3.0, 3.0]);

        let down = resample_up_down(&s, 1, 2).unwrap();
        assert_eq!(down.samples(), &[0.0, 2.0]);
        assert_eq!(down.sample_rate(), 5);
    }

    #[test]
    fn test_empty_signal() {
        let s = Signal::new(vec![], 8000).unwrap();
        assert!(interpolate(&s, 2, None).unwrap().is_empty());
        assert!(decimate(&s, 2, None).unwrap().is_empty());
        assert!(resample_up_down(&s, 3, 2).unwrap().is_empty());
    }
}

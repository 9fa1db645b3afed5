mod common;

use common::{correlation, estimate_freq_zero_crossings, gen_sine, gen_two_tone, signal};
use sigkernel::{
    decimate, interpolate, resample, resample_up_down, FirFilter, LowPassFilter, SignalError,
};

#[test]
fn test_interpolate_decimate_round_trip() {
    let x = signal(gen_two_tone(300.0, 0.6, 1100.0, 0.3, 8000, 4000), 8000);
    for factor in [2usize, 3, 4] {
        let up = interpolate(&x, factor, None).unwrap();
        assert_eq!(up.len(), x.len() * factor);
        assert_eq!(up.sample_rate(), 8000 * factor as u32);

        let back = decimate(&up, factor, None).unwrap();
        assert_eq!(back.len(), x.len());
        assert_eq!(back.sample_rate(), 8000);

        let r = correlation(&back.samples()[200..3800], &x.samples()[200..3800]);
        assert!(r > 0.99, "factor {}: correlation {}", factor, r);
    }
}

#[test]
fn test_resample_preserves_pitch() {
    let x = signal(gen_sine(440.0, 44100, 44100, |_| 0.9), 44100);
    for new_rate in [48000u32, 22050, 32000] {
        let y = resample(&x, new_rate, None).unwrap();
        assert_eq!(y.sample_rate(), new_rate);
        assert_eq!(y.len(), new_rate as usize);
        let n = y.len();
        let freq = estimate_freq_zero_crossings(y.samples(), new_rate, n / 10, n - n / 10);
        assert!((freq - 440.0).abs() < 3.0, "{} Hz: estimated {}", new_rate, freq);
    }
}

#[test]
fn test_resample_same_rate_is_copy() {
    let x = signal(gen_sine(100.0, 8000, 500, |_| 1.0), 8000);
    assert_eq!(resample(&x, 8000, None).unwrap(), x);
    assert_eq!(interpolate(&x, 1, None).unwrap(), x);
    assert_eq!(decimate(&x, 1, None).unwrap(), x);
}

#[test]
fn test_custom_filter_is_used() {
    struct Silence;
    impl LowPassFilter for Silence {
        fn apply(&self, input: &[f32]) -> Vec<f32> {
            vec![0.0; input.len()]
        }
    }

    let x = signal(gen_sine(100.0, 8000, 400, |_| 1.0), 8000);
    let y = interpolate(&x, 2, Some(&Silence)).unwrap();
    assert_eq!(y.len(), 800);
    assert!(y.samples().iter().all(|&v| v == 0.0));

    let narrow = FirFilter::low_pass(0.05, 101).unwrap();
    let z = decimate(&x, 2, Some(&narrow)).unwrap();
    assert_eq!(z.len(), 200);
}

#[test]
fn test_decimate_length_rounds_up() {
    let x = signal(vec![1.0; 1001], 44100);
    let y = decimate(&x, 4, None).unwrap();
    assert_eq!(y.len(), 251);
    assert_eq!(y.sample_rate(), 11025);
}

#[test]
fn test_up_down_linear_approximation() {
    let x = signal(gen_sine(50.0, 1000, 1000, |_| 1.0), 1000);
    let y = resample_up_down(&x, 3, 2).unwrap();
    assert_eq!(y.len(), 1500);
    assert_eq!(y.sample_rate(), 1500);
    // Slow sine: linear interpolation tracks the exact curve closely.
    let exact = gen_sine(50.0, 1500, 1500, |_| 1.0);
    let r = correlation(&y.samples()[..1490], &exact[..1490]);
    assert!(r > 0.999, "correlation {}", r);
}

#[test]
fn test_invalid_factors() {
    let x = signal(vec![1.0; 10], 8000);
    assert!(matches!(
        interpolate(&x, 0, None),
        Err(SignalError::InvalidFactor(_))
    ));
    assert!(matches!(decimate(&x, 0, None), Err(SignalError::InvalidFactor(_))));
    assert!(matches!(resample(&x, 0, None), Err(SignalError::InvalidFactor(_))));
    assert!(matches!(
        resample_up_down(&x, 1, 0),
        Err(SignalError::InvalidFactor(_))
    ));
}

#[test]
fn test_empty_signal_resamples_to_empty() {
    let x = signal(vec![], 8000);
    let y = resample(&x, 16000, None).unwrap();
    assert!(y.is_empty());
    assert_eq!(y.sample_rate(), 16000);
}

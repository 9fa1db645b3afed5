mod common;

use approx::assert_abs_diff_eq;
use common::{assert_slices_close, gen_noise, signal};
use sigkernel::{
    convolve, convolve_complex, convolve_complex_direct, convolve_direct, cross_correlate,
    cross_correlate_complex, cross_correlate_complex_direct, cross_correlate_direct, deconvolve,
    ComplexSignal, ConvolutionMode, SignalError, SpectralConvolver,
};

#[test]
fn test_known_convolution_and_correlation() {
    let a = signal(vec![1.0, 2.0, 3.0], 1);
    let b = signal(vec![1.0, 1.0], 1);
    let c = convolve(&a, &b).unwrap();
    assert_slices_close(c.samples(), &[1.0, 3.0, 5.0, 3.0], 1e-5);
    assert_eq!(c.sample_rate(), 1);

    let lag = signal(vec![0.0, 1.0], 1);
    let x = cross_correlate(&a, &lag).unwrap();
    assert_slices_close(x.samples(), &[1.0, 2.0, 3.0, 0.0], 1e-5);
    assert_slices_close(
        x.samples(),
        cross_correlate_direct(&a, &lag).unwrap().samples(),
        1e-5,
    );
}

#[test]
fn test_length_law_and_direct_agreement() {
    for (seed, (n, m)) in [(1usize, 1usize), (7, 3), (64, 64), (513, 31), (1000, 257), (5, 400)]
        .into_iter()
        .enumerate()
    {
        let a = signal(gen_noise(seed as u64, n), 8000);
        let b = signal(gen_noise(seed as u64 + 100, m), 8000);

        let fast = convolve(&a, &b).unwrap();
        let slow = convolve_direct(&a, &b).unwrap();
        assert_eq!(fast.len(), n + m - 1);
        assert_slices_close(fast.samples(), slow.samples(), 1e-3);

        let fast = cross_correlate(&a, &b).unwrap();
        let slow = cross_correlate_direct(&a, &b).unwrap();
        assert_eq!(fast.len(), n + m - 1);
        assert_slices_close(fast.samples(), slow.samples(), 1e-3);
    }
}

#[test]
fn test_autocorrelation_peaks_at_zero_lag() {
    let a = signal(gen_noise(42, 300), 8000);
    let x = cross_correlate(&a, &a).unwrap();
    let (peak_idx, _) = x
        .samples()
        .iter()
        .enumerate()
        .fold((0, f32::MIN), |acc, (i, &v)| if v > acc.1 { (i, v) } else { acc });
    assert_eq!(peak_idx, 299);
    let energy: f32 = a.samples().iter().map(|v| v * v).sum();
    assert_abs_diff_eq!(x.samples()[299], energy, epsilon = 1e-2);
}

#[test]
fn test_complex_matches_direct() {
    let a = ComplexSignal::new(gen_noise(3, 100), gen_noise(4, 100), 100).unwrap();
    let b = ComplexSignal::new(gen_noise(5, 17), gen_noise(6, 17), 100).unwrap();

    let fast = convolve_complex(&a, &b).unwrap();
    let slow = convolve_complex_direct(&a, &b).unwrap();
    assert_slices_close(fast.re(), slow.re(), 1e-3);
    assert_slices_close(fast.im(), slow.im(), 1e-3);

    let fast = cross_correlate_complex(&a, &b).unwrap();
    let slow = cross_correlate_complex_direct(&a, &b).unwrap();
    assert_slices_close(fast.re(), slow.re(), 1e-3);
    assert_slices_close(fast.im(), slow.im(), 1e-3);
}

#[test]
fn test_real_signal_through_complex_path() {
    let a = signal(gen_noise(8, 50), 16000);
    let b = signal(gen_noise(9, 9), 16000);
    let real = convolve(&a, &b).unwrap();
    let complex = convolve_complex(&ComplexSignal::from_real(&a), &ComplexSignal::from_real(&b))
        .unwrap();
    assert_slices_close(real.samples(), complex.re(), 1e-4);
    assert!(complex.im().iter().all(|v| v.abs() < 1e-4));
}

#[test]
fn test_modes_trim_full_result() {
    let a = signal(gen_noise(10, 40), 8000);
    let b = signal(gen_noise(11, 7), 8000);
    let mut engine = SpectralConvolver::new();
    let full = engine.convolve(&a, &b).unwrap();
    let same = engine.convolve_mode(&a, &b, ConvolutionMode::Same).unwrap();
    let valid = engine.convolve_mode(&a, &b, ConvolutionMode::Valid).unwrap();

    assert_eq!(same.len(), 40);
    assert_eq!(valid.len(), 34);
    assert_slices_close(same.samples(), &full.samples()[3..43], 1e-6);
    assert_slices_close(valid.samples(), &full.samples()[6..40], 1e-6);
}

#[test]
fn test_deconvolution_recovers_signal() {
    let x = signal(vec![0.5, -1.0, 2.0, 0.25, 0.0, 1.5, -0.75, 0.3], 8000);
    // Minimum-phase kernel with no spectral zeros.
    let h = signal(vec![1.0, 0.4, 0.1], 8000);
    let y = convolve(&x, &h).unwrap();
    let recovered = deconvolve(&y, &h).unwrap();
    assert_eq!(recovered.len(), y.len() - h.len() + 1);
    assert_slices_close(recovered.samples(), x.samples(), 1e-3);
}

#[test]
fn test_configuration_errors() {
    let empty = signal(vec![], 8000);
    let one = signal(vec![1.0], 8000);
    let other_rate = signal(vec![1.0], 44100);

    assert!(matches!(
        convolve(&empty, &one),
        Err(SignalError::EmptySignal(_))
    ));
    assert!(matches!(
        cross_correlate(&one, &empty),
        Err(SignalError::EmptySignal(_))
    ));
    assert!(matches!(
        convolve(&one, &other_rate),
        Err(SignalError::SampleRateMismatch { .. })
    ));
    assert!(matches!(
        deconvolve(&one, &signal(vec![1.0, 1.0], 8000)),
        Err(SignalError::DivisorTooLong { .. })
    ));
    assert!(matches!(
        ComplexSignal::new(vec![1.0, 2.0], vec![1.0], 8000),
        Err(SignalError::ComplexLengthMismatch { re: 2, im: 1 })
    ));
}

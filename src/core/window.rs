//! Window functions for framed analysis and FIR design.
//!
//! Hann is the default frame window of both time-scale modification engines
//! and any other type can be selected through the stretch configuration.
//! The Kaiser window shapes the default windowed-sinc low-pass used by the
//! resampler.

use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

/// Blackman-Harris window coefficients (4-term).
const BH_A0: f64 = 0.35875;
const BH_A1: f64 = 0.48829;
const BH_A2: f64 = 0.14128;
const BH_A3: f64 = 0.01168;

/// Window function types.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WindowType {
    Rectangular,
    #[default]
    Hann,
    BlackmanHarris,
    Kaiser { beta: f64 },
}

/// Generates a symmetric window of the specified type and size.
pub fn generate_window(window_type: WindowType, size: usize) -> Vec<f32> {
    match size {
        0 => return vec![],
        1 => return vec![1.0],
        _ => {}
    }
    let denom = (size - 1) as f64;
    match window_type {
        WindowType::Rectangular => vec![1.0; size],
        WindowType::Hann => (0..size)
            .map(|i| (0.5 * (1.0 - (2.0 * PI * i as f64 / denom).cos())) as f32)
            .collect(),
        WindowType::BlackmanHarris => (0..size)
            .map(|i| {
                let x = i as f64 / denom;
                (BH_A0 - BH_A1 * (2.0 * PI * x).cos() + BH_A2 * (4.0 * PI * x).cos()
                    - BH_A3 * (6.0 * PI * x).cos()) as f32
            })
            .collect(),
        WindowType::Kaiser { beta } => {
            let norm = bessel_i0(beta);
            (0..size)
                .map(|i| {
                    let x = 2.0 * i as f64 / denom - 1.0;
                    (bessel_i0(beta * (1.0 - x * x).max(0.0).sqrt()) / norm) as f32
                })
                .collect()
        }
    }
}

/// Maximum number of series terms for Bessel I0 convergence.
const BESSEL_MAX_TERMS: usize = 30;
/// Relative convergence threshold for Bessel I0 series.
const BESSEL_CONVERGENCE: f64 = 1e-15;

/// Zeroth-order modified Bessel function of the first kind (series expansion).
pub(crate) fn bessel_i0(x: f64) -> f64 {
    let mut sum = 1.0;
    let mut term = 1.0;
    let x_half = x / 2.0;
    for k in 1..BESSEL_MAX_TERMS {
        term *= (x_half / k as f64) * (x_half / k as f64);
        sum += term;
        if term < BESSEL_CONVERGENCE * sum {
            break;
        }
    }
    sum
}

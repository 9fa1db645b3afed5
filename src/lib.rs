#![forbid(unsafe_code)]
//! Pure Rust signal-processing kernel: FFT convolution, streaming block
//! filtering, resampling and time-scale modification.
//!
//! `sigkernel` works on mono [`Signal`]s (`f32` samples plus a sample rate)
//! and [`ComplexSignal`]s. Every whole-signal operation is a pure function
//! returning a new signal; the stateful processors ([`BlockConvolver`],
//! [`StretchStream`]) take `&mut self` and are driven chunk by chunk.
//!
//! # Convolution
//!
//! ```
//! use sigkernel::{convolve, cross_correlate, Signal};
//!
//! let a = Signal::new(vec![1.0, 2.0, 3.0], 8000).unwrap();
//! let b = Signal::new(vec![1.0, 1.0], 8000).unwrap();
//! let c = convolve(&a, &b).unwrap();
//! assert_eq!(c.len(), 4); // [1, 3, 5, 3]
//!
//! let lag = Signal::new(vec![0.0, 1.0], 8000).unwrap();
//! let x = cross_correlate(&a, &lag).unwrap();
//! assert!((x.samples()[2] - 3.0).abs() < 1e-5);
//! ```
//!
//! # Streaming block convolution
//!
//! ```
//! use sigkernel::{BlockConvolver, BlockFilter, FilterMethod};
//!
//! let kernel = [0.25, 0.5, 0.25];
//! let mut conv = BlockConvolver::new(&kernel, 64, FilterMethod::OverlapAdd).unwrap();
//! assert_eq!(conv.hop_size(), 62);
//!
//! let mut out = conv.process(&[1.0; 100]);
//! out.extend(conv.flush());
//! assert_eq!(out.len(), 102);
//! ```
//!
//! # Resampling and time stretching
//!
//! ```
//! use sigkernel::{resample, time_stretch, Signal, TsmAlgorithm};
//!
//! // 1 second of 440 Hz sine at 44.1 kHz
//! let input = Signal::new(
//!     (0..44100)
//!         .map(|i| (2.0 * std::f32::consts::PI * 440.0 * i as f32 / 44100.0).sin())
//!         .collect(),
//!     44100,
//! )
//! .unwrap();
//!
//! let at_48k = resample(&input, 48000, None).unwrap();
//! assert_eq!(at_48k.len(), 48000);
//!
//! let slower = time_stretch(&input, 1.5, TsmAlgorithm::Wsola).unwrap();
//! assert_eq!(slower.len(), 66150);
//! ```

pub mod core;
pub mod error;
pub mod spectral;
pub mod stream;
pub mod stretch;

pub use crate::core::fft::{RustFftTransform, SpectralTransform};
pub use crate::core::filter::{FirFilter, LowPassFilter};
pub use crate::core::resample::{decimate, interpolate, resample, resample_up_down};
pub use crate::core::types::{ComplexSignal, Sample, Signal};
pub use crate::core::window::WindowType;
pub use error::{Result, SignalError};
pub use spectral::{
    convolve, convolve_complex, convolve_complex_direct, convolve_direct, cross_correlate,
    cross_correlate_complex, cross_correlate_complex_direct, cross_correlate_direct, deconvolve,
    deconvolve_complex, ConvolutionMode, SpectralConvolver,
};
pub use stream::{block_convolve, BlockConvolver, BlockFilter, FilterMethod, StretchStream};
pub use stretch::{
    time_stretch, time_stretch_with, PhaseVocoder, StretchConfig, StretchEngine, TimeStretcher,
    TsmAlgorithm, Wsola,
};

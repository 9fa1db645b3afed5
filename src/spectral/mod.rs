//! Whole-signal spectral convolution and its direct-form reference.

pub mod convolution;
pub mod direct;

pub use convolution::{
    convolve, convolve_complex, cross_correlate, cross_correlate_complex, deconvolve,
    deconvolve_complex, ConvolutionMode, SpectralConvolver,
};
pub use direct::{
    convolve_complex_direct, convolve_direct, cross_correlate_complex_direct,
    cross_correlate_direct,
};

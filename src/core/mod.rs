//! Core types, the spectral transform capability, windows, filters and
//! resampling.

pub mod fft;
pub mod filter;
pub mod resample;
pub mod types;
pub mod window;

pub use types::*;
pub use window::{generate_window, WindowType};

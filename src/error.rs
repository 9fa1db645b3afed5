//! Error types for the sigkernel crate.

use thiserror::Error;

/// Errors reported by sigkernel operations.
///
/// Every variant is a configuration error: it is detected before any
/// sample is processed and no partial output is produced. Numerical
/// degradation (deconvolution near zero bins, silent WSOLA search regions)
/// is not reported as an error.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SignalError {
    /// An operation that needs samples was given an empty signal.
    #[error("empty signal: {0}")]
    EmptySignal(&'static str),

    /// Two signals combined by one operation carry different sample rates.
    #[error("sample rate mismatch: {left} Hz vs {right} Hz")]
    SampleRateMismatch { left: u32, right: u32 },

    /// Sample rate of zero.
    #[error("invalid sample rate: {0}")]
    InvalidSampleRate(u32),

    /// Real and imaginary parts of a complex signal differ in length.
    #[error("complex signal parts differ in length: re={re}, im={im}")]
    ComplexLengthMismatch { re: usize, im: usize },

    /// Streaming kernel does not fit in the block.
    #[error("kernel of {kernel_len} samples does not fit block size {block_size}")]
    KernelTooLong { kernel_len: usize, block_size: usize },

    /// Block size of zero or an empty kernel.
    #[error("invalid block configuration: {0}")]
    InvalidBlock(String),

    /// Deconvolution divisor longer than the dividend.
    #[error("divisor of {divisor} samples is longer than dividend of {dividend} samples")]
    DivisorTooLong { dividend: usize, divisor: usize },

    /// Non-positive or non-finite time-stretch factor.
    #[error("invalid stretch factor: {0}")]
    InvalidStretchFactor(String),

    /// Non-positive interpolation, decimation or resampling factor.
    #[error("invalid resampling factor: {0}")]
    InvalidFactor(String),

    /// Window or hop parameters that cannot drive a frame loop.
    #[error("invalid window parameters: {0}")]
    InvalidWindow(String),

    /// Configuration that could not be parsed or serialized.
    #[error("configuration error: {0}")]
    Config(String),
}

/// Result type for sigkernel operations.
pub type Result<T> = std::result::Result<T, SignalError>;

impl From<serde_json::Error> for SignalError {
    fn from(err: serde_json::Error) -> Self {
        SignalError::Config(err.to_string())
    }
}

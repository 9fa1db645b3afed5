//! Time-scale modification: change duration without changing pitch.

pub mod params;
pub mod phase_locking;
pub mod phase_vocoder;
pub mod wsola;

pub use params::{StretchConfig, TsmAlgorithm};
pub use phase_vocoder::PhaseVocoder;
pub use wsola::Wsola;

use crate::core::types::Signal;
use crate::error::Result;
use phase_vocoder::validate_factor;

/// Factors this close to 1 return the input unchanged.
const IDENTITY_TOLERANCE: f64 = 1e-10;

/// A time-scale modification engine over mono sample buffers.
pub trait TimeStretcher {
    /// Stretches `input` by the engine's factor.
    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>>;
}

impl TimeStretcher for PhaseVocoder {
    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        self.stretch(input)
    }
}

impl TimeStretcher for Wsola {
    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        Ok(self.stretch(input))
    }
}

/// Engine selected from a [`StretchConfig`].
pub enum StretchEngine {
    PhaseVocoder(PhaseVocoder),
    Wsola(Wsola),
}

impl StretchEngine {
    /// Builds the engine `config.algorithm` names.
    ///
    /// # Errors
    /// Fails on invalid window parameters or factor.
    pub fn new(config: &StretchConfig, factor: f64) -> Result<Self> {
        config.validate()?;
        let engine = match config.algorithm {
            TsmAlgorithm::Wsola => StretchEngine::Wsola(Wsola::with_window(
                config.window_size,
                config.hop_size,
                config.effective_search_range(),
                factor,
                config.window,
            )?),
            algorithm => StretchEngine::PhaseVocoder(PhaseVocoder::with_window(
                config.window_size,
                config.hop_size,
                factor,
                algorithm == TsmAlgorithm::PhaseVocoderWithPhaseLocking,
                config.window,
            )?),
        };
        Ok(engine)
    }
}

impl TimeStretcher for StretchEngine {
    fn process(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        match self {
            StretchEngine::PhaseVocoder(pv) => pv.process(input),
            StretchEngine::Wsola(wsola) => wsola.process(input),
        }
    }
}

/// Stretches `signal` by `factor` with the default parameters of
/// `algorithm` at the signal's sample rate.
///
/// A factor of 2.0 doubles the duration. Pitch is preserved.
///
/// # Errors
/// Fails if `factor` is not finite and positive.
pub fn time_stretch(signal: &Signal, factor: f64, algorithm: TsmAlgorithm) -> Result<Signal> {
    let config = StretchConfig::for_factor(algorithm, signal.sample_rate(), factor);
    time_stretch_with(signal, factor, &config)
}

/// Stretches `signal` by `factor` with explicit window parameters.
///
/// Factors within `1e-10` of 1 return an unmodified copy. The output keeps
/// the input's sample rate.
///
/// # Errors
/// Fails if `factor` is not finite and positive, or `config` has invalid
/// window or hop sizes. A phase vocoder synthesis hop longer than the
/// window is rejected with [`SignalError::InvalidWindow`].
///
/// [`SignalError::InvalidWindow`]: crate::error::SignalError::InvalidWindow
pub fn time_stretch_with(signal: &Signal, factor: f64, config: &StretchConfig) -> Result<Signal> {
    validate_factor(factor)?;
    config.validate()?;
    if (factor - 1.0).abs() < IDENTITY_TOLERANCE {
        return Ok(signal.clone());
    }

    let mut engine = StretchEngine::new(config, factor)?;
    let samples = engine.process(signal.samples())?;
    log::debug!(
        "stretched {} -> {} samples ({:?}, factor {})",
        signal.len(),
        samples.len(),
        config.algorithm,
        factor
    );
    Ok(Signal::with_rate_of(samples, signal.sample_rate()))
}

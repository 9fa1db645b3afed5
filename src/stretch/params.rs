//! Algorithm selection and window parameters for time-scale modification.

use serde::{Deserialize, Serialize};

use crate::core::window::WindowType;
use crate::error::{Result, SignalError};

/// Phase vocoder frame length used by [`StretchConfig::for_algorithm`].
const DEFAULT_PV_WINDOW: usize = 2048;
/// Phase vocoder analysis hop used by [`StretchConfig::for_algorithm`].
const DEFAULT_PV_HOP: usize = 512;
/// WSOLA segment length in seconds.
const DEFAULT_WSOLA_SEGMENT_SECS: f64 = 0.020;
/// WSOLA search radius in seconds.
const DEFAULT_WSOLA_SEARCH_SECS: f64 = 0.010;

/// Time-scale modification algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TsmAlgorithm {
    /// Waveform-similarity overlap-add. Time domain, good on transients.
    #[default]
    Wsola,
    /// Phase vocoder with per-bin phase propagation.
    PhaseVocoder,
    /// Phase vocoder with identity phase locking around spectral peaks.
    PhaseVocoderWithPhaseLocking,
}

impl TsmAlgorithm {
    /// Whether this algorithm runs in the frequency domain.
    #[inline]
    pub fn is_spectral(self) -> bool {
        !matches!(self, TsmAlgorithm::Wsola)
    }
}

/// Window and hop parameters for a time-scale modification run.
///
/// For the phase vocoder `window_size` is the transform length and
/// `hop_size` the analysis hop. For WSOLA `window_size` is the segment
/// length and `hop_size` the synthesis hop; `search_range` bounds the
/// similarity search on either side of the ideal read position and
/// defaults to half a segment. `window` shapes the frames of both.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StretchConfig {
    pub algorithm: TsmAlgorithm,
    pub window_size: usize,
    pub hop_size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_range: Option<usize>,
    #[serde(default)]
    pub window: WindowType,
}

impl StretchConfig {
    /// Defaults for `algorithm` at `sample_rate`.
    ///
    /// Phase vocoder: 2048-sample window, hop 512. WSOLA: 20 ms segments,
    /// 50 % overlap, ±10 ms search.
    pub fn for_algorithm(algorithm: TsmAlgorithm, sample_rate: u32) -> Self {
        if algorithm.is_spectral() {
            return Self {
                algorithm,
                window_size: DEFAULT_PV_WINDOW,
                hop_size: DEFAULT_PV_HOP,
                search_range: None,
                window: WindowType::Hann,
            };
        }
        let segment = ((DEFAULT_WSOLA_SEGMENT_SECS * sample_rate as f64).round() as usize).max(2);
        let search = (DEFAULT_WSOLA_SEARCH_SECS * sample_rate as f64).round() as usize;
        Self {
            algorithm,
            window_size: segment,
            hop_size: segment / 2,
            search_range: Some(search),
            window: WindowType::Hann,
        }
    }

    /// Defaults for `algorithm` at `sample_rate`, adjusted for `factor`.
    ///
    /// The phase vocoder's analysis hop shrinks on large stretches so the
    /// synthesis hop stays within half a window.
    pub fn for_factor(algorithm: TsmAlgorithm, sample_rate: u32, factor: f64) -> Self {
        let mut config = Self::for_algorithm(algorithm, sample_rate);
        if algorithm.is_spectral() && factor.is_finite() && factor > 0.0 {
            let max_hop = (config.window_size as f64 / (2.0 * factor)).floor() as usize;
            config.hop_size = config.hop_size.min(max_hop.max(1));
        }
        config
    }

    pub fn with_window_size(mut self, window_size: usize) -> Self {
        self.window_size = window_size;
        self
    }

    pub fn with_hop_size(mut self, hop_size: usize) -> Self {
        self.hop_size = hop_size;
        self
    }

    pub fn with_window(mut self, window: WindowType) -> Self {
        self.window = window;
        self
    }

    /// Set the WSOLA search radius. Ignored by the phase vocoder.
    pub fn with_search_range(mut self, search_range: usize) -> Self {
        self.search_range = Some(search_range);
        self
    }

    /// Effective WSOLA search radius.
    #[inline]
    pub fn effective_search_range(&self) -> usize {
        self.search_range.unwrap_or(self.window_size / 2)
    }

    /// Checks window and hop consistency.
    ///
    /// # Errors
    /// Returns [`SignalError::InvalidWindow`] if the window is shorter than
    /// two samples or the hop is zero or longer than the window.
    pub fn validate(&self) -> Result<()> {
        if self.window_size < 2 {
            return Err(SignalError::InvalidWindow(format!(
                "window size must be at least 2, got {}",
                self.window_size
            )));
        }
        if self.hop_size == 0 || self.hop_size > self.window_size {
            return Err(SignalError::InvalidWindow(format!(
                "hop size must be in 1..={}, got {}",
                self.window_size, self.hop_size
            )));
        }
        Ok(())
    }

    /// Parses and validates a JSON configuration.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

impl Default for StretchConfig {
    fn default() -> Self {
        Self::for_algorithm(TsmAlgorithm::default(), 44100)
    }
}

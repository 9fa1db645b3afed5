//! Phase vocoder time stretching with optional identity phase locking.

use rustfft::num_complex::Complex;
use std::f32::consts::PI;

use crate::core::fft::{normalize_with_peak, RustFftTransform, SpectralTransform, COMPLEX_ZERO};
use crate::core::window::{generate_window, WindowType};
use crate::error::{Result, SignalError};
use crate::stretch::phase_locking::{find_peaks, identity_phase_lock};

const TWO_PI: f32 = 2.0 * PI;
/// Frames whose largest bin magnitude is at or below this are silent and
/// cannot seed the phase accumulator.
const SILENT_MAGNITUDE: f32 = 1e-9;

/// Phase vocoder state for time stretching.
///
/// Frames of `window_size` samples are read every `hop_analysis` samples.
/// Frame `i` is written at `round(i * hop_analysis * factor)`, so the
/// nominal synthesis hop is `hop_synthesis = round(hop_analysis * factor)`
/// and the realized ratio matches `factor` exactly over many frames. Each
/// bin's synthesis phase advances by its measured instantaneous frequency
/// times the frame's synthesis hop.
pub struct PhaseVocoder {
    window_size: usize,
    hop_analysis: usize,
    hop_synthesis: usize,
    factor: f64,
    phase_locking: bool,
    window: Vec<f32>,
    transform: RustFftTransform,
    /// Synthesis phase per bin, seeded from the first non-silent frame.
    phase_accum: Vec<f32>,
    prev_phase: Vec<f32>,
    /// Expected phase advance per bin over one analysis hop.
    expected_advance: Vec<f32>,
    /// Frames processed since the last reset.
    frame_index: usize,
    /// Leading frames that pass their analysis phases straight through.
    lead_in: usize,
    awaiting_seed: bool,
    buffer: Vec<Complex<f32>>,
    magnitudes: Vec<f32>,
    phases: Vec<f32>,
    peaks: Vec<usize>,
    frame_out: Vec<f32>,
}

impl PhaseVocoder {
    /// Creates a phase vocoder with a Hann analysis/synthesis window.
    ///
    /// # Errors
    /// Fails on a window shorter than two samples, a hop outside
    /// `1..=window_size`, a non-finite or non-positive factor, a factor so
    /// small that the synthesis hop is under one sample, or a synthesis hop
    /// longer than the window.
    pub fn new(
        window_size: usize,
        hop_analysis: usize,
        factor: f64,
        phase_locking: bool,
    ) -> Result<Self> {
        Self::with_window(window_size, hop_analysis, factor, phase_locking, WindowType::Hann)
    }

    /// Like [`PhaseVocoder::new`] with an explicit analysis/synthesis window.
    pub fn with_window(
        window_size: usize,
        hop_analysis: usize,
        factor: f64,
        phase_locking: bool,
        window_type: WindowType,
    ) -> Result<Self> {
        validate_factor(factor)?;
        if window_size < 2 {
            return Err(SignalError::InvalidWindow(format!(
                "phase vocoder window must be at least 2 samples, got {}",
                window_size
            )));
        }
        if hop_analysis == 0 || hop_analysis > window_size {
            return Err(SignalError::InvalidWindow(format!(
                "analysis hop must be in 1..={}, got {}",
                window_size, hop_analysis
            )));
        }
        let exact_hop = hop_analysis as f64 * factor;
        if exact_hop < 1.0 {
            return Err(SignalError::InvalidStretchFactor(format!(
                "factor {} gives a synthesis hop under one sample for analysis hop {}",
                factor, hop_analysis
            )));
        }
        // Frames further apart than the window leave uncovered output.
        if exact_hop > window_size as f64 {
            return Err(SignalError::InvalidWindow(format!(
                "synthesis hop {:.1} exceeds window size {}; lower the analysis hop",
                exact_hop, window_size
            )));
        }
        let hop_synthesis = exact_hop.round() as usize;

        let num_bins = window_size / 2 + 1;
        let expected_advance = (0..num_bins)
            .map(|bin| TWO_PI * bin as f32 * hop_analysis as f32 / window_size as f32)
            .collect();

        log::debug!(
            "phase vocoder: window={} ({:?}), ha={}, hs={}, locking={}",
            window_size,
            window_type,
            hop_analysis,
            hop_synthesis,
            phase_locking
        );

        Ok(Self {
            window_size,
            hop_analysis,
            hop_synthesis,
            factor,
            phase_locking,
            window: generate_window(window_type, window_size),
            transform: RustFftTransform::new(),
            phase_accum: vec![0.0; num_bins],
            prev_phase: vec![0.0; num_bins],
            expected_advance,
            frame_index: 0,
            lead_in: 0,
            awaiting_seed: true,
            buffer: vec![COMPLEX_ZERO; window_size],
            magnitudes: vec![0.0; num_bins],
            phases: vec![0.0; num_bins],
            peaks: Vec::with_capacity(num_bins / 4),
            frame_out: vec![0.0; window_size],
        })
    }

    #[inline]
    pub fn window_size(&self) -> usize {
        self.window_size
    }

    #[inline]
    pub fn hop_analysis(&self) -> usize {
        self.hop_analysis
    }

    #[inline]
    pub fn hop_synthesis(&self) -> usize {
        self.hop_synthesis
    }

    /// The analysis and synthesis window.
    #[inline]
    pub fn window(&self) -> &[f32] {
        &self.window
    }

    /// Output position of the `frame`-th frame since the last reset.
    #[inline]
    pub fn synthesis_position(&self, frame: usize) -> usize {
        (frame as f64 * self.hop_analysis as f64 * self.factor).round() as usize
    }

    /// Forgets the phase history so the next non-silent frame re-seeds the
    /// accumulator.
    pub fn reset(&mut self) {
        self.frame_index = 0;
        self.lead_in = 0;
        self.awaiting_seed = true;
        self.phase_accum.iter_mut().for_each(|p| *p = 0.0);
        self.prev_phase.iter_mut().for_each(|p| *p = 0.0);
    }

    /// Resets for a signal preceded by `front_pad` samples of silence.
    ///
    /// Frames that start inside the padding only partly hold signal, so
    /// their phase increments are not meaningful. They keep their analysis
    /// phases and the first frame past the padding seeds the accumulator.
    pub(crate) fn reset_with_front_pad(&mut self, front_pad: usize) {
        self.reset();
        self.lead_in = front_pad.div_ceil(self.hop_analysis);
    }

    /// Runs one analysis frame through the vocoder.
    ///
    /// Returns the windowed synthesis frame, `window_size` samples long, to
    /// be overlap-added at [`synthesis_position`](Self::synthesis_position)
    /// of this frame's index. The caller normalizes by the summed squared
    /// window.
    ///
    /// # Errors
    /// Fails if `frame.len() != window_size`.
    pub fn process_frame(&mut self, frame: &[f32]) -> Result<&[f32]> {
        if frame.len() != self.window_size {
            return Err(SignalError::InvalidWindow(format!(
                "frame of {} samples does not match window size {}",
                frame.len(),
                self.window_size
            )));
        }

        for ((dst, &sample), &win) in self.buffer.iter_mut().zip(frame).zip(&self.window) {
            *dst = Complex::new(sample * win, 0.0);
        }
        self.transform.forward(&mut self.buffer);

        let seeding = self.lead_in > 0 || self.awaiting_seed;
        let hop = if self.frame_index == 0 {
            self.hop_synthesis
        } else {
            self.synthesis_position(self.frame_index)
                - self.synthesis_position(self.frame_index - 1)
        };
        let hop_ratio = hop as f32 / self.hop_analysis as f32;
        let mut peak_magnitude = 0.0f32;
        for bin in 0..self.magnitudes.len() {
            let c = self.buffer[bin];
            let phase = c.arg();
            let magnitude = c.norm();
            peak_magnitude = peak_magnitude.max(magnitude);
            self.magnitudes[bin] = magnitude;
            self.phases[bin] = phase;

            if seeding {
                self.phase_accum[bin] = phase;
            } else {
                let expected = self.expected_advance[bin];
                let deviation = wrap_phase(phase - self.prev_phase[bin] - expected);
                self.phase_accum[bin] =
                    wrap_phase(self.phase_accum[bin] + (expected + deviation) * hop_ratio);
            }
            self.prev_phase[bin] = phase;
        }

        if self.phase_locking && !seeding {
            find_peaks(&self.magnitudes, &mut self.peaks);
            identity_phase_lock(&self.phases, &mut self.phase_accum, &self.peaks);
        }
        if self.lead_in > 0 {
            self.lead_in -= 1;
        } else {
            self.awaiting_seed = peak_magnitude <= SILENT_MAGNITUDE;
        }
        self.frame_index += 1;

        self.synthesize();
        Ok(&self.frame_out)
    }

    /// Stretches a whole buffer. Output length is `round(len * factor)`.
    ///
    /// The input is padded with half a window of silence in front, so the
    /// first frame is centred on the first sample, and a full window behind.
    /// Input sample `i` maps to output sample `round(i * factor)`.
    pub fn stretch(&mut self, input: &[f32]) -> Result<Vec<f32>> {
        if input.is_empty() {
            return Ok(vec![]);
        }
        let n = self.window_size;
        let front_pad = self.front_pad();
        self.reset_with_front_pad(front_pad);

        let mut padded = vec![0.0f32; front_pad + input.len() + n];
        padded[front_pad..front_pad + input.len()].copy_from_slice(input);

        let num_frames = (padded.len() - n) / self.hop_analysis + 1;
        let output_len = self.synthesis_position(num_frames - 1) + n;
        let mut output = vec![0.0f32; output_len];
        let mut window_sum = vec![0.0f32; output_len];
        let squared: Vec<f32> = self.window.iter().map(|w| w * w).collect();

        for frame_idx in 0..num_frames {
            let analysis_pos = frame_idx * self.hop_analysis;
            let synthesis_pos = self.synthesis_position(frame_idx);
            let frame = &padded[analysis_pos..analysis_pos + n];
            let synthesized = self.process_frame(frame)?;
            let out = &mut output[synthesis_pos..synthesis_pos + n];
            for (o, &s) in out.iter_mut().zip(synthesized) {
                *o += s;
            }
            let ws = &mut window_sum[synthesis_pos..synthesis_pos + n];
            for (w, &sq) in ws.iter_mut().zip(&squared) {
                *w += sq;
            }
            log::trace!("pv frame {} at {} -> {}", frame_idx, analysis_pos, synthesis_pos);
        }

        normalize_with_peak(&mut output, &window_sum, self.window_sum_peak());

        let target = self.output_len(input.len());
        let mut result: Vec<f32> = output.into_iter().skip(front_pad).take(target).collect();
        result.resize(target, 0.0);
        Ok(result)
    }

    /// Silence placed before the input by [`PhaseVocoder::stretch`].
    #[inline]
    pub(crate) fn front_pad(&self) -> usize {
        self.window_size / 2
    }

    /// Stretched length of `input_len` samples.
    #[inline]
    pub(crate) fn output_len(&self, input_len: usize) -> usize {
        (input_len as f64 * self.factor).round() as usize
    }

    /// Largest steady-state sum of squared windows at the synthesis hop.
    ///
    /// Batch and streaming runs both floor the normalization against it.
    pub(crate) fn window_sum_peak(&self) -> f32 {
        let hop = self.hop_synthesis;
        (0..hop.min(self.window_size))
            .map(|offset| {
                self.window[offset..]
                    .iter()
                    .step_by(hop)
                    .map(|w| w * w)
                    .sum::<f32>()
            })
            .fold(0.0f32, f32::max)
    }

    /// Rebuilds the full spectrum from magnitudes and accumulated phases and
    /// inverse-transforms it into `frame_out`, applying the synthesis window.
    fn synthesize(&mut self) {
        let n = self.window_size;
        let num_bins = self.magnitudes.len();
        for bin in 0..num_bins {
            self.buffer[bin] = Complex::from_polar(self.magnitudes[bin], self.phase_accum[bin]);
        }
        for bin in 1..(n - num_bins + 1) {
            self.buffer[n - bin] = self.buffer[bin].conj();
        }
        self.transform.inverse(&mut self.buffer);
        for ((out, c), &win) in self.frame_out.iter_mut().zip(&self.buffer).zip(&self.window) {
            *out = c.re * win;
        }
    }
}

/// Rejects non-finite and non-positive stretch factors.
pub(crate) fn validate_factor(factor: f64) -> Result<()> {
    if !factor.is_finite() || factor <= 0.0 {
        return Err(SignalError::InvalidStretchFactor(format!(
            "factor must be finite and positive, got {}",
            factor
        )));
    }
    Ok(())
}

/// Wraps a phase value to [-PI, PI].
#[inline]
fn wrap_phase(phase: f32) -> f32 {
    let p = phase + PI;
    p - (p / TWO_PI).floor() * TWO_PI - PI
}

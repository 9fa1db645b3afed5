//! WSOLA (Waveform Similarity Overlap-Add) time stretching.

use crate::core::fft::normalize_by_window_sum;
use crate::core::window::{generate_window, WindowType};
use crate::error::{Result, SignalError};
use crate::spectral::SpectralConvolver;
use crate::stretch::phase_vocoder::validate_factor;

/// Minimum energy to treat a region as non-silent in the similarity search.
const ENERGY_EPSILON: f64 = 1e-12;
/// Minimum number of candidates to justify FFT-based correlation over direct computation.
const FFT_CANDIDATE_THRESHOLD: usize = 64;
/// Minimum overlap length for FFT-based correlation to be worthwhile.
const FFT_OVERLAP_THRESHOLD: usize = 32;
/// A candidate must beat the ideal position by more than this to be chosen.
const SCORE_MARGIN: f64 = 1e-9;

/// WSOLA time stretcher.
///
/// Output is written in windowed segments (Hann by default) every
/// `synthesis_hop` samples. A segment centred on output time `t` is read
/// centred near input time `t / factor`, shifted within `±search_range` to
/// the candidate that best continues the previously chosen segment.
pub struct Wsola {
    segment_size: usize,
    synthesis_hop: usize,
    search_range: usize,
    factor: f64,
    window: Vec<f32>,
    convolver: SpectralConvolver,
}

impl Wsola {
    /// Creates a WSOLA stretcher with Hann segments.
    ///
    /// # Errors
    /// Fails on a segment shorter than two samples, a hop outside
    /// `1..=segment_size`, or a non-finite or non-positive factor.
    pub fn new(
        segment_size: usize,
        synthesis_hop: usize,
        search_range: usize,
        factor: f64,
    ) -> Result<Self> {
        Self::with_window(segment_size, synthesis_hop, search_range, factor, WindowType::Hann)
    }

    /// Like [`Wsola::new`] with an explicit segment window.
    pub fn with_window(
        segment_size: usize,
        synthesis_hop: usize,
        search_range: usize,
        factor: f64,
        window_type: WindowType,
    ) -> Result<Self> {
        validate_factor(factor)?;
        if segment_size < 2 {
            return Err(SignalError::InvalidWindow(format!(
                "WSOLA segment must be at least 2 samples, got {}",
                segment_size
            )));
        }
        if synthesis_hop == 0 || synthesis_hop > segment_size {
            return Err(SignalError::InvalidWindow(format!(
                "synthesis hop must be in 1..={}, got {}",
                segment_size, synthesis_hop
            )));
        }
        log::debug!(
            "wsola: segment={}, hop={}, search=±{}, factor={}",
            segment_size,
            synthesis_hop,
            search_range,
            factor
        );
        Ok(Self {
            segment_size,
            synthesis_hop,
            search_range,
            factor,
            window: generate_window(window_type, segment_size),
            convolver: SpectralConvolver::new(),
        })
    }

    #[inline]
    pub fn segment_size(&self) -> usize {
        self.segment_size
    }

    #[inline]
    pub fn synthesis_hop(&self) -> usize {
        self.synthesis_hop
    }

    #[inline]
    pub fn search_range(&self) -> usize {
        self.search_range
    }

    #[inline]
    pub fn factor(&self) -> f64 {
        self.factor
    }

    /// Stretches a mono buffer. Output length is `round(len * factor)`.
    ///
    /// The input gets `segment_size - synthesis_hop` samples of leading
    /// silence so the first output sample already sits under a full set of
    /// overlapping segments; that stretch of output is dropped again.
    pub fn stretch(&mut self, input: &[f32]) -> Vec<f32> {
        if input.is_empty() {
            return vec![];
        }
        let w = self.segment_size;
        let lead = w - self.synthesis_hop;
        let target_len = (input.len() as f64 * self.factor).round() as usize;
        let synthesis_end = lead + target_len;

        // Silence past the end so every read of a full segment is in bounds.
        let padded_len = lead + input.len() + w + self.synthesis_hop;
        let mut padded = vec![0.0f32; padded_len];
        padded[lead..lead + input.len()].copy_from_slice(input);
        let max_start = padded_len - w;

        let mut output = vec![0.0f32; synthesis_end + w];
        let mut window_sum = vec![0.0f32; synthesis_end + w];
        let mut prev: Option<usize> = None;
        let mut synthesis_pos = 0;

        while synthesis_pos < synthesis_end {
            // The segment centred on output `lead + t` is read centred on
            // input `lead + t / factor`.
            let centre = (synthesis_pos + w / 2) as f64 - lead as f64;
            let ideal = (lead as f64 + centre / self.factor - (w / 2) as f64)
                .round()
                .max(0.0) as usize;
            let ideal = ideal.min(max_start);
            let chosen = match prev {
                Some(p) => self.find_best_position(&padded, p, ideal, max_start),
                None => ideal,
            };
            log::trace!(
                "wsola segment at {} <- {} (ideal {})",
                synthesis_pos,
                chosen,
                ideal
            );

            let segment = &padded[chosen..chosen + w];
            let out = &mut output[synthesis_pos..synthesis_pos + w];
            let ws = &mut window_sum[synthesis_pos..synthesis_pos + w];
            for (i, (&x, &win)) in segment.iter().zip(&self.window).enumerate() {
                out[i] += x * win;
                ws[i] += win;
            }

            prev = Some(chosen);
            synthesis_pos += self.synthesis_hop;
        }

        normalize_by_window_sum(&mut output, &window_sum);
        output.drain(..lead);
        output.truncate(target_len);
        output
    }

    /// Picks the read position within `±search_range` of `ideal` whose
    /// leading overlap best matches the natural continuation of the segment
    /// read at `prev`.
    ///
    /// Falls back to `ideal` when the continuation is silent or no candidate
    /// scores strictly better.
    fn find_best_position(
        &mut self,
        input: &[f32],
        prev: usize,
        ideal: usize,
        max_start: usize,
    ) -> usize {
        let overlap = self.segment_size - self.synthesis_hop;
        let natural = prev + self.synthesis_hop;
        if overlap == 0 || natural + overlap > input.len() {
            return ideal;
        }
        let reference = &input[natural..natural + overlap];
        let ref_energy = energy(reference);
        if ref_energy < ENERGY_EPSILON {
            return ideal;
        }

        let search_start = ideal.saturating_sub(self.search_range);
        let search_end = (ideal + self.search_range).min(max_start);
        if search_start >= search_end {
            return ideal;
        }

        let num_candidates = search_end - search_start + 1;
        let region = &input[search_start..search_end + overlap];
        let use_fft = num_candidates > FFT_CANDIDATE_THRESHOLD && overlap >= FFT_OVERLAP_THRESHOLD;
        let scores = if use_fft {
            self.scores_fft(region, reference, ref_energy, num_candidates)
        } else {
            scores_direct(region, reference, num_candidates)
        };

        let mut best_pos = ideal;
        let mut best_score = scores[ideal - search_start];
        for (k, &score) in scores.iter().enumerate() {
            if score > best_score + SCORE_MARGIN {
                best_score = score;
                best_pos = search_start + k;
            }
        }
        best_pos
    }

    /// Normalized correlation of every candidate in `region` against
    /// `reference`, using one spectral cross-correlation and prefix-sum
    /// energies.
    fn scores_fft(
        &mut self,
        region: &[f32],
        reference: &[f32],
        ref_energy: f64,
        num_candidates: usize,
    ) -> Vec<f64> {
        let overlap = reference.len();
        let corr = self.convolver.correlate_samples(region, reference);

        let mut prefix_sq = vec![0.0f64; region.len() + 1];
        for (i, &s) in region.iter().enumerate() {
            prefix_sq[i + 1] = prefix_sq[i] + s as f64 * s as f64;
        }

        (0..num_candidates)
            .map(|k| {
                // Lag k sits at index k + overlap - 1 of the full correlation.
                let raw = corr[k + overlap - 1] as f64;
                let window_energy = prefix_sq[k + overlap] - prefix_sq[k];
                let denom = (ref_energy * window_energy).sqrt();
                if denom > ENERGY_EPSILON {
                    raw / denom
                } else {
                    0.0
                }
            })
            .collect()
    }
}

/// Direct time-domain scoring for small search ranges.
fn scores_direct(region: &[f32], reference: &[f32], num_candidates: usize) -> Vec<f64> {
    let overlap = reference.len();
    (0..num_candidates)
        .map(|k| normalized_cross_correlation(&region[k..k + overlap], reference))
        .collect()
}

fn energy(x: &[f32]) -> f64 {
    x.iter().map(|&s| s as f64 * s as f64).sum()
}

/// Normalized cross-correlation between two signals.
#[inline]
fn normalized_cross_correlation(a: &[f32], b: &[f32]) -> f64 {
    let len = a.len().min(b.len());
    if len == 0 {
        return 0.0;
    }

    let mut sum_ab = 0.0f64;
    let mut sum_a2 = 0.0f64;
    let mut sum_b2 = 0.0f64;
    for (&x, &y) in a[..len].iter().zip(&b[..len]) {
        let va = x as f64;
        let vb = y as f64;
        sum_ab += va * vb;
        sum_a2 += va * va;
        sum_b2 += vb * vb;
    }

    let denom = (sum_a2 * sum_b2).sqrt();
    if denom < ENERGY_EPSILON {
        return 0.0;
    }
    sum_ab / denom
}

//! Identity phase locking (Laroche & Dolson 1999).
//!
//! Peaks are local magnitude maxima; every other bin belongs to the region
//! of influence of its nearest peak and keeps the analysis phase offset it
//! had relative to that peak, so the whole region rotates by the peak's
//! phase increment.

/// Collects the indices of strict local magnitude maxima into `peaks`.
///
/// The DC and Nyquist bins have one neighbour and are peaks when they
/// exceed it.
pub(crate) fn find_peaks(magnitudes: &[f32], peaks: &mut Vec<usize>) {
    peaks.clear();
    let len = magnitudes.len();
    if len < 2 {
        return;
    }
    for bin in 0..len {
        let above_left = bin == 0 || magnitudes[bin] > magnitudes[bin - 1];
        let above_right = bin + 1 == len || magnitudes[bin] > magnitudes[bin + 1];
        if above_left && above_right {
            peaks.push(bin);
        }
    }
}

/// Rewrites the synthesis phase of every non-peak bin as
/// `synthesis[peak] + (analysis[bin] - analysis[peak])`.
///
/// `peaks` must be sorted ascending, as produced by [`find_peaks`]. Ties in
/// distance go to the lower peak. Does nothing when there are no peaks.
pub(crate) fn identity_phase_lock(
    analysis_phases: &[f32],
    synthesis_phases: &mut [f32],
    peaks: &[usize],
) {
    if peaks.is_empty() {
        return;
    }

    let mut peak_idx = 0;
    for bin in 0..synthesis_phases.len() {
        while peak_idx + 1 < peaks.len()
            && peaks[peak_idx + 1].abs_diff(bin) < peaks[peak_idx].abs_diff(bin)
        {
            peak_idx += 1;
        }

        let nearest_peak = peaks[peak_idx];
        if bin != nearest_peak {
            let analysis_diff = analysis_phases[bin] - analysis_phases[nearest_peak];
            synthesis_phases[bin] = synthesis_phases[nearest_peak] + analysis_diff;
        }
    }
}

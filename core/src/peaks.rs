//! Candidate peak detection on a background-subtracted profile.
//!
//! A candidate is a local maximum whose amplitude exceeds a loose detection
//! floor (`detection_floor_sigma * rms`).  The floor is deliberately lower
//! than the final SNR threshold: weak neighbours must still be found so they
//! can lose their separation slot to a stronger peak instead of surfacing on
//! their own.
//!
//! Profiles are periodic, so neighbours and separations wrap around the
//! ends.  On a flat top the first bin of the plateau is reported.

use crate::types::{Candidate, DetectionParams};

/// Local-maximum finder with a minimum-separation constraint.
#[derive(Clone, Debug)]
pub struct PeakDetector {
    /// Detection floor in units of the baseline rms.
    floor_sigma: f64,
    /// Minimum circular distance between accepted candidates, in bins.
    min_separation: usize,
}

impl Default for PeakDetector {
    fn default() -> Self {
        Self::from_params(&DetectionParams::default())
    }
}

impl PeakDetector {
    pub fn new(floor_sigma: f64, min_separation: usize) -> Self {
        Self {
            floor_sigma,
            min_separation,
        }
    }

    pub fn from_params(params: &DetectionParams) -> Self {
        Self::new(params.detection_floor_sigma, params.min_separation_bins)
    }

    /// Find separated candidates above the floor, in ascending bin order.
    pub fn find_candidates(&self, residual: &[f64], rms: f64) -> Vec<Candidate> {
        let floor = self.floor_sigma * rms;
        let above: Vec<Candidate> = local_maxima(residual)
            .into_iter()
            .filter(|c| c.amplitude > floor)
            .collect();
        enforce_separation(above, residual.len(), self.min_separation)
    }
}

/// Every local maximum of `residual`, in ascending bin order.
///
/// Bin `i` qualifies when it is strictly above its left neighbour and
/// strictly above the first differing sample to its right.  A plateau is
/// therefore reported once, at its first bin, and a constant profile has no
/// maxima at all.
pub fn local_maxima(residual: &[f64]) -> Vec<Candidate> {
    let n = residual.len();
    if n < 3 {
        return Vec::new();
    }

    (0..n)
        .filter(|&i| is_local_max(residual, i))
        .map(|i| Candidate {
            phase_bin: i,
            amplitude: residual[i],
        })
        .collect()
}

fn is_local_max(residual: &[f64], i: usize) -> bool {
    let n = residual.len();
    let value = residual[i];
    if !(value > residual[(i + n - 1) % n]) {
        return false;
    }
    for step in 1..n {
        let right = residual[(i + step) % n];
        if right != value {
            return right < value;
        }
    }
    false
}

/// Greedy non-maximum suppression.
///
/// Candidates are visited strongest first (equal amplitudes by ascending
/// bin) and kept only when at least `min_separation` bins away from every
/// candidate already kept.  Output is in ascending bin order.
pub fn enforce_separation(
    mut candidates: Vec<Candidate>,
    nbins: usize,
    min_separation: usize,
) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.amplitude
            .total_cmp(&a.amplitude)
            .then(a.phase_bin.cmp(&b.phase_bin))
    });

    let mut kept: Vec<Candidate> = Vec::with_capacity(candidates.len());
    for c in candidates {
        let isolated = kept
            .iter()
            .all(|k| circular_distance(k.phase_bin, c.phase_bin, nbins) >= min_separation);
        if isolated {
            kept.push(c);
        }
    }

    kept.sort_by_key(|c| c.phase_bin);
    kept
}

/// Distance between two bins on a ring of `nbins` bins.
pub fn circular_distance(a: usize, b: usize, nbins: usize) -> usize {
    let d = a.abs_diff(b);
    d.min(nbins.saturating_sub(d))
}

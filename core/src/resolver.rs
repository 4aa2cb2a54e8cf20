//! Multi-component resolution: from separated candidates to the final,
//! reportable component list.
//!
//! A profile may carry several genuine components alongside a scattering of
//! noise bumps that only just cleared the detection floor.  The resolver
//! keeps the strongest few and discards anything below the acceptance SNR.
//!
//! # Steps
//!
//! 1. **Rank** — order candidates by descending amplitude (equal amplitudes
//!    by ascending bin, so the ranking is reproducible).
//! 2. **Truncate** — keep the first `max_components`.
//! 3. **Score** — compute peak SNR, phase, extent and boxcar SNR
//!    ([`crate::snr::annotate`]).
//! 4. **Accept** — drop components with `snr < snr_threshold`.
//! 5. **Order** — sort survivors by ascending phase for reporting.
//!
//! An empty result is valid: it simply means no component met the
//! threshold.

use crate::pipeline::DetectionError;
use crate::snr::annotate;
use crate::types::{BaselineStats, Candidate, Component, DetectionParams};

// ---------------------------------------------------------------------------
// ComponentResolver
// ---------------------------------------------------------------------------

/// Ranks, truncates and SNR-filters candidate peaks.
#[derive(Clone, Debug)]
pub struct ComponentResolver {
    /// Maximum number of components returned.
    pub max_components: usize,

    /// Minimum peak SNR for acceptance.
    pub snr_threshold: f64,
}

impl Default for ComponentResolver {
    fn default() -> Self {
        Self::from_params(&DetectionParams::default())
    }
}

impl ComponentResolver {
    pub fn new(max_components: usize, snr_threshold: f64) -> Self {
        Self {
            max_components,
            snr_threshold,
        }
    }

    pub fn from_params(params: &DetectionParams) -> Self {
        Self::new(params.max_components, params.snr_threshold)
    }

    /// Resolve separated candidates into accepted components.
    ///
    /// `residual` is the background-subtracted profile the candidates were
    /// found on; `baseline` supplies the rms.  Returns at most
    /// `max_components` components, each with `snr >= snr_threshold`, in
    /// ascending phase order.
    pub fn resolve(
        &self,
        candidates: &[Candidate],
        residual: &[f64],
        baseline: &BaselineStats,
    ) -> Result<Vec<Component>, DetectionError> {
        let mut ranked: Vec<Candidate> = candidates.to_vec();
        ranked.sort_by(|a, b| {
            b.amplitude
                .total_cmp(&a.amplitude)
                .then(a.phase_bin.cmp(&b.phase_bin))
        });
        ranked.truncate(self.max_components);

        let mut accepted = Vec::with_capacity(ranked.len());
        for candidate in &ranked {
            let component = annotate(candidate, residual, baseline)?;
            if component.snr >= self.snr_threshold {
                accepted.push(component);
            }
        }

        accepted.sort_by(|a, b| a.phase.total_cmp(&b.phase));
        Ok(accepted)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn baseline() -> BaselineStats {
        BaselineStats {
            mean: 0.0,
            rms: 1.0,
            window_start: 0,
            window_len: 32,
        }
    }

    fn residual_with(peaks: &[(usize, f64)], n: usize) -> (Vec<f64>, Vec<Candidate>) {
        let mut residual = vec![0.0; n];
        let mut cands = Vec::new();
        for &(bin, amp) in peaks {
            residual[bin] = amp;
            cands.push(Candidate { phase_bin: bin, amplitude: amp });
        }
        (residual, cands)
    }

    #[test]
    fn truncates_to_max_components() {
        let (residual, cands) = residual_with(
            &[(10, 30.0), (30, 25.0), (50, 40.0), (70, 11.0), (90, 50.0), (110, 20.0)],
            128,
        );
        let resolver = ComponentResolver::new(4, 10.0);
        let out = resolver.resolve(&cands, &residual, &baseline()).unwrap();
        let bins: Vec<usize> = out.iter().map(|c| c.bin).collect();
        assert_eq!(bins, vec![10, 30, 50, 90]);
    }

    #[test]
    fn drops_below_threshold_and_orders_by_phase() {
        let (residual, cands) = residual_with(&[(100, 17.0), (20, 12.0), (60, 8.0), (5, 4.0)], 128);
        let out = ComponentResolver::default()
            .resolve(&cands, &residual, &baseline())
            .unwrap();
        assert_eq!(out.len(), 2);
        assert_eq!(out[0].bin, 20);
        assert_eq!(out[1].bin, 100);
        assert!(out.iter().all(|c| c.snr >= 10.0));
        assert!(out.windows(2).all(|w| w[0].phase < w[1].phase));
    }

    #[test]
    fn threshold_is_inclusive() {
        let (residual, cands) = residual_with(&[(64, 10.0)], 128);
        let out = ComponentResolver::default()
            .resolve(&cands, &residual, &baseline())
            .unwrap();
        assert_eq!(out.len(), 1);
    }

    #[test]
    fn no_candidates_is_empty_not_error() {
        let out = ComponentResolver::default()
            .resolve(&[], &[0.0; 16], &baseline())
            .unwrap();
        assert!(out.is_empty());
    }
}

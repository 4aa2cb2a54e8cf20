//! Single-profile analysis engine: the heart of multi-component detection.
//!
//! # Background
//!
//! A folded pulse profile is mostly noise with one or more pulsed
//! components sitting on top of a slowly varying baseline.  To report each
//! component's position and significance we need a trustworthy noise level
//! first, then every local maximum that clearly rises above it, and finally
//! a ranked, de-duplicated shortlist.
//!
//! # Algorithm overview
//!
//! 1. **Baseline** — pick an off-pulse window and measure a robust mean and
//!    rms over it ([`crate::baseline`]).
//! 2. **Residual** — subtract the baseline mean from every bin.
//! 3. **Peak detection** — collect local maxima above
//!    `detection_floor_sigma * rms`, enforcing a minimum bin separation
//!    ([`crate::peaks`]).
//! 4. **Resolution** — keep the strongest `max_components` candidates whose
//!    SNR clears `snr_threshold`, reordered by phase
//!    ([`crate::resolver`], [`crate::snr`]).
//!
//! The whole run is a pure function of the profile and the parameters, so
//! repeated runs produce identical results and independent files can be
//! analysed concurrently.

use log::debug;
#[cfg(feature = "python")]
use pyo3::prelude::*;

use crate::baseline::estimate_baseline;
use crate::peaks::PeakDetector;
use crate::resolver::ComponentResolver;
use crate::types::{DetectionParams, Profile, ProfileResult};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors that stop the analysis of a single profile.
///
/// Finding no components is not an error; it yields an empty
/// [`ProfileResult::components`] list.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    #[error("insufficient data: {0}")]
    InsufficientData(String),

    #[error("off-pulse noise rms is zero; cannot form a signal-to-noise ratio")]
    ZeroNoise,
}

// ---------------------------------------------------------------------------
// PulseAnalyzer
// ---------------------------------------------------------------------------

/// The single-profile analysis engine.
///
/// Construct with a [`DetectionParams`] and call [`PulseAnalyzer::analyze`]
/// on a profile to obtain its [`ProfileResult`].
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, Default)]
pub struct PulseAnalyzer {
    params: DetectionParams,
}

#[cfg(feature = "python")]
#[pymethods]
impl PulseAnalyzer {
    /// Create a new analyzer with the given detection parameters.
    #[new]
    #[pyo3(signature = (params=None))]
    pub fn py_new(params: Option<DetectionParams>) -> Self {
        Self::new(params.unwrap_or_default())
    }

    /// Analyse one profile from Python.
    ///
    /// `samples` is the folded, background-included profile, one flux value
    /// per phase bin.
    #[pyo3(name = "analyze")]
    pub fn py_analyze(&self, filename: &str, samples: Vec<f64>) -> PyResult<ProfileResult> {
        self.analyze(filename, &Profile::new(samples))
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!("PulseAnalyzer({:?})", self.params)
    }
}

impl PulseAnalyzer {
    pub fn new(params: DetectionParams) -> Self {
        Self { params }
    }

    pub fn params(&self) -> &DetectionParams {
        &self.params
    }

    /// Run the full detection pipeline on one profile.
    ///
    /// # Arguments
    /// * `filename` — label carried into the result.
    /// * `profile`  — folded profile, baseline not yet removed.
    ///
    /// # Returns
    /// A [`ProfileResult`] with up to `max_components` components in
    /// ascending phase order.
    pub fn analyze(
        &self,
        filename: &str,
        profile: &Profile,
    ) -> Result<ProfileResult, DetectionError> {
        let nbins = profile.nbins();

        // ------------------------------------------------------------------
        // Step 1: Off-pulse baseline
        // ------------------------------------------------------------------
        let baseline = estimate_baseline(profile, &self.params)?;
        debug!(
            "{}: baseline mean={:.4e} rms={:.4e} over {} bins from bin {}",
            filename, baseline.mean, baseline.rms, baseline.window_len, baseline.window_start,
        );

        // ------------------------------------------------------------------
        // Step 2: Background subtraction
        // ------------------------------------------------------------------
        let residual = profile.residual(baseline.mean);

        // ------------------------------------------------------------------
        // Step 3: Candidate peaks
        // ------------------------------------------------------------------
        let detector = PeakDetector::from_params(&self.params);
        let candidates = detector.find_candidates(&residual, baseline.rms);
        debug!("{}: {} candidates above floor", filename, candidates.len());

        // ------------------------------------------------------------------
        // Step 4: Rank, score and filter
        // ------------------------------------------------------------------
        let resolver = ComponentResolver::from_params(&self.params);
        let components = resolver.resolve(&candidates, &residual, &baseline)?;
        debug!(
            "{}: {} components at or above SNR {:.1}",
            filename,
            components.len(),
            self.params.snr_threshold,
        );

        Ok(ProfileResult {
            filename: filename.to_string(),
            nbins,
            baseline,
            components,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::OffPulseWindow;

    /// Deterministic zero-mean pseudo-noise bounded by `amp`.
    fn ripple(n: usize, amp: f64) -> Vec<f64> {
        (0..n)
            .map(|i| amp * ((i as f64 * 2.399_963).sin() * 0.7 + (i as f64 * 0.618_034).cos() * 0.3))
            .collect()
    }

    fn fixed_params() -> DetectionParams {
        DetectionParams {
            off_pulse: OffPulseWindow::Fixed { start: 0, end: 256 },
            ..DetectionParams::default()
        }
    }

    #[test]
    fn flat_profile_is_zero_noise() {
        let analyzer = PulseAnalyzer::default();
        let err = analyzer
            .analyze("flat", &Profile::new(vec![3.0; 512]))
            .unwrap_err();
        assert_eq!(err, DetectionError::ZeroNoise);
    }

    #[test]
    fn short_profile_is_insufficient() {
        let analyzer = PulseAnalyzer::default();
        let err = analyzer
            .analyze("short", &Profile::new(vec![1.0, 2.0]))
            .unwrap_err();
        assert!(matches!(err, DetectionError::InsufficientData(_)));
    }

    #[test]
    fn noise_only_gives_empty_result() {
        let analyzer = PulseAnalyzer::new(fixed_params());
        let result = analyzer
            .analyze("noise", &Profile::new(ripple(512, 1.0)))
            .unwrap();
        assert!(result.components.is_empty());
        assert_eq!(result.nbins, 512);
        assert_eq!(result.filename, "noise");
    }

    #[test]
    fn nan_samples_are_an_error_not_a_panic() {
        let mut samples = ripple(1024, 1.0);
        for i in (0..1024).step_by(37) {
            samples[i] = f64::NAN;
        }
        let analyzer = PulseAnalyzer::new(DetectionParams {
            off_pulse: OffPulseWindow::Fixed { start: 0, end: 512 },
            ..DetectionParams::default()
        });
        let err = analyzer
            .analyze("nan.txt", &Profile::new(samples))
            .unwrap_err();
        assert!(matches!(err, DetectionError::InsufficientData(_)));
    }

    #[test]
    fn analysis_is_idempotent() {
        let mut samples = ripple(1024, 1.0);
        samples[700] += 40.0;
        samples[701] += 20.0;
        let profile = Profile::new(samples);
        let analyzer = PulseAnalyzer::default();
        let first = analyzer.analyze("a.txt", &profile).unwrap();
        let second = analyzer.analyze("a.txt", &profile).unwrap();
        assert_eq!(first, second);
        assert_eq!(first.components.len(), 1);
        assert_eq!(first.components[0].bin, 700);
    }
}

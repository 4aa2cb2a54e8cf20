//! Common types shared across the PeaRS pulse-analysis pipeline.
//!
//! These structures represent the fundamental data objects of a
//! multi-component pulse search: the folded profile itself, the off-pulse
//! noise baseline, raw peak candidates, the finished components, the
//! per-file result and the detection configuration.

#[cfg(feature = "python")]
use pyo3::prelude::*;
use serde::{Deserialize, Serialize};

// ---------------------------------------------------------------------------
// Profile
// ---------------------------------------------------------------------------

/// A folded pulse profile: one flux value per phase bin.
///
/// Bin `i` sits at normalised phase `i / nbins`.  The profile is treated as
/// periodic, so the last bin is adjacent to the first.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Profile {
    samples: Vec<f64>,
}

impl Profile {
    pub fn new(samples: Vec<f64>) -> Self {
        Self { samples }
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }

    pub fn nbins(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Normalised phase of bin `bin`, in `[0, 1)`.
    pub fn phase_of(&self, bin: usize) -> f64 {
        bin as f64 / self.samples.len() as f64
    }

    /// Profile with `level` subtracted from every bin.
    pub fn residual(&self, level: f64) -> Vec<f64> {
        self.samples.iter().map(|&v| v - level).collect()
    }
}

impl From<Vec<f64>> for Profile {
    fn from(samples: Vec<f64>) -> Self {
        Self::new(samples)
    }
}

// ---------------------------------------------------------------------------
// BaselineStats
// ---------------------------------------------------------------------------

/// Noise baseline measured over the off-pulse window.
///
/// `rms` is always strictly positive and finite: a flat window is reported
/// as [`crate::pipeline::DetectionError::ZeroNoise`] instead.
#[cfg_attr(feature = "python", pyclass(get_all))]
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct BaselineStats {
    /// Robust mean level of the off-pulse samples.
    pub mean: f64,

    /// Robust standard deviation of the off-pulse samples.
    pub rms: f64,

    /// First bin of the off-pulse window (the window may wrap past the end).
    pub window_start: usize,

    /// Number of bins in the off-pulse window.
    pub window_len: usize,
}

// ---------------------------------------------------------------------------
// Candidate
// ---------------------------------------------------------------------------

/// A local maximum of the background-subtracted profile, before ranking.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Candidate {
    pub phase_bin: usize,

    /// Background-subtracted flux at `phase_bin`.
    pub amplitude: f64,
}

// ---------------------------------------------------------------------------
// Component
// ---------------------------------------------------------------------------

/// One accepted pulse component.
///
/// `phase` and `snr` form the reported pair.  The half-maximum extent and
/// the integrated boxcar SNR over that extent are carried along for plotting
/// and for follow-up inspection; they play no part in acceptance.
#[cfg_attr(feature = "python", pyclass(get_all))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Component {
    /// Normalised phase of the peak bin, in `[0, 1)`.
    pub phase: f64,

    /// Peak amplitude over baseline rms.
    pub snr: f64,

    /// Peak bin index.
    pub bin: usize,

    /// Number of bins around the peak staying at or above half its amplitude.
    pub width_bins: usize,

    /// Summed residual flux over the extent, over `rms * sqrt(width_bins)`.
    pub boxcar_snr: f64,
}

#[cfg(feature = "python")]
#[pymethods]
impl Component {
    fn __repr__(&self) -> String {
        format!(
            "Component(phase={:.4}, snr={:.2}, width={} bins, boxcar_snr={:.2})",
            self.phase, self.snr, self.width_bins, self.boxcar_snr,
        )
    }
}

// ---------------------------------------------------------------------------
// ProfileResult
// ---------------------------------------------------------------------------

/// Outcome of analysing one profile.
///
/// Components are ordered by ascending phase so that reported pairs read
/// left to right across the profile.  An empty list is a valid result.
#[cfg_attr(feature = "python", pyclass(get_all))]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ProfileResult {
    pub filename: String,
    pub nbins: usize,
    pub baseline: BaselineStats,
    pub components: Vec<Component>,
}

impl ProfileResult {
    /// Serialise the result to a pretty-printed JSON string.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// `(phase, snr)` pairs in reporting order.
    pub fn pairs(&self) -> Vec<(f64, f64)> {
        self.components.iter().map(|c| (c.phase, c.snr)).collect()
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl ProfileResult {
    #[pyo3(name = "to_json")]
    fn py_to_json(&self) -> PyResult<String> {
        self.to_json()
            .map_err(|e| pyo3::exceptions::PyValueError::new_err(e.to_string()))
    }

    fn __repr__(&self) -> String {
        format!(
            "ProfileResult(file='{}', nbins={}, components={}, rms={:.4e})",
            self.filename,
            self.nbins,
            self.components.len(),
            self.baseline.rms,
        )
    }
}

// ---------------------------------------------------------------------------
// DetectionParams
// ---------------------------------------------------------------------------

/// How the off-pulse window is chosen.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum OffPulseWindow {
    /// The contiguous (phase-wrapping) run of `ceil(width_fraction * nbins)`
    /// bins whose even-numbered bins have the lowest summed flux.  Ties go to
    /// the earliest start bin.  Statistics come from the odd-numbered bins.
    Lowest { width_fraction: f64 },

    /// A fixed bin range `start..end`, for instruments where the on-pulse
    /// window is known in advance.
    Fixed { start: usize, end: usize },
}

impl Default for OffPulseWindow {
    fn default() -> Self {
        OffPulseWindow::Lowest {
            width_fraction: 0.25,
        }
    }
}

/// Thresholds and tuning knobs for a single-profile analysis.
///
/// Every field has a default chosen for 10-sigma screening of folded
/// profiles with a handful of components.
#[cfg_attr(feature = "python", pyclass)]
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectionParams {
    /// Minimum peak SNR for a component to be reported.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub snr_threshold: f64,

    /// Maximum number of components reported per profile.  Matches the
    /// width of the summary table.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub max_components: usize,

    /// Candidates must exceed this multiple of the baseline rms.  Kept well
    /// below `snr_threshold` so weak neighbours still compete for their
    /// separation slot.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub detection_floor_sigma: f64,

    /// Minimum circular distance, in bins, between two candidates.  Set it
    /// to the narrowest pulse width you expect.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub min_separation_bins: usize,

    pub off_pulse: OffPulseWindow,

    /// Smallest acceptable off-pulse window.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub min_off_pulse_bins: usize,

    /// Samples further than this many rms from the centre are clipped while
    /// refining the baseline.
    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub clip_sigma: f64,

    #[cfg_attr(feature = "python", pyo3(get, set))]
    pub clip_iterations: usize,
}

impl Default for DetectionParams {
    fn default() -> Self {
        Self {
            snr_threshold: 10.0,
            max_components: 4,
            detection_floor_sigma: 3.0,
            min_separation_bins: 8,
            off_pulse: OffPulseWindow::default(),
            min_off_pulse_bins: 16,
            clip_sigma: 3.0,
            clip_iterations: 5,
        }
    }
}

impl DetectionParams {
    /// Minimum separation expressed in normalised phase for a profile of
    /// `nbins` bins.
    pub fn min_separation_phase(&self, nbins: usize) -> f64 {
        self.min_separation_bins as f64 / nbins as f64
    }
}

#[cfg(feature = "python")]
#[pymethods]
impl DetectionParams {
    /// Create detection parameters from Python.
    ///
    /// Passing both `off_pulse_start` and `off_pulse_end` selects a fixed
    /// off-pulse window; otherwise the lowest window of
    /// `off_pulse_fraction` of the profile is used.
    #[new]
    #[pyo3(signature = (
        snr_threshold=10.0,
        max_components=4,
        detection_floor_sigma=3.0,
        min_separation_bins=8,
        off_pulse_fraction=0.25,
        off_pulse_start=None,
        off_pulse_end=None,
    ))]
    pub fn py_new(
        snr_threshold: f64,
        max_components: usize,
        detection_floor_sigma: f64,
        min_separation_bins: usize,
        off_pulse_fraction: f64,
        off_pulse_start: Option<usize>,
        off_pulse_end: Option<usize>,
    ) -> Self {
        let off_pulse = match (off_pulse_start, off_pulse_end) {
            (Some(start), Some(end)) => OffPulseWindow::Fixed { start, end },
            _ => OffPulseWindow::Lowest {
                width_fraction: off_pulse_fraction,
            },
        };
        Self {
            snr_threshold,
            max_components,
            detection_floor_sigma,
            min_separation_bins,
            off_pulse,
            ..Self::default()
        }
    }

    fn __repr__(&self) -> String {
        format!(
            "DetectionParams(snr_threshold={:.1}, max_components={}, floor={:.1} sigma, min_sep={} bins, off_pulse={:?})",
            self.snr_threshold,
            self.max_components,
            self.detection_floor_sigma,
            self.min_separation_bins,
            self.off_pulse,
        )
    }
}

//! # pears-core
//!
//! Peak-finding and SNR for radio signals: detects the individual pulse
//! components of folded pulsar and fast-radio-burst profiles and reports the
//! phase and signal-to-noise ratio of each, with optional Python bindings
//! via [PyO3](https://pyo3.rs).
//!
//! ## Overview
//!
//! | Module        | Purpose                                                    |
//! |---------------|------------------------------------------------------------|
//! | [`baseline`]  | Robust off-pulse mean and rms                              |
//! | [`peaks`]     | Local maxima above a detection floor, with separation      |
//! | [`resolver`]  | Ranks, truncates and SNR-filters candidates                |
//! | [`snr`]       | Peak SNR, phase, half-maximum extent and boxcar SNR        |
//! | [`pipeline`]  | [`PulseAnalyzer`] — the four stages on one profile         |
//! | [`archive`]   | Profile loading (`pdv` text dumps, weighted cube collapse) |
//! | [`catalog`]   | Input catalog parsing and the `snr_xprof` admission gate   |
//! | [`batch`]     | Parallel processing of catalog entries                     |
//! | [`report`]    | Summary TSV output and skip log                            |
//! | `plot`        | Batched PNG figures (feature `plot`)                       |
//! | [`types`]     | Shared data structures (profiles, components, params)      |
//!
//! ## Rust usage
//!
//! ```
//! use pears_core::{Profile, PulseAnalyzer};
//!
//! let mut samples: Vec<f64> = (0..512).map(|i| ((i as f64) * 2.4).sin()).collect();
//! samples[400] += 60.0;
//!
//! let result = PulseAnalyzer::default()
//!     .analyze("obs.txt", &Profile::new(samples))
//!     .unwrap();
//! assert_eq!(result.components.len(), 1);
//! ```
//!
//! ## Python usage
//!
//! Built with `--features python`, the library exposes a module called
//! `pears_core`:
//!
//! ```python
//! import pears_core
//!
//! params = pears_core.DetectionParams(snr_threshold=10.0, max_components=4)
//! analyzer = pears_core.PulseAnalyzer(params)
//! result = analyzer.analyze("obs.ar", profile.tolist())
//!
//! for component in result.components:
//!     print(component)
//! ```

pub mod archive;
pub mod baseline;
pub mod batch;
pub mod catalog;
pub mod peaks;
pub mod pipeline;
#[cfg(feature = "plot")]
pub mod plot;
pub mod report;
pub mod resolver;
pub mod snr;
pub mod types;

// Re-export the most commonly used items at crate root for convenience.
pub use archive::{ArchiveReader, AsciiProfileReader, LoadError, ProfileSource};
pub use batch::{BatchOutcome, BatchParams, BatchProcessor, PipelineConfig};
pub use catalog::CatalogEntry;
pub use pipeline::{DetectionError, PulseAnalyzer};
pub use types::{
    BaselineStats, Candidate, Component, DetectionParams, OffPulseWindow, Profile, ProfileResult,
};

#[cfg(feature = "python")]
use pyo3::prelude::*;

/// The top-level Python module exposed by this crate.
///
/// Registered classes:
/// - `PulseAnalyzer` — single-profile analysis engine
/// - `DetectionParams` — thresholds and window selection
/// - `ProfileResult` — per-file result
/// - `Component` — one accepted pulse component
/// - `BaselineStats` — off-pulse noise level
#[cfg(feature = "python")]
#[pymodule]
fn pears_core(m: &Bound<'_, PyModule>) -> PyResult<()> {
    m.add_class::<PulseAnalyzer>()?;
    m.add_class::<DetectionParams>()?;
    m.add_class::<ProfileResult>()?;
    m.add_class::<Component>()?;
    m.add_class::<BaselineStats>()?;

    m.add("__version__", env!("CARGO_PKG_VERSION"))?;
    m.add("__doc__", "Multi-component pulse detection and SNR measurement.")?;

    Ok(())
}

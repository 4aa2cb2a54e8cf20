//! Synthetic profiles for integration tests.
#![allow(dead_code)]

use pears_core::baseline::estimate_baseline;
use pears_core::{BaselineStats, DetectionParams, OffPulseWindow, Profile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

pub const NBINS: usize = 1024;

/// Uniform noise on `[-sqrt(3), sqrt(3))` has unit variance and is bounded,
/// so no noise sample ever reaches the 3-sigma detection floor.
const UNIFORM_HALF_WIDTH: f64 = 1.732_050_807_568_877_2;

pub fn noise(seed: u64) -> Vec<f64> {
    let mut rng = StdRng::seed_from_u64(seed);
    (0..NBINS)
        .map(|_| rng.random_range(-UNIFORM_HALF_WIDTH..UNIFORM_HALF_WIDTH))
        .collect()
}

/// Parameters with the off-pulse window pinned to the first quarter, where
/// synthetic components are never placed.
pub fn params() -> DetectionParams {
    DetectionParams {
        off_pulse: OffPulseWindow::Fixed { start: 0, end: 256 },
        ..DetectionParams::default()
    }
}

/// Baseline of the untouched off-pulse quarter of `samples`.
pub fn baseline(samples: &[f64]) -> BaselineStats {
    estimate_baseline(&Profile::new(samples.to_vec()), &params()).unwrap()
}

/// Add a Gaussian component of width `sigma_bins` whose peak bin lands
/// exactly `k` baseline rms above the baseline mean.
pub fn add_component(
    samples: &mut [f64],
    stats: &BaselineStats,
    centre: usize,
    k: f64,
    sigma_bins: f64,
) {
    let reach = (5.0 * sigma_bins).ceil() as isize;
    for d in -reach..=reach {
        let i = centre as isize + d;
        if i < 0 || i as usize >= samples.len() {
            continue;
        }
        let shape = (-(d * d) as f64 / (2.0 * sigma_bins * sigma_bins)).exp();
        samples[i as usize] += k * stats.rms * shape;
    }
    samples[centre] = stats.mean + k * stats.rms;
}

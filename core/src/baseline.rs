//! Off-pulse baseline estimation.
//!
//! The noise level drives every later decision, so it has to survive the
//! usual contaminants of a folded profile: leakage from the pulse wings,
//! isolated RFI spikes and a baseline that is offset from zero.
//!
//! 1. **Window selection** — either a fixed bin range, or the contiguous
//!    (phase-wrapping) window with the lowest summed flux.
//! 2. **Robust seed** — median and `1.4826 * MAD` of the window.
//! 3. **Sigma clipping** — iteratively drop samples further than
//!    `clip_sigma` rms from the centre and recompute mean and standard
//!    deviation until the kept set stops changing.
//!
//! Every step commutes with adding a constant to the profile, so the rms is
//! independent of the baseline offset while the mean tracks it.
//!
//! Picking the window with the lowest sum also picks the window whose noise
//! happens to be lowest, which drags the mean down by roughly a tenth of an
//! rms on a 1024-bin profile.  The lowest window is therefore ranked on
//! even-numbered bins only and measured on the odd-numbered bins inside it:
//! for uncorrelated noise the measured samples are independent of the
//! ranking and the estimate is unbiased.  A fixed window uses every bin.
//!
//! Profiles holding a NaN or infinite sample are rejected up front.

use log::trace;

use crate::pipeline::DetectionError;
use crate::types::{BaselineStats, DetectionParams, OffPulseWindow, Profile};

/// Scale factor turning a median absolute deviation into a Gaussian sigma.
const MAD_TO_SIGMA: f64 = 1.4826;

/// Smallest profile we attempt to analyse.
const MIN_PROFILE_BINS: usize = 3;

/// Measure the off-pulse mean and rms of `profile`.
pub fn estimate_baseline(
    profile: &Profile,
    params: &DetectionParams,
) -> Result<BaselineStats, DetectionError> {
    let nbins = profile.nbins();
    if nbins < MIN_PROFILE_BINS {
        return Err(DetectionError::InsufficientData(format!(
            "profile has {} bins, need at least {}",
            nbins, MIN_PROFILE_BINS
        )));
    }
    if let Some(bad) = profile.samples().iter().position(|v| !v.is_finite()) {
        return Err(DetectionError::InsufficientData(format!(
            "bin {} holds a non-finite sample ({})",
            bad,
            profile.samples()[bad]
        )));
    }

    let (window_start, window_len) = select_window(profile.samples(), params)?;
    let measured = |bin: usize| match params.off_pulse {
        OffPulseWindow::Fixed { .. } => true,
        OffPulseWindow::Lowest { .. } => bin % 2 == 1,
    };
    let window: Vec<f64> = (0..window_len)
        .map(|k| (window_start + k) % nbins)
        .filter(|&bin| measured(bin))
        .map(|bin| profile.samples()[bin])
        .collect();

    let (mean, rms) = clipped_stats(&window, params.clip_sigma, params.clip_iterations);
    if !(rms.is_finite() && rms > 0.0) || !mean.is_finite() {
        return Err(DetectionError::ZeroNoise);
    }

    Ok(BaselineStats {
        mean,
        rms,
        window_start,
        window_len,
    })
}

/// Resolve the configured off-pulse window to `(start, len)`.
///
/// The returned window may wrap past the last bin.
pub fn select_window(
    samples: &[f64],
    params: &DetectionParams,
) -> Result<(usize, usize), DetectionError> {
    let nbins = samples.len();
    let (start, len) = match params.off_pulse {
        OffPulseWindow::Fixed { start, end } => {
            if end <= start || end > nbins {
                return Err(DetectionError::InsufficientData(format!(
                    "off-pulse window {}..{} does not fit a {}-bin profile",
                    start, end, nbins
                )));
            }
            (start, end - start)
        }
        OffPulseWindow::Lowest { width_fraction } => {
            if !(width_fraction > 0.0 && width_fraction < 1.0) {
                return Err(DetectionError::InsufficientData(format!(
                    "off-pulse width fraction {} must lie in (0, 1)",
                    width_fraction
                )));
            }
            let width = ((width_fraction * nbins as f64).ceil() as usize).min(nbins - 1);
            (lowest_window_start(samples, width), width)
        }
    };

    if len < params.min_off_pulse_bins {
        return Err(DetectionError::InsufficientData(format!(
            "off-pulse window of {} bins is shorter than the minimum {}",
            len, params.min_off_pulse_bins
        )));
    }
    Ok((start, len))
}

/// Start bin of the circular window of `width` bins whose even-numbered
/// bins have the smallest sum.
fn lowest_window_start(samples: &[f64], width: usize) -> usize {
    let n = samples.len();
    let ranked: Vec<f64> = samples
        .iter()
        .enumerate()
        .map(|(i, &v)| if i % 2 == 0 { v } else { 0.0 })
        .collect();
    let samples = &ranked;
    let mut sum: f64 = samples[..width].iter().sum();
    let mut best = (sum, 0usize);

    for start in 1..n {
        // Slide by one: drop the bin leaving on the left, add the one entering
        // on the right (wrapping).
        sum += samples[(start + width - 1) % n] - samples[start - 1];
        if sum < best.0 {
            best = (sum, start);
        }
    }
    best.1
}

/// Robust `(mean, rms)` of `values` by MAD-seeded iterative sigma clipping.
fn clipped_stats(values: &[f64], clip_sigma: f64, max_iterations: usize) -> (f64, f64) {
    let mut center = median(values);
    let deviations: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();
    let mut scale = MAD_TO_SIGMA * median(&deviations);

    if scale <= 0.0 {
        // Quantised data can have more than half its samples on one value.
        let (m, s) = mean_std(values.iter().copied());
        center = m;
        scale = s;
    }

    let mut kept_len = values.len();
    for iteration in 0..max_iterations {
        if scale <= 0.0 {
            break;
        }
        let limit = clip_sigma * scale;
        let kept: Vec<f64> = values
            .iter()
            .copied()
            .filter(|v| (v - center).abs() <= limit)
            .collect();
        if kept.len() < 2 {
            break;
        }

        let (m, s) = mean_std(kept.iter().copied());
        center = m;
        scale = s;
        trace!(
            "clip iteration {}: kept {}/{} mean={:.4e} rms={:.4e}",
            iteration,
            kept.len(),
            values.len(),
            center,
            scale,
        );

        if iteration > 0 && kept.len() == kept_len {
            break;
        }
        kept_len = kept.len();
    }

    (center, scale)
}

/// Median of `values` (mean of the two middle values for even lengths).
fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        0.5 * (sorted[mid - 1] + sorted[mid])
    } else {
        sorted[mid]
    }
}

/// Mean and population standard deviation.
fn mean_std(values: impl Iterator<Item = f64> + Clone) -> (f64, f64) {
    let (count, sum) = values.clone().fold((0usize, 0.0), |(c, s), v| (c + 1, s + v));
    if count == 0 {
        return (0.0, 0.0);
    }
    let mean = sum / count as f64;
    let var = values.map(|v| (v - mean) * (v - mean)).sum::<f64>() / count as f64;
    (mean, var.sqrt())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ripple(n: usize) -> Vec<f64> {
        (0..n)
            .map(|i| (i as f64 * 2.399_963).sin() * 0.7 + (i as f64 * 0.618_034).cos() * 0.3)
            .collect()
    }

    #[test]
    fn rms_is_offset_invariant() {
        let params = DetectionParams {
            off_pulse: OffPulseWindow::Fixed { start: 64, end: 320 },
            ..DetectionParams::default()
        };
        let base = ripple(512);
        let shifted: Vec<f64> = base.iter().map(|v| v + 1234.5).collect();

        let a = estimate_baseline(&Profile::new(base), &params).unwrap();
        let b = estimate_baseline(&Profile::new(shifted), &params).unwrap();

        assert!((a.rms - b.rms).abs() < 1e-9, "rms {} vs {}", a.rms, b.rms);
        assert!((b.mean - a.mean - 1234.5).abs() < 1e-9);
        assert_eq!(a.window_start, b.window_start);
    }

    #[test]
    fn lowest_window_avoids_the_pulse() {
        let mut samples = ripple(400);
        for v in samples.iter_mut().skip(100).take(100) {
            *v += 50.0;
        }
        let params = DetectionParams::default();
        let stats = estimate_baseline(&Profile::new(samples), &params).unwrap();

        assert_eq!(stats.window_len, 100);
        let covered: Vec<usize> = (0..stats.window_len)
            .map(|k| (stats.window_start + k) % 400)
            .collect();
        assert!(covered.iter().all(|&b| !(100..200).contains(&b)));
        assert!(stats.mean.abs() < 1.0);
        assert!(stats.rms < 1.0);
    }

    #[test]
    fn lowest_window_can_wrap() {
        let mut samples = vec![10.0; 100];
        for (i, v) in samples.iter_mut().enumerate() {
            if i >= 90 || i < 10 {
                *v = (i % 3) as f64;
            }
        }
        let start = lowest_window_start(&samples, 20);
        let covered: Vec<usize> = (start..start + 20).map(|b| b % 100).collect();
        assert!(covered.contains(&99) && covered.contains(&0), "start {}", start);
    }

    #[test]
    fn lowest_window_is_measured_on_odd_bins() {
        // Even bins rank the window; odd bins carry a distinct level.
        let samples: Vec<f64> = (0..200)
            .map(|i| if i % 2 == 0 { 0.0 } else { 5.0 + (i % 7) as f64 })
            .collect();
        let stats = estimate_baseline(&Profile::new(samples), &DetectionParams::default()).unwrap();
        assert!(stats.mean > 5.0, "mean {}", stats.mean);
    }

    #[test]
    fn non_finite_samples_are_rejected() {
        let mut samples = ripple(1024);
        for i in (0..1024).step_by(37) {
            samples[i] = f64::NAN;
        }
        samples[500] = f64::INFINITY;
        for params in [
            DetectionParams::default(),
            DetectionParams {
                off_pulse: OffPulseWindow::Fixed { start: 0, end: 512 },
                ..DetectionParams::default()
            },
        ] {
            let err = estimate_baseline(&Profile::new(samples.clone()), &params).unwrap_err();
            assert!(matches!(err, DetectionError::InsufficientData(_)), "{:?}", err);
        }
    }

    #[test]
    fn median_orders_nan_without_panicking() {
        // Positive NaN sorts after every number.
        let m = median(&[3.0, f64::NAN, 1.0, 2.0, f64::NAN, 0.5]);
        assert_eq!(m, 2.5);
    }

    #[test]
    fn clipping_rejects_spikes() {
        let mut window = ripple(256);
        window[17] = 500.0;
        window[90] = -300.0;
        let (clean_mean, clean_rms) = clipped_stats(&ripple(256), 3.0, 5);
        let (mean, rms) = clipped_stats(&window, 3.0, 5);
        assert!(rms < clean_rms * 1.1);
        assert!((mean - clean_mean).abs() < 0.05);
    }

    #[test]
    fn fixed_window_bounds_are_checked() {
        let params = DetectionParams {
            off_pulse: OffPulseWindow::Fixed { start: 0, end: 1024 },
            ..DetectionParams::default()
        };
        let err = estimate_baseline(&Profile::new(ripple(512)), &params).unwrap_err();
        assert!(matches!(err, DetectionError::InsufficientData(_)));
    }

    #[test]
    fn narrow_window_is_insufficient() {
        let params = DetectionParams {
            off_pulse: OffPulseWindow::Fixed { start: 0, end: 8 },
            ..DetectionParams::default()
        };
        let err = estimate_baseline(&Profile::new(ripple(512)), &params).unwrap_err();
        assert!(matches!(err, DetectionError::InsufficientData(_)));
    }

    #[test]
    fn median_handles_even_lengths() {
        assert_eq!(median(&[4.0, 1.0, 3.0, 2.0]), 2.5);
        assert_eq!(median(&[5.0, 1.0, 3.0]), 3.0);
    }
}

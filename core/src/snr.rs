//! Signal-to-noise and phase conversions for accepted peaks.
//!
//! The peak SNR is the background-subtracted amplitude at the peak bin over
//! the baseline rms, with no smoothing.  The boxcar SNR integrates the
//! residual across the component's half-maximum extent instead, scaling the
//! noise by `sqrt(width)` as for a sum of independent samples.

use crate::pipeline::DetectionError;
use crate::types::{BaselineStats, Candidate, Component};

/// Peak SNR: `amplitude / rms`.
///
/// A zero, negative or non-finite rms means the baseline estimate failed
/// upstream and is reported as [`DetectionError::ZeroNoise`] rather than
/// leaking an infinite or NaN ratio.
pub fn peak_snr(amplitude: f64, rms: f64) -> Result<f64, DetectionError> {
    if !(rms.is_finite() && rms > 0.0) {
        return Err(DetectionError::ZeroNoise);
    }
    Ok(amplitude / rms)
}

/// Normalised phase of `bin` on a profile of `nbins` bins, in `[0, 1)`.
pub fn bin_to_phase(bin: usize, nbins: usize) -> Result<f64, DetectionError> {
    if bin >= nbins {
        return Err(DetectionError::InsufficientData(format!(
            "bin {} outside a {}-bin profile",
            bin, nbins
        )));
    }
    Ok(bin as f64 / nbins as f64)
}

/// Half-maximum extent of the peak at `bin` as `(first_bin, width)`.
///
/// Walks outwards while the residual stays at or above half the peak value.
/// The extent wraps around the profile ends and never exceeds one full turn.
pub fn half_max_extent(residual: &[f64], bin: usize) -> (usize, usize) {
    let n = residual.len();
    let half = 0.5 * residual[bin];

    let mut left = 0;
    while left + 1 < n && residual[(bin + n - left - 1) % n] >= half {
        left += 1;
    }
    let mut right = 0;
    while left + right + 1 < n && residual[(bin + right + 1) % n] >= half {
        right += 1;
    }

    ((bin + n - left) % n, left + right + 1)
}

/// Integrated SNR over `width` bins starting at `start` (wrapping).
pub fn boxcar_snr(
    residual: &[f64],
    start: usize,
    width: usize,
    rms: f64,
) -> Result<f64, DetectionError> {
    let n = residual.len();
    let flux: f64 = (0..width).map(|k| residual[(start + k) % n]).sum();
    peak_snr(flux, rms * (width as f64).sqrt())
}

/// Turn a candidate into a fully annotated [`Component`].
pub fn annotate(
    candidate: &Candidate,
    residual: &[f64],
    baseline: &BaselineStats,
) -> Result<Component, DetectionError> {
    let nbins = residual.len();
    let phase = bin_to_phase(candidate.phase_bin, nbins)?;
    let snr = peak_snr(candidate.amplitude, baseline.rms)?;
    let (start, width_bins) = half_max_extent(residual, candidate.phase_bin);
    let boxcar_snr = boxcar_snr(residual, start, width_bins, baseline.rms)?;

    Ok(Component {
        phase,
        snr,
        bin: candidate.phase_bin,
        width_bins,
        boxcar_snr,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snr_is_amplitude_over_rms() {
        assert_eq!(peak_snr(20.0, 2.0).unwrap(), 10.0);
    }

    #[test]
    fn zero_rms_is_an_error() {
        assert_eq!(peak_snr(5.0, 0.0), Err(DetectionError::ZeroNoise));
        assert_eq!(peak_snr(5.0, f64::NAN), Err(DetectionError::ZeroNoise));
        assert_eq!(peak_snr(5.0, -1.0), Err(DetectionError::ZeroNoise));
    }

    #[test]
    fn phase_stays_below_one() {
        assert_eq!(bin_to_phase(0, 1024).unwrap(), 0.0);
        assert!((bin_to_phase(1023, 1024).unwrap() - 1023.0 / 1024.0).abs() < 1e-15);
        assert!(bin_to_phase(1024, 1024).is_err());
        assert!(bin_to_phase(0, 0).is_err());
    }

    #[test]
    fn extent_covers_half_maximum() {
        let residual = [0.0, 1.0, 6.0, 10.0, 7.0, 4.0, 0.0, 0.0];
        assert_eq!(half_max_extent(&residual, 3), (2, 3));
    }

    #[test]
    fn extent_wraps() {
        let residual = [10.0, 8.0, 0.0, 0.0, 0.0, 9.0];
        assert_eq!(half_max_extent(&residual, 0), (5, 3));
    }

    #[test]
    fn extent_never_exceeds_profile() {
        let residual = [5.0; 6];
        let (_, width) = half_max_extent(&residual, 2);
        assert_eq!(width, 6);
    }

    #[test]
    fn boxcar_scales_with_sqrt_width() {
        let residual = [0.0, 4.0, 4.0, 4.0, 4.0, 0.0];
        let snr = boxcar_snr(&residual, 1, 4, 1.0).unwrap();
        assert!((snr - 8.0).abs() < 1e-12);
    }

    #[test]
    fn annotate_fills_every_field() {
        let residual = [0.0, 0.0, 3.0, 12.0, 3.0, 0.0, 0.0, 0.0];
        let baseline = BaselineStats {
            mean: 0.0,
            rms: 1.2,
            window_start: 5,
            window_len: 3,
        };
        let c = annotate(&Candidate { phase_bin: 3, amplitude: 12.0 }, &residual, &baseline)
            .unwrap();
        assert!((c.snr - 10.0).abs() < 1e-12);
        assert!((c.phase - 0.375).abs() < 1e-12);
        assert_eq!(c.width_bins, 1);
        assert!((c.boxcar_snr - 10.0).abs() < 1e-12);
    }
}

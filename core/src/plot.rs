//! Batched profile figures (cargo feature `plot`).
//!
//! Processed profiles are drawn in groups (five per figure by default), one
//! stacked panel per file.  Each panel shows the background-subtracted
//! profile against pulse phase; components above the SNR threshold get their
//! half-maximum region shaded and their peak phase marked.

use std::fs;
use std::path::{Path, PathBuf};

use log::info;
use plotters::coord::Shift;
use plotters::drawing::DrawingAreaErrorKind;
use plotters::prelude::*;

use crate::batch::{BatchOutcome, PlotBatch, ProcessedProfile};
use crate::snr::half_max_extent;

const PANEL_WIDTH: u32 = 1000;
const PANEL_HEIGHT: u32 = 300;

#[derive(Debug, thiserror::Error)]
pub enum PlotError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("drawing failed: {0}")]
    Draw(String),
}

impl<E: std::error::Error + Send + Sync> From<DrawingAreaErrorKind<E>> for PlotError {
    fn from(e: DrawingAreaErrorKind<E>) -> Self {
        PlotError::Draw(e.to_string())
    }
}

/// Render every plot batch of `outcome` into `output_dir`.
pub fn render_outcome(
    outcome: &BatchOutcome,
    batch_size: usize,
    snr_threshold: f64,
    output_dir: &Path,
) -> Result<Vec<PathBuf>, PlotError> {
    outcome
        .plot_batches(batch_size)
        .iter()
        .map(|batch| render_batch(batch, snr_threshold, output_dir))
        .collect()
}

/// Render one batch as `combined_pulses_batch_<index>.png`.
pub fn render_batch(
    batch: &PlotBatch<'_>,
    snr_threshold: f64,
    output_dir: &Path,
) -> Result<PathBuf, PlotError> {
    fs::create_dir_all(output_dir)?;
    let path = output_dir.join(format!("combined_pulses_batch_{}.png", batch.index));

    let rows = batch.profiles.len().max(1);
    {
        let root =
            BitMapBackend::new(&path, (PANEL_WIDTH, PANEL_HEIGHT * rows as u32)).into_drawing_area();
        root.fill(&WHITE)?;
        let panels = root.split_evenly((rows, 1));
        for (panel, processed) in panels.iter().zip(batch.profiles) {
            draw_panel(panel, processed, snr_threshold)?;
        }
        root.present()?;
    }

    info!("Wrote {} ({} profiles)", path.display(), batch.profiles.len());
    Ok(path)
}

fn draw_panel(
    area: &DrawingArea<BitMapBackend<'_>, Shift>,
    processed: &ProcessedProfile,
    snr_threshold: f64,
) -> Result<(), PlotError> {
    let result = &processed.result;
    let nbins = result.nbins as f64;
    let residual = processed.profile.residual(result.baseline.mean);

    let (y_min, y_max) = residual
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let pad = 0.05 * (y_max - y_min).abs().max(1e-9);
    let (y_lo, y_hi) = (y_min - pad, y_max + pad);

    let mut chart = ChartBuilder::on(area)
        .margin(10)
        .caption(&result.filename, ("sans-serif", 18))
        .x_label_area_size(30)
        .y_label_area_size(60)
        .build_cartesian_2d(0f64..1f64, y_lo..y_hi)?;

    chart
        .configure_mesh()
        .x_desc("Pulse phase")
        .y_desc("Flux density")
        .draw()?;

    for c in result.components.iter().filter(|c| c.snr > snr_threshold) {
        let (start, width) = half_max_extent(&residual, c.bin);
        let x0 = start as f64 / nbins;
        let x1 = x0 + width as f64 / nbins;
        for (a, b) in phase_spans(x0, x1) {
            chart.draw_series(std::iter::once(Rectangle::new(
                [(a, y_lo), (b, y_hi)],
                BLUE.mix(0.1).filled(),
            )))?;
        }
        chart.draw_series(LineSeries::new(vec![(c.phase, y_lo), (c.phase, y_hi)], &RED))?;
    }

    chart.draw_series(LineSeries::new(
        residual
            .iter()
            .enumerate()
            .map(|(i, &v)| (i as f64 / nbins, v)),
        &BLACK,
    ))?;

    Ok(())
}

/// Split a phase interval that may run past 1.0 into in-range pieces.
fn phase_spans(x0: f64, x1: f64) -> Vec<(f64, f64)> {
    if x1 <= 1.0 {
        vec![(x0, x1)]
    } else {
        vec![(x0, 1.0), (0.0, x1 - 1.0)]
    }
}
